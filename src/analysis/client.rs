use std::sync::atomic::{AtomicUsize, Ordering};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;

use super::AnalysisError;
use crate::models::{AnalysisResult, Language, Profile};

/// One already-decoded page image of a submitted document.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self::new("image/jpeg", bytes)
    }

    /// Data URL form, as stored in history thumbnails and original images.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.bytes))
    }
}

/// Profile attributes plus the declared report date, forwarded verbatim
/// to the provider for better interpretation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub condition: Option<String>,
    pub report_date: Option<String>,
}

impl AnalysisContext {
    pub fn for_profile(profile: &Profile, report_date: Option<String>) -> Self {
        Self {
            age: profile.context.age,
            gender: profile.context.gender.clone(),
            condition: profile.context.condition.clone(),
            report_date,
        }
    }
}

/// The consumed analysis capability. One call per job; the caller owns
/// retry policy (there is none) and timeout policy lives in the client.
pub trait AnalysisClient: Send + Sync {
    fn analyze(
        &self,
        images: &[ImagePayload],
        context: &AnalysisContext,
        language: Language,
    ) -> Result<AnalysisResult, AnalysisError>;
}

/// Canned-outcome client for tests: returns a fixed result or a fixed
/// failure, and counts invocations so exactly-once can be asserted.
pub struct MockAnalysisClient {
    outcome: MockOutcome,
    calls: AtomicUsize,
}

enum MockOutcome {
    Completes(AnalysisResult),
    FailsWith(String),
}

impl MockAnalysisClient {
    pub fn completing(result: AnalysisResult) -> Self {
        Self {
            outcome: MockOutcome::Completes(result),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: MockOutcome::FailsWith(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times `analyze` has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AnalysisClient for MockAnalysisClient {
    fn analyze(
        &self,
        _images: &[ImagePayload],
        _context: &AnalysisContext,
        _language: Language,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            MockOutcome::Completes(result) => Ok(result.clone()),
            MockOutcome::FailsWith(message) => Err(AnalysisError::Http(message.clone())),
        }
    }
}
