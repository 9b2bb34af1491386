//! History records: one `HistoryItem` per submitted analysis job.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::AnalysisResult;
use super::enums::{JobStatus, MessageRole};

/// One follow-up Q&A exchange entry attached to a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub created_at: NaiveDateTime,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Durable record of one analysis job, from submission to terminal state.
///
/// Created `pending` before the external call starts, so the record exists
/// even if the process dies mid-flight. Transitions exactly once to
/// `completed` or `failed`; after that only `chat_history` may grow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: Uuid,
    /// Owning profile. `None` on records that predate profiles; those are
    /// visible to every profile.
    pub profile_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    /// User-declared date the source document covers (free-form label).
    pub report_date: Option<String>,
    pub status: JobStatus,
    /// Present iff `status` is completed.
    pub result: Option<AnalysisResult>,
    /// Data URL of the first page, for the history list.
    pub thumbnail: Option<String>,
    /// Failure reason when failed; server summary when completed.
    pub summary: Option<String>,
    pub chat_history: Vec<ChatMessage>,
    /// Submitted pages as data URLs.
    pub original_images: Vec<String>,
}

impl HistoryItem {
    /// Build the initial `pending` record for a fresh submission.
    pub fn pending(
        profile_id: Option<Uuid>,
        report_date: Option<String>,
        original_images: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id,
            created_at: chrono::Utc::now().naive_utc(),
            report_date,
            status: JobStatus::Pending,
            result: None,
            thumbnail: original_images.first().cloned(),
            summary: None,
            chat_history: Vec::new(),
            original_images,
        }
    }

    /// Date used to place this item on a trend axis: the declared report
    /// date, or a short form of the creation timestamp.
    pub fn resolved_date(&self) -> String {
        match &self.report_date {
            Some(d) if !d.is_empty() => d.clone(),
            _ => self.created_at.format("%Y-%m-%d").to_string(),
        }
    }

    /// Whether this item is visible to the given profile.
    pub fn visible_to(&self, profile_id: Uuid) -> bool {
        match self.profile_id {
            Some(owner) => owner == profile_id,
            None => true,
        }
    }
}

/// Terminal outcome of one analysis job, applied by the history store.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed(AnalysisResult),
    Failed(String),
}
