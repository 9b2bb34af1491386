//! Analysis job lifecycle: submission to terminal, persisted outcome.
//!
//! `submit` writes the `pending` record before any asynchronous work, so
//! the job exists durably even if the process dies mid-flight. The external
//! call runs exactly once per job, with no retry; a failure is terminal and
//! the user resubmits. Background mode detaches the settle task with no
//! cancellation handle; its only coordination point is the store write, and
//! the store refuses a second terminal write per id.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::analysis::{AnalysisClient, AnalysisContext, ImagePayload};
use crate::history::HistoryHandle;
use crate::models::{ChatMessage, HistoryItem, JobOutcome, Language, MessageRole};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// Rejected before any job record is created.
    #[error("At least one image is required")]
    NoImages,
}

/// One submission: a batch of page images analyzed as a unit.
pub struct SubmitRequest {
    pub images: Vec<ImagePayload>,
    /// Profile the job belongs to; `None` only for legacy-style callers.
    pub profile_id: Option<Uuid>,
    pub context: AnalysisContext,
    pub language: Language,
    /// When true the caller does not wait for settlement.
    pub background: bool,
}

/// What `submit` hands back. `settled` carries the terminal record in
/// foreground mode and is `None` for background submissions.
#[derive(Debug)]
pub struct Submission {
    pub job_id: Uuid,
    pub settled: Option<HistoryItem>,
}

/// Drives analysis jobs against the history store.
pub struct JobRunner {
    history: HistoryHandle,
    client: Arc<dyn AnalysisClient>,
}

impl JobRunner {
    pub fn new(history: HistoryHandle, client: Arc<dyn AnalysisClient>) -> Self {
        Self { history, client }
    }

    /// Submit one batch of images for analysis.
    ///
    /// The `pending` record is created and persisted before this returns
    /// the job id. Concurrent submissions are independent: no dedup, no
    /// coalescing, duplicate content yields duplicate jobs.
    pub async fn submit(&self, req: SubmitRequest) -> Result<Submission, SubmitError> {
        if req.images.is_empty() {
            return Err(SubmitError::NoImages);
        }

        let data_urls = req.images.iter().map(|i| i.to_data_url()).collect();
        let item = HistoryItem::pending(req.profile_id, req.context.report_date.clone(), data_urls);
        let job_id = item.id;
        self.history.insert(item).await;

        tracing::info!(
            %job_id,
            pages = req.images.len(),
            background = req.background,
            "analysis job submitted"
        );

        let run = run_job(
            self.history.clone(),
            Arc::clone(&self.client),
            job_id,
            req.images,
            req.context,
            req.language,
        );

        if req.background {
            tokio::spawn(run);
            Ok(Submission {
                job_id,
                settled: None,
            })
        } else {
            run.await;
            let settled = self.history.get(job_id).await;
            Ok(Submission { job_id, settled })
        }
    }

    /// Append a follow-up Q&A message to a completed job. Pending, failed
    /// or unknown jobs make this a silent no-op (returns false).
    pub async fn append_chat_message(
        &self,
        job_id: Uuid,
        role: MessageRole,
        content: impl Into<String>,
    ) -> bool {
        self.history
            .append_chat(job_id, ChatMessage::new(role, content))
            .await
    }
}

/// One external call, then the single terminal write for this job id.
async fn run_job(
    history: HistoryHandle,
    client: Arc<dyn AnalysisClient>,
    job_id: Uuid,
    images: Vec<ImagePayload>,
    context: AnalysisContext,
    language: Language,
) {
    let call = tokio::task::spawn_blocking(move || client.analyze(&images, &context, language));

    let outcome = match call.await {
        Ok(Ok(result)) => {
            tracing::info!(%job_id, kind = ?result.kind, "analysis completed");
            JobOutcome::Completed(result)
        }
        Ok(Err(e)) => {
            tracing::warn!(%job_id, error = %e, "analysis failed");
            JobOutcome::Failed(e.to_string())
        }
        Err(e) => {
            tracing::error!(%job_id, error = %e, "analysis task panicked");
            JobOutcome::Failed("Analysis stopped unexpectedly. Please try again.".to_string())
        }
    };

    history.settle(job_id, outcome).await;
}
