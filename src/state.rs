//! Application state: the long-lived object a frontend binds against.
//!
//! `AppCore` owns handles to the two store tasks and the job runner, and is
//! the only state shared across callers. All mutation goes through the store
//! mailboxes, so handing out clones of this struct is safe.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::analysis::{AnalysisClient, AnalysisContext, ImagePayload};
use crate::config;
use crate::history::{HistoryHandle, HistoryStore};
use crate::jobs::{JobRunner, SubmitError, SubmitRequest, Submission};
use crate::models::{Language, MessageRole, Profile};
use crate::profiles::{ProfileHandle, ProfileStore};
use crate::storage::{
    open_database, open_memory_database, SqliteHistoryBackend, SqliteProfileBackend, StorageError,
};
use crate::trends::{self, TrendOptions, TrendPoint};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Could not prepare data directory: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Handles to the running core. Cheap to clone.
#[derive(Clone)]
pub struct AppCore {
    pub profiles: ProfileHandle,
    pub history: HistoryHandle,
    runner: Arc<JobRunner>,
}

impl AppCore {
    /// Open the database under `data_dir` (creating the directory if
    /// needed) and start the store tasks. Must be called within a tokio
    /// runtime.
    pub fn open(data_dir: &Path, client: Arc<dyn AnalysisClient>) -> Result<Self, CoreError> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = config::database_path(data_dir);
        tracing::info!(path = %db_path.display(), "opening database");

        // Each store task owns its own connection.
        let profiles =
            ProfileStore::spawn(Box::new(SqliteProfileBackend::new(open_database(&db_path)?)))?;
        let history =
            HistoryStore::spawn(Box::new(SqliteHistoryBackend::new(open_database(&db_path)?)))?;

        Ok(Self::assemble(profiles, history, client))
    }

    /// Fully in-memory core (no files touched), for tests and previews.
    pub fn open_in_memory(client: Arc<dyn AnalysisClient>) -> Result<Self, CoreError> {
        let profiles =
            ProfileStore::spawn(Box::new(SqliteProfileBackend::new(open_memory_database()?)))?;
        let history =
            HistoryStore::spawn(Box::new(SqliteHistoryBackend::new(open_memory_database()?)))?;
        Ok(Self::assemble(profiles, history, client))
    }

    fn assemble(
        profiles: ProfileHandle,
        history: HistoryHandle,
        client: Arc<dyn AnalysisClient>,
    ) -> Self {
        let runner = Arc::new(JobRunner::new(history.clone(), client));
        Self {
            profiles,
            history,
            runner,
        }
    }

    /// Submit a document for the active profile.
    ///
    /// The analysis context is taken from the active profile at submission
    /// time; later profile edits do not affect in-flight jobs.
    pub async fn submit(
        &self,
        images: Vec<ImagePayload>,
        report_date: Option<String>,
        language: Language,
        background: bool,
    ) -> Result<Submission, SubmitError> {
        let profile = self.profiles.active().await;
        let context = AnalysisContext::for_profile(&profile, report_date);
        self.runner
            .submit(SubmitRequest {
                images,
                profile_id: Some(profile.id),
                context,
                language,
                background,
            })
            .await
    }

    /// Append a follow-up Q&A message to a completed job; false when the
    /// job is unknown or not completed.
    pub async fn append_chat_message(
        &self,
        job_id: Uuid,
        role: MessageRole,
        content: impl Into<String>,
    ) -> bool {
        self.runner.append_chat_message(job_id, role, content).await
    }

    /// Cross-report series for one indicator, scoped to the active profile.
    pub async fn trend_series(
        &self,
        indicator_name: &str,
        current_date: &str,
        options: TrendOptions,
    ) -> Vec<TrendPoint> {
        let profile = self.active_profile().await;
        let items = self.history.list().await;
        trends::build_series(&items, profile.id, indicator_name, current_date, options)
    }

    pub async fn active_profile(&self) -> Profile {
        self.profiles.active().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MockAnalysisClient;
    use crate::models::{
        AnalysisResult, Indicator, IndicatorStatus, JobStatus, ResultKind,
    };

    fn glucose_report(value: f64, summary: &str) -> AnalysisResult {
        AnalysisResult {
            kind: ResultKind::Report,
            summary: summary.into(),
            indicators: vec![Indicator {
                name: "Glucose".into(),
                value: format!("{value} mg/dL"),
                value_number: None,
                unit: Some("mg/dL".into()),
                status: IndicatorStatus::High,
                explanation: String::new(),
                possible_causes: String::new(),
                reference_range: None,
                history: vec![],
            }],
            medication: None,
            questions_for_doctor: vec![],
            disclaimer: String::new(),
        }
    }

    fn one_image() -> Vec<ImagePayload> {
        vec![ImagePayload::jpeg(vec![0xFF, 0xD8])]
    }

    #[tokio::test]
    async fn submission_is_owned_by_the_active_profile() {
        let client = Arc::new(MockAnalysisClient::completing(glucose_report(105.0, "high")));
        let core = AppCore::open_in_memory(client).unwrap();
        let me = core.active_profile().await;

        let submission = core
            .submit(one_image(), Some("2024-01-15".into()), Language::En, false)
            .await
            .unwrap();

        let item = submission.settled.unwrap();
        assert_eq!(item.status, JobStatus::Completed);
        assert_eq!(item.profile_id, Some(me.id));
    }

    #[tokio::test]
    async fn two_reports_chart_a_glucose_trend() {
        // First report: 105 on 2024-01-15.
        let client = Arc::new(MockAnalysisClient::completing(glucose_report(105.0, "high")));
        let core = AppCore::open_in_memory(client).unwrap();
        core.submit(one_image(), Some("2024-01-15".into()), Language::En, false)
            .await
            .unwrap();

        // Second report two months later: 95 on 2024-03-01, via a second
        // runner sharing the same stores.
        let second = Arc::new(MockAnalysisClient::completing(glucose_report(95.0, "better")));
        let core2 = AppCore::assemble(core.profiles.clone(), core.history.clone(), second);
        core2
            .submit(one_image(), Some("2024-03-01".into()), Language::En, false)
            .await
            .unwrap();

        let series = core
            .trend_series("Glucose", "2024-03-01", TrendOptions::default())
            .await;

        // Numeric values come from the display strings; ascending by date,
        // the newest point marked current.
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, "2024-01-15");
        assert_eq!(series[0].value, 105.0);
        assert!(!series[0].is_current);
        assert_eq!(series[1].date, "2024-03-01");
        assert_eq!(series[1].value, 95.0);
        assert!(series[1].is_current);
    }

    #[tokio::test]
    async fn trend_is_scoped_to_the_active_profile() {
        let client = Arc::new(MockAnalysisClient::completing(glucose_report(105.0, "high")));
        let core = AppCore::open_in_memory(client).unwrap();
        core.submit(one_image(), Some("2024-01-15".into()), Language::En, false)
            .await
            .unwrap();

        let mom = core.profiles.create(Profile::new("Mom", "mother", "#E57373")).await;
        core.profiles.set_active(mom.id).await;

        let series = core
            .trend_series("Glucose", "2024-01-15", TrendOptions::default())
            .await;
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn chat_follows_the_job_through_the_core() {
        let client = Arc::new(MockAnalysisClient::completing(glucose_report(100.0, "ok")));
        let core = AppCore::open_in_memory(client).unwrap();

        let submission = core
            .submit(one_image(), None, Language::Zh, false)
            .await
            .unwrap();
        assert!(
            core.append_chat_message(submission.job_id, MessageRole::User, "高吗？")
                .await
        );
        assert!(
            !core
                .append_chat_message(Uuid::new_v4(), MessageRole::User, "?")
                .await
        );
    }

    #[tokio::test]
    async fn on_disk_core_survives_restart_with_repair() {
        let dir = tempfile::tempdir().unwrap();

        {
            let client = Arc::new(MockAnalysisClient::completing(glucose_report(105.0, "high")));
            let core = AppCore::open(dir.path(), client).unwrap();
            core.submit(one_image(), Some("2024-01-15".into()), Language::En, false)
                .await
                .unwrap();
        }

        let client = Arc::new(MockAnalysisClient::completing(glucose_report(95.0, "ok")));
        let core = AppCore::open(dir.path(), client).unwrap();
        let items = core.history.list().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, JobStatus::Completed);
    }
}
