//! Durable backend for the analysis history, behind a trait so the store
//! can run against SQLite in production and against mocks in tests.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::str::FromStr;
use uuid::Uuid;

use super::StorageError;
use crate::models::{AnalysisResult, ChatMessage, HistoryItem, JobStatus};

/// Persistence boundary for history records. Implementations must survive
/// process restarts; the in-memory store is the single writer.
pub trait HistoryBackend: Send {
    /// All persisted items, newest first.
    fn load_all(&self) -> Result<Vec<HistoryItem>, StorageError>;
    /// Insert or fully replace one item.
    fn put(&self, item: &HistoryItem) -> Result<(), StorageError>;
    fn delete(&self, id: &Uuid) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// SQLite-backed history persistence.
pub struct SqliteHistoryBackend {
    conn: Connection,
}

impl SqliteHistoryBackend {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl HistoryBackend for SqliteHistoryBackend {
    fn load_all(&self) -> Result<Vec<HistoryItem>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, profile_id, created_at, report_date, status, summary,
                    thumbnail, result_json, chat_json, images_json
             FROM history_items
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(HistoryRow {
                id: row.get(0)?,
                profile_id: row.get(1)?,
                created_at: row.get(2)?,
                report_date: row.get(3)?,
                status: row.get(4)?,
                summary: row.get(5)?,
                thumbnail: row.get(6)?,
                result_json: row.get(7)?,
                chat_json: row.get(8)?,
                images_json: row.get(9)?,
            })
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(item_from_row(row?)?);
        }
        Ok(items)
    }

    fn put(&self, item: &HistoryItem) -> Result<(), StorageError> {
        let result_json = match &item.result {
            Some(r) => Some(
                serde_json::to_string(r).map_err(|e| StorageError::payload("result_json", e))?,
            ),
            None => None,
        };
        let chat_json = serde_json::to_string(&item.chat_history)
            .map_err(|e| StorageError::payload("chat_json", e))?;
        let images_json = serde_json::to_string(&item.original_images)
            .map_err(|e| StorageError::payload("images_json", e))?;

        self.conn.execute(
            "INSERT INTO history_items
             (id, profile_id, created_at, report_date, status, summary,
              thumbnail, result_json, chat_json, images_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 summary = excluded.summary,
                 result_json = excluded.result_json,
                 chat_json = excluded.chat_json",
            params![
                item.id.to_string(),
                item.profile_id.map(|id| id.to_string()),
                item.created_at,
                item.report_date,
                item.status.as_str(),
                item.summary,
                item.thumbnail,
                result_json,
                chat_json,
                images_json,
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM history_items WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.conn.execute("DELETE FROM history_items", [])?;
        Ok(())
    }
}

// ═══════════════════════════════════════════
// Internal row mapping
// ═══════════════════════════════════════════

struct HistoryRow {
    id: String,
    profile_id: Option<String>,
    created_at: NaiveDateTime,
    report_date: Option<String>,
    status: String,
    summary: Option<String>,
    thumbnail: Option<String>,
    result_json: Option<String>,
    chat_json: String,
    images_json: String,
}

fn item_from_row(row: HistoryRow) -> Result<HistoryItem, StorageError> {
    let id = Uuid::parse_str(&row.id).map_err(|e| StorageError::payload("id", e))?;
    let profile_id = match row.profile_id {
        Some(s) => Some(Uuid::parse_str(&s).map_err(|e| StorageError::payload("profile_id", e))?),
        None => None,
    };
    let status = JobStatus::from_str(&row.status)?;

    let result: Option<AnalysisResult> = match row.result_json {
        Some(json) => Some(
            serde_json::from_str(&json).map_err(|e| StorageError::payload("result_json", e))?,
        ),
        None => None,
    };
    let chat_history: Vec<ChatMessage> = serde_json::from_str(&row.chat_json)
        .map_err(|e| StorageError::payload("chat_json", e))?;
    let original_images: Vec<String> = serde_json::from_str(&row.images_json)
        .map_err(|e| StorageError::payload("images_json", e))?;

    Ok(HistoryItem {
        id,
        profile_id,
        created_at: row.created_at,
        report_date: row.report_date,
        status,
        result,
        thumbnail: row.thumbnail,
        summary: row.summary,
        chat_history,
        original_images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Indicator, IndicatorStatus, MessageRole, ResultKind};
    use crate::storage::sqlite::open_memory_database;

    fn backend() -> SqliteHistoryBackend {
        SqliteHistoryBackend::new(open_memory_database().unwrap())
    }

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            kind: ResultKind::Report,
            summary: "All normal.".into(),
            indicators: vec![Indicator {
                name: "Glucose".into(),
                value: "5.2".into(),
                value_number: Some(5.2),
                unit: Some("mmol/L".into()),
                status: IndicatorStatus::Normal,
                explanation: "Within range.".into(),
                possible_causes: String::new(),
                reference_range: None,
                history: vec![],
            }],
            medication: None,
            questions_for_doctor: vec![],
            disclaimer: "Not medical advice.".into(),
        }
    }

    #[test]
    fn put_and_load_round_trip() {
        let backend = backend();
        let mut item = HistoryItem::pending(
            Some(Uuid::new_v4()),
            Some("2024-03-01".into()),
            vec!["data:image/jpeg;base64,AAAA".into()],
        );
        item.status = JobStatus::Completed;
        item.result = Some(sample_result());
        item.summary = Some("All normal.".into());
        item.chat_history
            .push(ChatMessage::new(MessageRole::User, "Is this ok?"));

        backend.put(&item).unwrap();

        let loaded = backend.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        let got = &loaded[0];
        assert_eq!(got.id, item.id);
        assert_eq!(got.profile_id, item.profile_id);
        assert_eq!(got.status, JobStatus::Completed);
        assert_eq!(got.report_date.as_deref(), Some("2024-03-01"));
        assert_eq!(got.result.as_ref().unwrap().indicators[0].name, "Glucose");
        assert_eq!(got.chat_history.len(), 1);
        assert_eq!(got.original_images.len(), 1);
    }

    #[test]
    fn put_twice_replaces_in_place() {
        let backend = backend();
        let mut item = HistoryItem::pending(None, None, vec![]);
        backend.put(&item).unwrap();

        item.status = JobStatus::Failed;
        item.summary = Some("network error".into());
        backend.put(&item).unwrap();

        let loaded = backend.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].status, JobStatus::Failed);
        assert_eq!(loaded[0].summary.as_deref(), Some("network error"));
    }

    #[test]
    fn load_all_is_newest_first() {
        let backend = backend();
        let mut old = HistoryItem::pending(None, None, vec![]);
        old.created_at = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut newer = HistoryItem::pending(None, None, vec![]);
        newer.created_at = chrono::NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();

        backend.put(&old).unwrap();
        backend.put(&newer).unwrap();

        let loaded = backend.load_all().unwrap();
        assert_eq!(loaded[0].id, newer.id);
        assert_eq!(loaded[1].id, old.id);
    }

    #[test]
    fn delete_and_clear() {
        let backend = backend();
        let a = HistoryItem::pending(None, None, vec![]);
        let b = HistoryItem::pending(None, None, vec![]);
        backend.put(&a).unwrap();
        backend.put(&b).unwrap();

        backend.delete(&a.id).unwrap();
        assert_eq!(backend.load_all().unwrap().len(), 1);

        backend.clear().unwrap();
        assert!(backend.load_all().unwrap().is_empty());
    }
}
