//! Durable backend for the profile list and the active-profile selection.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::StorageError;
use crate::models::{Profile, ProfileContext};

const ACTIVE_PROFILE_KEY: &str = "active_profile_id";

pub trait ProfileBackend: Send {
    /// Persisted profiles (in saved order) and the active profile id.
    fn load(&self) -> Result<(Vec<Profile>, Option<Uuid>), StorageError>;
    /// Full-list write: the store is the single writer and always persists
    /// the whole set, so the last writer's list wins by design.
    fn save_profiles(&self, profiles: &[Profile]) -> Result<(), StorageError>;
    fn save_active(&self, id: &Uuid) -> Result<(), StorageError>;
}

/// SQLite-backed profile persistence.
pub struct SqliteProfileBackend {
    conn: Connection,
}

impl SqliteProfileBackend {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl ProfileBackend for SqliteProfileBackend {
    fn load(&self) -> Result<(Vec<Profile>, Option<Uuid>), StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, relation, avatar_color, age, gender, condition
             FROM profiles ORDER BY position ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<u32>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;

        let mut profiles = Vec::new();
        for row in rows {
            let (id, name, relation, avatar_color, age, gender, condition) = row?;
            profiles.push(Profile {
                id: Uuid::parse_str(&id).map_err(|e| StorageError::payload("id", e))?,
                name,
                relation,
                avatar_color,
                context: ProfileContext {
                    age,
                    gender,
                    condition,
                },
            });
        }

        let active: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?1",
                params![ACTIVE_PROFILE_KEY],
                |row| row.get(0),
            )
            .optional()?;
        let active = match active {
            Some(s) => Some(Uuid::parse_str(&s).map_err(|e| StorageError::payload("value", e))?),
            None => None,
        };

        Ok((profiles, active))
    }

    fn save_profiles(&self, profiles: &[Profile]) -> Result<(), StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM profiles", [])?;
        for (position, p) in profiles.iter().enumerate() {
            tx.execute(
                "INSERT INTO profiles
                 (id, name, relation, avatar_color, age, gender, condition, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    p.id.to_string(),
                    p.name,
                    p.relation,
                    p.avatar_color,
                    p.context.age,
                    p.context.gender,
                    p.context.condition,
                    position as i64,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn save_active(&self, id: &Uuid) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO app_settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![ACTIVE_PROFILE_KEY, id.to_string()],
        )?;
        Ok(())
    }
}
