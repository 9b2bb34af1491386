//! Profile set and active-profile selection, behind the same single-writer
//! mailbox pattern as the history store.
//!
//! Invariant: the set is never empty and the active id always points at an
//! existing profile. Deleting the last profile substitutes the default one;
//! deleting the active profile reassigns the selection.

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::models::Profile;
use crate::storage::{ProfileBackend, StorageError};

enum Command {
    List {
        reply: oneshot::Sender<Vec<Profile>>,
    },
    Active {
        reply: oneshot::Sender<Profile>,
    },
    Create {
        profile: Profile,
        reply: oneshot::Sender<Profile>,
    },
    Update {
        profile: Profile,
        reply: oneshot::Sender<bool>,
    },
    SetActive {
        id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    Delete {
        id: Uuid,
        reply: oneshot::Sender<Profile>,
    },
}

/// Cloneable handle to the profile store task.
#[derive(Clone)]
pub struct ProfileHandle {
    tx: mpsc::Sender<Command>,
}

impl ProfileHandle {
    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> T {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .expect("profile store task exited");
        rx.await.expect("profile store dropped a reply")
    }

    pub async fn list(&self) -> Vec<Profile> {
        self.call(|reply| Command::List { reply }).await
    }

    /// The currently selected profile. Always exists.
    pub async fn active(&self) -> Profile {
        self.call(|reply| Command::Active { reply }).await
    }

    /// Add a profile (appended to the list) and return it.
    pub async fn create(&self, profile: Profile) -> Profile {
        self.call(|reply| Command::Create { profile, reply }).await
    }

    /// Replace a profile's fields by id; false if the id is unknown.
    pub async fn update(&self, profile: Profile) -> bool {
        self.call(|reply| Command::Update { profile, reply }).await
    }

    /// Select the active profile; false if the id is unknown.
    pub async fn set_active(&self, id: Uuid) -> bool {
        self.call(|reply| Command::SetActive { id, reply }).await
    }

    /// Delete a profile and return the profile that is active afterwards
    /// (the default profile if the set would have become empty).
    pub async fn delete(&self, id: Uuid) -> Profile {
        self.call(|reply| Command::Delete { id, reply }).await
    }
}

/// Owner of the profile list; lives on its own task.
pub struct ProfileStore {
    profiles: Vec<Profile>,
    active_id: Uuid,
    backend: Box<dyn ProfileBackend>,
}

impl ProfileStore {
    /// Load profiles, repair an empty set or dangling active id, and start
    /// the single-writer task. Must be called within a tokio runtime.
    pub fn spawn(backend: Box<dyn ProfileBackend>) -> Result<ProfileHandle, StorageError> {
        let (mut profiles, saved_active) = backend.load()?;

        if profiles.is_empty() {
            let fallback = Profile::default_self();
            tracing::info!(profile_id = %fallback.id, "no profiles found, creating default");
            profiles.push(fallback);
            backend.save_profiles(&profiles)?;
        }

        let active_id = match saved_active {
            Some(id) if profiles.iter().any(|p| p.id == id) => id,
            other => {
                let first = profiles[0].id;
                if other.is_some() {
                    tracing::warn!("saved active profile no longer exists, falling back");
                }
                backend.save_active(&first)?;
                first
            }
        };

        let mut store = Self {
            profiles,
            active_id,
            backend,
        };

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move { store.run(rx).await });
        Ok(ProfileHandle { tx })
    }

    async fn run(&mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
        }
        tracing::debug!("profile store mailbox closed");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::List { reply } => {
                let _ = reply.send(self.profiles.clone());
            }
            Command::Active { reply } => {
                let _ = reply.send(self.active().clone());
            }
            Command::Create { profile, reply } => {
                self.profiles.push(profile.clone());
                self.persist_profiles();
                let _ = reply.send(profile);
            }
            Command::Update { profile, reply } => {
                let updated = match self.profiles.iter_mut().find(|p| p.id == profile.id) {
                    Some(slot) => {
                        *slot = profile;
                        self.persist_profiles();
                        true
                    }
                    None => false,
                };
                let _ = reply.send(updated);
            }
            Command::SetActive { id, reply } => {
                let known = self.profiles.iter().any(|p| p.id == id);
                if known {
                    self.active_id = id;
                    self.persist_active();
                }
                let _ = reply.send(known);
            }
            Command::Delete { id, reply } => {
                let _ = reply.send(self.delete(id));
            }
        }
    }

    fn active(&self) -> &Profile {
        self.profiles
            .iter()
            .find(|p| p.id == self.active_id)
            .unwrap_or(&self.profiles[0])
    }

    fn delete(&mut self, id: Uuid) -> Profile {
        self.profiles.retain(|p| p.id != id);

        if self.profiles.is_empty() {
            let fallback = Profile::default_self();
            tracing::info!(profile_id = %fallback.id, "last profile deleted, substituting default");
            self.profiles.push(fallback);
        }
        self.persist_profiles();

        if self.active_id == id || !self.profiles.iter().any(|p| p.id == self.active_id) {
            self.active_id = self.profiles[0].id;
            self.persist_active();
        }
        self.active().clone()
    }

    fn persist_profiles(&self) {
        if let Err(e) = self.backend.save_profiles(&self.profiles) {
            tracing::warn!(error = %e, "profile list write failed; in-memory state kept");
        }
    }

    fn persist_active(&self) {
        if let Err(e) = self.backend.save_active(&self.active_id) {
            tracing::warn!(error = %e, "active profile write failed; in-memory state kept");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{open_database, open_memory_database, SqliteProfileBackend};

    fn memory_backend() -> Box<dyn ProfileBackend> {
        Box::new(SqliteProfileBackend::new(open_memory_database().unwrap()))
    }

    #[tokio::test]
    async fn empty_store_creates_default_profile() {
        let handle = ProfileStore::spawn(memory_backend()).unwrap();
        let profiles = handle.list().await;
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].relation, "self");
        assert_eq!(handle.active().await.id, profiles[0].id);
    }

    #[tokio::test]
    async fn create_and_set_active() {
        let handle = ProfileStore::spawn(memory_backend()).unwrap();
        let mom = handle.create(Profile::new("Mom", "mother", "#E57373")).await;

        assert!(handle.set_active(mom.id).await);
        assert_eq!(handle.active().await.id, mom.id);

        assert!(!handle.set_active(Uuid::new_v4()).await);
        assert_eq!(handle.active().await.id, mom.id);
    }

    #[tokio::test]
    async fn update_edits_fields() {
        let handle = ProfileStore::spawn(memory_backend()).unwrap();
        let mut me = handle.active().await;
        me.context.age = Some(34);
        me.context.condition = Some("diabetes".into());

        assert!(handle.update(me.clone()).await);
        assert_eq!(handle.active().await.context.age, Some(34));

        let ghost = Profile::new("Ghost", "other", "#000000");
        assert!(!handle.update(ghost).await);
    }

    #[tokio::test]
    async fn deleting_active_reassigns_to_remaining() {
        let handle = ProfileStore::spawn(memory_backend()).unwrap();
        let me = handle.active().await;
        let dad = handle.create(Profile::new("Dad", "father", "#64B5F6")).await;
        handle.set_active(dad.id).await;

        let now_active = handle.delete(dad.id).await;
        assert_eq!(now_active.id, me.id);
        assert_eq!(handle.list().await.len(), 1);
    }

    #[tokio::test]
    async fn deleting_last_profile_yields_default() {
        let handle = ProfileStore::spawn(memory_backend()).unwrap();
        let me = handle.active().await;

        let now_active = handle.delete(me.id).await;
        assert_ne!(now_active.id, me.id);
        assert_eq!(now_active.relation, "self");
        assert_eq!(handle.list().await.len(), 1);
    }

    #[tokio::test]
    async fn state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.db");

        let mom_id = {
            let backend = Box::new(SqliteProfileBackend::new(open_database(&path).unwrap()));
            let handle = ProfileStore::spawn(backend).unwrap();
            let mom = handle.create(Profile::new("Mom", "mother", "#E57373")).await;
            handle.set_active(mom.id).await;
            mom.id
        };

        let backend = Box::new(SqliteProfileBackend::new(open_database(&path).unwrap()));
        let handle = ProfileStore::spawn(backend).unwrap();
        assert_eq!(handle.list().await.len(), 2);
        assert_eq!(handle.active().await.id, mom_id);
    }

    #[tokio::test]
    async fn dangling_active_id_falls_back_to_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.db");

        {
            let backend = SqliteProfileBackend::new(open_database(&path).unwrap());
            let me = Profile::default_self();
            backend.save_profiles(&[me]).unwrap();
            backend.save_active(&Uuid::new_v4()).unwrap();
        }

        let backend = Box::new(SqliteProfileBackend::new(open_database(&path).unwrap()));
        let handle = ProfileStore::spawn(backend).unwrap();
        let active = handle.active().await;
        assert_eq!(active.id, handle.list().await[0].id);
    }
}
