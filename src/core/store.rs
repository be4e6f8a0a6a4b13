//! Session Store: in-memory sessions keyed by id
//!
//! The map lock is held only to find a session; every mutation then runs
//! under that session's own lock, so sessions never wait on each other and
//! two calls on the same session never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{KycError, Result};
use crate::types::{Session, SessionPatch, SocialImage};

type SessionCell = Arc<Mutex<Session>>;

/// Memory-only session store (no expiry, no eviction)
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionCell>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session and return its id
    pub async fn create(&self, challenge_sequence: Vec<String>) -> String {
        let id = Uuid::new_v4().to_string();
        let session = Session::new(id.clone(), challenge_sequence);
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        id
    }

    /// Snapshot of a session, `None` for unknown ids
    pub async fn get(&self, id: &str) -> Option<Session> {
        let cell = self.cell(id).await?;
        let session = cell.lock().await;
        Some(session.clone())
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Fails with `SessionNotFound` for unknown ids
    pub async fn require(&self, id: &str) -> Result<()> {
        if self.contains(id).await {
            Ok(())
        } else {
            Err(KycError::SessionNotFound(id.to_string()))
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Shallow merge: each provided field overwrites the stored value
    pub async fn update(&self, id: &str, patch: SessionPatch) -> Result<()> {
        self.modify(id, |session| {
            session.apply(patch);
            Ok(())
        })
        .await
    }

    /// Append exactly one social image record
    pub async fn append_social_image(&self, id: &str, record: SocialImage) -> Result<()> {
        self.modify(id, |session| {
            session.social_images.push(record);
            Ok(())
        })
        .await
    }

    /// Atomic read-modify-write on one session.
    ///
    /// `f` must return `Err` before touching the session, never after.
    pub async fn modify<T, F>(&self, id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let cell = self
            .cell(id)
            .await
            .ok_or_else(|| KycError::SessionNotFound(id.to_string()))?;
        let mut session = cell.lock().await;
        let out = f(&mut session)?;
        session.updated_at = Utc::now();
        Ok(out)
    }

    async fn cell(&self, id: &str) -> Option<SessionCell> {
        self.sessions.read().await.get(id).cloned()
    }
}
