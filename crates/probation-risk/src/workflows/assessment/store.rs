use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::session::{RespondentProfile, Session, SessionId};
use super::tokens::{StepToken, TokenPurpose};

/// Storage abstraction for in-progress sessions. Implementations only need
/// per-key consistency; sessions never share mutable state.
pub trait SessionStore: Send + Sync {
    fn insert(&self, session: Session) -> Result<(), StoreError>;
    fn fetch(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;
    /// Runs `apply` against the stored session while holding it exclusively,
    /// so concurrent updates to one key never overwrite each other. A failed
    /// `apply` leaves the stored session untouched.
    fn modify<F>(&self, id: &SessionId, apply: F) -> Result<Session, StoreError>
    where
        F: FnOnce(&mut Session) -> Result<(), StoreError>,
        Self: Sized;
    fn remove(&self, id: &SessionId) -> Result<(), StoreError>;
    /// Drops sessions last active before `cutoff`, returning how many went.
    fn sweep(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session expired or unknown")]
    Expired,
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Mutex-guarded map, one entry per session.
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl InMemorySessionStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SessionId, Session>>, StoreError> {
        self.sessions
            .lock()
            .map_err(|_| StoreError::Unavailable("session map lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, session: Session) -> Result<(), StoreError> {
        self.lock()?.insert(session.id.clone(), session);
        Ok(())
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn modify<F>(&self, id: &SessionId, apply: F) -> Result<Session, StoreError>
    where
        F: FnOnce(&mut Session) -> Result<(), StoreError>,
    {
        let mut guard = self.lock()?;
        let slot = guard.get_mut(id).ok_or(StoreError::Expired)?;
        let mut session = slot.clone();
        apply(&mut session)?;
        *slot = session.clone();
        Ok(session)
    }

    fn remove(&self, id: &SessionId) -> Result<(), StoreError> {
        self.lock()?.remove(id);
        Ok(())
    }

    fn sweep(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut guard = self.lock()?;
        let before = guard.len();
        guard.retain(|_, session| session.last_active >= cutoff);
        Ok(before - guard.len())
    }
}

/// Session-scoped accessors over a [`SessionStore`] that enforce the idle
/// window and the per-purpose token cap.
pub struct ProgressStore<S> {
    store: Arc<S>,
    ttl: chrono::Duration,
    token_cap: usize,
}

impl<S> ProgressStore<S>
where
    S: SessionStore + 'static,
{
    pub fn new(store: Arc<S>, ttl: Duration, token_cap: usize) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));
        Self {
            store,
            ttl,
            token_cap: token_cap.max(1),
        }
    }

    pub fn backend(&self) -> &Arc<S> {
        &self.store
    }

    /// Creates a fresh session for a new assessment.
    pub fn open(&self, respondent: RespondentProfile) -> Result<Session, StoreError> {
        let session = Session::new(respondent, Utc::now());
        self.store.insert(session.clone())?;
        debug!(session_id = %session.id, "assessment session opened");
        Ok(session)
    }

    /// Loads a live session; unknown or idle sessions are reported as expired.
    pub fn load(&self, id: &SessionId) -> Result<Session, StoreError> {
        let session = self.store.fetch(id)?.ok_or(StoreError::Expired)?;
        if session.is_idle(Utc::now(), self.ttl) {
            self.store.remove(id)?;
            debug!(session_id = %id, "idle session expired on access");
            return Err(StoreError::Expired);
        }
        Ok(session)
    }

    /// Read-modify-write against a single session key, atomic per key.
    pub fn update<F>(&self, id: &SessionId, apply: F) -> Result<Session, StoreError>
    where
        F: FnOnce(&mut Session),
    {
        let now = Utc::now();
        let ttl = self.ttl;
        let mut idle = false;
        let outcome = self.store.modify(id, |session| {
            if session.is_idle(now, ttl) {
                idle = true;
                return Err(StoreError::Expired);
            }
            apply(session);
            session.last_active = now;
            Ok(())
        });
        if idle {
            self.store.remove(id)?;
            debug!(session_id = %id, "idle session expired on update");
        }
        outcome
    }

    /// Replaces any prior scores for `segment`.
    pub fn record_segment_scores(
        &self,
        id: &SessionId,
        segment: u8,
        scores: Vec<i32>,
    ) -> Result<Session, StoreError> {
        self.update(id, |session| session.answers.set(segment, scores))
    }

    pub fn record_token(
        &self,
        id: &SessionId,
        purpose: TokenPurpose,
        token: StepToken,
    ) -> Result<Session, StoreError> {
        let cap = self.token_cap;
        self.update(id, |session| session.tokens.record(purpose, token, cap))
    }

    pub fn get_scores(&self, id: &SessionId, segment: u8) -> Result<Vec<i32>, StoreError> {
        Ok(self.load(id)?.answers.scores(segment).to_vec())
    }

    pub fn record_notes(&self, id: &SessionId, notes: String) -> Result<Session, StoreError> {
        self.update(id, |session| session.notes = notes)
    }

    pub fn token_cap(&self) -> usize {
        self.token_cap
    }

    /// Sweeps sessions idle longer than the configured window.
    pub fn expire_idle(&self) -> Result<usize, StoreError> {
        self.store.sweep(Utc::now() - self.ttl)
    }
}
