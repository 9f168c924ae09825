//! Process-wide token -> session table.
//!
//! Backed by `DashMap`, so lookups and provisioning are safe under
//! concurrency and never wait on any session's lifecycle mutex.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tenantgate_types::error::RegistryError;
use tenantgate_types::session::Token;
use tracing::info;

use crate::session::Session;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Token, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact-match lookup. Unknown and malformed tokens are both `NotFound`.
    pub fn resolve(&self, token: &str) -> Result<Arc<Session>, RegistryError> {
        self.sessions
            .get(token)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RegistryError::NotFound)
    }

    /// The session with the lexicographically lowest token.
    ///
    /// Reserved for callers holding the system credential (see
    /// [`crate::access::authorize_master`]).
    pub fn resolve_first_available(&self) -> Result<Arc<Session>, RegistryError> {
        self.sessions
            .iter()
            .min_by(|a, b| a.key().cmp(b.key()))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RegistryError::NotFound)
    }

    /// Provision `session` under its own token.
    pub fn insert(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        if session.token().is_empty() {
            return Err(RegistryError::EmptyToken);
        }
        match self.sessions.entry(session.token().clone()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyProvisioned),
            Entry::Vacant(slot) => {
                info!(token = %session.fingerprint(), "session provisioned");
                slot.insert(session);
                Ok(())
            }
        }
    }

    /// Deprovision the session for `token`: stop it with `reason`, then
    /// close its webhook lanes. Payloads already queued, including the final
    /// `disconnected` event, are still delivered.
    pub async fn remove(&self, token: &str, reason: &str) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(token)?;
        session.stop(reason).await;
        let lanes = session.retire_webhook_lanes();
        info!(token = %session.fingerprint(), lanes, "session deprovisioned");
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of every provisioned session.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Stop every session concurrently with `reason`.
    pub async fn stop_all(&self, reason: &str) {
        let sessions = self.sessions();
        let count = sessions.len();
        futures_util::future::join_all(sessions.iter().map(|session| session.stop(reason))).await;
        info!(count, reason, "all sessions stopped");
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
