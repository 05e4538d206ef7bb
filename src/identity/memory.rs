//! In-process session provider for the CLI and tests.

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use tracing::info;

use super::{AuthEvent, IdentityProvider, Session};
use crate::error::ApiError;

const EVENT_CAPACITY: usize = 32;

/// Holds at most one session in memory and broadcasts changes.
pub struct MemorySessionProvider {
    session: RwLock<Option<Session>>,
    tx: broadcast::Sender<AuthEvent>,
}

impl MemorySessionProvider {
    pub fn new(session: Option<Session>) -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session: RwLock::new(session),
            tx,
        }
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    /// Replace the session (sign in as someone).
    pub async fn sign_in(&self, session: Session) {
        let user_id = session.user_id.clone();
        *self.session.write().await = Some(session);
        info!(user_id = %user_id, "Signed in");
        let _ = self.tx.send(AuthEvent::SignedIn { user_id });
    }
}

#[async_trait]
impl IdentityProvider for MemorySessionProvider {
    async fn current_session(&self) -> Result<Option<Session>, ApiError> {
        Ok(self.session.read().await.clone())
    }

    async fn set_registration_completed(&self, completed: bool) -> Result<(), ApiError> {
        let mut guard = self.session.write().await;
        let session = guard.as_mut().ok_or_else(|| ApiError::Auth {
            reason: "no active session".to_string(),
        })?;
        session.registration_completed = Some(completed);
        if completed {
            let _ = self.tx.send(AuthEvent::RegistrationCompleted {
                user_id: session.user_id.clone(),
            });
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        let previous = self.session.write().await.take();
        if previous.is_some() {
            info!("Signed out");
            let _ = self.tx.send(AuthEvent::SignedOut);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }
}
