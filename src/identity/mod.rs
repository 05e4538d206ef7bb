//! Identity/session provider seam.
//!
//! The real provider lives outside this crate; everything here talks to it
//! through `IdentityProvider`.

pub mod memory;

pub use memory::MemorySessionProvider;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::ApiError;

/// An authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque user id.
    pub user_id: String,
    /// Bearer credential for backend calls.
    pub access_token: SecretString,
    /// Account metadata flag: `None` until first set, `Some(true)` once the
    /// first plan has been generated.
    pub registration_completed: Option<bool>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: SecretString::from(access_token.into()),
            registration_completed: None,
        }
    }

    pub fn with_registration_completed(mut self, completed: bool) -> Self {
        self.registration_completed = Some(completed);
        self
    }

    /// Only an explicit `true` counts; absent and `false` are equivalent.
    pub fn is_registered(&self) -> bool {
        self.registration_completed == Some(true)
    }
}

/// Auth-state-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: String },
    SignedOut,
    RegistrationCompleted { user_id: String },
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The current session, or `None` when signed out.
    async fn current_session(&self) -> Result<Option<Session>, ApiError>;

    /// Reflect a registration-flag change in the local session metadata.
    async fn set_registration_completed(&self, completed: bool) -> Result<(), ApiError>;

    /// End the session.
    async fn sign_out(&self) -> Result<(), ApiError>;

    /// Subscribe to auth-state changes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    /// Bearer credential for the current session.
    async fn access_token(&self) -> Result<SecretString, ApiError> {
        self.current_session()
            .await?
            .map(|s| s.access_token)
            .ok_or_else(|| ApiError::Auth {
                reason: "no active session".to_string(),
            })
    }
}

/// Stream of auth-state changes. Lagged notifications are skipped.
pub fn auth_changes(provider: &dyn IdentityProvider) -> impl Stream<Item = AuthEvent> + use<> {
    BroadcastStream::new(provider.subscribe()).filter_map(|event| event.ok())
}
