//! Session provider: who is signed in, whether that is still being worked
//! out, and sign-in/sign-out.

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::client::AuthClient;
use crate::error::AuthError;
use crate::identity::Identity;
use crate::storage::{Session, SessionStorage};

/// Snapshot published to subscribers whenever the session changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub identity: Option<Identity>,
    /// True until the stored session has been resolved
    pub loading: bool,
}

impl AuthState {
    fn resolved(identity: Option<Identity>) -> Self {
        Self {
            identity,
            loading: false,
        }
    }
}

pub struct AuthSession {
    client: AuthClient,
    storage: SessionStorage,
    session: RwLock<Option<Session>>,
    state: watch::Sender<AuthState>,
}

impl AuthSession {
    /// Create a provider in the loading state; call [`AuthSession::restore`]
    /// to resolve it.
    pub fn new(client: AuthClient, storage: SessionStorage) -> Self {
        let (state, _) = watch::channel(AuthState {
            identity: None,
            loading: true,
        });

        Self {
            client,
            storage,
            session: RwLock::new(None),
            state,
        }
    }

    /// Resolve the stored session, refreshing it if it is close to expiry.
    ///
    /// A session that cannot be refreshed is discarded; transient refresh
    /// failures keep the stored session if its token is still valid.
    pub async fn restore(&self) -> Option<Identity> {
        let stored = match self.storage.load() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Ignoring unreadable stored session: {:#}", e);
                None
            }
        };

        let session = match stored {
            Some(session) if session.needs_refresh() => self.refresh_stored(session).await,
            other => other,
        };

        let identity = session.as_ref().map(|s| s.user.clone());
        *self.session.write() = session;
        self.publish(identity.clone());

        match &identity {
            Some(user) => tracing::info!("Restored session for {}", user.id),
            None => tracing::info!("No stored session"),
        }
        identity
    }

    async fn refresh_stored(&self, session: Session) -> Option<Session> {
        match self.client.refresh(&session.refresh_token).await {
            Ok(fresh) => {
                if let Err(e) = self.storage.store(&fresh) {
                    tracing::warn!("Failed to persist refreshed session: {:#}", e);
                }
                Some(fresh)
            }
            Err(e) if e.invalidates_session() || session.is_expired() => {
                tracing::info!("Stored session is no longer valid: {}", e);
                if let Err(e) = self.storage.delete() {
                    tracing::warn!("Failed to delete stale session: {:#}", e);
                }
                None
            }
            Err(e) => {
                tracing::warn!("Session refresh failed, keeping current token: {}", e);
                Some(session)
            }
        }
    }

    /// Sign in with email and password and persist the session
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let session = self.client.sign_in_with_password(email, password).await?;
        self.storage
            .store(&session)
            .map_err(|e| AuthError::Storage(format!("{:#}", e)))?;

        let identity = session.user.clone();
        *self.session.write() = Some(session);
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    /// Sign out. The server-side logout is best effort; the local session is
    /// always cleared.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.session.write().take();

        if let Some(session) = session {
            if let Err(e) = self.client.sign_out(&session.access_token).await {
                tracing::warn!("Remote sign-out failed: {}", e);
            }
        }

        self.publish(None);
        self.storage
            .delete()
            .map_err(|e| AuthError::Storage(format!("{:#}", e)))?;
        tracing::info!("Signed out");
        Ok(())
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Access token of the current session
    pub fn access_token(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.access_token.clone())
    }

    /// Watch identity changes; the receiver starts with the current state
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn publish(&self, identity: Option<Identity>) {
        self.state.send_replace(AuthState::resolved(identity));
    }
}
