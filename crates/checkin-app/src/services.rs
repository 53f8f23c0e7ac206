//! Wiring of the backend clients the commands share.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use checkin_auth::{AuthClient, AuthSession, Identity, SessionStorage};
use checkin_core::{App, AppError, AuthError, Config, ConfigError};
use checkin_realtime::{ChannelSpec, RealtimeClient, RealtimeError, RealtimeTransport, Subscription};
use checkin_services::{CheckIn, NewCheckIn, RestClient};
use checkin_sync::{submit_check_in, LiveFeed};

use crate::error_mapping::ResultExt;

/// Realtime transport for the feed: a live socket, or nothing when the
/// realtime service could not be reached.
pub enum FeedTransport {
    Live(RealtimeClient),
    Offline,
}

#[async_trait]
impl RealtimeTransport for FeedTransport {
    async fn subscribe(&self, spec: ChannelSpec) -> Result<Subscription, RealtimeError> {
        match self {
            FeedTransport::Live(client) => client.subscribe(spec).await,
            FeedTransport::Offline => Err(RealtimeError::Closed),
        }
    }
}

pub type Feed = LiveFeed<RestClient, FeedTransport>;

/// Clients shared by every command.
pub struct AppServices {
    config: Arc<Config>,
    rest: Arc<RestClient>,
    auth: Arc<AuthSession>,
}

impl AppServices {
    pub fn new(app: &App) -> Result<Self, AppError> {
        let config = app.config_arc();

        let rest_url = config
            .backend
            .rest_url()
            .map_err(|e| ConfigError::Invalid(format!("{:#}", e)))?;
        let auth_url = config
            .backend
            .auth_url()
            .map_err(|e| ConfigError::Invalid(format!("{:#}", e)))?;

        let rest = RestClient::new(rest_url.as_str(), &config.backend.anon_key).app_err()?;
        let auth_client = AuthClient::new(auth_url.as_str(), &config.backend.anon_key).app_err()?;
        let auth = AuthSession::new(auth_client, SessionStorage::new(app.tokens_dir()));

        Ok(Self {
            config,
            rest: Arc::new(rest),
            auth: Arc::new(auth),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    /// Resolve the stored session and hand its token to the REST client
    pub async fn restore_session(&self) -> Option<Identity> {
        let identity = self.auth.restore().await;
        self.rest.set_access_token(self.auth.access_token());
        identity
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let identity = self.auth.sign_in(email, password).await.app_err()?;
        self.rest.set_access_token(self.auth.access_token());
        Ok(identity)
    }

    pub async fn sign_out(&self) -> Result<(), AppError> {
        self.auth.sign_out().await.app_err()?;
        self.rest.set_access_token(None);
        Ok(())
    }

    /// Restore the session, failing when nobody is signed in
    pub async fn require_identity(&self) -> Result<Identity, AppError> {
        self.restore_session()
            .await
            .ok_or(AppError::Auth(AuthError::NotSignedIn))
    }

    /// Insert today's check-in straight through the store
    pub async fn check_in(&self, identity: &Identity, input: NewCheckIn) -> Result<CheckIn, AppError> {
        submit_check_in(self.rest.as_ref(), identity, input).await.app_err()
    }

    /// Open the realtime socket with the current access token
    pub async fn connect_realtime(&self) -> Result<RealtimeClient, AppError> {
        let url = self
            .config
            .backend
            .realtime_url()
            .map_err(|e| ConfigError::Invalid(format!("{:#}", e)))?;

        let heartbeat = Duration::from_secs(self.config.realtime.heartbeat_secs);
        RealtimeClient::connect(&url, self.auth.access_token(), heartbeat)
            .await
            .app_err()
    }

    pub fn live_feed(&self, transport: FeedTransport) -> Feed {
        LiveFeed::new(
            self.rest.clone(),
            Arc::new(transport),
            self.config.realtime.feed_limit,
        )
    }
}
