//! Client for the hosted auth API (password sign-in, refresh, logout).

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client};
use serde::Deserialize;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use crate::error::AuthError;
use crate::identity::Identity;
use crate::storage::Session;

/// Token response from `/token`
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
    email: Option<String>,
}

/// Error body; older and newer servers use different field names
#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    error_code: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self.expires_at.unwrap_or_else(|| {
            chrono::Utc::now().timestamp() + self.expires_in.unwrap_or(3600)
        });

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: Identity::new(self.user.id, self.user.email),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: Url,
    client: Arc<Client>,
    anon_key: String,
}

impl AuthClient {
    /// Create a client rooted at the auth base URL (`.../auth/v1/`)
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, AuthError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let with_slash = format!("{}/", base_url.path());
            base_url.set_path(&with_slash);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            base_url,
            client: Arc::new(client),
            anon_key: anon_key.to_string(),
        })
    }

    async fn token_request(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, AuthError> {
        let mut url = self.base_url.join("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &text));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.into_session())
    }

    /// Sign in with email and password
    #[instrument(skip(self, password), level = "info")]
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self
            .token_request(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        tracing::info!("Signed in as {}", session.user.id);
        Ok(session)
    }

    /// Exchange a refresh token for a new session
    #[instrument(skip_all, level = "debug")]
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        self.token_request(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    /// Revoke the session server-side
    #[instrument(skip_all, level = "debug")]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = self.base_url.join("logout")?;
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(classify_error(status.as_u16(), &text))
        }
    }
}

fn classify_error(status: u16, body: &str) -> AuthError {
    let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();

    let code = parsed.error_code.or(parsed.error).unwrap_or_default();
    if code == "invalid_credentials" || (code == "invalid_grant" && status == 400) {
        let description = parsed.error_description.or(parsed.msg).unwrap_or_default();
        // invalid_grant also covers a revoked refresh token
        if description.to_lowercase().contains("refresh token") {
            return AuthError::SessionExpired;
        }
        return AuthError::InvalidCredentials;
    }

    let message = parsed
        .msg
        .or(parsed.error_description)
        .unwrap_or_else(|| body.to_string());
    AuthError::Api { status, message }
}
