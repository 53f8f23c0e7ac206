//! REST client for the hosted tables.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use crate::backend::CheckInBackend;
use crate::error::ServiceError;
use crate::retry::ReadRetry;
use crate::types::{CheckIn, CheckInInsert, Profile};

const CHECK_INS_TABLE: &str = "check_ins";
const PROFILES_TABLE: &str = "profiles";

/// Client for the hosted `check_ins` / `profiles` tables
#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: Url,
    client: Arc<Client>,
    anon_key: String,
    access_token: Arc<RwLock<Option<String>>>,
    retry: ReadRetry,
}

impl RestClient {
    /// Create a client rooted at the REST base URL (`.../rest/v1/`)
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, ServiceError> {
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
            access_token: Arc::new(RwLock::new(None)),
            retry: ReadRetry::default(),
        })
    }

    /// Override the retry policy used for reads
    pub fn with_read_retry(mut self, retry: ReadRetry) -> Self {
        self.retry = retry;
        self
    }

    /// Use the signed-in user's token for row-level security; `None` falls
    /// back to the anon key. Shared by all clones of this client.
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }

    fn bearer(&self) -> String {
        let token = self.access_token.read();
        format!("Bearer {}", token.as_deref().unwrap_or(&self.anon_key))
    }

    /// Build request with auth headers
    fn build_request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.anon_key)
            .header(header::AUTHORIZATION, self.bearer())
            .header(header::ACCEPT, "application/json")
    }

    fn table_url(&self, table: &str) -> Result<Url, ServiceError> {
        Ok(self.base_url.join(table)?)
    }

    /// Check response status and classify errors
    async fn check_response(&self, response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_response(status.as_u16(), &body));
        }
        Ok(response)
    }

    /// GET rows, retrying transient failures
    async fn get_rows<T: DeserializeOwned>(&self, what: &str, url: Url) -> Result<Vec<T>, ServiceError> {
        self.retry.run(what, || self.fetch_rows(url.clone())).await
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, ServiceError> {
        let response = self.build_request(self.client.get(url)).send().await?;
        let response = self.check_response(response).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl CheckInBackend for RestClient {
    #[instrument(skip(self), level = "debug")]
    async fn recent_check_ins(&self, limit: usize) -> Result<Vec<CheckIn>, ServiceError> {
        let mut url = self.table_url(CHECK_INS_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc")
            .append_pair("limit", &limit.to_string());

        let rows: Vec<CheckIn> = self.get_rows("recent check-ins", url).await?;
        tracing::debug!("Fetched {} recent check-ins", rows.len());
        Ok(rows)
    }

    #[instrument(skip(self), level = "debug")]
    async fn check_in_by_id(&self, id: Uuid) -> Result<Option<CheckIn>, ServiceError> {
        let mut url = self.table_url(CHECK_INS_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("id", &format!("eq.{}", id))
            .append_pair("limit", "1");

        let rows: Vec<CheckIn> = self.get_rows("check-in by id", url).await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self), level = "debug")]
    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, ServiceError> {
        let mut url = self.table_url(PROFILES_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "display_name")
            .append_pair("user_id", &format!("eq.{}", user_id))
            .append_pair("limit", "1");

        let rows: Vec<Profile> = self.get_rows("profile", url).await?;
        Ok(rows.into_iter().next().and_then(|p| p.display_name))
    }

    #[instrument(skip(self, row), fields(user_id = %row.user_id), level = "info")]
    async fn insert_check_in(&self, row: &CheckInInsert) -> Result<CheckIn, ServiceError> {
        let url = self.table_url(CHECK_INS_TABLE)?;
        let request = self.build_request(
            self.client
                .post(url)
                .header("Prefer", "return=representation")
                .json(&[row]),
        );

        let response = request.send().await?;
        let response = self.check_response(response).await?;
        let rows: Vec<CheckIn> = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        let stored = rows
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::InvalidResponse("insert returned no rows".to_string()))?;

        tracing::info!("Created check-in {} at {}", stored.id, stored.location);
        Ok(stored)
    }
}
