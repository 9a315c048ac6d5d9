use async_trait::async_trait;
use reportfetch_core::execution::{ApiError, RemoteApiClient};
use reportfetch_core::model::{AccountId, Row};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use url::Url;

use crate::credentials::AdsCredentials;
use crate::retry::RetryPolicy;
use crate::rows::SearchStreamBatch;

/// Access tokens are refreshed this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Cannot build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Google Ads REST client running queries through `googleAds:searchStream`
///
/// Access tokens are obtained with the refresh token of the credentials and cached until shortly
/// before they expire. Transient failures are retried according to the [`RetryPolicy`]
pub struct GoogleAdsClient {
    http: reqwest::Client,
    credentials: AdsCredentials,
    api_version: u32,
    token: Mutex<Option<AccessToken>>,
    retry: RetryPolicy,
}

impl GoogleAdsClient {
    pub fn new(credentials: AdsCredentials, api_version: u32) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("reportfetch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            credentials,
            api_version,
            token: Mutex::new(None),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn search_stream_url(&self, account: &AccountId) -> Result<Url, ApiError> {
        self.credentials
            .endpoint
            .join(&format!(
                "v{}/customers/{}/googleAds:searchStream",
                self.api_version, account
            ))
            .map_err(|e| ApiError::Protocol(format!("invalid endpoint: {e}")))
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached
            .as_ref()
            .filter(|token| token.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN)
        {
            return Ok(token.value.clone());
        }

        debug!("Refreshing access token");
        let response = self
            .http
            .post(self.credentials.token_uri.clone())
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 | 500..=599 => ApiError::Transient(format!("token refresh returned {status}")),
                _ => ApiError::Unauthenticated(error_message(&body)),
            });
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ApiError::Protocol(format!("invalid token response: {e}")))?;

        let value = token.access_token.clone();
        *cached = Some(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in.unwrap_or(3600)),
        });

        Ok(value)
    }

    #[instrument(skip_all, fields(account = account.as_str()), err)]
    async fn search_stream(&self, account: &AccountId, query: &str) -> Result<Vec<Row>, ApiError> {
        let token = self.access_token().await?;

        let mut request = self
            .http
            .post(self.search_stream_url(account)?)
            .bearer_auth(token)
            .header("developer-token", self.credentials.developer_token.as_str())
            .json(&json!({ "query": query }));

        if let Some(login) = &self.credentials.login_customer_id {
            request = request.header("login-customer-id", login.as_str());
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }

        let batches = response
            .json::<Vec<SearchStreamBatch>>()
            .await
            .map_err(|e| ApiError::Protocol(format!("invalid searchStream response: {e}")))?;

        let rows = batches
            .iter()
            .flat_map(SearchStreamBatch::rows)
            .collect::<Vec<_>>();

        debug!(rows = rows.len(), "Received searchStream response");
        Ok(rows)
    }
}

#[async_trait]
impl RemoteApiClient for GoogleAdsClient {
    async fn query(&self, account: &AccountId, query_text: &str) -> Result<Vec<Row>, ApiError> {
        self.retry
            .execute(|| self.search_stream(account, query_text))
            .await
    }
}

fn transport_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        ApiError::Transient(error.to_string())
    } else {
        ApiError::Protocol(error.to_string())
    }
}

/// Map an unsuccessful HTTP status to the matching error class
pub fn status_error(status: u16, body: &str) -> ApiError {
    let message = format!("{status}: {}", error_message(body));

    match status {
        401 => ApiError::Unauthenticated(message),
        403 => ApiError::PermissionDenied(message),
        400 | 404 => ApiError::InvalidQuery(message),
        429 | 500..=599 => ApiError::Transient(message),
        _ => ApiError::Protocol(message),
    }
}

/// Message of a Google API error payload, `searchStream` wraps it into an array
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let error = match &parsed {
        Some(Value::Array(items)) => items.first().and_then(|item| item.get("error")),
        Some(value) => value.get("error"),
        None => None,
    };

    let message = error.and_then(|error| match error {
        Value::String(description) => Some(description.as_str()),
        other => other.get("message").and_then(Value::as_str),
    });

    match message {
        Some(message) => message.to_string(),
        None => body.trim().to_string(),
    }
}
