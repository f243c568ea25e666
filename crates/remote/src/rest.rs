//! REST client for the hosted document service.
//!
//! The service exposes point reads, field-masked merge patches, and bearer
//! tokens from an anonymous sign-in endpoint. Realtime subscriptions are an
//! update-time poll loop: the service has no push channel of its own, so the
//! client polls and forwards only actual changes.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tokio::sync::{mpsc, RwLock};
use tokio::time::sleep;

use crate::error::{Result, RetryClass, StoreError};
use crate::store::{
    DocumentFields, DocumentPath, DocumentStore, DocumentSubscription, SnapshotEvent,
};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;
const WATCH_MAX_ATTEMPTS: usize = 6;
const WATCH_BASE_BACKOFF_MS: u64 = 250;
const WATCH_MAX_BACKOFF_MS: u64 = 8_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

fn backoff_with_jitter(attempt: usize) -> Duration {
    let exp = (attempt.saturating_sub(1) as u32).min(8);
    let backoff =
        (WATCH_BASE_BACKOFF_MS.saturating_mul(1_u64 << exp)).min(WATCH_MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
    Duration::from_millis(backoff.saturating_add(jitter))
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    token: String,
}

/// Document envelope returned by the service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentEnvelope {
    fields: DocumentFields,
    #[serde(default)]
    update_time: Option<String>,
}

/// Configuration for [`RestDocumentStore`].
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Base URL of the document service, e.g. `https://api.weekplan.app`.
    pub base_url: String,
    /// Optional API key sent with anonymous sign-in.
    pub api_key: Option<String>,
    /// Interval between watch polls.
    pub poll_interval: Duration,
}

impl RestStoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// REST-backed [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct RestDocumentStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    poll_interval: Duration,
    token: Arc<RwLock<Option<String>>>,
}

impl RestDocumentStore {
    pub fn new(config: RestStoreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            poll_interval: config.poll_interval,
            token: Arc::new(RwLock::new(None)),
        }
    }

    fn document_url(&self, path: &DocumentPath) -> String {
        format!("{}/v1/documents/{}", self.base_url, path)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[RemoteStore] Response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[RemoteStore] Response error ({}): {}", status, preview);
    }

    async fn headers(&self) -> Result<HeaderMap> {
        let token = self
            .token
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::auth("Not authenticated; call ensure_auth first"))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| StoreError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);
        Ok(headers)
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(StoreError::api(
                    status.as_u16(),
                    format!("{}: {}", error.code, error.message),
                ));
            }
            return Err(StoreError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "[RemoteStore] Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            StoreError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    async fn fetch_envelope(&self, path: &DocumentPath) -> Result<Option<DocumentEnvelope>> {
        let url = self.document_url(path);
        let response = self
            .client
            .get(&url)
            .headers(self.headers().await?)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::parse_response(response).await?))
    }
}

#[async_trait::async_trait]
impl DocumentStore for RestDocumentStore {
    async fn ensure_auth(&self) -> Result<()> {
        if self.token.read().await.is_some() {
            return Ok(());
        }

        let url = format!("{}/v1/auth:signIn", self.base_url);
        let body = match &self.api_key {
            Some(key) => serde_json::json!({ "apiKey": key }),
            None => serde_json::json!({}),
        };
        debug!("[RemoteStore] Signing in anonymously");
        let response = self.client.post(&url).json(&body).send().await?;
        let signed_in: SignInResponse = Self::parse_response(response).await?;
        *self.token.write().await = Some(signed_in.token);
        Ok(())
    }

    async fn read(&self, path: &DocumentPath) -> Result<Option<DocumentFields>> {
        Ok(self.fetch_envelope(path).await?.map(|env| env.fields))
    }

    async fn write_merge(&self, path: &DocumentPath, fields: DocumentFields) -> Result<()> {
        if fields.is_empty() {
            return Err(StoreError::invalid_request("Empty merge-write field map"));
        }
        let mask = fields.keys().cloned().collect::<Vec<_>>().join(",");
        let url = self.document_url(path);
        debug!("[RemoteStore] Merge-write {} mask={}", path, mask);

        let response = self
            .client
            .patch(&url)
            .headers(self.headers().await?)
            .query(&[("updateMask", mask)])
            .json(&serde_json::json!({ "fields": fields }))
            .send()
            .await?;

        let _: serde_json::Value = Self::parse_response(response).await?;
        Ok(())
    }

    async fn subscribe(&self, path: &DocumentPath) -> Result<DocumentSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = self.clone();
        let path = path.clone();

        tokio::spawn(async move {
            let mut last_update: Option<String> = None;
            let mut delivered_initial = false;
            let mut attempt = 0usize;

            loop {
                if tx.is_closed() {
                    debug!("[RemoteStore] Watch for {} unsubscribed", path);
                    break;
                }

                match store.fetch_envelope(&path).await {
                    Ok(Some(envelope)) => {
                        attempt = 0;
                        let changed = !delivered_initial || last_update != envelope.update_time;
                        if changed {
                            delivered_initial = true;
                            last_update = envelope.update_time;
                            if tx.send(SnapshotEvent::Snapshot(envelope.fields)).is_err() {
                                break;
                            }
                        }
                        sleep(store.poll_interval).await;
                    }
                    Ok(None) => {
                        // Document not created yet; keep waiting for it.
                        attempt = 0;
                        sleep(store.poll_interval).await;
                    }
                    Err(err) => {
                        if err.retry_class() != RetryClass::Permanent && attempt < WATCH_MAX_ATTEMPTS
                        {
                            attempt += 1;
                            let backoff = backoff_with_jitter(attempt);
                            debug!(
                                "[RemoteStore] Watch retry attempt {}/{} for {} after: {}",
                                attempt, WATCH_MAX_ATTEMPTS, path, err
                            );
                            sleep(backoff).await;
                            continue;
                        }
                        warn!("[RemoteStore] Watch for {} lost: {}", path, err);
                        let _ = tx.send(SnapshotEvent::Lost(err));
                        break;
                    }
                }
            }
        });

        Ok(DocumentSubscription::new(rx))
    }
}
