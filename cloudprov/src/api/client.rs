use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

use super::error::{ApiError, ErrorBody};
use super::pool::{ConnectionPoolConfig, ConnectionPoolManager, ConnectionStats, RequestOutcome};

pub const TARGET_HEADER: &str = "X-Amz-Target";
pub const JSON_RPC_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Control-plane API client
///
/// Every operation is a `POST /` whose target header names the service and
/// operation. The client classifies failures but never retries: retries
/// belong to the lifecycle controller driving the call.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    pool_manager: ConnectionPoolManager,
}

impl Client {
    /// Create a new API client with default connection settings
    pub fn new(endpoint: &str, api_token: &str, insecure: bool) -> Result<Self, ApiError> {
        Self::with_config(endpoint, api_token, insecure, ConnectionPoolConfig::default())
    }

    pub fn with_config(
        endpoint: &str,
        api_token: &str,
        insecure: bool,
        pool_config: ConnectionPoolConfig,
    ) -> Result<Self, ApiError> {
        let parsed = Url::parse(endpoint)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "{}: unsupported scheme {}",
                endpoint,
                parsed.scheme()
            )));
        }

        let pool_manager = ConnectionPoolManager::new(pool_config);
        let http_client = pool_manager.build_client(insecure)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: endpoint.trim_end_matches('/').to_string(),
                auth_header: format!("Bearer {}", api_token),
                pool_manager,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub async fn get_connection_stats(&self) -> ConnectionStats {
        self.inner.pool_manager.get_stats().await
    }

    /// Invokes `{service}.{operation}` with a JSON body
    pub async fn call<Req, Resp>(
        &self,
        service: &str,
        operation: &str,
        request: &Req,
    ) -> Result<Resp, ApiError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let target = format!("{}.{}", service, operation);
        let url = format!("{}/", self.inner.base_url);
        tracing::debug!("POST {} ({})", url, target);

        let sent = self
            .inner
            .http_client
            .post(&url)
            .header(AUTHORIZATION, &self.inner.auth_header)
            .header(CONTENT_TYPE, JSON_RPC_CONTENT_TYPE)
            .header(TARGET_HEADER, &target)
            .json(request)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                self.inner
                    .pool_manager
                    .record_request(RequestOutcome::Failed)
                    .await;
                return Err(self.classify_transport_error(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            self.inner
                .pool_manager
                .record_request(RequestOutcome::Success)
                .await;
            return self.parse_success_response(&target, response).await;
        }

        let err = self.handle_error_response(response).await;
        let outcome = match err {
            ApiError::RateLimited(_) => RequestOutcome::Throttled,
            _ => RequestOutcome::Failed,
        };
        self.inner.pool_manager.record_request(outcome).await;
        tracing::debug!("{} failed: {}", target, err);
        Err(err)
    }

    fn classify_transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(
                self.inner
                    .pool_manager
                    .config()
                    .request_timeout
                    .as_secs(),
            )
        } else if e.is_connect() || e.is_request() {
            ApiError::ServiceUnavailable(e.to_string())
        } else {
            ApiError::RequestError(e)
        }
    }

    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        target: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("{} response body: {}", target, text);

        let body = if text.trim().is_empty() { "{}" } else { &text };
        serde_json::from_str::<T>(body).map_err(|e| {
            tracing::error!("Failed to deserialize {} response: {}, body: {}", target, e, text);
            ApiError::ParseError(format!("{}: {}", target, e))
        })
    }

    async fn handle_error_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody {
            error_type: String::new(),
            message: text.clone(),
        });

        ApiError::from_response(status, body)
    }
}
