//! Transport seam between the order store and the order API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{error::ApiError, OrderDraft, OrderId, OrderRecord, OrderStatus, StatusPatch};
use tracing::debug;

use crate::error::TransportError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait OrderTransport: Send + Sync {
    async fn get_all(&self) -> Result<Vec<OrderRecord>, TransportError>;
    async fn get_by_id(&self, id: OrderId) -> Result<OrderRecord, TransportError>;
    async fn create(&self, draft: &OrderDraft) -> Result<OrderRecord, TransportError>;
    async fn patch_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderRecord, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Collection endpoint, e.g. `https://api.example.com/orders`.
    pub api_url: String,
    pub request_timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct HttpOrderTransport {
    http: Client,
    api_url: String,
}

impl HttpOrderTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::malformed(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn order_url(&self, id: OrderId) -> String {
        format!("{}/{}", self.api_url, id.0)
    }
}

#[async_trait]
impl OrderTransport for HttpOrderTransport {
    async fn get_all(&self) -> Result<Vec<OrderRecord>, TransportError> {
        let response = self
            .http
            .get(&self.api_url)
            .send()
            .await
            .map_err(classify_request_error)?;
        decode_response(response, None).await
    }

    async fn get_by_id(&self, id: OrderId) -> Result<OrderRecord, TransportError> {
        let response = self
            .http
            .get(self.order_url(id))
            .send()
            .await
            .map_err(classify_request_error)?;
        decode_response(response, Some(id)).await
    }

    async fn create(&self, draft: &OrderDraft) -> Result<OrderRecord, TransportError> {
        let response = self
            .http
            .post(&self.api_url)
            .json(&OrderRecord::from(draft))
            .send()
            .await
            .map_err(classify_request_error)?;
        decode_response(response, None).await
    }

    async fn patch_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderRecord, TransportError> {
        let response = self
            .http
            .patch(format!("{}/status", self.order_url(id)))
            .json(&StatusPatch { status })
            .send()
            .await
            .map_err(classify_request_error)?;
        decode_response(response, Some(id)).await
    }
}

async fn decode_response<T: DeserializeOwned>(
    response: Response,
    id: Option<OrderId>,
) -> Result<T, TransportError> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(classify_request_error);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            debug!(status = status.as_u16(), error = %err, "orders: failed to read error body");
            String::new()
        }
    };
    let message = ApiError::message_from_body(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    });
    debug!(status = status.as_u16(), %message, "orders: api returned error status");

    match (status, id) {
        (StatusCode::NOT_FOUND, Some(id)) => Err(TransportError::NotFound(id)),
        (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => {
            Err(TransportError::Rejected(message))
        }
        _ => Err(TransportError::server(status.as_u16(), message)),
    }
}

fn classify_request_error(err: reqwest::Error) -> TransportError {
    if err.is_decode() {
        TransportError::malformed(format!("failed to decode order payload: {err}"))
    } else if err.is_timeout() {
        TransportError::client(format!("request timed out: {err}"))
    } else if err.is_connect() {
        TransportError::client(format!("failed to connect: {err}"))
    } else if err.is_builder() {
        TransportError::malformed(format!("invalid request: {err}"))
    } else {
        TransportError::client(format!("request failed: {err}"))
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
