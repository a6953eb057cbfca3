//! Raw HTTP seam. A transport sends one request and reports the status and
//! body; it never interprets status codes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::request::{PendingRequest, RequestBody};
use super::ApiError;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e))
        })
    }

    /// Convert a non-success response into the matching `ApiError`
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_status(self.status, &self.body))
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &PendingRequest) -> Result<ApiResponse, ApiError>;
}

/// `reqwest`-backed transport rooted at the API base URL.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &PendingRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url(request.path());
        let builder = self
            .client
            .request(request.method().clone(), &url)
            .headers(request.headers().clone());

        let builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(file) => {
                let part = Part::bytes(file.bytes.clone())
                    .file_name(file.file_name.clone())
                    .mime_str(&file.mime)?;
                builder.multipart(Form::new().part(file.field.clone(), part))
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(method = %request.method(), url = %url, status = status.as_u16(), "HTTP exchange complete");

        Ok(ApiResponse::new(status, body))
    }
}

/// Transport for runs without an API base URL. Local operations such as
/// logout still work; anything that reaches the network fails.
#[derive(Debug, Clone)]
pub struct OfflineTransport {
    reason: String,
}

impl OfflineTransport {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Transport for OfflineTransport {
    async fn send(&self, request: &PendingRequest) -> Result<ApiResponse, ApiError> {
        debug!(path = request.path(), "Refusing request, API base URL not configured");
        Err(ApiError::NotConfigured(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let transport = HttpTransport::new("https://voters.example.org/").unwrap();
        assert_eq!(transport.base_url(), "https://voters.example.org");
        assert_eq!(
            transport.url("/api/v1/auth/users/"),
            "https://voters.example.org/api/v1/auth/users/"
        );
    }

    #[test]
    fn test_error_for_status() {
        let ok = ApiResponse::new(StatusCode::OK, "[]");
        assert!(ok.error_for_status().is_ok());

        let denied = ApiResponse::new(StatusCode::UNAUTHORIZED, "");
        assert!(denied.error_for_status().unwrap_err().is_unauthorized());
    }

    #[test]
    fn test_json_parse_failure_is_invalid_response() {
        let response = ApiResponse::new(StatusCode::OK, "not json");
        let result: Result<Vec<String>, _> = response.json();
        assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_offline_transport_refuses_every_request() {
        let transport = OfflineTransport::new("no base URL");
        let err = transport.send(&PendingRequest::get("/api/v1/auth/users/")).await.unwrap_err();
        assert!(matches!(err, ApiError::NotConfigured(ref reason) if reason == "no base URL"));
    }
}
