//! API client for the roster backend.
//!
//! Every call made through [`ApiClient::execute`] gets the stored access token
//! attached as a bearer credential. When the server answers 401 the client
//! renews the access token once with the stored refresh token and re-sends the
//! call. If renewal is impossible the token store is cleared and subscribed
//! [`SessionListener`]s are told the session was invalidated.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::auth::{CredentialPair, SessionEvent, SessionListener, TokenStore};

use super::request::{Attempt, PendingRequest, RequestBody};
use super::transport::{ApiResponse, Transport};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Login endpoint, exchanges email + password for a token pair
pub const LOGIN_PATH: &str = "/api/v1/auth/login/";

/// Token renewal endpoint, exchanges a refresh token for a new access token
pub const TOKEN_REFRESH_PATH: &str = "/api/v1/auth/token/refresh/";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Authenticated API client.
/// Clone is cheap; clones share the transport, token store and listeners.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    listeners: Arc<Mutex<Vec<Arc<dyn SessionListener>>>>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            transport,
            store,
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Register a listener for session events
    pub fn subscribe(&self, listener: Arc<dyn SessionListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Exchange credentials for a token pair. Bypasses token attachment and renewal.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<CredentialPair, ApiError> {
        let request = PendingRequest::post(LOGIN_PATH).with_json(&LoginRequest { email, password })?;

        let response = self.transport.send(&request).await?.error_for_status()?;
        let tokens: LoginResponse = response.json()?;

        Ok(CredentialPair {
            access_token: tokens.access,
            refresh_token: tokens.refresh,
        })
    }

    // ===== Authenticated Calls =====

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<ApiResponse, ApiError> {
        self.execute(PendingRequest::new(method, path).with_body(body))
            .await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(PendingRequest::get(path)).await?.json()
    }

    /// Send a request with the stored access token, renewing it once on 401.
    ///
    /// Returns the response of the last attempt. A 401 on the retried call is
    /// returned as-is; a failed renewal ends the session and returns
    /// [`ApiError::SessionExpired`].
    pub async fn execute(&self, request: PendingRequest) -> Result<ApiResponse, ApiError> {
        let mut request = self.attach_token(request)?;
        let mut attempt = Attempt::Initial;

        loop {
            match self.send(&request).await {
                Err(ApiError::Unauthorized(body)) => {
                    let Some(next) = attempt.next() else {
                        warn!(path = request.path(), "Request rejected again after token renewal");
                        return Err(ApiError::Unauthorized(body));
                    };

                    debug!(path = request.path(), "Access token rejected, renewing");
                    let access = match self.renew_access_token().await {
                        Ok(access) => access,
                        Err(cause) => return Err(self.invalidate_session(cause)),
                    };

                    request = request.with_bearer(&access)?;
                    attempt = next;
                }
                outcome => return outcome,
            }
        }
    }

    fn attach_token(&self, request: PendingRequest) -> Result<PendingRequest, ApiError> {
        match self.store.read_access()? {
            Some(token) => request.with_bearer(&token),
            None => {
                debug!(path = request.path(), "No access token stored, sending without credentials");
                Ok(request)
            }
        }
    }

    /// Send once, backing off on 429. Non-success statuses become errors.
    async fn send(&self, request: &PendingRequest) -> Result<ApiResponse, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.transport.send(request).await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return response.error_for_status();
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(path = request.path(), retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2; // Exponential backoff
        }
    }

    /// Trade the stored refresh token for a new access token and store it.
    /// Goes straight to the transport so a rejected renewal is never itself renewed.
    async fn renew_access_token(&self) -> Result<String, ApiError> {
        let refresh = self
            .store
            .read_refresh()?
            .ok_or(ApiError::MissingRefreshToken)?;

        let request = PendingRequest::post(TOKEN_REFRESH_PATH).with_json(&RefreshRequest { refresh: &refresh })?;
        let response = self.transport.send(&request).await?.error_for_status()?;
        let renewed: RefreshResponse = response.json()?;

        self.store.set_access(&renewed.access)?;
        info!("Access token renewed");
        Ok(renewed.access)
    }

    fn invalidate_session(&self, cause: ApiError) -> ApiError {
        warn!(error = %cause, "Token renewal failed, ending session");

        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear token store");
        }

        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_session_event(SessionEvent::Invalidated);
        }

        ApiError::SessionExpired(Box::new(cause))
    }
}

// ============================================================================
// Tests
// ============================================================================
