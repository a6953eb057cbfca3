//! Session state and the controller that owns it.
//!
//! The session is never persisted. It is derived from the token store on
//! startup and changed only by `login`, `logout`, or a session-invalidated
//! event from the API client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, info, warn};

use super::events::{SessionEvent, SessionListener};
use super::guard::{Navigator, Route, RouteGuard};
use crate::api::{ApiClient, ApiError};
use crate::notify::{NoticeKind, Notifier};

pub const LOGIN_SUCCESS_MESSAGE: &str = "Login successful!";
pub const LOGOUT_MESSAGE: &str = "Logged out successfully.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

/// The principal a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub is_authenticated: bool,
    pub user: Option<UserRef>,
}

impl Session {
    pub fn authenticated(user: Option<UserRef>) -> Self {
        Self {
            is_authenticated: true,
            user,
        }
    }

    pub fn unauthenticated() -> Self {
        Self::default()
    }
}

/// State shared between the controller and the API client's listener list.
struct SessionShared {
    session: RwLock<Session>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl SessionShared {
    fn snapshot(&self) -> Session {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, session: Session) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }
}

impl SessionListener for SessionShared {
    fn on_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Invalidated => {
                warn!("Session invalidated by failed token renewal");
                self.set(Session::unauthenticated());
                self.notifier.notify(NoticeKind::Error, SESSION_EXPIRED_MESSAGE);
                self.navigator.navigate(Route::Login);
            }
        }
    }
}

/// Single source of truth for whether protected views may be shown.
pub struct SessionController {
    api: ApiClient,
    shared: Arc<SessionShared>,
    initialized: AtomicBool,
}

impl SessionController {
    /// Create a controller and subscribe it to the client's session events.
    /// The session starts unauthenticated until [`initialize`](Self::initialize) runs.
    pub fn new(api: ApiClient, notifier: Arc<dyn Notifier>, navigator: Arc<dyn Navigator>) -> Self {
        let shared = Arc::new(SessionShared {
            session: RwLock::new(Session::unauthenticated()),
            notifier,
            navigator,
        });
        api.subscribe(shared.clone());

        Self {
            api,
            shared,
            initialized: AtomicBool::new(false),
        }
    }

    /// Seed the session from the token store. Only token presence is checked.
    /// Runs once; later calls return the current session unchanged.
    pub fn initialize(&self) -> Session {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("Session already initialized");
            return self.session();
        }

        match self.api.store().read() {
            Ok(Some(_)) => {
                info!("Stored tokens found, session restored");
                self.shared.set(Session::authenticated(None));
            }
            Ok(None) => debug!("No stored tokens, starting unauthenticated"),
            Err(e) => warn!(error = %e, "Failed to read token store, starting unauthenticated"),
        }
        self.session()
    }

    /// Log in with email and password.
    ///
    /// On success the token pair is stored, the session becomes authenticated
    /// and the user is sent to the dashboard. On failure the session and the
    /// token store are left alone, an error notice is shown, and the error is
    /// returned so the caller can do its own cleanup.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        info!(email, "Logging in");

        let stored = match self.api.authenticate(email, password).await {
            Ok(pair) => self.api.store().save(&pair).map_err(ApiError::from),
            Err(e) => Err(e),
        };

        if let Err(e) = stored {
            error!(error = %e, "Login failed");
            self.shared
                .notifier
                .notify(NoticeKind::Error, &login_failure_message(&e));
            return Err(e);
        }

        self.shared.set(Session::authenticated(Some(UserRef {
            email: email.to_string(),
        })));
        self.shared.notifier.notify(NoticeKind::Success, LOGIN_SUCCESS_MESSAGE);
        self.shared.navigator.navigate(Route::Dashboard);
        info!("Login successful");
        Ok(())
    }

    /// Clear stored tokens and end the session. Never fails; no server call is made.
    pub fn logout(&self) {
        if let Err(e) = self.api.store().clear() {
            error!(error = %e, "Failed to clear token store on logout");
        }
        self.shared.set(Session::unauthenticated());
        self.shared.notifier.notify(NoticeKind::Info, LOGOUT_MESSAGE);
        self.shared.navigator.navigate(Route::Login);
        info!("Logged out");
    }

    pub fn session(&self) -> Session {
        self.shared.snapshot()
    }

    pub fn is_authenticated(&self) -> bool {
        self.shared.snapshot().is_authenticated
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn guard(&self) -> RouteGuard<'_> {
        RouteGuard::new(self)
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.shared.notifier
    }

    pub(crate) fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.shared.navigator
    }
}

/// User-facing message for a failed login, preferring the server's own detail
fn login_failure_message(error: &ApiError) -> String {
    if let Some(detail) = error.detail() {
        return detail;
    }
    match error {
        ApiError::Unauthorized(_) => "Invalid email or password".to_string(),
        ApiError::NetworkError(e) if e.is_timeout() => {
            "Connection timed out. Please try again.".to_string()
        }
        ApiError::NetworkError(_) => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        other => format!("Login failed: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{PendingRequest, TOKEN_REFRESH_PATH};
    use crate::auth::{CredentialPair, MemoryTokenStore, RouteTracker, TokenStore};
    use crate::test_support::{json, status, RecordingNotifier, ScriptedTransport};
    use reqwest::StatusCode;

    struct Fixture {
        controller: SessionController,
        store: Arc<MemoryTokenStore>,
        transport: Arc<ScriptedTransport>,
        notifier: Arc<RecordingNotifier>,
        tracker: Arc<RouteTracker>,
    }

    fn fixture(tokens: Option<CredentialPair>, responses: Vec<Result<crate::api::ApiResponse, ApiError>>) -> Fixture {
        let store = Arc::new(match tokens {
            Some(pair) => MemoryTokenStore::with_pair(pair),
            None => MemoryTokenStore::default(),
        });
        let transport = Arc::new(ScriptedTransport::new(responses));
        let api = ApiClient::new(transport.clone(), store.clone());
        let notifier = Arc::new(RecordingNotifier::default());
        let tracker = Arc::new(RouteTracker::default());
        let controller = SessionController::new(api, notifier.clone(), tracker.clone());
        Fixture {
            controller,
            store,
            transport,
            notifier,
            tracker,
        }
    }

    #[test]
    fn test_initialize_without_tokens_stays_unauthenticated() {
        let f = fixture(None, Vec::new());
        assert_eq!(f.controller.initialize(), Session::unauthenticated());
        assert!(!f.controller.is_authenticated());
    }

    #[test]
    fn test_initialize_with_tokens_restores_session() {
        let f = fixture(Some(CredentialPair::new("A1", "R1")), Vec::new());
        let session = f.controller.initialize();
        assert!(session.is_authenticated);
        assert!(session.user.is_none());
        // No network call is made to validate the tokens
        assert!(f.transport.requests().is_empty());
    }

    #[test]
    fn test_initialize_needs_both_tokens() {
        let f = fixture(None, Vec::new());
        f.store.set_access("A1").unwrap();
        assert!(!f.controller.initialize().is_authenticated);
    }

    #[test]
    fn test_initialize_runs_once() {
        let f = fixture(None, Vec::new());
        f.controller.initialize();
        f.store.save(&CredentialPair::new("A1", "R1")).unwrap();
        assert!(!f.controller.initialize().is_authenticated);
    }

    #[tokio::test]
    async fn test_login_stores_tokens_and_navigates() {
        let f = fixture(
            None,
            vec![json(200, serde_json::json!({"access": "A1", "refresh": "R1"}))],
        );
        f.controller.initialize();

        f.controller.login("a@x.com", "secret").await.unwrap();

        assert_eq!(f.store.read().unwrap(), Some(CredentialPair::new("A1", "R1")));
        assert_eq!(
            f.controller.session(),
            Session::authenticated(Some(UserRef {
                email: "a@x.com".to_string()
            }))
        );
        assert_eq!(f.tracker.current(), Some(Route::Dashboard));
        assert_eq!(
            f.notifier.last(),
            Some((NoticeKind::Success, LOGIN_SUCCESS_MESSAGE.to_string()))
        );
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_server_detail() {
        let f = fixture(
            None,
            vec![json(
                401,
                serde_json::json!({"errors": [{"detail": "No active account found with the given credentials"}]}),
            )],
        );
        f.controller.initialize();

        let err = f.controller.login("a@x.com", "wrong").await.unwrap_err();

        assert!(err.is_unauthorized());
        assert!(!f.controller.is_authenticated());
        assert!(f.store.read().unwrap().is_none());
        assert!(f.tracker.history().is_empty());
        assert_eq!(
            f.notifier.last(),
            Some((
                NoticeKind::Error,
                "No active account found with the given credentials".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_login_failure_without_payload_uses_fallback_message() {
        let f = fixture(None, vec![status(401)]);

        f.controller.login("a@x.com", "wrong").await.unwrap_err();

        assert_eq!(
            f.notifier.last(),
            Some((NoticeKind::Error, "Invalid email or password".to_string()))
        );
    }

    #[tokio::test]
    async fn test_failed_login_keeps_existing_tokens() {
        let f = fixture(Some(CredentialPair::new("A0", "R0")), vec![status(500)]);

        f.controller.login("a@x.com", "secret").await.unwrap_err();

        assert_eq!(f.store.read().unwrap(), Some(CredentialPair::new("A0", "R0")));
    }

    #[test]
    fn test_logout_clears_everything() {
        let f = fixture(Some(CredentialPair::new("A1", "R1")), Vec::new());
        f.controller.initialize();

        f.controller.logout();

        assert!(f.store.read_access().unwrap().is_none());
        assert!(f.store.read_refresh().unwrap().is_none());
        assert_eq!(f.controller.session(), Session::unauthenticated());
        assert_eq!(f.tracker.current(), Some(Route::Login));
        assert_eq!(
            f.notifier.last(),
            Some((NoticeKind::Info, LOGOUT_MESSAGE.to_string()))
        );
    }

    #[test]
    fn test_logout_when_already_logged_out() {
        let f = fixture(None, Vec::new());
        f.controller.initialize();
        f.controller.logout();
        assert!(!f.controller.is_authenticated());
        assert!(f.store.read().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_access_token_is_renewed_transparently() {
        let f = fixture(
            Some(CredentialPair::new("A1", "R1")),
            vec![
                status(401),
                json(200, serde_json::json!({"access": "A2"})),
                json(200, serde_json::json!([])),
            ],
        );
        f.controller.initialize();

        let response = f
            .controller
            .api()
            .execute(PendingRequest::get("/api/v1/auth/users/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(f.store.read().unwrap(), Some(CredentialPair::new("A2", "R1")));
        assert!(f.controller.is_authenticated());
        assert!(f.notifier.notices().is_empty());
        assert_eq!(f.transport.requests()[2].bearer(), Some("A2"));
    }

    #[tokio::test]
    async fn test_failed_renewal_forces_logout() {
        let f = fixture(
            Some(CredentialPair::new("A1", "R1")),
            vec![status(401), status(401)],
        );
        f.controller.initialize();
        assert!(f.controller.is_authenticated());

        let err = f
            .controller
            .api()
            .execute(PendingRequest::get("/api/v1/auth/users/"))
            .await
            .unwrap_err();

        assert!(err.is_session_expired());
        assert!(f.store.read_access().unwrap().is_none());
        assert!(f.store.read_refresh().unwrap().is_none());
        assert!(!f.controller.is_authenticated());
        assert_eq!(f.tracker.current(), Some(Route::Login));
        assert_eq!(
            f.notifier.last(),
            Some((NoticeKind::Error, SESSION_EXPIRED_MESSAGE.to_string()))
        );
        assert_eq!(f.transport.requests()[1].path(), TOKEN_REFRESH_PATH);
        assert!(!f.controller.guard().evaluate(Route::Dashboard).renders());
    }
}
