//! Routes and the guard that protects them.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::session::SessionController;
use crate::notify::NoticeKind;

/// Notice shown when an unauthenticated user reaches a protected view
pub const LOGIN_REQUIRED_MESSAGE: &str = "Please login to access the dashboard.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        match path.trim_end_matches('/') {
            "/login" => Some(Route::Login),
            "/dashboard" => Some(Route::Dashboard),
            _ => None,
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard)
    }
}

/// Receives navigation side effects.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that remembers where it was sent.
#[derive(Debug, Default)]
pub struct RouteTracker {
    history: Mutex<Vec<Route>>,
}

impl RouteTracker {
    pub fn current(&self) -> Option<Route> {
        self.history().last().copied()
    }

    pub fn history(&self) -> Vec<Route> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RouteTracker {
    fn navigate(&self, route: Route) {
        debug!(path = route.path(), "Navigating");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Render(Route),
    Redirect(Route),
}

impl GuardDecision {
    pub fn renders(&self) -> bool {
        matches!(self, GuardDecision::Render(_))
    }
}

/// Decides per navigation whether a view may be rendered. Reads the live
/// session every time; nothing is cached.
pub struct RouteGuard<'a> {
    session: &'a SessionController,
}

impl<'a> RouteGuard<'a> {
    pub fn new(session: &'a SessionController) -> Self {
        Self { session }
    }

    pub fn evaluate(&self, route: Route) -> GuardDecision {
        let authenticated = self.session.is_authenticated();
        match route {
            route if route.is_protected() && !authenticated => {
                self.session
                    .notifier()
                    .notify(NoticeKind::Info, LOGIN_REQUIRED_MESSAGE);
                self.redirect(Route::Login)
            }
            Route::Login if authenticated => self.redirect(Route::Dashboard),
            route => GuardDecision::Render(route),
        }
    }

    /// Evaluate a raw path. Unknown paths go to the login page.
    pub fn resolve(&self, path: &str) -> GuardDecision {
        match Route::from_path(path) {
            Some(route) => self.evaluate(route),
            None => {
                debug!(path, "Unknown path");
                match self.evaluate(Route::Login) {
                    GuardDecision::Render(login) => self.redirect(login),
                    redirect => redirect,
                }
            }
        }
    }

    fn redirect(&self, to: Route) -> GuardDecision {
        self.session.navigator().navigate(to);
        GuardDecision::Redirect(to)
    }
}
