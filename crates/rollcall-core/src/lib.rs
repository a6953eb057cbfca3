//! Core library for rollcall, an admin client for the voter/student roster API.
//!
//! Provides the token store, the authenticated API client with one-shot token
//! renewal, the session controller, the route guard, and the roster service
//! built on top of them. Front ends supply a [`notify::Notifier`] and an
//! [`auth::Navigator`] to receive user-facing side effects.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod notify;
pub mod roster;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, ApiError, HttpTransport, OfflineTransport};
pub use auth::{GuardDecision, Route, RouteTracker, Session, SessionController};
pub use config::Config;
pub use notify::{NoticeKind, Notifier};
pub use roster::RosterService;
