//! Authentication module: token storage, session state and route protection.
//!
//! This module provides:
//! - `TokenStore`: durable storage for the access/refresh token pair, backed
//!   by a JSON file, the OS keychain, or memory
//! - `SessionController`: in-memory session derived from stored tokens, with
//!   `login`/`logout`
//! - `RouteGuard`: redirects unauthenticated users away from protected views
//!
//! Token expiry is never checked locally; it is discovered when the server
//! rejects a call, and handled by the API client.

pub mod events;
pub mod file_store;
pub mod guard;
pub mod keyring_store;
pub mod session;
pub mod store;

pub use events::{SessionEvent, SessionListener};
pub use file_store::FileTokenStore;
pub use guard::{GuardDecision, Navigator, Route, RouteGuard, RouteTracker};
pub use keyring_store::KeyringTokenStore;
pub use session::{Session, SessionController, UserRef};
pub use store::{open_store, CredentialPair, MemoryTokenStore, StoreError, TokenStore};
