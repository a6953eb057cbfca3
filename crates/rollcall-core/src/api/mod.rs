//! REST API client module for the roster backend.
//!
//! This module provides the `ApiClient` for authenticated calls, the
//! `Transport` seam it sends through, and the `ApiError` taxonomy.
//!
//! The API uses JWT bearer tokens obtained from the login endpoint and
//! renewed through the token refresh endpoint.

pub mod client;
pub mod error;
pub mod request;
pub mod transport;

pub use client::{ApiClient, LOGIN_PATH, TOKEN_REFRESH_PATH};
pub use error::ApiError;
pub use request::{Attempt, FilePart, PendingRequest, RequestBody};
pub use transport::{ApiResponse, HttpTransport, OfflineTransport, Transport};
