//! Remote API access.
//!
//! This module provides the HTTP client, the explicit login session and the
//! query filters for the climate endpoints.

pub mod client;
pub mod error;
pub mod query;
pub mod session;

pub use client::{ApiClient, ClientConfig, NewUser, UserUpdate};
pub use error::ApiError;
pub use query::{resolve_location, DocumentFilters, TemperatureFilters};
pub use session::{Session, SessionStore};
