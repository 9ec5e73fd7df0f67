//! Order relay domain layer.
//!
//! - `gateway`: HTTP client for the backend API
//! - `credentials`: turns session cookies into a bearer credential
//! - `relay`: the per-connection upstream relay for the live order feed
//! - `order`: order mutations that publish order notifications on success

pub mod credentials;
pub mod error;
pub mod gateway;
pub mod order;
pub mod relay;

pub use credentials::{CredentialProvider, SessionCookieCredentials, SessionCookies};
pub use gateway::backend::{BackendClient, BackendResponse};
pub use relay::{OrderStreamSource, RelaySession, RelayStream};
