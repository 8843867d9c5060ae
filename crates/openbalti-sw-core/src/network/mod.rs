//! Outbound fetch used by the worker.
//!
//! `HttpNetwork` talks to the real origin with reqwest. `MockNetwork`
//! (tests and the `mock` feature) serves scripted responses and records
//! every call so cache-first behaviour can be asserted.

pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

use async_trait::async_trait;

use crate::error::NetworkError;
use crate::models::{Request, Response};

pub use http::HttpNetwork;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockNetwork;

#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request. Any HTTP status is `Ok`; only transport
    /// failures are `Err`.
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}
