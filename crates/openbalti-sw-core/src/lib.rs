//! Offline cache worker for OpenBalti.
//!
//! This crate implements the offline layer of the OpenBalti dictionary PWA:
//! an event-driven worker that installs an essential file set into a
//! versioned cache, garbage-collects caches from earlier versions on
//! activation, and answers intercepted requests with one of four caching
//! strategies (navigation, API, static asset, everything else).
//!
//! The browser runtime is replaced by explicit seams so the worker can be
//! driven from ordinary async Rust:
//!
//! - `CacheStorage`: namespaced request/response store (memory or disk)
//! - `Network`: the outbound fetch (reqwest, or a scripted mock in tests)
//! - `ClientRegistry`: open pages that receive worker broadcasts
//! - `Registration`: the foreground side that installs and promotes workers

pub mod cache;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod offline;
pub mod registration;
pub mod router;
pub mod strategy;
pub mod worker;

pub use cache::{CacheReport, CacheStorage, CachedEntry, DiskCacheStorage, MemoryCacheStorage};
pub use clients::{ClientId, ClientRegistry};
pub use config::{CacheRole, Settings, WorkerConfig, CACHE_VERSION};
pub use error::{CacheError, NetworkError, WorkerError};
pub use models::{
    CacheMode, ClientMessage, ControlMessage, Destination, Message, MessageReply, Request,
    RequestMode, Response,
};
pub use network::{HttpNetwork, Network};
pub use registration::{RegisterOutcome, Registration};
pub use router::{classify, should_intercept, RouteKind};
pub use worker::{
    ActivationReport, EventKind, EventOutcome, FetchOutcome, MessageOutcome, ServiceWorker,
    WorkerEvent, WorkerState,
};

#[cfg(any(test, feature = "mock"))]
pub use network::MockNetwork;
