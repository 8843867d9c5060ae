//! Data models for the offline worker.
//!
//! - `Request`, `Response`: the intercepted exchange
//! - `ControlMessage`, `Message`, `MessageReply`: inbound control channel
//! - `ClientMessage`: outbound notifications to open clients

pub mod message;
pub mod request;
pub mod response;

pub use message::{ClientMessage, ControlMessage, Message, MessageReply};
pub use request::{CacheMode, Destination, Request, RequestMode};
pub use response::Response;
