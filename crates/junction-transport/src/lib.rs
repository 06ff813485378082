//! # Junction Transport
//!
//! Transport adapters for the junction daemon.
//!
//! The dispatcher is transport-agnostic; this crate frames it for the
//! outside world:
//!
//! - **[`websocket::RpcServer`]**: the WebSocket RPC surface: JSON text
//!   frames or MessagePack binary frames, correlated by request id, with
//!   streaming subscriptions and connection-scoped teardown
//! - **[`websocket::RpcClient`]**: the matching client with a guarded
//!   request-id correlation table
//! - **[`http`]**: an axum middleware adapter that dispatches HTTP requests
//!   and falls through to the host application on `NOT_FOUND`
//! - **[`codec`]**: the shared JSON/MessagePack frame codec

pub mod codec;
pub mod error;
pub mod http;
pub mod user_agent;
pub mod websocket;

pub use codec::{WireEncoding, WireFrame};
pub use error::{TransportError, TransportResult};
pub use websocket::{ClientConfig, ClientSubscription, RpcClient, RpcServer};
