//! # Junction Core
//!
//! The foundational types for the junction daemon.
//!
//! This crate provides the fundamental abstractions that are not tied to any
//! transport or routing strategy. The path-routed dispatch engine lives in
//! [`junction-framework`]; the WebSocket and HTTP adapters live in
//! [`junction-transport`].
//!
//! ## Core Components
//!
//! ### Wire types
//! - **Request**, **ResponseFrame**: the id-correlated RPC envelopes
//!
//! ### Contexts
//! - **Context**: the per-request carrier of path, params, payload, and status
//! - **ResponseSink** / **ResponseStream**: the object-mode response queue
//!
//! ### Services
//! - **Service**: a handler expressing call / subscribe / unsubscribe through
//!   one registration
//! - **SubscriptionRegistry**: connection-scoped subscription bookkeeping
//!
//! ### Errors
//! - **DispatchError**: the kinded error taxonomy with stable numeric codes

pub mod context;
pub mod error;
pub mod message;
pub mod service;
pub mod sink;

pub use context::{Context, ContextBuilder};
pub use error::{DispatchError, DispatchResult};
pub use message::{PROTOCOL_VERSION, Request, RequestKind, ResponseFrame};
pub use service::{
    ConnectionId, Service, ServiceRef, Subscription, SubscriptionRegistry,
};
pub use sink::{ResponseSink, ResponseStream, response_channel};
