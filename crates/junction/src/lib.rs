//! # Junction
//!
//! A local daemon exposing a path-addressed RPC surface over a persistent
//! WebSocket stream, with an HTTP middleware adapter for plain request/
//! response traffic.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     ┌─────────────┐     ┌──────────────────────────┐
//! │ Transports │────▶│  Dispatcher │────▶│ Handlers                 │
//! │  ws / http │     │ (route walk)│────▶│  fn(ctx, next)           │
//! └────────────┘     └─────────────┘────▶│  Service (call/sub/unsub)│
//!                                   ────▶│  nested Dispatcher       │
//!                                        └──────────────────────────┘
//! ```
//!
//! - **Transports** frame requests into [`Context`]s and drain each
//!   context's response sink back to the wire
//! - **Dispatcher** walks its ordered route table; first match wins, and a
//!   middleware `next` continuation resumes the walk
//! - **Handlers** are functions, services, or nested dispatchers mounted
//!   under a path prefix
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use junction::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> junction::runtime::RuntimeResult<()> {
//!     let mut dispatcher = Dispatcher::new();
//!     dispatcher.register("/status", |ctx: std::sync::Arc<Context>, _next: Next| async move {
//!         ctx.response().send(json!({ "ok": true }));
//!         Ok(())
//!     })?;
//!
//!     // Serves ws://127.0.0.1:1732 until Ctrl+C
//!     JunctionRuntime::new(dispatcher).run().await
//! }
//! ```
//!
//! [`Context`]: junction_core::Context

pub use junction_core as core;
pub use junction_framework as framework;
pub use junction_runtime as runtime;
pub use junction_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use junction::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use junction_runtime::JunctionRuntime;

    // Dispatch engine - for registering routes
    pub use junction_framework::{Dispatcher, Next, ServiceDescriptor};

    // Request-side types handlers work with
    pub use junction_core::{
        Context, DispatchError, DispatchResult, RequestKind, Service, Subscription,
    };

    // Client side
    pub use junction_transport::{ClientConfig, RpcClient};
}
