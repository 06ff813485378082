//! # Junction Framework
//!
//! The path-routed dispatch engine for the junction daemon.
//!
//! This crate turns the foundational types in [`junction-core`] into a
//! routing framework:
//!
//! - **[`PathPattern`] / [`CompiledMatcher`]**: literal, parameterized, and
//!   regex patterns compiled to anchored matchers with named captures
//! - **[`Route`] / [`Handler`]**: the ordered route table and the three
//!   handler shapes (function, service, nested dispatcher)
//! - **[`Dispatcher`] / [`Next`]**: the dispatch walk with its one-shot
//!   middleware continuation
//! - **[`ServiceDescriptor`]**: service registration glue
//!
//! ```rust,ignore
//! use junction_framework::{Dispatcher, Next};
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.register("/status", |ctx, _next: Next| async move {
//!     ctx.response().send(serde_json::json!({ "ok": true }));
//!     Ok(())
//! })?;
//!
//! let mut plugins = Dispatcher::new();
//! plugins.register("/time", time_handler)?;
//! dispatcher.register("/plugin", plugins)?;
//! ```

pub mod dispatcher;
pub mod pattern;
pub mod route;
pub mod service;

pub use dispatcher::{Dispatcher, Next};
pub use pattern::{CompiledMatcher, PathMatch, PathPattern, PatternSet};
pub use route::{Handler, HandlerFn, IntoHandler, Route};
pub use service::ServiceDescriptor;
