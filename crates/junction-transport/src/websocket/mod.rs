//! WebSocket transport adapters.

pub mod client;
pub mod server;

pub use client::{ClientConfig, ClientSubscription, RpcClient};
pub use server::RpcServer;
