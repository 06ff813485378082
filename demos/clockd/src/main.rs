//! Junction demo daemon.
//!
//! Exposes a `/status` route, an `/echo/:text` route, and a `/clock` service
//! that streams one tick per second to every subscriber.
//!
//! # Running the Demo
//!
//! ```bash
//! cargo run --package clockd
//! ```
//!
//! Then, from any WebSocket client:
//!
//! ```text
//! > {"version":"1.0","id":"1","path":"/status"}
//! < {"id":"1","status":200,"message":{"ok":true,"uptime":3}}
//! > {"version":"1.0","id":"2","path":"/clock","type":"subscribe"}
//! < {"id":"2","status":200,"message":{"type":"subscribe","sid":"..."}}
//! < {"id":"2","message":{"tick":1}}
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use junction::prelude::*;

/// Streams a counter to each subscriber until they go away.
struct ClockService;

#[async_trait]
impl Service for ClockService {
    async fn call(&self, ctx: &Context) -> DispatchResult<()> {
        ctx.response().send(json!({ "now": unix_now() }));
        Ok(())
    }

    async fn subscribe(&self, _ctx: &Context, sub: &Subscription) -> DispatchResult<()> {
        info!(sid = %sub.sid(), "clock subscriber joined");
        let sub = sub.clone();
        tokio::spawn(async move {
            let mut tick = 0u64;
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                tick += 1;
                if !sub.publish(json!({ "tick": tick })) {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn unsubscribe(&self, sub: &Subscription) -> DispatchResult<()> {
        info!(sid = %sub.sid(), "clock subscriber left");
        Ok(())
    }
}

/// Seconds since the Unix epoch.
fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[tokio::main]
async fn main() -> junction::runtime::RuntimeResult<()> {
    let started = Instant::now();

    let mut dispatcher = Dispatcher::new();

    dispatcher.register("/status", move |ctx: Arc<Context>, _next: Next| {
        let uptime = started.elapsed().as_secs();
        async move {
            ctx.response().send(json!({ "ok": true, "uptime": uptime }));
            Ok(())
        }
    })?;

    dispatcher.register("/echo/:text", |ctx: Arc<Context>, _next: Next| async move {
        let text = ctx.param("text").unwrap_or_default();
        ctx.response().send(json!(text));
        Ok(())
    })?;

    dispatcher.register_service(ServiceDescriptor::new("/clock", ClockService))?;

    // Loads junction.yaml when present; defaults to ws://127.0.0.1:1732
    JunctionRuntime::new(dispatcher).run().await
}
