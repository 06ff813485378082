//! Service registration and lifecycle demultiplexing.
//!
//! One registered [`Service`] serves three request kinds. A `call` is a
//! one-shot invocation. A `subscribe` allocates a subscription against the
//! requesting connection and queues the acknowledgment before the service
//! sees the subscription handle, so the ack always precedes the first
//! published event. An `unsubscribe` removes the record and runs the
//! service's teardown hook; the subscription registry guarantees the hook
//! runs exactly once even when a disconnect races the explicit teardown.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use junction_core::{
    Context, DispatchError, DispatchResult, RequestKind, Service, ServiceRef,
    SubscriptionRegistry,
};

use crate::pattern::PathPattern;

/// A service bundled with the path it wants to live under.
pub struct ServiceDescriptor {
    path: PathPattern,
    service: ServiceRef,
}

impl ServiceDescriptor {
    /// Creates a descriptor for a concrete service.
    pub fn new(path: impl Into<PathPattern>, service: impl Service + 'static) -> Self {
        Self {
            path: path.into(),
            service: Arc::new(service),
        }
    }

    pub(crate) fn into_parts(self) -> (PathPattern, ServiceRef) {
        (self.path, self.service)
    }
}

pub(crate) async fn execute_service(service: ServiceRef, ctx: &Arc<Context>) -> DispatchResult<()> {
    match ctx.kind() {
        RequestKind::Call => service.call(ctx).await,
        RequestKind::Subscribe => {
            let (registry, connection) = streaming_scope(ctx)?;
            let sub = registry.open(
                &connection,
                &ctx.path(),
                Arc::clone(&service),
                ctx.response().clone(),
            );
            debug!(sid = %sub.sid(), path = %sub.path(), "subscription opened");
            // the ack is queued before the service sees the handle, so no
            // publish can precede it
            ctx.response()
                .send(json!({ "type": "subscribe", "sid": sub.sid() }));
            service.subscribe(ctx, &sub).await
        }
        RequestKind::Unsubscribe => {
            let (registry, connection) = streaming_scope(ctx)?;
            let sid = ctx.data().get("sid").and_then(Value::as_str);
            let (sub, service) = registry
                .close(&connection, sid, &ctx.path())
                .ok_or(DispatchError::NotFound)?;
            service.unsubscribe(&sub).await?;
            sub.sink().send(json!({ "type": "unsubscribe", "sid": sub.sid() }));
            sub.sink().close();
            ctx.response()
                .send(json!({ "type": "unsubscribe", "sid": sub.sid() }));
            debug!(sid = %sub.sid(), path = %sub.path(), "subscription closed");
            Ok(())
        }
    }
}

fn streaming_scope(
    ctx: &Context,
) -> DispatchResult<(Arc<SubscriptionRegistry>, junction_core::ConnectionId)> {
    let registry = ctx
        .subscriptions()
        .ok_or_else(|| DispatchError::bad_request("subscriptions require a streaming transport"))?;
    let connection = ctx
        .connection()
        .ok_or_else(|| DispatchError::bad_request("subscriptions require a client connection"))?;
    Ok((Arc::clone(registry), connection.clone()))
}
