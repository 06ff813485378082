//! The per-request dispatch context.
//!
//! A [`Context`] is created once per inbound request and shared by reference
//! through the whole route chain, including descents into nested
//! dispatchers. Handlers mutate it in place: the path reflects the tail
//! after prefix stripping, params always reflect the most recent match, and
//! everything written to the response sink is observed by the owning
//! transport in write order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use parking_lot::RwLock;
use serde_json::Value;

use crate::message::RequestKind;
use crate::service::{ConnectionId, SubscriptionRegistry};
use crate::sink::{ResponseSink, ResponseStream, response_channel};

/// Mutable carrier for one request's journey through the dispatcher.
pub struct Context {
    kind: RequestKind,
    data: Value,
    path: RwLock<String>,
    params: RwLock<Option<HashMap<String, String>>>,
    status: AtomicU16,
    response: ResponseSink,
    connection: Option<ConnectionId>,
    subscriptions: Option<Arc<SubscriptionRegistry>>,
}

impl Context {
    /// Starts building a context for the given request kind.
    pub fn builder(kind: RequestKind) -> ContextBuilder {
        ContextBuilder {
            kind,
            data: None,
            connection: None,
            subscriptions: None,
        }
    }

    /// The lifecycle operation this request performs.
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// The client-supplied payload. Never null; defaults to `{}`.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// The path currently being matched (tail after prefix stripping).
    pub fn path(&self) -> String {
        self.path.read().clone()
    }

    /// Replaces the path being matched.
    pub fn set_path(&self, path: &str) {
        *self.path.write() = path.to_string();
    }

    /// Parameters captured by the most recent matching route; `None` until a
    /// route has matched.
    pub fn params(&self) -> Option<HashMap<String, String>> {
        self.params.read().clone()
    }

    /// Looks up a single captured parameter.
    pub fn param(&self, name: &str) -> Option<String> {
        self.params.read().as_ref()?.get(name).cloned()
    }

    /// Clears and repopulates the captured parameters.
    pub fn set_params(&self, params: HashMap<String, String>) {
        *self.params.write() = Some(params);
    }

    /// The HTTP-style response status. Initially `200`.
    pub fn status(&self) -> u16 {
        self.status.load(Ordering::Acquire)
    }

    /// Overrides the response status.
    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::Release);
    }

    /// The response sink; each message queued here becomes one outbound
    /// response frame.
    pub fn response(&self) -> &ResponseSink {
        &self.response
    }

    /// The client connection this request arrived on, when the transport has
    /// one.
    pub fn connection(&self) -> Option<&ConnectionId> {
        self.connection.as_ref()
    }

    /// The subscription registry for this connection's transport, when it
    /// supports streaming.
    pub fn subscriptions(&self) -> Option<&Arc<SubscriptionRegistry>> {
        self.subscriptions.as_ref()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("kind", &self.kind)
            .field("path", &*self.path.read())
            .field("status", &self.status())
            .finish()
    }
}

/// Builder for [`Context`].
pub struct ContextBuilder {
    kind: RequestKind,
    data: Option<Value>,
    connection: Option<ConnectionId>,
    subscriptions: Option<Arc<SubscriptionRegistry>>,
}

impl ContextBuilder {
    /// Sets the request payload. `null` is coerced to `{}`.
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Binds the context to a client connection.
    pub fn connection(mut self, connection: ConnectionId) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Attaches the transport's subscription registry.
    pub fn subscriptions(mut self, registry: Arc<SubscriptionRegistry>) -> Self {
        self.subscriptions = Some(registry);
        self
    }

    /// Builds the shared context and the stream its responses drain from.
    pub fn build(self) -> (Arc<Context>, ResponseStream) {
        let (response, stream) = response_channel();
        let data = match self.data {
            None | Some(Value::Null) => Value::Object(serde_json::Map::new()),
            Some(data) => data,
        };
        let ctx = Context {
            kind: self.kind,
            data,
            path: RwLock::new(String::new()),
            params: RwLock::new(None),
            status: AtomicU16::new(200),
            response,
            connection: self.connection,
            subscriptions: self.subscriptions,
        };
        (Arc::new(ctx), stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_call_empty_payload_and_200() {
        let (ctx, _stream) = Context::builder(RequestKind::Call).build();
        assert_eq!(ctx.kind(), RequestKind::Call);
        assert_eq!(*ctx.data(), json!({}));
        assert_eq!(ctx.status(), 200);
        assert!(ctx.params().is_none());
        assert!(ctx.connection().is_none());
    }

    #[test]
    fn null_payload_is_coerced_to_empty_object() {
        let (ctx, _stream) = Context::builder(RequestKind::Call)
            .data(Value::Null)
            .build();
        assert_eq!(*ctx.data(), json!({}));
    }

    #[test]
    fn params_are_replaced_wholesale() {
        let (ctx, _stream) = Context::builder(RequestKind::Call).build();
        ctx.set_params(HashMap::from([("a".to_string(), "x".to_string())]));
        ctx.set_params(HashMap::from([("b".to_string(), "y".to_string())]));
        assert_eq!(ctx.param("b").as_deref(), Some("y"));
        // earlier captures are gone, not merged
        assert!(ctx.param("a").is_none());
    }

    #[tokio::test]
    async fn response_writes_reach_the_stream() {
        let (ctx, mut stream) = Context::builder(RequestKind::Call).build();
        ctx.set_status(201);
        ctx.response().send(json!({ "ok": true }));
        assert_eq!(ctx.status(), 201);
        assert_eq!(stream.next().await, Some(json!({ "ok": true })));
    }
}
