//! Service handlers and connection-scoped subscription bookkeeping.
//!
//! A *service* is a single registration that expresses three lifecycle
//! operations (call, subscribe, unsubscribe) demultiplexed on the request
//! kind. Subscription state is keyed by `(connection, sid)`; the registry
//! guarantees each teardown hook runs exactly once, whether it is triggered
//! by an explicit unsubscribe or by the client connection going away.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use crate::context::Context;
use crate::error::{DispatchError, DispatchResult};
use crate::sink::ResponseSink;

/// Opaque identity of a client connection.
///
/// Transports mint one per accepted connection; tests may use any string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Mints a fresh connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ConnectionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A shared, object-safe service handle.
pub type ServiceRef = Arc<dyn Service>;

/// A handler that expresses call, subscribe, and unsubscribe through one
/// registration.
///
/// All hooks have defaults: a pure request/response service overrides only
/// [`call`](Self::call); a pure event source overrides
/// [`subscribe`](Self::subscribe) and, when it holds per-subscription
/// resources, [`unsubscribe`](Self::unsubscribe).
#[async_trait]
pub trait Service: Send + Sync {
    /// Handles a one-shot request. The response is written to the context's
    /// sink. Defaults to `NotFound` for subscription-only services.
    async fn call(&self, ctx: &Context) -> DispatchResult<()> {
        let _ = ctx;
        Err(DispatchError::NotFound)
    }

    /// Invoked once per successful subscribe, after the acknowledgment has
    /// been queued. The subscription handle stays valid until teardown; clone
    /// it into spawned tasks to publish asynchronously.
    async fn subscribe(&self, ctx: &Context, sub: &Subscription) -> DispatchResult<()> {
        let _ = (ctx, sub);
        Ok(())
    }

    /// Teardown hook, invoked exactly once per subscription, triggered by
    /// explicit unsubscribe or by client disconnect, never both.
    async fn unsubscribe(&self, sub: &Subscription) -> DispatchResult<()> {
        let _ = sub;
        Ok(())
    }
}

/// A live subscription stream for one `(connection, service)` pair.
#[derive(Clone)]
pub struct Subscription {
    sid: String,
    connection: ConnectionId,
    path: String,
    sink: ResponseSink,
}

impl Subscription {
    /// The server-generated subscription id.
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// The connection this subscription is bound to.
    pub fn connection(&self) -> &ConnectionId {
        &self.connection
    }

    /// The concrete path the subscription was opened against.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Queues one event on the subscription stream.
    ///
    /// Returns `false` after teardown or disconnect; the event is dropped.
    pub fn publish(&self, event: Value) -> bool {
        self.sink.send(event)
    }

    /// The stream the subscription's events flow through.
    pub fn sink(&self) -> &ResponseSink {
        &self.sink
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("sid", &self.sid)
            .field("connection", &self.connection)
            .field("path", &self.path)
            .finish()
    }
}

struct SubscriptionEntry {
    subscription: Subscription,
    service: ServiceRef,
}

/// Connection-scoped subscription state.
///
/// Keyed connection → sid → entry. Removal under the lock is the
/// linearization point: whichever caller removes an entry owns its teardown.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<HashMap<ConnectionId, HashMap<String, SubscriptionEntry>>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new subscription and returns its handle.
    pub fn open(
        &self,
        connection: &ConnectionId,
        path: &str,
        service: ServiceRef,
        sink: ResponseSink,
    ) -> Subscription {
        let subscription = Subscription {
            sid: Uuid::new_v4().to_string(),
            connection: connection.clone(),
            path: path.to_string(),
            sink,
        };
        self.inner
            .lock()
            .entry(connection.clone())
            .or_default()
            .insert(
                subscription.sid.clone(),
                SubscriptionEntry {
                    subscription: subscription.clone(),
                    service,
                },
            );
        subscription
    }

    /// Removes one subscription, by sid when given, else by path.
    ///
    /// The caller owns the returned entry's teardown.
    pub fn close(
        &self,
        connection: &ConnectionId,
        sid: Option<&str>,
        path: &str,
    ) -> Option<(Subscription, ServiceRef)> {
        let mut inner = self.inner.lock();
        let subs = inner.get_mut(connection)?;
        let sid = match sid {
            Some(sid) => sid.to_string(),
            None => {
                subs.values()
                    .find(|entry| entry.subscription.path == path)?
                    .subscription
                    .sid
                    .clone()
            }
        };
        let entry = subs.remove(&sid)?;
        if subs.is_empty() {
            inner.remove(connection);
        }
        Some((entry.subscription, entry.service))
    }

    /// Removes every subscription bound to a connection.
    fn disconnect(&self, connection: &ConnectionId) -> Vec<(Subscription, ServiceRef)> {
        self.inner
            .lock()
            .remove(connection)
            .map(|subs| {
                subs.into_values()
                    .map(|entry| (entry.subscription, entry.service))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tears down every subscription bound to a connection, invoking each
    /// teardown hook exactly once, and returns how many were torn down.
    pub async fn teardown_connection(&self, connection: &ConnectionId) -> usize {
        let entries = self.disconnect(connection);
        let count = entries.len();
        for (subscription, service) in entries {
            if let Err(err) = service.unsubscribe(&subscription).await {
                error!(
                    sid = %subscription.sid(),
                    path = %subscription.path(),
                    error = %err,
                    "subscription teardown failed"
                );
            }
            subscription.sink().close();
        }
        count
    }

    /// Number of live subscriptions for a connection.
    pub fn active(&self, connection: &ConnectionId) -> usize {
        self.inner
            .lock()
            .get(connection)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::response_channel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        torn_down: AtomicUsize,
    }

    impl Counting {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                torn_down: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Service for Counting {
        async fn unsubscribe(&self, _sub: &Subscription) -> DispatchResult<()> {
            self.torn_down.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn close_by_path_when_sid_is_absent() {
        let registry = SubscriptionRegistry::new();
        let conn = ConnectionId::from("c1");
        let service = Counting::new();
        let (sink, _stream) = response_channel();
        let sub = registry.open(&conn, "/clock", service.clone(), sink);

        let (closed, _) = registry.close(&conn, None, "/clock").expect("entry");
        assert_eq!(closed.sid(), sub.sid());
        assert_eq!(registry.active(&conn), 0);
    }

    #[tokio::test]
    async fn close_is_exactly_once() {
        let registry = SubscriptionRegistry::new();
        let conn = ConnectionId::from("c1");
        let service = Counting::new();
        let (sink, _stream) = response_channel();
        let sub = registry.open(&conn, "/clock", service.clone(), sink);

        assert!(registry.close(&conn, Some(sub.sid()), "/clock").is_some());
        assert!(registry.close(&conn, Some(sub.sid()), "/clock").is_none());
        // a later disconnect finds nothing to tear down
        assert_eq!(registry.teardown_connection(&conn).await, 0);
        assert_eq!(service.torn_down.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disconnect_tears_down_every_subscription_once() {
        let registry = SubscriptionRegistry::new();
        let conn = ConnectionId::from("c1");
        let service = Counting::new();
        for path in ["/a", "/b", "/c"] {
            let (sink, _stream) = response_channel();
            registry.open(&conn, path, service.clone(), sink);
        }
        assert_eq!(registry.active(&conn), 3);

        assert_eq!(registry.teardown_connection(&conn).await, 3);
        assert_eq!(service.torn_down.load(Ordering::SeqCst), 3);
        assert_eq!(registry.teardown_connection(&conn).await, 0);
        assert_eq!(service.torn_down.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn publish_after_teardown_is_a_noop() {
        let registry = SubscriptionRegistry::new();
        let conn = ConnectionId::from("c1");
        let service = Counting::new();
        let (sink, mut stream) = response_channel();
        let sub = registry.open(&conn, "/clock", service, sink);

        assert!(sub.publish(serde_json::json!({ "t": 1 })));
        registry.teardown_connection(&conn).await;
        assert!(!sub.publish(serde_json::json!({ "t": 2 })));
        assert_eq!(stream.next().await, Some(serde_json::json!({ "t": 1 })));
        assert_eq!(stream.next().await, None);
    }
}
