//! The path-routed dispatch engine.
//!
//! A [`Dispatcher`] holds an ordered route table. Dispatching walks the
//! table in registration order; the first route whose matcher accepts the
//! path wins. A matched middleware function receives the shared context and
//! a [`Next`] continuation that resumes the walk at the following route;
//! a matched nested dispatcher strips its prefix and recurses with the same
//! context; a matched service demultiplexes on the request kind.
//!
//! The route table is append-only: registration happens before the
//! dispatcher is shared, so dispatch reads need no lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{Instrument, Level, debug, error, span, trace, warn};

use junction_core::{Context, DispatchError, DispatchResult};

use crate::pattern::PatternSet;
use crate::route::{Handler, IntoHandler, Route};
use crate::service::{ServiceDescriptor, execute_service};

/// The path-routed request/response/subscription engine.
#[derive(Default)]
pub struct Dispatcher {
    routes: Vec<Route>,
}

impl Dispatcher {
    /// Creates a dispatcher with an empty route table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under one or more path patterns.
    ///
    /// Accepted handler shapes are middleware functions, [`ServiceRef`]s,
    /// and nested dispatchers; accepted pattern shapes are literal strings
    /// (with optional `:name` tokens), regular expressions, and collections
    /// of either. Registering the same pattern twice is permitted; the first
    /// registration wins at match time.
    ///
    /// [`ServiceRef`]: junction_core::ServiceRef
    pub fn register<P, H>(&mut self, patterns: P, handler: H) -> DispatchResult<&mut Self>
    where
        P: Into<PatternSet>,
        H: IntoHandler,
    {
        let handler = handler.into_handler();
        for pattern in patterns.into().into_patterns() {
            let route = Route::new(pattern, handler.clone())?;
            debug!(
                pattern = %route.pattern(),
                handler = route.handler().kind(),
                "route registered"
            );
            self.routes.push(route);
        }
        Ok(self)
    }

    /// Registers a service descriptor: the descriptor's own path is
    /// unwrapped and used as the pattern.
    pub fn register_service(&mut self, descriptor: ServiceDescriptor) -> DispatchResult<&mut Self> {
        let (path, service) = descriptor.into_parts();
        self.register(path, service)
    }

    /// The registered routes, in matching order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Dispatches a request path against the route table.
    ///
    /// The context is shared by reference through the whole chain; on
    /// success it is handed back with whatever the handlers wrote into it.
    /// Exhausting the table yields [`DispatchError::NotFound`]; handler
    /// failures surface their taxonomy status.
    pub async fn call(self: &Arc<Self>, path: &str, ctx: Arc<Context>) -> DispatchResult<Arc<Context>> {
        let span = span!(Level::DEBUG, "dispatch", path = %path, kind = ?ctx.kind());
        ctx.set_path(path);
        let result = Arc::clone(self)
            .dispatch_from(0, Arc::clone(&ctx))
            .instrument(span)
            .await;
        match result {
            Ok(()) => Ok(ctx),
            Err(err) => {
                error!(path = %path, code = err.code(), error = %err, "dispatch failed");
                Err(err)
            }
        }
    }

    fn dispatch_from(
        self: Arc<Self>,
        index: usize,
        ctx: Arc<Context>,
    ) -> BoxFuture<'static, DispatchResult<()>> {
        async move {
            for i in index..self.routes.len() {
                let route = &self.routes[i];
                let path = ctx.path();
                let Some(hit) = route.matcher().matches(&path) else {
                    trace!(pattern = %route.pattern(), path = %path, "route miss");
                    continue;
                };
                debug!(
                    pattern = %route.pattern(),
                    path = %path,
                    params = ?hit.params,
                    "route matched"
                );
                ctx.set_params(hit.params);
                match route.handler() {
                    Handler::Nested(child) => {
                        let tail = &path[hit.matched_len..];
                        let tail = if tail.starts_with('/') {
                            tail.to_string()
                        } else {
                            format!("/{tail}")
                        };
                        trace!(prefix = ?route.prefix(), tail = %tail, "descending into mounted dispatcher");
                        ctx.set_path(&tail);
                        return Arc::clone(child).dispatch_from(0, ctx).await;
                    }
                    Handler::Service(service) => {
                        return execute_service(Arc::clone(service), &ctx).await;
                    }
                    Handler::Func(handler) => {
                        let next = Next::new(Arc::clone(&self), i + 1, Arc::clone(&ctx));
                        return (handler.as_ref())(Arc::clone(&ctx), next).await;
                    }
                }
            }
            trace!("route table exhausted");
            Err(DispatchError::NotFound)
        }
        .boxed()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes)
            .finish()
    }
}

/// The one-shot continuation handed to middleware functions.
///
/// Invoking it resumes the route walk at the next entry; the downstream
/// chain's outcome becomes the dispatch outcome. A second invocation is a
/// logged no-op.
pub struct Next {
    dispatcher: Arc<Dispatcher>,
    index: usize,
    ctx: Arc<Context>,
    used: AtomicBool,
}

impl Next {
    fn new(dispatcher: Arc<Dispatcher>, index: usize, ctx: Arc<Context>) -> Self {
        Self {
            dispatcher,
            index,
            ctx,
            used: AtomicBool::new(false),
        }
    }

    /// Yields control to the rest of the route chain.
    pub async fn invoke(&self) -> DispatchResult<()> {
        if self.used.swap(true, Ordering::AcqRel) {
            warn!(index = self.index, "next invoked more than once, ignoring");
            return Ok(());
        }
        trace!(index = self.index, "continuing route chain");
        Arc::clone(&self.dispatcher)
            .dispatch_from(self.index, Arc::clone(&self.ctx))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_core::RequestKind;
    use serde_json::{Value, json};
    use std::sync::atomic::AtomicUsize;

    fn call_ctx() -> (Arc<Context>, junction_core::ResponseStream) {
        Context::builder(RequestKind::Call).build()
    }

    #[tokio::test]
    async fn literal_route_writes_its_response() {
        let mut d = Dispatcher::new();
        d.register("/status", |ctx: Arc<Context>, _next: Next| async move {
            ctx.response().send(json!({ "ok": true }));
            Ok(())
        })
        .unwrap();
        let d = Arc::new(d);

        let (ctx, stream) = call_ctx();
        let ctx = d.call("/status", ctx).await.unwrap();
        assert_eq!(ctx.status(), 200);
        assert_eq!(stream.drain(), vec![json!({ "ok": true })]);
    }

    #[tokio::test]
    async fn parameterized_route_extracts_params() {
        let mut d = Dispatcher::new();
        d.register("/echo/:v", |ctx: Arc<Context>, _next: Next| async move {
            let v = ctx.param("v").unwrap_or_default();
            ctx.response().send(Value::String(v));
            Ok(())
        })
        .unwrap();
        let d = Arc::new(d);

        let (ctx, stream) = call_ctx();
        d.call("/echo/hello", ctx).await.unwrap();
        assert_eq!(stream.drain(), vec![json!("hello")]);
    }

    #[tokio::test]
    async fn params_from_losing_routes_are_cleared() {
        let mut d = Dispatcher::new();
        // matches first and forwards, leaving `wrong` behind in params
        d.register("/x/:wrong", |ctx: Arc<Context>, next: Next| async move {
            assert_eq!(ctx.param("wrong").as_deref(), Some("y"));
            next.invoke().await
        })
        .unwrap();
        d.register("/:a/:b", |ctx: Arc<Context>, _next: Next| async move {
            ctx.response().send(json!(ctx.params().unwrap()));
            Ok(())
        })
        .unwrap();
        let d = Arc::new(d);

        let (ctx, stream) = call_ctx();
        d.call("/x/y", ctx.clone()).await.unwrap();
        let params = stream.drain().pop().unwrap();
        // repopulated exactly, not merged
        assert_eq!(params, json!({ "a": "x", "b": "y" }));
        assert!(ctx.param("wrong").is_none());
    }

    #[tokio::test]
    async fn nested_dispatch_is_equivalent_to_direct_dispatch() {
        let mut inner = Dispatcher::new();
        inner
            .register("/time", |ctx: Arc<Context>, _next: Next| async move {
                ctx.response().send(json!("T"));
                ctx.set_status(201);
                Ok(())
            })
            .unwrap();
        let inner = Arc::new(inner);

        let mut outer = Dispatcher::new();
        outer.register("/svc", Arc::clone(&inner)).unwrap();
        let outer = Arc::new(outer);

        let (ctx, stream) = call_ctx();
        let ctx = outer.call("/svc/time", ctx).await.unwrap();
        assert_eq!(stream.drain(), vec![json!("T")]);
        // mutations applied through the nested dispatcher survive on the
        // same shared context
        assert_eq!(ctx.status(), 201);
        assert_eq!(ctx.path(), "/time");

        let (ctx, stream) = call_ctx();
        let ctx = inner.call("/time", ctx).await.unwrap();
        assert_eq!(stream.drain(), vec![json!("T")]);
        assert_eq!(ctx.status(), 201);
    }

    #[tokio::test]
    async fn empty_table_rejects_with_not_found() {
        let d = Arc::new(Dispatcher::new());
        let (ctx, stream) = call_ctx();
        let err = d.call("/nope", ctx).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
        assert_eq!(err.status(), 404);
        assert!(stream.drain().is_empty());
    }

    #[tokio::test]
    async fn next_resumes_at_the_following_route() {
        let mut d = Dispatcher::new();
        d.register("/a", |_ctx: Arc<Context>, next: Next| async move {
            next.invoke().await
        })
        .unwrap();
        d.register("/a", |ctx: Arc<Context>, _next: Next| async move {
            ctx.response().send(json!("ok"));
            Ok(())
        })
        .unwrap();
        let d = Arc::new(d);

        let (ctx, stream) = call_ctx();
        let ctx = d.call("/a", ctx).await.unwrap();
        assert_eq!(ctx.status(), 200);
        assert_eq!(stream.drain(), vec![json!("ok")]);
    }

    #[tokio::test]
    async fn second_next_invocation_is_a_noop() {
        let downstream_runs = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&downstream_runs);

        let mut d = Dispatcher::new();
        d.register("/a", |_ctx: Arc<Context>, next: Next| async move {
            next.invoke().await?;
            next.invoke().await
        })
        .unwrap();
        d.register("/a", move |_ctx: Arc<Context>, _next: Next| {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();
        let d = Arc::new(d);

        let (ctx, _stream) = call_ctx();
        d.call("/a", ctx).await.unwrap();
        assert_eq!(downstream_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_matching_route_wins_in_registration_order() {
        let mut d = Dispatcher::new();
        d.register("/dup", |ctx: Arc<Context>, _next: Next| async move {
            ctx.response().send(json!("first"));
            Ok(())
        })
        .unwrap();
        d.register("/dup", |ctx: Arc<Context>, _next: Next| async move {
            ctx.response().send(json!("second"));
            Ok(())
        })
        .unwrap();
        let d = Arc::new(d);

        let (ctx, stream) = call_ctx();
        d.call("/dup", ctx).await.unwrap();
        assert_eq!(stream.drain(), vec![json!("first")]);
    }

    #[tokio::test]
    async fn handler_errors_surface_their_taxonomy() {
        let mut d = Dispatcher::new();
        d.register("/boom", |_ctx: Arc<Context>, _next: Next| async move {
            Err(DispatchError::server("kaboom"))
        })
        .unwrap();
        d.register("/teapot", |_ctx: Arc<Context>, _next: Next| async move {
            Err(DispatchError::custom(418, "TEAPOT", "short and stout"))
        })
        .unwrap();
        let d = Arc::new(d);

        let (ctx, _stream) = call_ctx();
        let err = d.call("/boom", ctx).await.unwrap_err();
        assert_eq!(err.status(), 500);
        assert_eq!(err.code(), "SERVER_ERROR");

        let (ctx, _stream) = call_ctx();
        let err = d.call("/teapot", ctx).await.unwrap_err();
        assert_eq!(err.status(), 418);
        assert_eq!(err.code(), "TEAPOT");
    }

    #[tokio::test]
    async fn array_patterns_share_one_handler() {
        let mut d = Dispatcher::new();
        d.register(["/ping", "/health"], |ctx: Arc<Context>, _next: Next| async move {
            ctx.response().send(json!("pong"));
            Ok(())
        })
        .unwrap();
        let d = Arc::new(d);

        for path in ["/ping", "/health"] {
            let (ctx, stream) = call_ctx();
            d.call(path, ctx).await.unwrap();
            assert_eq!(stream.drain(), vec![json!("pong")]);
        }
    }

    #[tokio::test]
    async fn mount_at_root_passes_the_full_path_through() {
        let mut inner = Dispatcher::new();
        inner
            .register("/deep/:name", |ctx: Arc<Context>, _next: Next| async move {
                ctx.response().send(json!(ctx.param("name").unwrap()));
                Ok(())
            })
            .unwrap();

        let mut outer = Dispatcher::new();
        outer.register("/", inner).unwrap();
        let outer = Arc::new(outer);

        let (ctx, stream) = call_ctx();
        outer.call("/deep/value", ctx).await.unwrap();
        assert_eq!(stream.drain(), vec![json!("value")]);
    }

    #[tokio::test]
    async fn exhausted_chain_after_next_is_not_found() {
        let mut d = Dispatcher::new();
        d.register("/only", |_ctx: Arc<Context>, next: Next| async move {
            next.invoke().await
        })
        .unwrap();
        let d = Arc::new(d);

        let (ctx, _stream) = call_ctx();
        let err = d.call("/only", ctx).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
    }
}
