//! Route records and the handler shapes that can be registered.
//!
//! A handler is one of three things, fixed at registration time: a plain
//! middleware function, a [`Service`], or a nested [`Dispatcher`]. The
//! dispatch engine switches on the tag; nothing is duck-typed at call time.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use junction_core::{Context, DispatchResult, ServiceRef};

use crate::dispatcher::{Dispatcher, Next};
use crate::pattern::{CompiledMatcher, PathPattern};

/// The boxed shape every middleware function is erased to.
pub type HandlerFn =
    dyn Fn(Arc<Context>, Next) -> BoxFuture<'static, DispatchResult<()>> + Send + Sync;

/// A registered handler, tagged by shape.
#[derive(Clone)]
pub enum Handler {
    /// A middleware function invoked with `(ctx, next)`.
    Func(Arc<HandlerFn>),
    /// A service demultiplexing call / subscribe / unsubscribe.
    Service(ServiceRef),
    /// A nested dispatcher; the route matches a prefix and descends.
    Nested(Arc<Dispatcher>),
}

impl Handler {
    pub(crate) fn is_terminal(&self) -> bool {
        !matches!(self, Self::Nested(_))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Func(_) => "handler",
            Self::Service(_) => "service",
            Self::Nested(_) => "dispatcher",
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Conversion of the accepted handler shapes into [`Handler`].
pub trait IntoHandler {
    /// Performs the conversion.
    fn into_handler(self) -> Handler;
}

impl<F, Fut> IntoHandler for F
where
    F: Fn(Arc<Context>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult<()>> + Send + 'static,
{
    fn into_handler(self) -> Handler {
        Handler::Func(Arc::new(move |ctx, next| self(ctx, next).boxed()))
    }
}

impl IntoHandler for Dispatcher {
    fn into_handler(self) -> Handler {
        Handler::Nested(Arc::new(self))
    }
}

impl IntoHandler for Arc<Dispatcher> {
    fn into_handler(self) -> Handler {
        Handler::Nested(self)
    }
}

impl IntoHandler for ServiceRef {
    fn into_handler(self) -> Handler {
        Handler::Service(self)
    }
}

impl IntoHandler for Handler {
    fn into_handler(self) -> Handler {
        self
    }
}

/// One entry in a dispatcher's ordered route table.
pub struct Route {
    pattern: String,
    prefix: Option<String>,
    matcher: CompiledMatcher,
    handler: Handler,
}

impl Route {
    pub(crate) fn new(pattern: PathPattern, handler: Handler) -> DispatchResult<Self> {
        let terminal = handler.is_terminal();
        let matcher = CompiledMatcher::compile(&pattern, terminal)?;
        let display = pattern.to_string();
        let prefix = (!terminal).then(|| display.clone());
        Ok(Self {
            pattern: display,
            prefix,
            matcher,
            handler,
        })
    }

    /// The pattern this route was registered under, in display form.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The literal mount prefix; `Some` iff the handler is a nested
    /// dispatcher.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The compiled matcher for this route.
    pub fn matcher(&self) -> &CompiledMatcher {
        &self.matcher
    }

    /// The registered handler.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("handler", &self.handler)
            .finish()
    }
}
