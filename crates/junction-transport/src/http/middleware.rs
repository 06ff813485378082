//! HTTP middleware adapter.
//!
//! Adapts one HTTP exchange onto the dispatcher: the request path is
//! dispatched as a `call`, a `PUT`/`POST` body becomes the payload, and the
//! context's status and drained response become the HTTP reply. `HEAD`
//! requests and WebSocket upgrades bypass dispatch entirely, and a
//! `NOT_FOUND` outcome falls through to the next middleware so the host
//! application keeps its own fallbacks.

use std::sync::Arc;

use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::{debug, warn};

use junction_core::{Context, DispatchError, RequestKind};
use junction_framework::Dispatcher;

/// Largest request body the adapter will buffer.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// State for [`dispatch`].
#[derive(Clone)]
pub struct HttpState {
    dispatcher: Arc<Dispatcher>,
}

impl HttpState {
    /// Wraps a dispatcher for use as HTTP middleware state.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

/// Layers the dispatch middleware onto an axum router.
pub fn attach(router: axum::Router, dispatcher: Arc<Dispatcher>) -> axum::Router {
    router.layer(axum::middleware::from_fn_with_state(
        HttpState::new(dispatcher),
        dispatch,
    ))
}

/// The middleware function: dispatch first, fall through on `NOT_FOUND`.
pub async fn dispatch(State(state): State<HttpState>, request: Request, next: Next) -> Response {
    // HEAD goes straight to the next middleware
    if request.method() == Method::HEAD {
        return next.run(request).await;
    }
    // so do upgrade handshakes; those belong to the WebSocket endpoint
    if request.headers().contains_key(header::UPGRADE) {
        return next.run(request).await;
    }

    let with_body =
        request.method() == Method::PUT || request.method() == Method::POST;
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to buffer request body");
            return (StatusCode::BAD_REQUEST, "failed to read request body").into_response();
        }
    };

    let data = if with_body && !bytes.is_empty() {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "request body is not valid JSON");
                return (StatusCode::BAD_REQUEST, "request body is not valid JSON")
                    .into_response();
            }
        }
    } else {
        json!({})
    };

    let path = parts.uri.path().to_string();
    let (ctx, stream) = Context::builder(RequestKind::Call).data(data).build();

    match state.dispatcher.call(&path, ctx).await {
        Ok(ctx) => {
            let body = stream.drain().into_iter().next().unwrap_or(Value::Null);
            let status =
                StatusCode::from_u16(ctx.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(body)).into_response()
        }
        Err(DispatchError::NotFound) => {
            debug!(path = %path, "no route matched, falling through");
            let request = Request::from_parts(parts, Body::from(bytes));
            next.run(request).await
        }
        Err(err) => {
            let status =
                StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, err.to_string()).into_response()
        }
    }
}
