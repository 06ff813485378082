//! WebSocket RPC server adapter.
//!
//! Each accepted connection gets an identity, a write pump, and a
//! cancellation token. Inbound frames are decoded per their frame type
//! (text ⇒ JSON, binary ⇒ MessagePack), dispatched on their own task, and
//! answered in the encoding they arrived in. Closing the connection cancels
//! in-flight dispatches and tears down every subscription the connection
//! owns, exactly once.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use junction_core::{
    ConnectionId, Context, PROTOCOL_VERSION, Request, RequestKind, ResponseFrame, ResponseStream,
    SubscriptionRegistry,
};
use junction_framework::Dispatcher;

use crate::codec::{WireEncoding, WireFrame};

/// The WebSocket RPC surface over one dispatcher.
#[derive(Clone)]
pub struct RpcServer {
    dispatcher: Arc<Dispatcher>,
    subscriptions: Arc<SubscriptionRegistry>,
}

impl RpcServer {
    /// Creates an RPC server over a dispatcher.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            subscriptions: Arc::new(SubscriptionRegistry::new()),
        }
    }

    /// The dispatcher requests are routed through.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The registry holding this server's live subscriptions.
    pub fn subscriptions(&self) -> &Arc<SubscriptionRegistry> {
        &self.subscriptions
    }

    /// Builds the axum router exposing the RPC endpoint at `/`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(ws_handler))
            .with_state(self.clone())
    }
}

async fn ws_handler(State(server): State<RpcServer>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, server))
}

/// Runs one connection until the client goes away.
async fn handle_socket(socket: WebSocket, server: RpcServer) {
    let connection = ConnectionId::new();
    info!(connection = %connection, "client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WireFrame>();
    let cancel = CancellationToken::new();

    // write pump: ends when every request task has dropped its sender
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let message = match frame {
                WireFrame::Text(text) => Message::Text(text.into()),
                WireFrame::Binary(bytes) => Message::Binary(bytes.into()),
            };
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(inbound) = ws_rx.next().await {
        match inbound {
            Ok(Message::Text(text)) => {
                handle_frame(&server, &connection, &out_tx, &cancel, text.as_bytes(), WireEncoding::Json);
            }
            Ok(Message::Binary(bytes)) => {
                handle_frame(&server, &connection, &out_tx, &cancel, &bytes, WireEncoding::MsgPack);
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                trace!(connection = %connection, "keepalive frame");
            }
            Ok(Message::Close(_)) => {
                debug!(connection = %connection, "client sent close");
                break;
            }
            Err(err) => {
                warn!(connection = %connection, error = %err, "socket error");
                break;
            }
        }
    }

    // cancel in-flight dispatches, then tear down this connection's
    // subscriptions exactly once
    cancel.cancel();
    drop(out_tx);
    let torn_down = server.subscriptions.teardown_connection(&connection).await;
    let _ = writer.await;
    info!(connection = %connection, subscriptions = torn_down, "client disconnected");
}

/// Decodes one inbound frame and spawns its dispatch.
///
/// Malformed frames are logged and dropped without a response; a version
/// mismatch is answered with `BAD_REQUEST` since the frame still carries a
/// usable correlation id.
fn handle_frame(
    server: &RpcServer,
    connection: &ConnectionId,
    out_tx: &mpsc::UnboundedSender<WireFrame>,
    cancel: &CancellationToken,
    bytes: &[u8],
    encoding: WireEncoding,
) {
    let request = match encoding.decode_request(bytes) {
        Ok(request) => request,
        Err(err) => {
            warn!(connection = %connection, error = %err, "dropping malformed frame");
            return;
        }
    };

    if request.version != PROTOCOL_VERSION {
        let err = junction_core::DispatchError::bad_request(format!(
            "unsupported protocol version {:?}",
            request.version
        ));
        send_frame(out_tx, encoding, &ResponseFrame::error(&request.id, &err));
        return;
    }

    let (ctx, stream) = Context::builder(request.kind)
        .data(request.data.clone().unwrap_or(Value::Null))
        .connection(connection.clone())
        .subscriptions(Arc::clone(&server.subscriptions))
        .build();

    let dispatcher = Arc::clone(&server.dispatcher);
    let out_tx = out_tx.clone();
    let cancel = cancel.clone();
    tokio::spawn(async move {
        run_request(dispatcher, request, encoding, ctx, stream, out_tx, cancel).await;
    });
}

async fn run_request(
    dispatcher: Arc<Dispatcher>,
    request: Request,
    encoding: WireEncoding,
    ctx: Arc<Context>,
    mut stream: ResponseStream,
    out_tx: mpsc::UnboundedSender<WireFrame>,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        _ = cancel.cancelled() => {
            ctx.response().close();
            trace!(id = %request.id, "dispatch cancelled by disconnect");
            return;
        }
        result = dispatcher.call(&request.path, Arc::clone(&ctx)) => result,
    };

    match result {
        Err(err) => {
            send_frame(&out_tx, encoding, &ResponseFrame::error(&request.id, &err));
        }
        Ok(ctx) => match request.kind {
            // one final frame carrying the status and whatever the handler
            // queued
            RequestKind::Call | RequestKind::Unsubscribe => {
                let body = stream.try_next().unwrap_or(Value::Null);
                send_frame(
                    &out_tx,
                    encoding,
                    &ResponseFrame::result(&request.id, ctx.status(), body),
                );
            }
            // the ack carries the status; events stream until teardown
            RequestKind::Subscribe => {
                let mut first = true;
                loop {
                    let message = tokio::select! {
                        _ = cancel.cancelled() => break,
                        message = stream.next() => message,
                    };
                    let Some(message) = message else { break };
                    let frame = if first {
                        first = false;
                        ResponseFrame::result(&request.id, ctx.status(), message)
                    } else {
                        ResponseFrame::event(&request.id, message)
                    };
                    send_frame(&out_tx, encoding, &frame);
                }
            }
        },
    }
}

fn send_frame(
    out_tx: &mpsc::UnboundedSender<WireFrame>,
    encoding: WireEncoding,
    frame: &ResponseFrame,
) {
    match encoding.encode_frame(frame) {
        // a send failure means the connection is gone; the frame is
        // discarded by contract
        Ok(encoded) => {
            let _ = out_tx.send(encoded);
        }
        Err(err) => {
            warn!(id = %frame.id, error = %err, "failed to encode response frame");
        }
    }
}
