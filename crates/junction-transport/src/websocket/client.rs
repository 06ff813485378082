//! WebSocket RPC client.
//!
//! The client correlates responses to requests through a guarded pending
//! table keyed by request id. Calls resolve on their single response frame;
//! subscriptions hand back an event stream that ends when the server sends
//! the unsubscribe close message. The client does not reconnect: in-flight
//! requests on a dropped connection fail with `ConnectionClosed`.

use std::collections::HashMap;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{ACCEPT_LANGUAGE, USER_AGENT};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use junction_core::{Request, RequestKind, ResponseFrame};

use crate::codec::{WireEncoding, WireFrame};
use crate::error::{TransportError, TransportResult};
use crate::user_agent;

/// Connection options for [`RpcClient::connect`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Leading `name/version` User-Agent tokens identifying the
    /// application.
    pub app_tokens: Vec<String>,
    /// Negotiated locale, sent as `Accept-Language` when present.
    pub locale: Option<String>,
    /// Use MessagePack binary frames instead of JSON text frames.
    pub binary: bool,
}

enum Pending {
    Call(oneshot::Sender<ResponseFrame>),
    Stream(mpsc::UnboundedSender<ResponseFrame>),
}

type PendingTable = Arc<Mutex<HashMap<String, Pending>>>;

/// A connected RPC client.
pub struct RpcClient {
    out_tx: mpsc::UnboundedSender<WireFrame>,
    pending: PendingTable,
    encoding: WireEncoding,
    shutdown: CancellationToken,
}

impl RpcClient {
    /// Connects to a junction daemon, e.g. `ws://127.0.0.1:1732`.
    pub async fn connect(url: &str, config: ClientConfig) -> TransportResult<Self> {
        let mut request =
            url.into_client_request()
                .map_err(|err| TransportError::ConnectionFailed {
                    url: url.to_string(),
                    reason: err.to_string(),
                })?;

        let ua = user_agent::build(&config.app_tokens);
        request.headers_mut().insert(
            USER_AGENT,
            HeaderValue::from_str(&ua)
                .map_err(|err| TransportError::Protocol(err.to_string()))?,
        );
        if let Some(locale) = &config.locale {
            request.headers_mut().insert(
                ACCEPT_LANGUAGE,
                HeaderValue::from_str(locale)
                    .map_err(|err| TransportError::Protocol(err.to_string()))?,
            );
        }

        info!(url = %url, "connecting");
        let (stream, _response) =
            connect_async(request)
                .await
                .map_err(|err| TransportError::ConnectionFailed {
                    url: url.to_string(),
                    reason: err.to_string(),
                })?;
        let (mut ws_tx, mut ws_rx) = stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WireFrame>();
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        // write loop
        let write_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = write_shutdown.cancelled() => break,
                    frame = out_rx.recv() => frame,
                };
                let Some(frame) = frame else { break };
                let message = match frame {
                    WireFrame::Text(text) => Message::text(text),
                    WireFrame::Binary(bytes) => Message::binary(bytes),
                };
                if ws_tx.send(message).await.is_err() {
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        // read loop
        let read_pending = Arc::clone(&pending);
        let read_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                let inbound = tokio::select! {
                    _ = read_shutdown.cancelled() => break,
                    inbound = ws_rx.next() => inbound,
                };
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        route_frame(&read_pending, WireEncoding::Json, text.as_bytes());
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        route_frame(&read_pending, WireEncoding::MsgPack, &bytes);
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        trace!("keepalive frame");
                    }
                    Some(Ok(Message::Close(_))) | Some(Ok(Message::Frame(_))) | None => {
                        debug!("server closed the connection");
                        break;
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "socket error");
                        break;
                    }
                }
            }
            // fail everything still in flight
            read_pending.lock().clear();
            read_shutdown.cancel();
        });

        Ok(Self {
            out_tx,
            pending,
            encoding: if config.binary {
                WireEncoding::MsgPack
            } else {
                WireEncoding::Json
            },
            shutdown,
        })
    }

    /// Performs a one-shot call and returns its response frame.
    pub async fn call(&self, path: &str, data: Value) -> TransportResult<ResponseFrame> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), Pending::Call(tx));

        let request = Request::new(&id, path, RequestKind::Call).with_data(data);
        if let Err(err) = self.send(&request) {
            self.pending.lock().remove(&id);
            return Err(err);
        }

        rx.await
            .map_err(|_| TransportError::ConnectionClosed("connection closed before reply".into()))
    }

    /// Opens a subscription stream.
    ///
    /// Resolves once the acknowledgment arrives; the returned handle yields
    /// each published event until the server closes the stream.
    pub async fn subscribe(&self, path: &str, data: Value) -> TransportResult<ClientSubscription> {
        let id = Uuid::new_v4().to_string();
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.pending.lock().insert(id.clone(), Pending::Stream(tx));

        let request = Request::new(&id, path, RequestKind::Subscribe).with_data(data);
        if let Err(err) = self.send(&request) {
            self.pending.lock().remove(&id);
            return Err(err);
        }

        let ack = rx.recv().await.ok_or_else(|| {
            TransportError::ConnectionClosed("connection closed before subscribe ack".into())
        })?;
        if !ack.is_success() {
            self.pending.lock().remove(&id);
            return Err(TransportError::Protocol(format!(
                "subscribe rejected: {}",
                ack.message
            )));
        }
        let sid = ack
            .message
            .get("sid")
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::Protocol("subscribe ack missing sid".into()))?
            .to_string();

        debug!(path = %path, sid = %sid, "subscription opened");
        Ok(ClientSubscription {
            sid,
            path: path.to_string(),
            events: rx,
        })
    }

    /// Tears down a subscription by sid.
    pub async fn unsubscribe(&self, path: &str, sid: &str) -> TransportResult<ResponseFrame> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), Pending::Call(tx));

        let request = Request::new(&id, path, RequestKind::Unsubscribe)
            .with_data(serde_json::json!({ "sid": sid }));
        if let Err(err) = self.send(&request) {
            self.pending.lock().remove(&id);
            return Err(err);
        }

        rx.await
            .map_err(|_| TransportError::ConnectionClosed("connection closed before reply".into()))
    }

    /// Closes the connection; in-flight requests fail.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    fn send(&self, request: &Request) -> TransportResult<()> {
        let frame = self.encoding.encode_request(request)?;
        self.out_tx
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed("connection is closed".into()))
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Routes one inbound frame to its pending request.
fn route_frame(pending: &PendingTable, encoding: WireEncoding, bytes: &[u8]) {
    let frame = match encoding.decode_frame(bytes) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, "dropping undecodable frame");
            return;
        }
    };

    let mut table = pending.lock();
    match table.remove(&frame.id) {
        Some(Pending::Call(tx)) => {
            let _ = tx.send(frame);
        }
        Some(Pending::Stream(tx)) => {
            let closed = frame.message.get("type").and_then(Value::as_str)
                == Some("unsubscribe");
            let id = frame.id.clone();
            let _ = tx.send(frame);
            if !closed {
                // stream stays open for further events
                table.insert(id, Pending::Stream(tx));
            }
        }
        None => {
            trace!(id = %frame.id, "frame for unknown request id");
        }
    }
}

/// A live client-side subscription.
pub struct ClientSubscription {
    sid: String,
    path: String,
    events: mpsc::UnboundedReceiver<ResponseFrame>,
}

impl ClientSubscription {
    /// The server-generated subscription id.
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// The path the subscription was opened against.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Waits for the next published event; `None` once the server has
    /// closed the stream.
    pub async fn next_event(&mut self) -> Option<Value> {
        let frame = self.events.recv().await?;
        if frame.message.get("type").and_then(Value::as_str) == Some("unsubscribe") {
            return None;
        }
        Some(frame.message)
    }
}
