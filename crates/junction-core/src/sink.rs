//! The object-mode response queue attached to every [`Context`].
//!
//! The sink side is a cheap, cloneable multi-producer handle; the stream side
//! is the single consumer. Transport adapters drain the stream to the wire;
//! tests drain it to a buffer. Once the sink is closed, further writes are
//! dropped silently: after a client disconnect, handlers must not assume
//! delivery.
//!
//! [`Context`]: crate::context::Context

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

enum SinkItem {
    Message(Value),
    Closed,
}

/// Producer half of the response queue.
#[derive(Clone)]
pub struct ResponseSink {
    tx: mpsc::UnboundedSender<SinkItem>,
    closed: Arc<AtomicBool>,
}

impl ResponseSink {
    /// Queues one response message.
    ///
    /// Returns `false` when the sink was already closed or the consumer is
    /// gone; the message is dropped in that case.
    pub fn send(&self, message: Value) -> bool {
        if self.closed.load(Ordering::Acquire) {
            trace!("response sink closed, dropping message");
            return false;
        }
        self.tx.send(SinkItem::Message(message)).is_ok()
    }

    /// Closes the sink. Idempotent; the consumer observes end-of-stream.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(SinkItem::Closed);
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Consumer half of the response queue.
pub struct ResponseStream {
    rx: mpsc::UnboundedReceiver<SinkItem>,
    done: bool,
}

impl ResponseStream {
    /// Waits for the next queued message; `None` once the sink is closed and
    /// drained.
    pub async fn next(&mut self) -> Option<Value> {
        if self.done {
            return None;
        }
        match self.rx.recv().await {
            Some(SinkItem::Message(message)) => Some(message),
            Some(SinkItem::Closed) | None => {
                self.done = true;
                None
            }
        }
    }

    /// Takes the next already-queued message without waiting.
    pub fn try_next(&mut self) -> Option<Value> {
        if self.done {
            return None;
        }
        match self.rx.try_recv() {
            Ok(SinkItem::Message(message)) => Some(message),
            Ok(SinkItem::Closed) => {
                self.done = true;
                None
            }
            Err(_) => None,
        }
    }

    /// Drains every already-queued message into a buffer.
    pub fn drain(mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(message) = self.try_next() {
            out.push(message);
        }
        out
    }
}

/// Creates a connected sink/stream pair.
pub fn response_channel() -> (ResponseSink, ResponseStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ResponseSink {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        },
        ResponseStream { rx, done: false },
    )
}
