//! Delivery sink: the ordered outbound channel to one consumer
//!
//! Sessions never touch the transport. They see a [`LinkSink`], check
//! [`LinkSink::is_ready`] and push [`OutboundMessage`]s; the server owns the
//! socket on the other end.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::utils::TIMEOUT_MESSAGE;

/// Message pushed to a consumer
///
/// Serializes to `{"links": [...]}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Links { links: Vec<String> },
    Error { error: String },
}

impl OutboundMessage {
    #[must_use]
    pub fn links(links: Vec<String>) -> Self {
        Self::Links { links }
    }

    /// Notification sent when a session hits its maximum duration
    #[must_use]
    pub fn timed_out() -> Self {
        Self::Error {
            error: TIMEOUT_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("Consumer is not ready to receive")]
    NotReady,

    #[error("Consumer connection is closed")]
    Closed,
}

/// Ordered, connection-stateful outbound channel
///
/// `send` is fire-and-forget: success means the message was queued for the
/// consumer, not that it arrived.
pub trait LinkSink: Send + Sync {
    fn is_ready(&self) -> bool;

    fn send(&self, message: OutboundMessage) -> Result<(), SinkError>;
}

/// Sink backed by an unbounded channel drained by a socket writer task
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutboundMessage>,
    open: Arc<AtomicBool>,
}

impl ChannelSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            tx,
            open: Arc::new(AtomicBool::new(true)),
        };
        (sink, rx)
    }

    /// Mark the consumer as gone; every clone stops accepting messages
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

impl LinkSink for ChannelSink {
    fn is_ready(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    fn send(&self, message: OutboundMessage) -> Result<(), SinkError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(SinkError::NotReady);
        }
        self.tx.send(message).map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let links = serde_json::to_string(&OutboundMessage::links(vec!["a".into(), "b".into()]))
            .unwrap();
        assert_eq!(links, r#"{"links":["a","b"]}"#);

        let timeout = serde_json::to_string(&OutboundMessage::timed_out()).unwrap();
        assert_eq!(timeout, r#"{"error":"Operation timed out"}"#);
    }

    #[tokio::test]
    async fn test_send_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        assert!(sink.is_ready());

        sink.send(OutboundMessage::links(vec!["1".into()])).unwrap();
        sink.send(OutboundMessage::links(vec!["2".into()])).unwrap();

        assert_eq!(rx.recv().await, Some(OutboundMessage::links(vec!["1".into()])));
        assert_eq!(rx.recv().await, Some(OutboundMessage::links(vec!["2".into()])));
    }

    #[test]
    fn test_closed_sink_not_ready() {
        let (sink, rx) = ChannelSink::new();
        let clone = sink.clone();
        sink.close();
        assert!(!clone.is_ready());
        assert_eq!(
            clone.send(OutboundMessage::timed_out()),
            Err(SinkError::NotReady)
        );
        drop(rx);
    }

    #[test]
    fn test_dropped_receiver_not_ready() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        assert!(!sink.is_ready());
        assert_eq!(
            sink.send(OutboundMessage::links(vec![])),
            Err(SinkError::Closed)
        );
    }
}
