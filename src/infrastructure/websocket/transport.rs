//! Seams between [`FeedConnection`](super::FeedConnection) and the platform:
//! a connector that opens sockets and a single-shot timer for reconnects.
//! Platform callbacks only enqueue events; the connection handles them one at
//! a time from its inbox.

use std::time::Duration;

use futures::channel::mpsc::UnboundedSender;

use crate::domain::errors::TransportError;

/// Something the socket reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Closed { code: u16, reason: String },
    Error(String),
}

#[derive(Debug)]
pub(crate) enum FeedEvent {
    Transport { generation: u64, event: TransportEvent },
    ReconnectDue { token: u64 },
}

/// Handed to a connector for one socket. Events are tagged with the socket's
/// generation so the connection can ignore sockets it has replaced.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    tx: UnboundedSender<FeedEvent>,
}

impl TransportEvents {
    pub(crate) fn new(generation: u64, tx: UnboundedSender<FeedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn push(&self, event: TransportEvent) {
        // A closed inbox means the connection was shut down.
        let _ = self.tx.unbounded_send(FeedEvent::Transport { generation: self.generation, event });
    }

    pub fn opened(&self) {
        self.push(TransportEvent::Opened);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.push(TransportEvent::Message(text.into()));
    }

    pub fn closed(&self, code: u16, reason: impl Into<String>) {
        self.push(TransportEvent::Closed { code, reason: reason.into() });
    }

    pub fn error(&self, description: impl Into<String>) {
        self.push(TransportEvent::Error(description.into()));
    }
}

/// An open (or opening) socket.
pub trait Socket {
    fn send_text(&self, text: &str) -> Result<(), TransportError>;
    fn close(&self, code: u16, reason: &str);
}

/// Opens sockets. Returning `Err` is treated like an abnormal closure.
pub trait Connector {
    fn open(&self, url: &str, events: TransportEvents) -> Result<Box<dyn Socket>, TransportError>;
}

/// Single-shot timers for reconnect backoff.
pub trait ReconnectTimer {
    fn schedule(&self, delay: Duration, on_fire: Box<dyn FnOnce()>) -> Box<dyn PendingTimer>;
}

pub trait PendingTimer {
    fn cancel(self: Box<Self>);
}
