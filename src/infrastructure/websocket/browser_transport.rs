use std::pin::Pin;
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::future::{self, FutureExt};
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, StreamExt, pin_mut, select};
use gloo_net::websocket::futures::WebSocket;
use gloo_net::websocket::{Message, WebSocketError};
use gloo_timers::callback::Timeout;
use wasm_bindgen_futures::spawn_local;

use super::feed_connection::{ABNORMAL_CLOSURE, FeedConnection, NORMAL_CLOSURE};
use super::transport::{Connector, PendingTimer, ReconnectTimer, Socket, TransportEvents};
use crate::config::FeedConfig;
use crate::domain::errors::TransportError;
use crate::domain::logging::LogComponent;
use crate::{log_debug, log_trace};

const COMPONENT: LogComponent = LogComponent::Infrastructure("BrowserSocket");

/// Opens gloo websockets; each one is driven by its own local task.
pub struct BrowserConnector;

enum Command {
    Text(String),
    Close { code: u16, reason: String },
}

/// Handle to a socket task. Dropping it closes the socket.
struct GlooSocket {
    commands: UnboundedSender<Command>,
}

impl Connector for BrowserConnector {
    fn open(&self, url: &str, events: TransportEvents) -> Result<Box<dyn Socket>, TransportError> {
        let ws = WebSocket::open(url).map_err(|e| TransportError::Open(e.to_string()))?;
        let (commands, inbox) = mpsc::unbounded();
        spawn_local(drive(ws, inbox, events));
        Ok(Box::new(GlooSocket { commands }))
    }
}

impl Socket for GlooSocket {
    fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.commands
            .unbounded_send(Command::Text(text.to_string()))
            .map_err(|_| TransportError::Send("socket task has ended".to_string()))
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.commands.unbounded_send(Command::Close { code, reason: reason.to_string() });
    }
}

enum Step {
    Ready(Result<(), WebSocketError>),
    Frame(Option<Result<Message, WebSocketError>>),
    Command(Option<Command>),
}

/// Pump one socket: report readiness and inbound frames to `events`, and
/// carry out sends and the close requested through `inbox`.
async fn drive(ws: WebSocket, mut inbox: UnboundedReceiver<Command>, events: TransportEvents) {
    let (mut sink, mut stream) = ws.split();
    let mut open = false;
    loop {
        let step = {
            // The sink only becomes ready once the handshake completes.
            let ready = async {
                if open {
                    future::pending().await
                } else {
                    future::poll_fn(|cx| Pin::new(&mut sink).poll_ready(cx)).await
                }
            }
            .fuse();
            pin_mut!(ready);
            select! {
                result = ready => Step::Ready(result),
                frame = stream.next().fuse() => Step::Frame(frame),
                command = inbox.next() => Step::Command(command),
            }
        };

        match step {
            Step::Ready(Ok(())) => {
                open = true;
                events.opened();
            }
            Step::Ready(Err(e)) => {
                events.closed(ABNORMAL_CLOSURE, e.to_string());
                return;
            }
            Step::Frame(Some(Ok(Message::Text(text)))) => events.message(text),
            Step::Frame(Some(Ok(Message::Bytes(bytes)))) => {
                log_debug!(COMPONENT, "ignored {} byte binary frame", bytes.len());
            }
            Step::Frame(Some(Err(WebSocketError::ConnectionClose(close)))) => {
                events.closed(close.code, close.reason);
                return;
            }
            Step::Frame(Some(Err(e))) => events.error(e.to_string()),
            Step::Frame(None) => {
                events.closed(ABNORMAL_CLOSURE, "stream ended");
                return;
            }
            Step::Command(Some(Command::Text(text))) => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    events.error(e.to_string());
                }
            }
            Step::Command(Some(Command::Close { code, reason })) => {
                close(sink, stream, code, &reason);
                return;
            }
            Step::Command(None) => {
                close(sink, stream, NORMAL_CLOSURE, "dropped");
                return;
            }
        }
    }
}

fn close(
    sink: SplitSink<WebSocket, Message>,
    stream: SplitStream<WebSocket>,
    code: u16,
    reason: &str,
) {
    // The connection stops listening to this socket once it asks for a close.
    match sink.reunite(stream) {
        Ok(ws) => {
            if let Err(e) = ws.close(Some(code), Some(reason)) {
                log_debug!(COMPONENT, "close failed: {}", e);
            }
        }
        Err(_) => {
            log_trace!(COMPONENT, "socket halves did not match");
        }
    }
}

/// Reconnect timer backed by `setTimeout`.
pub struct GlooTimer;

struct PendingTimeout(Timeout);

impl ReconnectTimer for GlooTimer {
    fn schedule(&self, delay: Duration, on_fire: Box<dyn FnOnce()>) -> Box<dyn PendingTimer> {
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        Box::new(PendingTimeout(Timeout::new(millis, on_fire)))
    }
}

impl PendingTimer for PendingTimeout {
    fn cancel(self: Box<Self>) {
        self.0.cancel();
    }
}

impl FeedConnection {
    /// Connection backed by gloo websockets and timers.
    pub fn browser(config: FeedConfig) -> Self {
        FeedConnection::new(config, BrowserConnector, GlooTimer)
    }
}
