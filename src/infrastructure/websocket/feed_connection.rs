//! The shared streaming connection to the dashboard backend.
//!
//! One `FeedConnection` is created at application start and handed to every
//! chart. It keeps exactly one socket alive, reconnects with capped
//! exponential backoff after abnormal closures and fans every parsed frame
//! out to its subscribers.

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use futures::StreamExt;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use serde::Serialize;
use strum::Display as StrumDisplay;

use super::dto::{FeedMessage, OutboundFrame, parse_frame};
use super::transport::{
    Connector, FeedEvent, PendingTimer, ReconnectTimer, Socket, TransportEvent, TransportEvents,
};
use crate::config::FeedConfig;
use crate::domain::errors::{SubscriberError, SubscriberResult, TransportError};
use crate::domain::logging::{LogComponent, LogLevel, Logger, get_logger};
use crate::{log_debug, log_error, log_info, log_trace, log_warn};

/// Close code for a deliberate shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code browsers report when a socket drops without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

const COMPONENT: LogComponent = LogComponent::Infrastructure("FeedConnection");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, StrumDisplay)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
    Reconnecting,
}

/// Snapshot of everything observable about the connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub attempts: u32,
    pub last_error: Option<TransportError>,
    /// Reconnects were given up; only a manual `connect()` recovers.
    pub exhausted: bool,
}

impl ConnectionStatus {
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

type MessageCallback = Rc<dyn Fn(&FeedMessage) -> SubscriberResult>;
type StatusCallback = Rc<dyn Fn(&ConnectionStatus)>;

struct Slot<F: ?Sized> {
    id: u64,
    active: Rc<Cell<bool>>,
    callback: Rc<F>,
}

impl<F: ?Sized> Clone for Slot<F> {
    fn clone(&self) -> Self {
        Self { id: self.id, active: self.active.clone(), callback: self.callback.clone() }
    }
}

#[derive(Default)]
struct ConnectionCore {
    state: ConnectionState,
    generation: u64,
    is_connecting: bool,
    should_stay_connected: bool,
    attempts: u32,
    socket: Option<Box<dyn Socket>>,
    pending_reconnect: Option<(u64, Box<dyn PendingTimer>)>,
    next_timer_token: u64,
    last_error: Option<TransportError>,
    exhausted: bool,
    last_message: Option<FeedMessage>,
}

impl ConnectionCore {
    fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            attempts: self.attempts,
            last_error: self.last_error.clone(),
            exhausted: self.exhausted,
        }
    }

    fn cancel_reconnect(&mut self) {
        if let Some((token, timer)) = self.pending_reconnect.take() {
            log_trace!(COMPONENT, "cancelled reconnect timer {}", token);
            timer.cancel();
        }
    }
}

struct Shared {
    config: FeedConfig,
    connector: Box<dyn Connector>,
    timer: Box<dyn ReconnectTimer>,
    core: RefCell<ConnectionCore>,
    subscribers: RefCell<Vec<Slot<dyn Fn(&FeedMessage) -> SubscriberResult>>>,
    status_listeners: RefCell<Vec<Slot<dyn Fn(&ConnectionStatus)>>>,
    published: RefCell<ConnectionStatus>,
    inbox: RefCell<Option<UnboundedReceiver<FeedEvent>>>,
    outbox: UnboundedSender<FeedEvent>,
    next_slot_id: Cell<u64>,
    leases: Cell<usize>,
}

/// Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct FeedConnection {
    shared: Rc<Shared>,
}

impl FeedConnection {
    pub fn new(
        config: FeedConfig,
        connector: impl Connector + 'static,
        timer: impl ReconnectTimer + 'static,
    ) -> Self {
        let (outbox, inbox) = mpsc::unbounded();
        Self {
            shared: Rc::new(Shared {
                config,
                connector: Box::new(connector),
                timer: Box::new(timer),
                core: RefCell::new(ConnectionCore::default()),
                subscribers: RefCell::new(Vec::new()),
                status_listeners: RefCell::new(Vec::new()),
                published: RefCell::new(ConnectionStatus::default()),
                inbox: RefCell::new(Some(inbox)),
                outbox,
                next_slot_id: Cell::new(0),
                leases: Cell::new(0),
            }),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.core.borrow().state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.core.borrow().status()
    }

    pub fn is_connecting(&self) -> bool {
        self.shared.core.borrow().is_connecting
    }

    /// Most recent successfully parsed frame.
    pub fn last_message(&self) -> Option<FeedMessage> {
        self.shared.core.borrow().last_message.clone()
    }

    /// Open the socket unless it is open or opening. Resets the reconnect
    /// counter, so this also recovers from exhausted retries.
    pub fn connect(&self) {
        {
            let mut core = self.shared.core.borrow_mut();
            core.should_stay_connected = true;
            if core.state == ConnectionState::Open || core.is_connecting {
                log_trace!(COMPONENT, "connect ignored in state {}", core.state);
                return;
            }
            core.attempts = 0;
            core.exhausted = false;
            core.cancel_reconnect();
        }
        self.open_transport();
        self.publish_status();
    }

    /// Close with the normal closure code and stop reconnecting. Idempotent.
    pub fn disconnect(&self) {
        let socket = {
            let mut core = self.shared.core.borrow_mut();
            core.should_stay_connected = false;
            core.cancel_reconnect();
            core.is_connecting = false;
            // Events still in flight from the closed socket are stale from here on.
            core.generation += 1;
            core.state = ConnectionState::Closed;
            core.socket.take()
        };
        if let Some(socket) = socket {
            log_info!(COMPONENT, "disconnecting");
            socket.close(NORMAL_CLOSURE, "User disconnected");
        }
        self.publish_status();
    }

    /// Serialize and transmit `message` if the socket is open. Returns whether
    /// the frame was handed to the socket; nothing is queued.
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                log_error!(COMPONENT, "failed to serialize outbound frame: {}", e);
                return false;
            }
        };
        let result = {
            let core = self.shared.core.borrow();
            match (&core.socket, core.state) {
                (Some(socket), ConnectionState::Open) => Some(socket.send_text(&text)),
                _ => None,
            }
        };
        match result {
            Some(Ok(())) => true,
            Some(Err(error)) => {
                log_warn!(COMPONENT, "{}", error);
                self.shared.core.borrow_mut().last_error = Some(error);
                self.publish_status();
                false
            }
            None => {
                log_warn!(COMPONENT, "socket not open, dropped frame {}", text);
                false
            }
        }
    }

    /// Deliver every parsed inbound message to `callback` until the returned
    /// subscription is disposed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&FeedMessage) -> SubscriberResult + 'static,
    {
        let callback: MessageCallback = Rc::new(callback);
        let (id, active) = self.next_slot();
        self.shared.subscribers.borrow_mut().push(Slot { id, active: active.clone(), callback });
        Subscription::new(Rc::downgrade(&self.shared), id, SlotKind::Message, active)
    }

    /// Like [`subscribe`](Self::subscribe) but delivers into a channel.
    pub fn subscribe_channel(&self) -> (Subscription, UnboundedReceiver<FeedMessage>) {
        let (tx, rx) = mpsc::unbounded();
        let subscription = self.subscribe(move |message| {
            tx.unbounded_send(message.clone()).map_err(|_| SubscriberError::ChannelClosed)
        });
        (subscription, rx)
    }

    /// Call `callback` with a fresh status snapshot whenever it changes.
    pub fn watch_status<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConnectionStatus) + 'static,
    {
        let callback: StatusCallback = Rc::new(callback);
        let (id, active) = self.next_slot();
        self.shared.status_listeners.borrow_mut().push(Slot {
            id,
            active: active.clone(),
            callback,
        });
        Subscription::new(Rc::downgrade(&self.shared), id, SlotKind::Status, active)
    }

    /// Claim the connection. The first lease connects; releasing the last one
    /// disconnects.
    pub fn lease(&self) -> ConnectionLease {
        let leases = self.shared.leases.get() + 1;
        self.shared.leases.set(leases);
        if leases == 1 {
            self.connect();
        }
        ConnectionLease { shared: Rc::downgrade(&self.shared), released: Cell::new(false) }
    }

    pub fn lease_count(&self) -> usize {
        self.shared.leases.get()
    }

    /// Handle every queued transport and timer event. Returns how many were
    /// handled.
    pub fn drain_events(&self) -> usize {
        let mut handled = 0;
        loop {
            let next = self.shared.inbox.borrow_mut().as_mut().map(|inbox| inbox.try_next());
            match next {
                Some(Ok(Some(event))) => {
                    self.handle(event);
                    handled += 1;
                }
                _ => return handled,
            }
        }
    }

    /// Drive the connection from its inbox until [`shutdown`](Self::shutdown).
    pub async fn run(&self) {
        let Some(mut inbox) = self.shared.inbox.borrow_mut().take() else {
            log_warn!(COMPONENT, "event loop already running");
            return;
        };
        while let Some(event) = inbox.next().await {
            self.handle(event);
        }
        log_debug!(COMPONENT, "event loop finished");
    }

    /// Disconnect and close the inbox, ending [`run`](Self::run).
    pub fn shutdown(&self) {
        self.disconnect();
        self.shared.outbox.close_channel();
    }

    fn next_slot(&self) -> (u64, Rc<Cell<bool>>) {
        let id = self.shared.next_slot_id.get();
        self.shared.next_slot_id.set(id + 1);
        (id, Rc::new(Cell::new(true)))
    }

    fn open_transport(&self) {
        let generation = {
            let mut core = self.shared.core.borrow_mut();
            if core.is_connecting {
                return;
            }
            core.generation += 1;
            core.is_connecting = true;
            core.state = ConnectionState::Connecting;
            if let Some(previous) = core.socket.take() {
                previous.close(NORMAL_CLOSURE, "superseded");
            }
            core.generation
        };

        let url = &self.shared.config.url;
        log_info!(COMPONENT, "connecting to {} (generation {})", url, generation);
        let events = TransportEvents::new(generation, self.shared.outbox.clone());
        match self.shared.connector.open(url, events) {
            Ok(socket) => {
                let mut core = self.shared.core.borrow_mut();
                if core.generation == generation {
                    core.socket = Some(socket);
                } else {
                    socket.close(NORMAL_CLOSURE, "superseded");
                }
            }
            Err(error) => {
                log_warn!(COMPONENT, "{}", error);
                self.retry_after(error);
            }
        }
    }

    fn handle(&self, event: FeedEvent) {
        match event {
            FeedEvent::Transport { generation, event } => {
                let current = self.shared.core.borrow().generation;
                if generation != current {
                    log_trace!(COMPONENT, "ignored {:?} from stale socket {}", event, generation);
                    return;
                }
                match event {
                    TransportEvent::Opened => self.on_opened(),
                    TransportEvent::Message(text) => self.on_message(&text),
                    TransportEvent::Closed { code, reason } => self.on_closed(code, reason),
                    TransportEvent::Error(description) => self.on_error(description),
                }
            }
            FeedEvent::ReconnectDue { token } => self.on_reconnect_due(token),
        }
        self.publish_status();
    }

    fn on_opened(&self) {
        {
            let mut core = self.shared.core.borrow_mut();
            core.is_connecting = false;
            core.state = ConnectionState::Open;
            core.attempts = 0;
            core.exhausted = false;
            core.last_error = None;
        }
        log_info!(COMPONENT, "connected to {}", self.shared.config.url);
        for stream in &self.shared.config.streams {
            self.send(&OutboundFrame::from(*stream));
        }
    }

    fn on_message(&self, text: &str) {
        let message = match parse_frame(text) {
            Ok(message) => message,
            Err(error) => {
                get_logger().log_with_metadata(
                    LogLevel::Warn,
                    COMPONENT,
                    &format!("dropped frame: {error}"),
                    text,
                );
                return;
            }
        };
        self.shared.core.borrow_mut().last_message = Some(message.clone());
        self.dispatch(&message);
    }

    fn dispatch(&self, message: &FeedMessage) {
        // Snapshot so callbacks may subscribe, dispose or send re-entrantly.
        let subscribers = self.shared.subscribers.borrow().clone();
        for slot in subscribers {
            if !slot.active.get() {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| (slot.callback)(message))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    let kind = message.kind();
                    log_error!(COMPONENT, "subscriber {} failed on {}: {}", slot.id, kind, error);
                }
                Err(_) => {
                    log_error!(COMPONENT, "subscriber {} panicked on {}", slot.id, message.kind());
                }
            }
        }
    }

    fn on_error(&self, description: String) {
        log_warn!(COMPONENT, "socket error: {}", description);
        self.shared.core.borrow_mut().last_error = Some(TransportError::Socket(description));
    }

    fn on_closed(&self, code: u16, reason: String) {
        {
            let mut core = self.shared.core.borrow_mut();
            if code == NORMAL_CLOSURE || !core.should_stay_connected {
                core.is_connecting = false;
                core.socket = None;
                core.state = ConnectionState::Closed;
                log_info!(COMPONENT, "closed (code {})", code);
                return;
            }
        }
        self.retry_after(TransportError::AbnormalClosure { code, reason });
    }

    /// Schedule the next reconnect after a failed or lost socket, or give up
    /// once the attempt budget is spent.
    fn retry_after(&self, error: TransportError) {
        let (delay, token) = {
            let mut core = self.shared.core.borrow_mut();
            core.is_connecting = false;
            core.socket = None;
            if !core.should_stay_connected {
                core.state = ConnectionState::Closed;
                return;
            }
            if core.attempts >= self.shared.config.max_reconnect_attempts {
                core.state = ConnectionState::Closed;
                core.exhausted = true;
                core.last_error = Some(TransportError::RetriesExhausted { attempts: core.attempts });
                log_error!(COMPONENT, "giving up after {} reconnect attempts: {}", core.attempts, error);
                return;
            }
            core.last_error = Some(error);
            core.state = ConnectionState::Reconnecting;
            core.cancel_reconnect();
            core.next_timer_token += 1;
            (self.shared.config.backoff_delay(core.attempts), core.next_timer_token)
        };

        log_warn!(COMPONENT, "reconnecting in {} ms", delay.as_millis());
        let outbox = self.shared.outbox.clone();
        let timer = self.shared.timer.schedule(
            delay,
            Box::new(move || {
                let _ = outbox.unbounded_send(FeedEvent::ReconnectDue { token });
            }),
        );
        self.shared.core.borrow_mut().pending_reconnect = Some((token, timer));
    }

    fn on_reconnect_due(&self, token: u64) {
        {
            let mut core = self.shared.core.borrow_mut();
            match &core.pending_reconnect {
                Some((pending, _)) if *pending == token => {}
                _ => {
                    log_trace!(COMPONENT, "ignored stale reconnect timer {}", token);
                    return;
                }
            }
            core.pending_reconnect = None;
            if !core.should_stay_connected {
                return;
            }
            core.attempts += 1;
            log_info!(COMPONENT, "reconnect attempt {}", core.attempts);
        }
        self.open_transport();
    }

    fn publish_status(&self) {
        let status = self.status();
        if *self.shared.published.borrow() == status {
            return;
        }
        *self.shared.published.borrow_mut() = status.clone();
        let listeners = self.shared.status_listeners.borrow().clone();
        for slot in listeners {
            // A listener that re-entered the connection has already published
            // a newer status to everyone.
            if *self.shared.published.borrow() != status {
                break;
            }
            if slot.active.get() {
                (slot.callback)(&status);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    Message,
    Status,
}

/// Handle to a registered callback. Disposing (or dropping) it removes the
/// callback and nothing else; the socket stays open.
pub struct Subscription {
    shared: Weak<Shared>,
    id: u64,
    kind: SlotKind,
    active: Rc<Cell<bool>>,
}

impl Subscription {
    fn new(shared: Weak<Shared>, id: u64, kind: SlotKind, active: Rc<Cell<bool>>) -> Self {
        Self { shared, id, kind, active }
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Idempotent.
    pub fn dispose(&self) {
        if !self.active.replace(false) {
            return;
        }
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        match self.kind {
            SlotKind::Message => shared.subscribers.borrow_mut().retain(|slot| slot.id != self.id),
            SlotKind::Status => {
                shared.status_listeners.borrow_mut().retain(|slot| slot.id != self.id)
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Reference-counted claim on the connection; see [`FeedConnection::lease`].
pub struct ConnectionLease {
    shared: Weak<Shared>,
    released: Cell<bool>,
}

impl ConnectionLease {
    /// Idempotent.
    pub fn release(&self) {
        if self.released.replace(true) {
            return;
        }
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let leases = shared.leases.get().saturating_sub(1);
        shared.leases.set(leases);
        if leases == 0 {
            FeedConnection { shared }.disconnect();
        }
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.release();
    }
}
