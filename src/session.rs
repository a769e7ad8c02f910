// MIT License

//! Transport session: owns the link to the gateway, drives decode/apply on
//! every inbound frame, and manages the reconnect backoff timer.
//!
//! Lifecycle: `Disconnected -> Connecting -> Connected`, and on link loss
//! `-> Reconnecting -> Connected` or, once the attempt budget is spent,
//! a terminal `connection` error until the user calls `connect()` again.
//! A user-initiated `disconnect()` never reconnects.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::config::ClientConfig;
use crate::devices::{DeviceMirror, Property};
use crate::error::IndiError;
use crate::event::{ClientEvent, EventSender};
use crate::transport::Connector;
use crate::wire::{self, Message};

/// Compute the backoff delay before reconnect attempt `attempt` (1-based):
/// `base * 1.5^(attempt-1)`.
pub(crate) fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1.5_f64.powi(attempt.saturating_sub(1) as i32);
    Duration::from_millis((base.as_millis() as f64 * factor).round() as u64)
}

/// One logical session against one gateway. Multiple sessions can coexist;
/// there is no shared ambient state.
pub(crate) struct Session<C: Connector> {
    connector: Arc<C>,
    state: Arc<SessionState>,
}

pub(crate) struct SessionState {
    config: ClientConfig,
    event_tx: EventSender,
    mirror: Mutex<DeviceMirror>,
    /// Outbound half of the live link, `None` while disconnected.
    /// Never held across an await.
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    reconnect_timer: Mutex<Option<JoinHandle<()>>>,
    reconnect_attempts: AtomicU32,
    /// Set by `disconnect()`; suppresses every automatic reconnect path.
    shutdown: AtomicBool,
}

impl<C: Connector> Session<C> {
    pub fn new(config: ClientConfig, connector: C, event_tx: EventSender) -> Self {
        Self {
            connector: Arc::new(connector),
            state: Arc::new(SessionState {
                config,
                event_tx,
                mirror: Mutex::new(DeviceMirror::new()),
                outbound: Mutex::new(None),
                reader_task: Mutex::new(None),
                reconnect_timer: Mutex::new(None),
                reconnect_attempts: AtomicU32::new(0),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// Open (or re-open) the link. Resolves `true` on success; on failure
    /// resolves `false` and kicks off the reconnection procedure.
    pub async fn connect(&self) -> bool {
        self.state.shutdown.store(false, Ordering::SeqCst);
        self.state.reconnect_attempts.store(0, Ordering::SeqCst);
        cancel_reconnect_timer(&self.state);
        open_link(self.connector.clone(), self.state.clone()).await
    }

    /// User-initiated teardown. Cancels any pending reconnect, closes the
    /// link, clears the mirror, and emits an empty device snapshot. Safe
    /// to call from any state, repeatedly.
    pub fn disconnect(&self) {
        info!("disconnecting from gateway");
        self.state.shutdown.store(true, Ordering::SeqCst);
        cancel_reconnect_timer(&self.state);

        if let Some(handle) = self.state.reader_task.lock().expect("lock poisoned").take() {
            handle.abort();
        }
        // Dropping the sender closes the transport's write task and socket.
        *self.state.outbound.lock().expect("lock poisoned") = None;

        self.state.mirror.lock().expect("lock poisoned").clear();
        let _ = self.state.event_tx.send(ClientEvent::DevicesUpdated(Vec::new()));
    }

    /// Transmit a raw frame, or report a `command` error if disconnected.
    /// Commands are never queued across disconnects.
    pub fn send_command(&self, xml: &str) {
        send_frame(&self.state, xml);
    }

    /// Build and transmit a command.
    pub fn send(&self, command: &Command) {
        self.send_command(&command.to_xml());
    }

    /// Re-emit the current device snapshot to subscribers.
    pub fn publish_device_list(&self) {
        let devices = self.state.mirror.lock().expect("lock poisoned").devices();
        let _ = self.state.event_tx.send(ClientEvent::DevicesUpdated(devices));
    }

    pub fn devices(&self) -> Vec<crate::devices::Device> {
        self.state.mirror.lock().expect("lock poisoned").devices()
    }

    pub fn device(&self, name: &str) -> Option<crate::devices::Device> {
        self.state
            .mirror
            .lock()
            .expect("lock poisoned")
            .device(name)
            .cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.state
            .outbound
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

/// Single connection attempt plus reader start. Shared by `connect()` and
/// the reconnect timer.
async fn open_link<C: Connector>(connector: Arc<C>, state: Arc<SessionState>) -> bool {
    if state.shutdown.load(Ordering::SeqCst) {
        return false;
    }
    teardown_link(&state);

    info!(address = %state.config.address(), "connecting to gateway");
    let connection = match timeout(state.config.connect_timeout, connector.connect()).await {
        Ok(Ok(connection)) => connection,
        Ok(Err(e)) => {
            warn!("connect failed: {}", e);
            schedule_reconnect(connector, state);
            return false;
        }
        Err(_) => {
            warn!(
                "connect timed out after {:?}",
                state.config.connect_timeout
            );
            schedule_reconnect(connector, state);
            return false;
        }
    };

    // A disconnect issued while the attempt was in flight wins: drop the
    // fresh connection instead of resurrecting the session.
    if state.shutdown.load(Ordering::SeqCst) {
        debug!("connect attempt completed after disconnect, dropping link");
        return false;
    }

    let outbound = connection.outbound;
    let mut inbound = connection.inbound;

    *state.outbound.lock().expect("lock poisoned") = Some(outbound.clone());
    state.reconnect_attempts.store(0, Ordering::SeqCst);
    let _ = state.event_tx.send(ClientEvent::Connection(true));
    info!("connection established");

    // Kick off discovery immediately so the mirror starts filling.
    if outbound.send(Command::GetProperties.to_xml()).await.is_err() {
        warn!("link closed before discovery command could be sent");
    }

    let reader_state = state.clone();
    let reader_connector = connector.clone();
    let handle = tokio::spawn(async move {
        while let Some(frame) = inbound.recv().await {
            handle_frame(&reader_state, &frame);
        }
        // Link dropped. If this was a user disconnect the flag is set and
        // we just stop; otherwise start the reconnection procedure.
        if reader_state.shutdown.load(Ordering::SeqCst) {
            return;
        }
        debug!("link lost");
        *reader_state.outbound.lock().expect("lock poisoned") = None;
        let _ = reader_state.event_tx.send(ClientEvent::Connection(false));
        schedule_reconnect(reader_connector, reader_state);
    });
    *state.reader_task.lock().expect("lock poisoned") = Some(handle);

    true
}

/// Close the current link without touching mirror or reconnect state.
fn teardown_link(state: &SessionState) {
    if let Some(handle) = state.reader_task.lock().expect("lock poisoned").take() {
        handle.abort();
    }
    *state.outbound.lock().expect("lock poisoned") = None;
}

/// Schedule a single reconnect attempt after the backoff delay.
/// Idempotent while a timer is already pending; emits a fatal `connection`
/// error once the attempt budget is exhausted.
fn schedule_reconnect<C: Connector>(connector: Arc<C>, state: Arc<SessionState>) {
    if state.shutdown.load(Ordering::SeqCst) {
        return;
    }

    let mut timer = state.reconnect_timer.lock().expect("lock poisoned");
    if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
        return;
    }

    let attempts = state.reconnect_attempts.load(Ordering::SeqCst);
    if attempts >= state.config.max_reconnect_attempts {
        warn!(attempts, "reconnect attempts exhausted, giving up");
        emit_error(&state, &IndiError::ReconnectExhausted { attempts });
        return;
    }

    let attempt = attempts + 1;
    state.reconnect_attempts.store(attempt, Ordering::SeqCst);
    let delay = reconnect_delay(state.config.base_reconnect_delay, attempt);
    info!(
        attempt,
        max = state.config.max_reconnect_attempts,
        "reconnecting in {:?}",
        delay
    );

    let timer_state = state.clone();
    *timer = Some(tokio::spawn(async move {
        sleep(delay).await;
        if timer_state.shutdown.load(Ordering::SeqCst) {
            return;
        }
        // Clear our own slot so a failed attempt can schedule the next one.
        *timer_state.reconnect_timer.lock().expect("lock poisoned") = None;
        open_link(connector, timer_state).await;
    }));
}

fn cancel_reconnect_timer(state: &SessionState) {
    if let Some(handle) = state.reconnect_timer.lock().expect("lock poisoned").take() {
        handle.abort();
    }
}

/// Decode one inbound frame and apply it to the mirror, emitting at most
/// one `PropertyUpdated`/`Message` and exactly one `DevicesUpdated` when
/// the mirror changed. Decode failures drop the frame and keep the link up.
fn handle_frame(state: &SessionState, frame: &str) {
    let message = match wire::decode(frame) {
        Ok(message) => message,
        Err(e) => {
            debug!("undecodable frame dropped: {}", e);
            emit_error(state, &IndiError::Decode(e));
            return;
        }
    };

    match message {
        Message::Define(def) => {
            let property = {
                let mut mirror = state.mirror.lock().expect("lock poisoned");
                mirror.apply_definition(&def)
            };
            emit_property_updated(state, &def.device, &def.name, property);
            emit_devices_updated(state);
        }
        Message::Set(set) => {
            let applied = {
                let mut mirror = state.mirror.lock().expect("lock poisoned");
                mirror.apply_set(&set)
            };
            // Stray sets for unknown devices/properties mutate nothing and
            // therefore notify nothing.
            if let Some(property) = applied {
                emit_property_updated(state, &set.device, &set.name, property);
                emit_devices_updated(state);
            }
        }
        Message::Message(msg) => {
            let _ = state.event_tx.send(ClientEvent::Message {
                device: msg.device,
                timestamp: msg.timestamp,
                text: msg.text,
            });
        }
        Message::DelProperty(del) => {
            {
                let mut mirror = state.mirror.lock().expect("lock poisoned");
                match (del.device.as_deref(), del.property.as_deref()) {
                    (Some(device), Some(property)) => mirror.delete_property(device, property),
                    (Some(device), None) => mirror.delete_device(device),
                    (None, _) => mirror.clear(),
                }
            }
            emit_devices_updated(state);
        }
    }
}

fn emit_property_updated(state: &SessionState, device: &str, property: &str, data: Property) {
    let _ = state.event_tx.send(ClientEvent::PropertyUpdated {
        device: device.to_string(),
        property: property.to_string(),
        data,
    });
}

fn emit_devices_updated(state: &SessionState) {
    let devices = state.mirror.lock().expect("lock poisoned").devices();
    let _ = state.event_tx.send(ClientEvent::DevicesUpdated(devices));
}

fn send_frame(state: &SessionState, xml: &str) {
    let guard = state.outbound.lock().expect("lock poisoned");
    let result = match guard.as_ref() {
        Some(tx) => tx.try_send(xml.to_string()).map_err(|e| match e {
            // Connected but backpressured is a different failure from a
            // dead link; label it as such.
            TrySendError::Full(_) => IndiError::QueueFull,
            TrySendError::Closed(_) => IndiError::Disconnected,
        }),
        None => Err(IndiError::Disconnected),
    };
    drop(guard);

    if let Err(e) = result {
        warn!("command dropped: {}", e);
        emit_error(state, &e);
    }
}

/// Report a non-throwing failure to subscribers, bucketed by its kind.
fn emit_error(state: &SessionState, err: &IndiError) {
    let _ = state.event_tx.send(ClientEvent::Error {
        kind: err.kind(),
        message: err.to_string(),
    });
}
