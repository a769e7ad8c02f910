// MIT License

use crate::devices::{Device, Property};
use crate::error::ErrorKind;

/// All events emitted to subscribers.
///
/// Consumers subscribe via `client.subscribe()` and receive a
/// `tokio::sync::broadcast::Receiver<ClientEvent>`. The wire format never
/// leaks through this surface.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Transport opened (`true`) or dropped (`false`)
    Connection(bool),
    /// A property was defined or updated
    PropertyUpdated {
        device: String,
        property: String,
        data: Property,
    },
    /// The device table changed; carries a full snapshot
    DevicesUpdated(Vec<Device>),
    /// Human-readable message from a device or the gateway
    Message {
        device: Option<String>,
        timestamp: Option<String>,
        text: String,
    },
    /// A non-throwing failure, bucketed by [`ErrorKind`]
    Error { kind: ErrorKind, message: String },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<ClientEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<ClientEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
