// MIT License

//! Public client facade. Wraps a [`Session`] and exposes the high-level
//! operations an application needs: connect, subscribe to events, inspect
//! the device snapshot, and issue property changes.

use tracing::warn;

use crate::command::Command;
use crate::config::ClientConfig;
use crate::devices::element::SwitchState;
use crate::devices::Device;
use crate::error::{IndiError, Result};
use crate::event::{event_channel, EventReceiver, EventSender};
use crate::session::Session;
use crate::transport::{Connector, TcpConnector};

/// Client for a single INDI gateway.
///
/// Cheap to share behind an `Arc`; every method takes `&self`. Events flow
/// out through [`subscribe`](Self::subscribe), commands flow in through the
/// `set_*` methods, and all device state is read from the internal mirror
/// rather than queried over the wire.
pub struct IndiClient<C: Connector = TcpConnector> {
    session: Session<C>,
    event_tx: EventSender,
}

impl IndiClient<TcpConnector> {
    /// Build a client that connects over TCP to `config.address()`.
    pub fn new(config: ClientConfig) -> Self {
        let connector = TcpConnector::new(config.address());
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> IndiClient<C> {
    /// Build a client over a custom transport. Used by in-process tests;
    /// production code goes through [`IndiClient::new`].
    pub fn with_connector(config: ClientConfig, connector: C) -> Self {
        let (event_tx, _) = event_channel(config.event_capacity);
        let session = Session::new(config, connector, event_tx.clone());
        Self { session, event_tx }
    }

    /// Subscribe to client events. Each receiver sees every event emitted
    /// after the call; slow consumers may observe `Lagged`.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    /// Open the link and start discovery. On failure the reconnection
    /// procedure takes over; progress is reported through events either way.
    pub async fn connect(&self) -> bool {
        self.session.connect().await
    }

    /// Tear the link down and clear all device state. Pending reconnects
    /// are cancelled; no further events follow except the final empty
    /// device snapshot.
    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    /// Whether the link is currently up.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Emit a `DevicesUpdated` snapshot to all subscribers on demand.
    pub fn get_device_list(&self) {
        self.session.publish_device_list();
    }

    /// Current snapshot of all known devices, in name order.
    pub fn get_devices(&self) -> Vec<Device> {
        self.session.devices()
    }

    /// Current snapshot of one device, if known.
    pub fn get_device(&self, name: &str) -> Option<Device> {
        self.session.device(name)
    }

    /// Ask the gateway to connect a device (its CONNECTION vector).
    pub fn connect_device(&self, device: &str) -> Result<()> {
        let device = valid_name("device", device)?;
        self.session.send(&Command::SetConnection {
            device,
            connect: true,
        });
        Ok(())
    }

    /// Ask the gateway to disconnect a device.
    pub fn disconnect_device(&self, device: &str) -> Result<()> {
        let device = valid_name("device", device)?;
        self.session.send(&Command::SetConnection {
            device,
            connect: false,
        });
        Ok(())
    }

    /// Submit new values for a number property.
    pub fn set_number_property(
        &self,
        device: &str,
        property: &str,
        values: &[(&str, f64)],
    ) -> Result<()> {
        self.session.send(&Command::NewNumberVector {
            device: valid_name("device", device)?,
            property: valid_name("property", property)?,
            values: values
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
        });
        Ok(())
    }

    /// Submit new states for a switch property.
    pub fn set_switch_property(
        &self,
        device: &str,
        property: &str,
        values: &[(&str, SwitchState)],
    ) -> Result<()> {
        self.session.send(&Command::NewSwitchVector {
            device: valid_name("device", device)?,
            property: valid_name("property", property)?,
            values: values
                .iter()
                .map(|(name, state)| (name.to_string(), *state))
                .collect(),
        });
        Ok(())
    }

    /// Submit new values for a text property.
    pub fn set_text_property(
        &self,
        device: &str,
        property: &str,
        values: &[(&str, &str)],
    ) -> Result<()> {
        self.session.send(&Command::NewTextVector {
            device: valid_name("device", device)?,
            property: valid_name("property", property)?,
            values: values
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        });
        Ok(())
    }

    /// Send a pre-built command. The frame goes out as-is, so the caller
    /// is responsible for well-formed XML.
    pub fn send_command(&self, command: Command) {
        self.session.send(&command);
    }
}

/// Device and property names travel as XML attributes; empty names are
/// rejected here rather than producing a frame the gateway will ignore.
fn valid_name(what: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        warn!("rejected empty {} name", what);
        return Err(IndiError::InvalidName {
            what,
            value: value.to_string(),
        });
    }
    Ok(trimmed.to_string())
}
