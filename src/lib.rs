// MIT License

//! # indi-bridge
//!
//! Async client for INDI (Instrument Neutral Distributed Interface)
//! gateways: device discovery, a live mirror of all property vectors, and
//! command submission over plain TCP.
//!
//! The client maintains the link itself, reconnecting with exponential
//! backoff when it drops, and exposes everything that happens as a
//! broadcast event stream. Applications never touch the XML wire format.
//!
//! ## Quick Start
//!
//! ```no_run
//! use indi_bridge::{ClientConfig, ClientEvent, IndiClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::builder()
//!         .host("192.168.0.50")
//!         .build();
//!
//!     let client = IndiClient::new(config);
//!
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let ClientEvent::DevicesUpdated(devices) = event {
//!                 println!("{} device(s) known", devices.len());
//!             }
//!         }
//!     });
//!
//!     client.connect().await;
//!     client.connect_device("Telescope Simulator")?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.disconnect();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod devices;
pub mod error;
pub mod event;
pub mod transport;
pub mod wire;

mod session;

// Re-exports for convenience
pub use client::IndiClient;
pub use command::Command;
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_PORT};
pub use devices::element::{Permission, PropertyKind, PropertyState, SwitchRule, SwitchState};
pub use devices::{Device, Element, Property};
pub use error::{ErrorKind, IndiError, Result};
pub use event::{ClientEvent, EventReceiver};
