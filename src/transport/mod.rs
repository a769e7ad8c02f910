// MIT License

//! Transport boundary: the session speaks to the gateway through a pair of
//! in-order frame channels, so everything above this module is
//! transport-agnostic (and tests can drive a session entirely in memory).

pub mod tcp;

use std::future::Future;

use tokio::sync::mpsc;

pub use tcp::TcpConnector;

/// A live duplex link delivering whole XML frames, in arrival order.
///
/// Dropping `outbound` (or the remote closing) ends the link; the session
/// observes this as `inbound` yielding `None`.
pub struct Connection {
    /// Outbound command frames
    pub outbound: mpsc::Sender<String>,
    /// Inbound protocol frames, one complete top-level element each
    pub inbound: mpsc::Receiver<String>,
}

/// Opens fresh [`Connection`]s on demand.
///
/// The session owns reconnection policy, so connectors must not retry
/// internally; a failed attempt returns the error immediately.
pub trait Connector: Send + Sync + 'static {
    /// Open a new link to the gateway. The `Send` bound lets the session
    /// reconnect from spawned timer tasks.
    fn connect(&self) -> impl Future<Output = std::io::Result<Connection>> + Send;
}
