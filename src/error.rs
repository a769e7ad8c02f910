// MIT License

use std::fmt;

/// Coarse error taxonomy surfaced to subscribers through the `Error` event.
///
/// - `Parse`: malformed inbound XML. Non-fatal, the frame is dropped.
/// - `Command`: a send was attempted while disconnected. Non-fatal, the
///   command is dropped without buffering.
/// - `Connection`: reconnection attempts are exhausted. Terminal until the
///   user calls `connect()` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    Command,
    Connection,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Command => "command",
            Self::Connection => "connection",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors the library produces, surfaced either as `Err` returns from
/// the client facade or through `Error` events (bucketed by [`kind`]).
///
/// [`kind`]: IndiError::kind
#[derive(Debug, thiserror::Error)]
pub enum IndiError {
    #[error("Not connected, command dropped")]
    Disconnected,

    #[error("Outbound queue full, command dropped")]
    QueueFull,

    #[error("Reconnect attempts exhausted ({attempts})")]
    ReconnectExhausted { attempts: u32 },

    #[error("Frame decode failed: {0}")]
    Decode(#[from] crate::wire::DecodeError),

    #[error("Invalid {what} name: {value:?}")]
    InvalidName { what: &'static str, value: String },
}

impl IndiError {
    /// The event taxonomy bucket this error is reported under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndiError::Decode(_) => ErrorKind::Parse,
            IndiError::Disconnected
            | IndiError::QueueFull
            | IndiError::InvalidName { .. } => ErrorKind::Command,
            IndiError::ReconnectExhausted { .. } => ErrorKind::Connection,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_strings() {
        assert_eq!(ErrorKind::Parse.as_str(), "parse");
        assert_eq!(ErrorKind::Command.as_str(), "command");
        assert_eq!(ErrorKind::Connection.as_str(), "connection");
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(IndiError::Disconnected.kind(), ErrorKind::Command);
        assert_eq!(IndiError::QueueFull.kind(), ErrorKind::Command);
        assert_eq!(
            IndiError::ReconnectExhausted { attempts: 5 }.kind(),
            ErrorKind::Connection
        );
        assert_eq!(
            IndiError::Decode(crate::wire::DecodeError::EmptyFrame).kind(),
            ErrorKind::Parse
        );
    }
}
