// MIT License

//! TCP transport to an INDI gateway. The gateway writes XML elements
//! back-to-back with no length prefix, so the read side carries a frame
//! splitter that reassembles whole top-level elements out of arbitrary
//! TCP read boundaries.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::transport::{Connection, Connector};

/// Frames buffered in each direction before backpressure applies.
const CHANNEL_CAPACITY: usize = 64;

/// Connects directly to the gateway's TCP port (conventionally 7624).
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl Connector for TcpConnector {
    async fn connect(&self) -> std::io::Result<Connection> {
        let stream = TcpStream::connect(&self.address).await?;
        debug!(address = %self.address, "TCP socket connected");

        let (mut reader, mut writer) = stream.into_split();
        let (inbound_tx, inbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        // Read task: socket bytes -> whole frames. Ends on EOF, read error,
        // or the session dropping its receiver.
        tokio::spawn(async move {
            let mut splitter = FrameSplitter::new();
            let mut buf = vec![0u8; 8192];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => {
                        debug!("gateway closed the connection");
                        break;
                    }
                    Ok(n) => {
                        for frame in splitter.push(&buf[..n]) {
                            if inbound_tx.send(frame).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        error!("read error: {}", e);
                        break;
                    }
                }
            }
        });

        // Write task: outbound frames -> socket. Ends when the session
        // drops its sender, which also closes the write half.
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = writer.write_all(frame.as_bytes()).await {
                    error!("write error: {}", e);
                    break;
                }
                if let Err(e) = writer.write_all(b"\n").await {
                    error!("write error: {}", e);
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        Ok(Connection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// Incremental splitter yielding complete top-level XML elements.
///
/// Tracks element depth with a small scanner (tag/quote/comment states)
/// rather than a full parser; the wire decoder validates each frame
/// properly afterwards. BLOB payloads are plain base64 text, so no CDATA
/// handling is needed, but quoted attribute values may contain `>` and
/// are skipped over.
pub(crate) struct FrameSplitter {
    buf: Vec<u8>,
    /// Scan position within `buf`; everything before it is classified
    pos: usize,
    /// Open-element depth at `pos`
    depth: i32,
    state: ScanState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    Text,
    /// Inside a tag; tracks whether it opened with `</` (closing), with
    /// `<?`/`<!` (neutral: declarations and comments, no depth change),
    /// and the previous byte
    Tag {
        closing: bool,
        neutral: bool,
        prev: u8,
    },
    /// Inside a quoted attribute value
    Quote {
        delim: u8,
        closing: bool,
        neutral: bool,
    },
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            depth: 0,
            state: ScanState::Text,
        }
    }

    /// Feed raw bytes; returns every frame completed by this chunk.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(data);
        let mut frames = Vec::new();

        while self.pos < self.buf.len() {
            let byte = self.buf[self.pos];
            match self.state {
                ScanState::Text => {
                    if byte == b'<' {
                        self.state = ScanState::Tag {
                            closing: false,
                            neutral: false,
                            prev: b'<',
                        };
                    }
                }
                ScanState::Tag {
                    closing,
                    neutral,
                    prev,
                } => match byte {
                    b'/' if prev == b'<' => {
                        self.state = ScanState::Tag {
                            closing: true,
                            neutral,
                            prev: byte,
                        };
                    }
                    b'?' | b'!' if prev == b'<' => {
                        self.state = ScanState::Tag {
                            closing,
                            neutral: true,
                            prev: byte,
                        };
                    }
                    b'"' | b'\'' => {
                        self.state = ScanState::Quote {
                            delim: byte,
                            closing,
                            neutral,
                        };
                    }
                    b'>' => {
                        self.state = ScanState::Text;
                        if neutral {
                            // Declarations between frames are dropped whole.
                            if self.depth == 0 {
                                self.discard_frame();
                                continue;
                            }
                        } else {
                            let self_closing = prev == b'/' && !closing;
                            if closing {
                                self.depth -= 1;
                            } else if !self_closing {
                                self.depth += 1;
                            }
                            if self.depth <= 0 {
                                self.depth = 0;
                                frames.extend(self.take_frame());
                                continue;
                            }
                        }
                    }
                    _ => {
                        self.state = ScanState::Tag {
                            closing,
                            neutral,
                            prev: byte,
                        };
                    }
                },
                ScanState::Quote {
                    delim,
                    closing,
                    neutral,
                } => {
                    if byte == delim {
                        self.state = ScanState::Tag {
                            closing,
                            neutral,
                            prev: byte,
                        };
                    }
                }
            }
            self.pos += 1;
        }

        frames
    }

    /// Cut the completed frame (everything up to and including `pos`) out
    /// of the buffer. `pos` sits on the closing `>` when called.
    fn take_frame(&mut self) -> Option<String> {
        let end = self.pos + 1;
        let frame: Vec<u8> = self.buf.drain(..end).collect();
        self.pos = 0;
        let text = String::from_utf8_lossy(&frame).trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Drop everything up to and including `pos` without emitting a frame.
    fn discard_frame(&mut self) {
        self.buf.drain(..self.pos + 1);
        self.pos = 0;
    }
}
