//! Error types for the transport.

use thiserror::Error;

/// Errors surfaced by the connection facade and the socket layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The socket is already open
    #[error("socket is already open")]
    AlreadyOpen,
    /// The socket is already closed
    #[error("socket is already closed")]
    AlreadyClosed,
    /// Payload plus header exceeds what the configured MTU allows
    #[error("packet of {size} bytes exceeds maximum of {max}")]
    PacketTooLarge {
        /// Bytes the datagram would occupy
        size: usize,
        /// Largest datagram the MTU allows
        max: usize,
    },
    /// The operating system accepted fewer bytes than offered
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes handed to the kernel
        written: usize,
        /// Bytes offered
        expected: usize,
    },
    /// Datagram too small to hold a header
    #[error("truncated header")]
    TruncatedHeader,
    /// Operating system socket failure, surfaced verbatim
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, TransportError>;
