//! Wire-level errors.

use thiserror::Error;

/// Errors raised while decoding or encoding a [`crate::Packet`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The supplied buffer is not exactly [`crate::Packet::WIRE_SIZE`] bytes.
    #[error("truncated packet: expected {expected} bytes, got {got}")]
    TruncatedPacket {
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        got: usize,
    },

    /// `package_type` was not one of SINGLE/START/CONTINUED/END.
    #[error("invalid package type: {0:#04x}")]
    InvalidPackageType(u8),

    /// `payload_size` exceeds the fixed payload capacity.
    #[error("payload size {got} exceeds capacity {capacity}")]
    PayloadTooLarge {
        /// Declared payload size.
        got: usize,
        /// Maximum capacity of the payload union.
        capacity: usize,
    },

    /// A `ConnectInfo` name field was not valid UTF-8 up to its NUL
    /// terminator.
    #[error("invalid peer name encoding")]
    InvalidName,
}
