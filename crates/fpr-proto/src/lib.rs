//! Fast Peer Router wire format.
//!
//! Defines the fixed-layout packet that crosses the link layer: a
//! memory-image-style frame with no variable-length fields, so encoding and
//! decoding never allocate and the whole packet is asserted at compile time
//! to fit one link-layer datagram.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod control;
mod error;
mod mac;
mod packet;
mod version;

pub use control::{ConnectInfo, MAX_NAME_LEN, Visibility};
pub use error::ProtocolError;
pub use mac::MacAddr;
pub use packet::{CONTROL_ID, DEFAULT_MAX_HOPS, FRAME_MTU, PAYLOAD_CAPACITY, Packet, PackageType};
pub use version::ProtocolVersion;
