//! Transmit/receive pipelines, role logic, and the `Router` application API
//! for the Fast Peer Router.
//!
//! This crate owns everything that touches the link layer: fragmentation and
//! sequencing on the way out, replay/reassembly/queue policy and role
//! dispatch (CLIENT/HOST/EXTENDER) on the way in, and the periodic
//! broadcast/keepalive tasks. The pure state (peer table, handshake) lives in
//! `fpr-core`; the wire format lives in `fpr-proto`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod link;
pub mod receive;
pub mod role;
pub mod router;
pub mod transmit;

pub use config::{ClientConfig, ConnectionMode, HostConfig, PowerMode, RouterConfig};
pub use link::{LinkError, LinkLayer};
pub use receive::{DataOutcome, process_data_frame};
pub use role::{ForwardDecision, Role, VersionDecision, decide_forward, route_version};
pub use router::{PeerInfo, Router, PROTOCOL_VERSION};
pub use transmit::{TransmitPipeline, fragment};
