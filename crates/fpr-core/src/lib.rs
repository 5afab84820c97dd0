//! Peer table, handshake state machine, and `Environment` abstraction for
//! the Fast Peer Router.
//!
//! This crate holds everything that does not need to touch a real link
//! layer: peer bookkeeping, replay/reassembly state, the four-message
//! handshake, statistics counters, and the `Environment` trait that lets the
//! router's driving logic run identically against a deterministic simulated
//! clock/RNG (`fpr-harness`) or the real OS clock/RNG (`fpr-node`). The
//! pieces that actually send and receive frames live in `fpr-router`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod handshake;
pub mod lifecycle;
pub mod peer;
pub mod stats;
pub mod system_env;

pub use env::Environment;
pub use error::RouterError;
pub use handshake::HandshakeAction;
pub use lifecycle::LifecycleState;
pub use peer::{ConnectionState, PeerRecord, PeerTable, QueueMode, SecurityState};
pub use stats::{NetworkStats, NetworkStatsSnapshot};
pub use system_env::SystemEnv;
