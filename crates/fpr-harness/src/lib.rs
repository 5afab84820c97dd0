//! Deterministic simulation harness for Fast Peer Router protocol testing.
//!
//! Grounded on the teacher's `lockframe-harness` crate: a seeded virtual
//! clock/RNG (`sim_env`), an in-process stand-in for the real medium
//! (`sim_link`), a cluster driver wiring several routers together
//! (`cluster`), and a small invariant-checking layer (`invariants`) exercised
//! by the property tests in `tests/`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cluster;
pub mod invariants;
pub mod sim_env;
pub mod sim_link;

pub use cluster::{SimCluster, SimNode};
pub use invariants::{
    AtMostOneHost, Invariant, InvariantRegistry, InvariantResult, PeerTableSnapshot,
    RouteHopCountConsistency, Violation,
};
pub use sim_env::SimEnv;
pub use sim_link::{SimLink, SimMedium, SimReceiver};
