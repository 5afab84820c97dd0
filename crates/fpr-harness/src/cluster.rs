//! Wires several `Router<SimEnv, SimLink>`s to one [`SimMedium`] and drives
//! frame delivery between them.
//!
//! Grounded on `lockframe-harness/src/cluster.rs`'s `TestCluster`, which
//! owns a `Vec<Client<SimEnv>>` and exposes scenario-shaped helper methods
//! (`create_room`, `join_via_welcome`, `send_and_verify`) instead of making
//! every test hand-roll message passing. `SimCluster` plays the same role
//! for `Router`s: `pump` is this crate's analogue of `TestCluster`'s manual
//! frame-threading loops, generalized into one reusable driver since FPR's
//! frames don't need the variant-specific handling MLS commits/welcomes do.

use std::time::Duration;

use fpr_proto::MacAddr;
use fpr_router::{Role, Router, RouterConfig};

use crate::{invariants::PeerTableSnapshot, sim_env::SimEnv, sim_link::SimMedium};

/// One simulated node: its `Router` plus the receive half of its `SimLink`
/// attachment, which nothing but [`SimCluster::pump`] should touch.
pub struct SimNode {
    /// The node's address on the simulated medium.
    pub mac: MacAddr,
    /// The router under test.
    pub router: Router<SimEnv, crate::sim_link::SimLink>,
    receiver: crate::sim_link::SimReceiver,
}

/// A set of [`SimNode`]s sharing one [`SimMedium`] and one [`SimEnv`]
/// (so every node's virtual clock and RNG stream are the same one,
/// matching how independent processes would each read their own real
/// clock but a single-process simulation shares state for determinism).
pub struct SimCluster {
    /// The shared virtual environment.
    pub env: SimEnv,
    /// The shared medium.
    pub medium: SimMedium,
    /// Attached nodes, in attachment order.
    pub nodes: Vec<SimNode>,
}

impl SimCluster {
    /// Builds an empty cluster over a fully-connected medium.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { env: SimEnv::with_seed(seed), medium: SimMedium::with_seed(seed), nodes: Vec::new() }
    }

    /// Builds an empty cluster restricted to the given reachability graph.
    #[must_use]
    pub fn with_topology(seed: u64, links: &[(MacAddr, MacAddr)]) -> Self {
        Self { env: SimEnv::with_seed(seed), medium: SimMedium::with_topology(seed, links), nodes: Vec::new() }
    }

    /// Attaches a new node, initialized and started in the given role.
    #[allow(clippy::expect_used)]
    pub async fn add_node(&mut self, mac: MacAddr, name: &str, role: Role) -> usize {
        let (link, receiver) = self.medium.attach(mac);
        let mut router = Router::new(self.env.clone(), link, mac);
        router
            .init(RouterConfig { name: name.to_string(), ..RouterConfig::default() })
            .await
            .expect("init from Uninitialized always succeeds");
        router.start().expect("start from Initialized always succeeds");
        router.set_mode(role).await.expect("set_mode always succeeds");
        self.nodes.push(SimNode { mac, router, receiver });
        self.nodes.len() - 1
    }

    #[allow(clippy::expect_used)]
    fn index_of(&self, mac: MacAddr) -> usize {
        self.nodes.iter().position(|n| n.mac == mac).expect("mac attached to this cluster")
    }

    /// Mutable access to a node's router by MAC.
    pub fn router(&mut self, mac: MacAddr) -> &mut Router<SimEnv, crate::sim_link::SimLink> {
        let i = self.index_of(mac);
        &mut self.nodes[i].router
    }

    /// Delivers every frame sitting in every node's receive queue to that
    /// node's `Router::on_frame`, repeating until the medium is quiescent
    /// or `max_rounds` is hit (a deadlock/infinite-forward bug would
    /// otherwise hang the test instead of failing it).
    ///
    /// Mirrors `SimDriver::process_pending`'s "drain, dispatch, repeat
    /// until nothing's left" loop.
    pub async fn pump(&mut self, max_rounds: usize) {
        for _ in 0..max_rounds {
            if self.medium.is_quiescent() {
                return;
            }
            for node in &mut self.nodes {
                let frames = node.receiver.drain();
                for (src_mac, bytes) in frames {
                    node.router.on_frame(src_mac, node.mac, 0, &bytes).await;
                }
            }
        }
    }

    /// Calls `run_loop_tick` on every node, then pumps.
    pub async fn tick_loop(&mut self, max_rounds: usize) {
        for node in &mut self.nodes {
            node.router.run_loop_tick().await;
        }
        self.pump(max_rounds).await;
    }

    /// Advances the shared virtual clock without pumping (e.g. to age a
    /// peer past a reconnect timeout).
    pub fn advance(&self, duration: Duration) {
        self.env.advance(duration);
    }

    /// Snapshots one node's peer table, for feeding to an
    /// [`crate::invariants::InvariantRegistry`].
    pub fn snapshot(&mut self, mac: MacAddr) -> PeerTableSnapshot {
        let peers = self.router(mac).list_all_peers();
        PeerTableSnapshot { mac, peers }
    }
}
