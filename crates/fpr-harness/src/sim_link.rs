//! `SimMedium`: an in-process stand-in for the reference radio medium.
//!
//! Generalizes `lockframe-harness/src/cluster.rs`'s `TestCluster` (which
//! wires several `Client<SimEnv>`s together through an in-memory
//! `GroupInfo` store instead of a real server) to FPR's link-layer
//! boundary: instead of exchanging structured messages directly,
//! `SimMedium` moves raw encoded frames between attached [`SimLink`]
//! handles exactly the way `fpr-node`'s `UdpBroadcastLink` moves them over
//! a socket — every transmission reaches every node the sender can
//! currently reach, regardless of the frame's own destination field, and
//! it is up to each receiver's `Router::on_frame` to decide what to do
//! with it. `register_peer`/`unregister_peer` stay no-ops, as they are on
//! `UdpBroadcastLink`, for the same reason: there is no MAC-filtering
//! radio hardware to program.
//!
//! Reachability defaults to a full mesh (every attached node hears every
//! other); [`SimMedium::with_topology`] restricts it to an explicit set of
//! links, which is how the extender-relay scenario (spec concrete scenario
//! 5) models "only `A<->X` and `X<->B` are in range".

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use fpr_proto::MacAddr;
use fpr_router::{LinkError, LinkLayer};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

struct Inner {
    queues: HashMap<MacAddr, VecDeque<(MacAddr, Vec<u8>)>>,
    neighbors: Option<HashMap<MacAddr, HashSet<MacAddr>>>,
    rng: ChaCha8Rng,
    drop_probability: f64,
}

impl Inner {
    fn reachable_from(&self, mac: MacAddr) -> Vec<MacAddr> {
        match &self.neighbors {
            None => self.queues.keys().copied().filter(|&m| m != mac).collect(),
            Some(graph) => graph.get(&mac).map(|set| set.iter().copied().collect()).unwrap_or_default(),
        }
    }
}

/// A shared in-process broadcast medium. Cheap to clone: every clone is a
/// handle onto the same queues.
#[derive(Clone)]
pub struct SimMedium {
    inner: Arc<Mutex<Inner>>,
}

impl SimMedium {
    /// A fully-connected medium: every attached node hears every other.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                queues: HashMap::new(),
                neighbors: None,
                rng: ChaCha8Rng::seed_from_u64(seed),
                drop_probability: 0.0,
            })),
        }
    }

    /// A medium restricted to the given undirected `links`; two nodes hear
    /// each other only if an explicit link connects them.
    #[must_use]
    pub fn with_topology(seed: u64, links: &[(MacAddr, MacAddr)]) -> Self {
        let mut graph: HashMap<MacAddr, HashSet<MacAddr>> = HashMap::new();
        for &(a, b) in links {
            graph.entry(a).or_default().insert(b);
            graph.entry(b).or_default().insert(a);
        }
        Self {
            inner: Arc::new(Mutex::new(Inner {
                queues: HashMap::new(),
                neighbors: Some(graph),
                rng: ChaCha8Rng::seed_from_u64(seed),
                drop_probability: 0.0,
            })),
        }
    }

    /// Sets the independent per-transmission drop probability (0.0-1.0)
    /// applied at every receiving neighbor, for chaos-style testing.
    pub fn set_drop_probability(&self, probability: f64) {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).drop_probability = probability;
    }

    /// Attaches a new node at `mac`, returning its send half ([`SimLink`])
    /// and receive half ([`SimReceiver`]).
    pub fn attach(&self, mac: MacAddr) -> (SimLink, SimReceiver) {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).queues.entry(mac).or_default();
        (SimLink { mac, medium: self.clone() }, SimReceiver { mac, medium: self.clone() })
    }

    fn send(&self, src: MacAddr, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let targets = inner.reachable_from(src);
        for target in targets {
            let drop_it = inner.drop_probability > 0.0 && inner.rng.gen_bool(inner.drop_probability);
            if drop_it {
                continue;
            }
            if let Some(queue) = inner.queues.get_mut(&target) {
                queue.push_back((src, bytes.to_vec()));
            }
        }
    }

    fn drain(&self, mac: MacAddr) -> Vec<(MacAddr, Vec<u8>)> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.queues.get_mut(&mac).map(std::mem::take).map(Vec::from).unwrap_or_default()
    }

    /// True once every attached node's queue is empty.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .queues
            .values()
            .all(VecDeque::is_empty)
    }
}

/// The send/registration half of a [`SimMedium`] attachment, implementing
/// [`LinkLayer`].
pub struct SimLink {
    mac: MacAddr,
    medium: SimMedium,
}

/// The receive half of a [`SimMedium`] attachment.
pub struct SimReceiver {
    mac: MacAddr,
    medium: SimMedium,
}

impl SimReceiver {
    /// Drains every frame currently queued for this node, as
    /// `(sender_mac, bytes)` pairs in arrival order.
    #[must_use]
    pub fn drain(&self) -> Vec<(MacAddr, Vec<u8>)> {
        self.medium.drain(self.mac)
    }
}

#[async_trait]
impl LinkLayer for SimLink {
    async fn register_peer(&self, mac: MacAddr) -> Result<(), LinkError> {
        tracing::debug!(%mac, "register_peer (no-op on the simulated medium)");
        Ok(())
    }

    async fn unregister_peer(&self, mac: MacAddr) -> Result<(), LinkError> {
        tracing::debug!(%mac, "unregister_peer (no-op on the simulated medium)");
        Ok(())
    }

    async fn send(&self, _dest: MacAddr, bytes: &[u8]) -> Result<(), LinkError> {
        self.medium.send(self.mac, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([2, 0, 0, 0, 0, n])
    }

    #[tokio::test]
    async fn full_mesh_delivers_to_every_other_node() {
        let medium = SimMedium::with_seed(1);
        let (link_a, _rx_a) = medium.attach(mac(1));
        let (_link_b, rx_b) = medium.attach(mac(2));
        let (_link_c, rx_c) = medium.attach(mac(3));

        link_a.send(mac(2), b"hello").await.expect("send succeeds");

        assert_eq!(rx_b.drain(), vec![(mac(1), b"hello".to_vec())]);
        assert_eq!(rx_c.drain(), vec![(mac(1), b"hello".to_vec())]);
    }

    #[tokio::test]
    async fn topology_restricts_reachability() {
        let medium = SimMedium::with_topology(1, &[(mac(1), mac(2))]);
        let (link_a, _rx_a) = medium.attach(mac(1));
        let (_link_b, rx_b) = medium.attach(mac(2));
        let (_link_c, rx_c) = medium.attach(mac(3));

        link_a.send(mac(2), b"hi").await.expect("send succeeds");

        assert_eq!(rx_b.drain(), vec![(mac(1), b"hi".to_vec())]);
        assert!(rx_c.drain().is_empty());
    }

    #[tokio::test]
    async fn drop_probability_of_one_delivers_nothing() {
        let medium = SimMedium::with_seed(1);
        medium.set_drop_probability(1.0);
        let (link_a, _rx_a) = medium.attach(mac(1));
        let (_link_b, rx_b) = medium.attach(mac(2));

        link_a.send(mac(2), b"hi").await.expect("send succeeds");

        assert!(rx_b.drain().is_empty());
        assert!(medium.is_quiescent());
    }
}
