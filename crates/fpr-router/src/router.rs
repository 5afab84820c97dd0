//! The `Router`: the application-facing handle tying together the peer
//! table, handshake state machine, transmit/receive pipelines, and role
//! logic behind one `(Environment, LinkLayer)` pair.
//!
//! Grounded on the teacher's `ServerDriver`/`Client<E>` shape generalized
//! to a single struct: where the teacher dispatches `ServerEvent`s over
//! many rooms via `process_event`, `Router::on_frame` dispatches one
//! inbound frame over the (at most one, for CLIENT) peer/host relationship
//! or the whole peer table (HOST, EXTENDER). Every public method that can
//! fail returns `Result<_, RouterError>`; the receive path never does,
//! matching the propagation policy in the spec's error-handling design.

use std::time::Duration;

use fpr_core::{
    ConnectionState, Environment, LifecycleState, NetworkStats, NetworkStatsSnapshot, PeerTable,
    RouterError, SecurityState,
};
use fpr_crypto::Key128;
use fpr_proto::{ConnectInfo, MacAddr, Packet, ProtocolVersion, Visibility};

use crate::{
    config::{ClientConfig, HostConfig, RouterConfig},
    link::LinkLayer,
    receive::{DataOutcome, process_data_frame},
    role::{ForwardDecision, Role, VersionDecision, decide_forward, route_version},
    transmit::TransmitPipeline,
};

/// Protocol version this crate implements.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(1, 0, 0);

/// Polling granularity for [`Router::get_data_from_peer`]'s wait loop.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A read-only snapshot of one peer's state, returned by the introspection
/// API (`get_peer_info`, `list_all_peers`).
#[derive(Debug, Clone)]
pub struct PeerInfo {
    /// The peer's MAC address.
    pub mac: MacAddr,
    /// The peer's advertised display name.
    pub name: String,
    /// Connection lifecycle state.
    pub state: ConnectionState,
    /// Handshake progress.
    pub sec_state: SecurityState,
    /// Most recently observed RSSI.
    pub rssi: i8,
    /// Total frames received from this peer.
    pub packets_received: u64,
    /// Distance, in hops, to this peer as a mesh origin, if known.
    pub hop_count: Option<u8>,
    /// Next-hop MAC to reach this peer, if not a direct neighbor.
    pub next_hop_mac: Option<MacAddr>,
}

type RequestCallback = Box<dyn Fn(MacAddr) -> bool + Send + Sync>;
type DiscoveryCallback = Box<dyn Fn(MacAddr, &str) + Send + Sync>;
type SelectionCallback = Box<dyn Fn(MacAddr, &str) -> bool + Send + Sync>;
type ReceiveCallback = Box<dyn Fn(MacAddr, &[u8]) + Send + Sync>;

/// The Fast Peer Router application handle.
///
/// Generic over the [`Environment`] (time/randomness source) and
/// [`LinkLayer`] (the medium frames are sent/received over), so the exact
/// same logic runs against `fpr-harness`'s deterministic simulation or
/// `fpr-node`'s real OS clock and socket.
pub struct Router<E: Environment, L: LinkLayer> {
    env: E,
    link: L,

    local_mac: MacAddr,
    config: RouterConfig,
    lifecycle: LifecycleState,
    role: Role,
    visibility: Visibility,

    peers: PeerTable<E::Instant>,
    host_pwk: Option<Key128>,
    tx: TransmitPipeline,
    stats: NetworkStats,

    host_config: HostConfig,
    client_config: ClientConfig,
    request_cb: Option<RequestCallback>,
    discovery_cb: Option<DiscoveryCallback>,
    selection_cb: Option<SelectionCallback>,
    receive_cb: Option<ReceiveCallback>,
}

impl<E: Environment, L: LinkLayer> Router<E, L> {
    /// Constructs a router. It starts `Uninitialized`; call [`Router::init`]
    /// before `start`.
    #[must_use]
    pub fn new(env: E, link: L, local_mac: MacAddr) -> Self {
        Self {
            env,
            link,
            local_mac,
            config: RouterConfig::default(),
            lifecycle: LifecycleState::Uninitialized,
            role: Role::default(),
            visibility: Visibility::Public,
            peers: PeerTable::new(),
            host_pwk: None,
            tx: TransmitPipeline::new(),
            stats: NetworkStats::default(),
            host_config: HostConfig::default(),
            client_config: ClientConfig::default(),
            request_cb: None,
            discovery_cb: None,
            selection_cb: None,
            receive_cb: None,
        }
    }

    // ---- Lifecycle -----------------------------------------------------

    fn require_state(&self, expected: LifecycleState, operation: &'static str) -> Result<(), RouterError> {
        if self.lifecycle == expected {
            Ok(())
        } else {
            Err(RouterError::InvalidState { state: self.lifecycle, operation })
        }
    }

    /// Registers the broadcast peer with the link layer and stores `config`.
    pub async fn init(&mut self, config: RouterConfig) -> Result<(), RouterError> {
        self.require_state(LifecycleState::Uninitialized, "init")?;
        self.link
            .register_peer(MacAddr::BROADCAST)
            .await
            .map_err(|e| RouterError::LinkFailure(e.to_string()))?;
        self.config = config;
        self.lifecycle = LifecycleState::Initialized;
        Ok(())
    }

    /// Starts the receive pipeline and periodic tasks (driven externally by
    /// `Router::run_loop_tick`/`run_reconnect_tick` callers).
    pub fn start(&mut self) -> Result<(), RouterError> {
        if self.lifecycle != LifecycleState::Initialized && self.lifecycle != LifecycleState::Paused {
            return Err(RouterError::InvalidState { state: self.lifecycle, operation: "start" });
        }
        self.lifecycle = LifecycleState::Started;
        Ok(())
    }

    /// Suspends `send` and the receive pipeline without losing peer state.
    pub fn pause(&mut self) -> Result<(), RouterError> {
        self.require_state(LifecycleState::Started, "pause")?;
        self.lifecycle = LifecycleState::Paused;
        Ok(())
    }

    /// Resumes after [`Router::pause`].
    pub fn resume(&mut self) -> Result<(), RouterError> {
        self.require_state(LifecycleState::Paused, "resume")?;
        self.lifecycle = LifecycleState::Started;
        Ok(())
    }

    /// Stops periodic tasks; peer state is preserved until `deinit`.
    pub fn stop(&mut self) -> Result<(), RouterError> {
        if self.lifecycle != LifecycleState::Started && self.lifecycle != LifecycleState::Paused {
            return Err(RouterError::InvalidState { state: self.lifecycle, operation: "stop" });
        }
        self.lifecycle = LifecycleState::Stopped;
        Ok(())
    }

    /// Tears down all peer state and unregisters the broadcast peer.
    pub async fn deinit(&mut self) -> Result<(), RouterError> {
        self.require_state(LifecycleState::Stopped, "deinit")?;
        self.peers.clear_all();
        let _ = self.link.unregister_peer(MacAddr::BROADCAST).await;
        self.lifecycle = LifecycleState::Uninitialized;
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn get_state(&self) -> LifecycleState {
        self.lifecycle
    }

    // ---- Role -----------------------------------------------------------

    /// Switches role, re-registering the broadcast-peer entry and, when
    /// entering HOST, generating a fresh PWK for this session.
    pub async fn set_mode(&mut self, role: Role) -> Result<(), RouterError> {
        let _ = self.link.unregister_peer(MacAddr::BROADCAST).await;
        self.link
            .register_peer(MacAddr::BROADCAST)
            .await
            .map_err(|e| RouterError::LinkFailure(e.to_string()))?;
        if role == Role::Host {
            self.host_pwk = Some(Key128::generate(|buf| self.env.random_bytes(buf)));
        }
        self.role = role;
        Ok(())
    }

    /// Current role.
    #[must_use]
    pub fn get_mode(&self) -> Role {
        self.role
    }

    // ---- Host control -----------------------------------------------------

    /// Replaces the HOST-role configuration.
    pub fn host_set_config(&mut self, config: HostConfig, request_cb: Option<RequestCallback>) {
        self.host_config = config;
        self.request_cb = request_cb;
    }

    /// Approves a pending client, sending handshake step 1.
    pub async fn approve(&mut self, mac: MacAddr) -> Result<(), RouterError> {
        let pwk = self.host_pwk.ok_or_else(|| RouterError::InvalidArgument("not in host role".into()))?;
        let peer = self.peers.lookup_mut(mac).ok_or(RouterError::NotFound { mac })?;
        if peer.sec_state() != SecurityState::None {
            return Ok(());
        }
        let actions = peer.host_send_step1(mac, pwk);
        drop(peer);
        self.execute_handshake_actions(mac, actions).await;
        Ok(())
    }

    /// Rejects a pending client; it stays un-connected until re-approved.
    pub fn reject(&mut self, mac: MacAddr) -> Result<(), RouterError> {
        let peer = self.peers.lookup_mut(mac).ok_or(RouterError::NotFound { mac })?;
        peer.set_state(ConnectionState::Rejected);
        Ok(())
    }

    /// Blocks a peer: further discovery/handshake frames from it are
    /// ignored until [`Router::unblock`].
    pub fn block(&mut self, mac: MacAddr) -> Result<(), RouterError> {
        let peer = self.peers.lookup_mut(mac).ok_or(RouterError::NotFound { mac })?;
        peer.wipe_keys();
        peer.set_state(ConnectionState::Blocked);
        Ok(())
    }

    /// Unblocks a previously [`Router::block`]ed peer.
    pub fn unblock(&mut self, mac: MacAddr) -> Result<(), RouterError> {
        let peer = self.peers.lookup_mut(mac).ok_or(RouterError::NotFound { mac })?;
        if peer.state() == ConnectionState::Blocked {
            peer.set_state(ConnectionState::Discovered);
        }
        Ok(())
    }

    /// Disconnects a connected peer, demoting it back to `Discovered`.
    pub fn disconnect_peer(&mut self, mac: MacAddr) -> Result<(), RouterError> {
        let peer = self.peers.lookup_mut(mac).ok_or(RouterError::NotFound { mac })?;
        peer.wipe_keys();
        peer.reset_sequence();
        peer.set_state(ConnectionState::Discovered);
        Ok(())
    }

    /// Number of peers currently `Connected`.
    #[must_use]
    pub fn get_connected_count(&self) -> usize {
        self.peers.connected_count()
    }

    // ---- Client control ----------------------------------------------------

    /// Replaces the CLIENT-role configuration.
    pub fn client_set_config(
        &mut self,
        config: ClientConfig,
        discovery_cb: Option<DiscoveryCallback>,
        selection_cb: Option<SelectionCallback>,
    ) {
        self.client_config = config;
        self.discovery_cb = discovery_cb;
        self.selection_cb = selection_cb;
    }

    /// Waits passively for `duration`, then returns whatever hosts were
    /// discovered during that window.
    pub async fn scan_for_hosts(&mut self, duration: Duration) -> Vec<PeerInfo> {
        self.env.sleep(duration).await;
        self.list_discovered_hosts()
    }

    /// Every peer currently `Discovered` (not yet connected).
    #[must_use]
    pub fn list_discovered_hosts(&self) -> Vec<PeerInfo> {
        let mut out = Vec::new();
        self.peers.for_each(|mac, peer| {
            if peer.state() == ConnectionState::Discovered {
                out.push(peer_info(mac, peer));
            }
        });
        out
    }

    /// Explicitly initiates a handshake with `mac`, waiting up to `timeout`
    /// for it to complete.
    pub async fn connect_to_host(&mut self, mac: MacAddr, timeout: Duration) -> Result<(), RouterError> {
        if self.peers.lookup(mac).is_none() {
            let now = self.env.now();
            self.peers.add(mac, "", now);
        }
        self.client_initiate_handshake(mac).await;

        let start = self.env.now();
        loop {
            if let Some(peer) = self.peers.lookup(mac)
                && peer.state() == ConnectionState::Connected
            {
                return Ok(());
            }
            if self.env.now() - start >= timeout {
                return Err(RouterError::Timeout { elapsed: timeout });
            }
            self.env.sleep(POLL_INTERVAL).await;
        }
    }

    /// Disconnects from the currently connected host, if any.
    pub fn disconnect(&mut self) {
        if let Some(mac) = self.peers.connected_peer() {
            let _ = self.disconnect_peer(mac);
        }
    }

    /// True if currently connected to a host.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.peers.connected_peer().is_some()
    }

    /// Info about the currently connected host, if any.
    #[must_use]
    pub fn get_host_info(&self) -> Option<PeerInfo> {
        let mac = self.peers.connected_peer()?;
        self.peers.lookup(mac).map(|peer| peer_info(mac, peer))
    }

    // ---- Data -------------------------------------------------------------

    /// Sends `bytes` to a single peer.
    pub async fn send_to_peer(&mut self, mac: MacAddr, bytes: &[u8], id: i32) -> Result<(), RouterError> {
        self.send_with_options(mac, bytes, id, None).await
    }

    /// Sends `bytes` to every peer.
    pub async fn broadcast(&mut self, bytes: &[u8], id: i32) -> Result<(), RouterError> {
        self.send_with_options(MacAddr::BROADCAST, bytes, id, None).await
    }

    /// Sends `bytes` to `dest`, fragmenting as needed, with an optional
    /// max-hops override.
    pub async fn send_with_options(
        &mut self,
        dest: MacAddr,
        bytes: &[u8],
        id: i32,
        max_hops: Option<u8>,
    ) -> Result<(), RouterError> {
        if self.lifecycle != LifecycleState::Started {
            return Err(RouterError::InvalidState { state: self.lifecycle, operation: "send" });
        }
        let packets = self.tx.build_message(self.local_mac, dest, id, max_hops, PROTOCOL_VERSION, bytes)?;
        let last = packets.len().saturating_sub(1);
        for (index, packet) in packets.iter().enumerate() {
            let encoded = packet.encode();
            if let Err(e) = self.link.send(dest, &encoded).await {
                self.stats.record_send_failure();
                return Err(RouterError::LinkFailure(e.to_string()));
            }
            self.stats.record_packet_sent();
            if index != last {
                self.env.sleep(crate::config::INTER_FRAGMENT_PAUSE).await;
            }
        }
        Ok(())
    }

    /// Waits up to `timeout` for the next complete message from `mac`.
    ///
    /// Backed by `tokio::time::timeout` wrapping a receive on the peer's
    /// mpsc queue, rather than polling: the wait resolves the instant a
    /// message is enqueued instead of on the next poll tick.
    pub async fn get_data_from_peer(&mut self, mac: MacAddr, timeout: Duration) -> Result<Vec<u8>, RouterError> {
        let Some(peer) = self.peers.lookup_mut(mac) else {
            return Err(RouterError::NotFound { mac });
        };
        match tokio::time::timeout(timeout, peer.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) | Err(_) => Err(RouterError::Timeout { elapsed: timeout }),
        }
    }

    /// Registers a callback invoked with `(src, payload)` for every message
    /// delivered to the application. Runs from the receive context; must
    /// not block.
    pub fn register_receive_callback(&mut self, callback: ReceiveCallback) {
        self.receive_cb = Some(callback);
    }

    // ---- Introspection ------------------------------------------------------

    /// Snapshot of one known peer.
    pub fn get_peer_info(&self, mac: MacAddr) -> Result<PeerInfo, RouterError> {
        self.peers.lookup(mac).map(|peer| peer_info(mac, peer)).ok_or(RouterError::NotFound { mac })
    }

    /// Snapshot of every known peer.
    #[must_use]
    pub fn list_all_peers(&self) -> Vec<PeerInfo> {
        let mut out = Vec::new();
        self.peers.for_each(|mac, peer| out.push(peer_info(mac, peer)));
        out
    }

    /// Point-in-time statistics snapshot.
    #[must_use]
    pub fn get_network_stats(&self) -> NetworkStatsSnapshot {
        self.stats.snapshot()
    }

    /// Zeroes every statistics counter.
    pub fn reset_network_stats(&self) {
        self.stats.reset();
    }

    /// Evicts peers not heard from in longer than `timeout`, deregistering
    /// them from the link layer.
    pub async fn cleanup_stale_routes(&mut self, timeout: Duration) -> Vec<MacAddr> {
        let now = self.env.now();
        let evicted = self.peers.cleanup_stale(now, timeout);
        for mac in &evicted {
            let _ = self.link.unregister_peer(*mac).await;
        }
        evicted
    }

    /// Logs the current route table at `info` level.
    pub fn print_route_table(&self) {
        self.peers.for_each(|mac, peer| {
            tracing::info!(
                %mac,
                name = peer.name(),
                hop_count = ?peer.hop_count(),
                next_hop = ?peer.next_hop_mac(),
                "route table entry"
            );
        });
    }

    /// Protocol version this crate implements.
    #[must_use]
    pub fn get_protocol_version() -> ProtocolVersion {
        PROTOCOL_VERSION
    }

    /// Protocol version, formatted `major.minor.patch`.
    #[must_use]
    pub fn get_protocol_version_string() -> String {
        PROTOCOL_VERSION.to_string()
    }

    // ---- Receive pipeline (§5.E) -------------------------------------------

    /// Entry point for an inbound frame from the link layer.
    ///
    /// Never returns an error to the caller: every failure mode here is
    /// counted in statistics rather than surfaced, per the propagation
    /// policy (receive-path failures are never surfaced to the
    /// application).
    pub async fn on_frame(&mut self, src_mac: MacAddr, dst_mac: MacAddr, rssi: i8, bytes: &[u8]) {
        if self.lifecycle == LifecycleState::Paused || self.lifecycle != LifecycleState::Started {
            return;
        }

        let Ok(packet) = Packet::decode(bytes) else {
            self.stats.record_packet_dropped();
            return;
        };

        let version_decision = route_version(PROTOCOL_VERSION, packet.version());
        match version_decision {
            VersionDecision::Incompatible => {
                self.stats.record_version_mismatch();
                self.stats.record_packet_dropped();
                return;
            },
            VersionDecision::Accept | VersionDecision::Legacy | VersionDecision::BestEffort => {},
        }
        self.stats.record_packet_received();

        let now = self.env.now();
        if let Some(peer) = self.peers.lookup_mut(src_mac) {
            peer.touch(now, rssi);
        }

        if self.role == Role::Extender {
            if !self.route_and_forward(src_mac, &packet, rssi, now).await {
                return;
            }
        } else if packet.dest_mac() != self.local_mac && !packet.dest_mac().is_broadcast() {
            return;
        }

        if packet.is_control() {
            self.handle_control(src_mac, packet.dest_mac(), &packet).await;
        } else {
            let is_legacy = version_decision == VersionDecision::Legacy;
            self.handle_data(src_mac, &packet, is_legacy);
        }

        let _ = dst_mac; // accepted for interface parity with the link-layer callback shape
    }

    /// Runs EXTENDER route learning and forwarding for one inbound frame.
    ///
    /// Returns `true` iff the frame should also be delivered locally
    /// (`DeliverLocal`/`DeliverAndForward`'s local-delivery half); `false`
    /// for `ForwardOnly`/`Drop`, which must not fall through to
    /// `handle_control`/`handle_data` — those would otherwise double-count
    /// the frame as dropped on top of the forward's own accounting.
    async fn route_and_forward(&mut self, src_mac: MacAddr, packet: &Packet, rssi: i8, now: E::Instant) -> bool {
        let origin = packet.origin_mac();
        if origin != self.local_mac {
            let peer = self.peers.add(origin, "", now);
            peer.touch(now, rssi);
            peer.learn_route(src_mac, packet.hop_count().saturating_add(1));
        }

        let route = self.peers.route_to(packet.dest_mac());
        let decision = decide_forward(
            self.local_mac,
            packet.dest_mac(),
            origin,
            packet.hop_count(),
            packet.max_hops(),
            route,
        );
        match decision {
            ForwardDecision::Drop => {
                self.stats.record_packet_dropped();
                false
            },
            ForwardDecision::DeliverLocal => true,
            ForwardDecision::DeliverAndForward => {
                self.forward(packet, MacAddr::BROADCAST).await;
                true
            },
            ForwardDecision::ForwardOnly { next_hop } => {
                self.forward(packet, next_hop).await;
                false
            },
        }
    }

    async fn forward(&mut self, packet: &Packet, next_hop: MacAddr) {
        let mut forwarded = *packet;
        forwarded.set_hop_count(packet.hop_count().saturating_add(1));
        let encoded = forwarded.encode();
        if self.link.send(next_hop, &encoded).await.is_ok() {
            self.stats.record_packet_forwarded();
        } else {
            self.stats.record_send_failure();
        }
    }

    async fn handle_control(&mut self, src_mac: MacAddr, dest_mac: MacAddr, packet: &Packet) {
        let Ok(info) = ConnectInfo::from_payload(packet.raw_payload()) else {
            self.stats.record_packet_dropped();
            return;
        };
        match self.role {
            Role::Client => self.client_handle_control(src_mac, dest_mac, &info).await,
            Role::Host => self.host_handle_control(src_mac, &info).await,
            Role::Extender => {},
        }
    }

    fn handle_data(&mut self, src_mac: MacAddr, packet: &Packet, is_legacy: bool) {
        let Some(peer) = self.peers.lookup_mut(src_mac) else {
            self.stats.record_packet_dropped();
            return;
        };
        match process_data_frame(peer, packet, is_legacy) {
            DataOutcome::Enqueued => {
                if let Some(callback) = self.receive_cb.as_ref()
                    && let Some(peer) = self.peers.lookup_mut(src_mac)
                    && let Some(message) = peer.dequeue()
                {
                    callback(src_mac, &message);
                }
            },
            DataOutcome::NotConnected | DataOutcome::OrphanFragment | DataOutcome::QueueFull => {
                self.stats.record_packet_dropped();
            },
            DataOutcome::Replay => self.stats.record_replay_blocked(),
            DataOutcome::Continuing => {},
        }
    }

    // ---- Role logic: CLIENT -------------------------------------------------

    async fn client_initiate_handshake(&mut self, host_mac: MacAddr) {
        let info = ConnectInfo::new(&self.config.name, self.local_mac, self.visibility, None, None);
        let packet = TransmitPipeline::build_control(self.local_mac, host_mac, PROTOCOL_VERSION, info);
        let encoded = packet.encode();
        if self.link.send(host_mac, &encoded).await.is_ok() {
            self.stats.record_packet_sent();
        } else {
            self.stats.record_send_failure();
        }
    }

    async fn client_handle_control(&mut self, src_mac: MacAddr, dest_mac: MacAddr, info: &ConnectInfo) {
        if dest_mac.is_broadcast() {
            self.client_handle_discovery_broadcast(src_mac, info).await;
            return;
        }

        let Some(peer) = self.peers.lookup_mut(src_mac) else { return };
        if peer.state() == ConnectionState::Blocked {
            return;
        }

        match (info.pwk(), info.lwk()) {
            (Some(pwk), None) => self.client_receive_step1(src_mac, pwk).await,
            (Some(pwk), Some(lwk)) => self.client_receive_step3(src_mac, pwk, lwk),
            _ => {},
        }
    }

    async fn client_handle_discovery_broadcast(&mut self, src_mac: MacAddr, info: &ConnectInfo) {
        let name = info.name().unwrap_or("").to_string();

        if let Some(peer) = self.peers.lookup(src_mac) {
            if peer.state() != ConnectionState::Connected && peer.sec_state() == SecurityState::None {
                self.client_initiate_handshake(src_mac).await;
            }
            return;
        }

        if let Some(cb) = &self.discovery_cb {
            cb(src_mac, &name);
        }
        if self.peers.connected_peer().is_some() {
            return;
        }

        let should_connect = match self.client_config.mode {
            crate::config::ConnectionMode::Auto => true,
            crate::config::ConnectionMode::Manual => {
                self.selection_cb.as_ref().is_some_and(|cb| cb(src_mac, &name))
            },
        };

        let now = self.env.now();
        self.peers.add(src_mac, name, now);
        if should_connect {
            self.client_initiate_handshake(src_mac).await;
        }
    }

    async fn client_receive_step1(&mut self, src_mac: MacAddr, host_pwk: Key128) {
        let Some(peer) = self.peers.lookup_mut(src_mac) else { return };
        let actions = peer.client_handle_step1(host_pwk);
        let should_send_step2 =
            actions.is_empty() || actions.iter().any(|a| matches!(a, fpr_core::HandshakeAction::Restarted));
        if should_send_step2 {
            self.client_send_step2(src_mac).await;
        }
    }

    async fn client_send_step2(&mut self, src_mac: MacAddr) {
        let env = self.env.clone();
        let Some(peer) = self.peers.lookup_mut(src_mac) else { return };
        let actions = peer.client_send_step2(src_mac, || Key128::generate(|buf| env.random_bytes(buf)));
        self.execute_handshake_actions(src_mac, actions).await;
    }

    fn client_receive_step3(&mut self, src_mac: MacAddr, pwk: Key128, lwk: Key128) {
        let Some(peer) = self.peers.lookup_mut(src_mac) else { return };
        let actions = peer.client_handle_step3(pwk, lwk);
        for action in actions {
            match action {
                fpr_core::HandshakeAction::Established => {
                    tracing::info!(mac = %src_mac, "handshake established");
                },
                fpr_core::HandshakeAction::SecurityFailure => {
                    self.stats.record_handshake_failure();
                },
                _ => {},
            }
        }
    }

    // ---- Role logic: HOST ---------------------------------------------------

    async fn host_handle_control(&mut self, src_mac: MacAddr, info: &ConnectInfo) {
        if let Some(peer) = self.peers.lookup(src_mac)
            && peer.state() == ConnectionState::Blocked
        {
            return;
        }

        match (info.pwk(), info.lwk()) {
            (None, None) => self.host_handle_discovery(src_mac, info).await,
            (Some(pwk), Some(lwk)) => self.host_handle_step2(src_mac, pwk, lwk).await,
            _ => {},
        }
    }

    async fn host_handle_discovery(&mut self, src_mac: MacAddr, info: &ConnectInfo) {
        let name = info.name().unwrap_or("").to_string();
        if self.peers.lookup(src_mac).is_none() {
            let now = self.env.now();
            self.peers.add(src_mac, name, now);
        }
        let Some(peer) = self.peers.lookup(src_mac) else { return };
        if peer.sec_state() != SecurityState::None {
            return;
        }

        let has_slot = self.peers.connected_count() < self.host_config.max_peers;
        let approved = match self.host_config.mode {
            crate::config::ConnectionMode::Auto => has_slot,
            crate::config::ConnectionMode::Manual => {
                has_slot && self.request_cb.as_ref().is_some_and(|cb| cb(src_mac))
            },
        };
        if approved {
            let _ = self.approve(src_mac).await;
        }
    }

    async fn host_handle_step2(&mut self, src_mac: MacAddr, echoed_pwk: Key128, client_lwk: Key128) {
        let Some(host_pwk) = self.host_pwk else { return };
        let Some(peer) = self.peers.lookup_mut(src_mac) else { return };
        let actions = peer.host_handle_step2(src_mac, host_pwk, echoed_pwk, client_lwk);
        self.execute_handshake_actions(src_mac, actions).await;
    }

    async fn execute_handshake_actions(&mut self, dest: MacAddr, actions: Vec<fpr_core::HandshakeAction>) {
        for action in actions {
            match action {
                fpr_core::HandshakeAction::SendStep { dest, pwk, lwk } => {
                    let info = ConnectInfo::new(
                        &self.config.name,
                        self.local_mac,
                        self.visibility,
                        pwk.map(Key128::to_bytes),
                        lwk.map(Key128::to_bytes),
                    );
                    let packet =
                        TransmitPipeline::build_control(self.local_mac, dest, PROTOCOL_VERSION, info);
                    let encoded = packet.encode();
                    if self.link.send(dest, &encoded).await.is_ok() {
                        self.stats.record_packet_sent();
                    } else {
                        self.stats.record_send_failure();
                    }
                },
                fpr_core::HandshakeAction::Established => {
                    tracing::info!(mac = %dest, "handshake established");
                },
                fpr_core::HandshakeAction::SecurityFailure => {
                    self.stats.record_handshake_failure();
                },
                fpr_core::HandshakeAction::Restarted | fpr_core::HandshakeAction::Dropped { .. } => {},
            }
        }
    }

    // ---- Periodic tasks (§7) -------------------------------------------------

    /// One tick of the `loop` task: HOST broadcasts device-info. No-op for
    /// other roles.
    pub async fn run_loop_tick(&mut self) {
        if self.role != Role::Host || self.lifecycle != LifecycleState::Started {
            return;
        }
        let info = ConnectInfo::new(&self.config.name, self.local_mac, self.visibility, None, None);
        let packet =
            TransmitPipeline::build_control(self.local_mac, MacAddr::BROADCAST, PROTOCOL_VERSION, info);
        let encoded = packet.encode();
        if self.link.send(MacAddr::BROADCAST, &encoded).await.is_ok() {
            self.stats.record_packet_sent();
        } else {
            self.stats.record_send_failure();
        }
    }

    /// One tick of the `reconnect` task: demotes timed-out CONNECTED peers
    /// and, for CLIENT, resends device-info to the current host.
    pub async fn run_reconnect_tick(&mut self) {
        if self.lifecycle != LifecycleState::Started {
            return;
        }
        let now = self.env.now();
        let timeout = self.config.power_mode.scale(self.config.reconnect_timeout);
        let stale: Vec<MacAddr> = {
            let mut stale = Vec::new();
            self.peers.for_each(|mac, peer| {
                if peer.state() == ConnectionState::Connected && now - peer.last_seen() > timeout {
                    stale.push(mac);
                }
            });
            stale
        };
        for mac in stale {
            let _ = self.disconnect_peer(mac);
        }

        if self.role == Role::Client
            && let Some(mac) = self.peers.connected_peer()
        {
            self.client_initiate_handshake(mac).await;
        }
    }

    /// The configured interval for the `loop` task, scaled by power mode.
    #[must_use]
    pub fn broadcast_interval(&self) -> Duration {
        self.config.power_mode.scale(self.config.broadcast_interval)
    }

    /// The configured interval for the `reconnect` task, scaled by power
    /// mode.
    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        self.config.power_mode.scale(self.config.reconnect_interval)
    }
}

fn peer_info<I: Copy>(mac: MacAddr, peer: &fpr_core::PeerRecord<I>) -> PeerInfo {
    PeerInfo {
        mac,
        name: peer.name().to_string(),
        state: peer.state(),
        sec_state: peer.sec_state(),
        rssi: peer.rssi(),
        packets_received: peer.packets_received(),
        hop_count: peer.hop_count(),
        next_hop_mac: peer.next_hop_mac(),
    }
}
