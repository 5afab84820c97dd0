//! Per-peer record and the peer table.
//!
//! Grounded on the teacher's `ConnectionRegistry`: a `HashMap` keyed by
//! identity with bidirectional bookkeeping for routing (the `next_hop_mac`
//! lookups play the role of the registry's `session_id_for_user` reverse
//! index) and an enforced single-host invariant for clients mirroring the
//! registry's "one session per user" rule.

use std::{ops::Sub, time::Duration};

use fpr_crypto::Key128;
use fpr_proto::MacAddr;
use tokio::sync::mpsc;
use zeroize::Zeroize;

/// Default capacity of a peer's inbound message queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Connection lifecycle of a peer, independent of handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Seen (via broadcast or manual add) but no handshake has completed.
    Discovered,
    /// A handshake is in progress.
    Pending,
    /// The four-message handshake completed; `sec_state == Established`.
    Connected,
    /// A connection attempt was explicitly rejected (host-side MANUAL).
    Rejected,
    /// Explicitly blocked by the host; discovery/handshake frames from this
    /// peer are ignored until `unblock`.
    Blocked,
}

/// Progress of the four-message handshake for one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityState {
    /// No handshake material exchanged yet.
    None,
    /// Host sent its PWK (step 1 from the host's point of view).
    PwkSent,
    /// Client received a PWK (step 1 from the client's point of view).
    PwkReceived,
    /// Host sent PWK+LWK echo (step 3); client sent PWK+LWK (step 2).
    LwkSent,
    /// Client received its own LWK echoed back and verified it.
    LwkReceived,
    /// Both keys verified by both sides; `ConnectionState::Connected`.
    Established,
}

/// How a peer's inbound queue behaves when frames arrive faster than they
/// are drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    /// Frames queue up to capacity; excess frames are dropped.
    #[default]
    Normal,
    /// Only the most recently completed message is kept; enqueueing a new
    /// one drains everything queued before it. Fragmented messages are
    /// rejected outright in this mode (reassembly state would otherwise be
    /// discarded mid-message by the very policy meant to keep only the
    /// latest).
    LatestOnly,
}

/// Per-peer state: identity, handshake progress, replay/reassembly state,
/// inbound queue, and routing metadata.
///
/// Generic over the environment's `Instant` type so it can be driven by a
/// virtual clock in `fpr-harness` or `std::time::Instant` in `fpr-node`.
pub struct PeerRecord<I> {
    name: String,
    last_seen: I,
    rssi: i8,
    packets_received: u64,

    conn_state: ConnectionState,
    sec_state: SecurityState,
    pwk: Option<Key128>,
    lwk: Option<Key128>,
    pwk_valid: bool,
    lwk_valid: bool,

    last_seq_num: u32,
    receiving_fragmented: bool,
    fragment_seq_num: u32,
    reassembly_buf: Vec<u8>,

    queue_tx: mpsc::Sender<Vec<u8>>,
    queue_rx: mpsc::Receiver<Vec<u8>>,
    queue_mode: QueueMode,

    hop_count: Option<u8>,
    next_hop_mac: Option<MacAddr>,
}

impl<I: Copy> PeerRecord<I> {
    /// Creates a freshly discovered peer with no handshake progress.
    #[must_use]
    pub fn new(name: impl Into<String>, now: I) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);
        Self {
            name: name.into(),
            last_seen: now,
            rssi: 0,
            packets_received: 0,
            conn_state: ConnectionState::Discovered,
            sec_state: SecurityState::None,
            pwk: None,
            lwk: None,
            pwk_valid: false,
            lwk_valid: false,
            last_seq_num: 0,
            receiving_fragmented: false,
            fragment_seq_num: 0,
            reassembly_buf: Vec::new(),
            queue_tx,
            queue_rx,
            queue_mode: QueueMode::Normal,
            hop_count: None,
            next_hop_mac: None,
        }
    }

    /// Display name advertised by the peer.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Timestamp of the last frame received from this peer.
    #[must_use]
    pub fn last_seen(&self) -> I {
        self.last_seen
    }

    /// Most recently observed RSSI.
    #[must_use]
    pub fn rssi(&self) -> i8 {
        self.rssi
    }

    /// Total frames received from this peer (any kind).
    #[must_use]
    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    /// Records link-layer metadata for an inbound frame.
    pub fn touch(&mut self, now: I, rssi: i8) {
        self.last_seen = now;
        self.rssi = rssi;
        self.packets_received += 1;
    }

    /// Connection lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.conn_state
    }

    /// Sets the connection lifecycle state.
    pub fn set_state(&mut self, state: ConnectionState) {
        self.conn_state = state;
    }

    /// Handshake progress.
    #[must_use]
    pub fn sec_state(&self) -> SecurityState {
        self.sec_state
    }

    /// Sets the handshake progress.
    pub fn set_sec_state(&mut self, state: SecurityState) {
        self.sec_state = state;
    }

    /// The peer's PWK, if stored.
    #[must_use]
    pub fn pwk(&self) -> Option<Key128> {
        self.pwk
    }

    /// The peer's LWK, if stored.
    #[must_use]
    pub fn lwk(&self) -> Option<Key128> {
        self.lwk
    }

    /// True once the PWK has been verified.
    #[must_use]
    pub fn pwk_valid(&self) -> bool {
        self.pwk_valid
    }

    /// True once the LWK has been verified.
    #[must_use]
    pub fn lwk_valid(&self) -> bool {
        self.lwk_valid
    }

    /// Stores the peer's PWK and marks it (not yet necessarily verified).
    pub fn set_pwk(&mut self, pwk: Key128, valid: bool) {
        self.pwk = Some(pwk);
        self.pwk_valid = valid;
    }

    /// Stores the peer's LWK and marks it (not yet necessarily verified).
    pub fn set_lwk(&mut self, lwk: Key128, valid: bool) {
        self.lwk = Some(lwk);
        self.lwk_valid = valid;
    }

    /// Zeroizes and clears all handshake key material and resets security
    /// state to `None`. Used for handshake restart (PWK arriving while
    /// already past `LwkSent`) and for full peer teardown.
    pub fn wipe_keys(&mut self) {
        if let Some(mut pwk) = self.pwk.take() {
            pwk.zeroize();
        }
        if let Some(mut lwk) = self.lwk.take() {
            lwk.zeroize();
        }
        self.pwk_valid = false;
        self.lwk_valid = false;
        self.sec_state = SecurityState::None;
    }

    /// The last sequence number accepted from this peer.
    #[must_use]
    pub fn last_seq_num(&self) -> u32 {
        self.last_seq_num
    }

    /// Replay check: `true` if `sequence_num` must be rejected as a replay.
    ///
    /// Sequence number 0 never counts as a replay (control/legacy frames
    /// routinely carry it); otherwise a non-increasing sequence is rejected.
    #[must_use]
    pub fn is_replay(&self, sequence_num: u32) -> bool {
        sequence_num != 0 && sequence_num < self.last_seq_num
    }

    /// Updates `last_seq_num` if `sequence_num` is newer.
    pub fn observe_sequence(&mut self, sequence_num: u32) {
        if sequence_num > self.last_seq_num {
            self.last_seq_num = sequence_num;
        }
    }

    /// Resets the replay counter to 0. Called when a handshake completes,
    /// starting a fresh session.
    pub fn reset_sequence(&mut self) {
        self.last_seq_num = 0;
    }

    /// True while a multi-fragment message is being reassembled.
    #[must_use]
    pub fn receiving_fragmented(&self) -> bool {
        self.receiving_fragmented
    }

    /// The sequence number of the in-progress fragmented message, if any.
    #[must_use]
    pub fn fragment_seq_num(&self) -> u32 {
        self.fragment_seq_num
    }

    /// Begins reassembly of a new fragmented message, discarding any
    /// previously abandoned fragments.
    pub fn start_fragment(&mut self, sequence_num: u32, first_chunk: &[u8]) {
        self.reassembly_buf.clear();
        self.reassembly_buf.extend_from_slice(first_chunk);
        self.receiving_fragmented = true;
        self.fragment_seq_num = sequence_num;
    }

    /// Appends a `CONTINUED`/`END` fragment's bytes to the in-progress
    /// message. Caller must have already checked `receiving_fragmented` and
    /// that the sequence number matches.
    pub fn append_fragment(&mut self, chunk: &[u8]) {
        self.reassembly_buf.extend_from_slice(chunk);
    }

    /// Completes reassembly, clearing the in-progress flag and returning the
    /// full message bytes.
    pub fn finish_fragment(&mut self) -> Vec<u8> {
        self.receiving_fragmented = false;
        std::mem::take(&mut self.reassembly_buf)
    }

    /// Abandons any in-progress reassembly without returning its bytes.
    pub fn abandon_fragment(&mut self) {
        self.receiving_fragmented = false;
        self.reassembly_buf.clear();
    }

    /// Inbound queue discipline.
    #[must_use]
    pub fn queue_mode(&self) -> QueueMode {
        self.queue_mode
    }

    /// Sets the inbound queue discipline.
    pub fn set_queue_mode(&mut self, mode: QueueMode) {
        self.queue_mode = mode;
    }

    /// Number of complete messages currently queued.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue_rx.len()
    }

    /// Enqueues a complete message, applying the queue-mode policy.
    ///
    /// Backed by a bounded `tokio::sync::mpsc` channel: `try_send` never
    /// blocks, matching the receive path's non-blocking enqueue
    /// requirement. Returns `false` (and drops `message`) if `Normal` mode
    /// and the queue is already at capacity. `LatestOnly` mode never
    /// rejects: it drains everything queued before admitting the new
    /// message.
    #[must_use]
    pub fn enqueue(&mut self, message: Vec<u8>) -> bool {
        match self.queue_mode {
            QueueMode::Normal => self.queue_tx.try_send(message).is_ok(),
            QueueMode::LatestOnly => {
                while self.queue_rx.try_recv().is_ok() {}
                self.queue_tx.try_send(message).is_ok()
            },
        }
    }

    /// Pops the oldest complete message without waiting, if any is already
    /// queued.
    pub fn dequeue(&mut self) -> Option<Vec<u8>> {
        self.queue_rx.try_recv().ok()
    }

    /// Waits for the next complete message, suspending until one arrives.
    /// Callers needing a bounded wait wrap this in `tokio::time::timeout`.
    /// Returns `None` only if the sender half were dropped, which never
    /// happens while this peer record itself is alive (sender and receiver
    /// are both fields of the same struct).
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.queue_rx.recv().await
    }

    /// Distance, in hops, to this peer as a mesh origin. `None` if no route
    /// has been learned yet.
    #[must_use]
    pub fn hop_count(&self) -> Option<u8> {
        self.hop_count
    }

    /// The next-hop MAC to reach this peer, if this node is not a direct
    /// neighbor.
    #[must_use]
    pub fn next_hop_mac(&self) -> Option<MacAddr> {
        self.next_hop_mac
    }

    /// Records a learned route if it is strictly better than the current
    /// one (or none is stored yet). Returns `true` if the route was updated.
    #[must_use]
    pub fn learn_route(&mut self, via: MacAddr, cost: u8) -> bool {
        if self.hop_count.is_none_or(|current| cost < current) {
            self.hop_count = Some(cost);
            self.next_hop_mac = Some(via);
            true
        } else {
            false
        }
    }
}

/// The peer table: every known MAC mapped to its record.
///
/// Grounded on the teacher's `ConnectionRegistry` shape: bidirectional
/// bookkeeping kept consistent through a narrow mutation API rather than
/// exposing the backing map directly.
pub struct PeerTable<I> {
    peers: std::collections::HashMap<MacAddr, PeerRecord<I>>,
}

impl<I> Default for PeerTable<I> {
    fn default() -> Self {
        Self { peers: std::collections::HashMap::new() }
    }
}

impl<I: Copy + Ord + Sub<Output = Duration>> PeerTable<I> {
    /// Creates an empty peer table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known peers.
    #[must_use]
    pub fn size(&self) -> usize {
        self.peers.len()
    }

    /// Looks up a peer by MAC.
    #[must_use]
    pub fn lookup(&self, mac: MacAddr) -> Option<&PeerRecord<I>> {
        self.peers.get(&mac)
    }

    /// Mutable lookup by MAC.
    pub fn lookup_mut(&mut self, mac: MacAddr) -> Option<&mut PeerRecord<I>> {
        self.peers.get_mut(&mac)
    }

    /// Inserts a new peer record, or returns the existing one unchanged if
    /// `mac` is already known.
    pub fn add(&mut self, mac: MacAddr, name: impl Into<String>, now: I) -> &mut PeerRecord<I> {
        self.peers.entry(mac).or_insert_with(|| PeerRecord::new(name, now))
    }

    /// Removes a peer, zeroizing its key material first.
    pub fn remove(&mut self, mac: MacAddr) -> bool {
        if let Some(mut record) = self.peers.remove(&mac) {
            record.wipe_keys();
            true
        } else {
            false
        }
    }

    /// Iterates over every known peer.
    pub fn for_each(&self, mut visitor: impl FnMut(MacAddr, &PeerRecord<I>)) {
        for (mac, record) in &self.peers {
            visitor(*mac, record);
        }
    }

    /// Removes every peer, zeroizing key material as it goes.
    pub fn clear_all(&mut self) {
        for (_, mut record) in self.peers.drain() {
            record.wipe_keys();
        }
    }

    /// Removes peers whose `last_seen` age exceeds `threshold`, relative to
    /// `now`. Returns the MAC addresses that were evicted.
    pub fn cleanup_stale(&mut self, now: I, threshold: Duration) -> Vec<MacAddr> {
        let stale: Vec<MacAddr> = self
            .peers
            .iter()
            .filter(|(_, record)| now - record.last_seen > threshold)
            .map(|(mac, _)| *mac)
            .collect();
        for mac in &stale {
            self.remove(*mac);
        }
        stale
    }

    /// The single peer currently `Connected`, if any — used to enforce the
    /// at-most-one-host invariant on the client side.
    #[must_use]
    pub fn connected_peer(&self) -> Option<MacAddr> {
        self.peers
            .iter()
            .find(|(_, record)| record.state() == ConnectionState::Connected)
            .map(|(mac, _)| *mac)
    }

    /// Number of peers currently `Connected`.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.peers.values().filter(|record| record.state() == ConnectionState::Connected).count()
    }

    /// Finds the next-hop MAC to reach `origin`, if a route is known.
    #[must_use]
    pub fn route_to(&self, origin: MacAddr) -> Option<MacAddr> {
        self.peers.get(&origin).and_then(PeerRecord::next_hop_mac)
    }
}
