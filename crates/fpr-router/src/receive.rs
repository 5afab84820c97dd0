//! Inbound application-data processing (§5.E, steps 4-6).
//!
//! Version routing and control-packet dispatch live in `router.rs`, next to
//! the peer table and role logic they need; this module holds the pure,
//! per-peer replay/reassembly/queue policy in isolation, the way the
//! teacher keeps `Connection::handle_frame`'s pure state transitions
//! separate from `ServerDriver`'s I/O-producing dispatch.

use fpr_core::{PeerRecord, QueueMode};
use fpr_proto::{PackageType, Packet};

/// Result of feeding one application-data packet to a connected peer's
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOutcome {
    /// The peer is not `Connected`; the frame is dropped without touching
    /// replay/reassembly state.
    NotConnected,
    /// `sequence_num` was not newer than the peer's last accepted sequence.
    Replay,
    /// A `Continued`/`End` fragment arrived with no matching in-progress
    /// reassembly (or in `LatestOnly` mode, any fragment at all).
    OrphanFragment,
    /// A complete message was enqueued for delivery.
    Enqueued,
    /// The per-peer queue was at capacity (`Normal` mode only).
    QueueFull,
    /// A `Start`/`Continued` fragment was accepted; reassembly continues.
    Continuing,
}

/// Applies the replay check, then the reassembly/queue policy, to one
/// inbound application-data packet.
///
/// Caller must have already confirmed `packet` is not a control packet and
/// that version routing accepted it. `is_legacy` is the version-routing
/// outcome for this frame (`VersionDecision::Legacy`, i.e. sender version
/// 0): legacy senders have no sequence semantics, so replay checking is
/// skipped entirely for them, per the version-routing step.
pub fn process_data_frame<I: Copy>(peer: &mut PeerRecord<I>, packet: &Packet, is_legacy: bool) -> DataOutcome {
    use fpr_core::ConnectionState;

    if peer.state() != ConnectionState::Connected {
        return DataOutcome::NotConnected;
    }

    let sequence_num = packet.sequence_num();
    if !is_legacy {
        if peer.is_replay(sequence_num) {
            return DataOutcome::Replay;
        }
        peer.observe_sequence(sequence_num);
    }

    match peer.queue_mode() {
        QueueMode::LatestOnly => process_latest_only(peer, packet),
        QueueMode::Normal => process_normal(peer, packet, sequence_num),
    }
}

fn process_latest_only<I: Copy>(peer: &mut PeerRecord<I>, packet: &Packet) -> DataOutcome {
    if packet.package_type() != PackageType::Single {
        peer.abandon_fragment();
        return DataOutcome::OrphanFragment;
    }
    // `enqueue` under `LatestOnly` drains everything queued before admitting.
    let _ = peer.enqueue(packet.payload().to_vec());
    DataOutcome::Enqueued
}

fn process_normal<I: Copy>(peer: &mut PeerRecord<I>, packet: &Packet, sequence_num: u32) -> DataOutcome {
    match packet.package_type() {
        PackageType::Single => enqueue_or_full(peer, packet.payload().to_vec()),
        PackageType::Start => {
            // Discards any previously abandoned in-progress reassembly.
            peer.start_fragment(sequence_num, packet.payload());
            DataOutcome::Continuing
        },
        PackageType::Continued => {
            if !peer.receiving_fragmented() || peer.fragment_seq_num() != sequence_num {
                return DataOutcome::OrphanFragment;
            }
            peer.append_fragment(packet.payload());
            DataOutcome::Continuing
        },
        PackageType::End => {
            if !peer.receiving_fragmented() || peer.fragment_seq_num() != sequence_num {
                return DataOutcome::OrphanFragment;
            }
            peer.append_fragment(packet.payload());
            let message = peer.finish_fragment();
            enqueue_or_full(peer, message)
        },
    }
}

fn enqueue_or_full<I: Copy>(peer: &mut PeerRecord<I>, message: Vec<u8>) -> DataOutcome {
    if peer.enqueue(message) {
        DataOutcome::Enqueued
    } else {
        DataOutcome::QueueFull
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use fpr_core::ConnectionState;
    use fpr_proto::{DEFAULT_MAX_HOPS, MacAddr, ProtocolVersion};

    use super::*;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([2, 0, 0, 0, 0, n])
    }

    fn connected_peer() -> PeerRecord<Instant> {
        let mut peer: PeerRecord<Instant> = PeerRecord::new("peer", Instant::now());
        peer.set_state(ConnectionState::Connected);
        peer
    }

    fn single(seq: u32, payload: &[u8]) -> Packet {
        Packet::new(
            PackageType::Single,
            1,
            mac(2),
            mac(1),
            0,
            DEFAULT_MAX_HOPS,
            ProtocolVersion::new(1, 0, 0),
            seq,
            payload,
        )
        .unwrap()
    }

    #[test]
    fn disconnected_peer_drops_silently() {
        let mut peer: PeerRecord<Instant> = PeerRecord::new("peer", Instant::now());
        let packet = single(1, b"hi");
        assert_eq!(process_data_frame(&mut peer, &packet, false), DataOutcome::NotConnected);
    }

    #[test]
    fn single_frame_is_enqueued() {
        let mut peer = connected_peer();
        let packet = single(1, b"hi");
        assert_eq!(process_data_frame(&mut peer, &packet, false), DataOutcome::Enqueued);
        assert_eq!(peer.dequeue(), Some(b"hi".to_vec()));
    }

    #[test]
    fn replayed_sequence_is_rejected() {
        let mut peer = connected_peer();
        process_data_frame(&mut peer, &single(5, b"a"), false);
        let outcome = process_data_frame(&mut peer, &single(5, b"a"), false);
        assert_eq!(outcome, DataOutcome::Replay);
    }

    #[test]
    fn fragmented_message_reassembles_in_order() {
        let mut peer = connected_peer();
        let start =
            Packet::new(PackageType::Start, 9, mac(2), mac(1), 0, DEFAULT_MAX_HOPS, ProtocolVersion::new(1, 0, 0), 3, b"AB")
                .unwrap();
        let end =
            Packet::new(PackageType::End, 9, mac(2), mac(1), 0, DEFAULT_MAX_HOPS, ProtocolVersion::new(1, 0, 0), 3, b"CD")
                .unwrap();

        assert_eq!(process_data_frame(&mut peer, &start, false), DataOutcome::Continuing);
        assert_eq!(process_data_frame(&mut peer, &end, false), DataOutcome::Enqueued);
        assert_eq!(peer.dequeue(), Some(b"ABCD".to_vec()));
    }

    #[test]
    fn continued_fragment_with_wrong_sequence_is_orphaned() {
        let mut peer = connected_peer();
        let start =
            Packet::new(PackageType::Start, 9, mac(2), mac(1), 0, DEFAULT_MAX_HOPS, ProtocolVersion::new(1, 0, 0), 3, b"AB")
                .unwrap();
        let wrong_end =
            Packet::new(PackageType::End, 9, mac(2), mac(1), 0, DEFAULT_MAX_HOPS, ProtocolVersion::new(1, 0, 0), 4, b"CD")
                .unwrap();

        process_data_frame(&mut peer, &start, false);
        assert_eq!(process_data_frame(&mut peer, &wrong_end, false), DataOutcome::OrphanFragment);
    }

    #[test]
    fn latest_only_rejects_fragments() {
        let mut peer = connected_peer();
        peer.set_queue_mode(QueueMode::LatestOnly);
        let start =
            Packet::new(PackageType::Start, 9, mac(2), mac(1), 0, DEFAULT_MAX_HOPS, ProtocolVersion::new(1, 0, 0), 3, b"AB")
                .unwrap();
        assert_eq!(process_data_frame(&mut peer, &start, false), DataOutcome::OrphanFragment);
    }

    #[test]
    fn latest_only_drains_before_admitting() {
        let mut peer = connected_peer();
        peer.set_queue_mode(QueueMode::LatestOnly);
        process_data_frame(&mut peer, &single(1, b"old"), false);
        process_data_frame(&mut peer, &single(2, b"new"), false);
        assert_eq!(peer.queued_len(), 1);
        assert_eq!(peer.dequeue(), Some(b"new".to_vec()));
    }

    #[test]
    fn normal_queue_reports_full() {
        let mut peer = connected_peer();
        for i in 0..fpr_core::peer::DEFAULT_QUEUE_CAPACITY {
            assert_eq!(
                process_data_frame(&mut peer, &single((i + 1) as u32, b"x"), false),
                DataOutcome::Enqueued
            );
        }
        let outcome = process_data_frame(
            &mut peer,
            &single((fpr_core::peer::DEFAULT_QUEUE_CAPACITY + 1) as u32, b"y"),
            false,
        );
        assert_eq!(outcome, DataOutcome::QueueFull);
    }

    #[test]
    fn legacy_frame_bypasses_replay_check() {
        let mut peer = connected_peer();
        process_data_frame(&mut peer, &single(5, b"a"), true);
        let outcome = process_data_frame(&mut peer, &single(5, b"a"), true);
        assert_eq!(outcome, DataOutcome::Enqueued);
        assert_eq!(peer.last_seq_num(), 0);
    }
}
