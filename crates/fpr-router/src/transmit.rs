//! Outbound fragmentation (§5.D).
//!
//! Grounded on the teacher's driver/room-manager action-dispatch pattern:
//! fragmenting a message is a pure function from `(state, bytes, opts)` to
//! `Vec<Packet>`. The inter-fragment pause is performed by the async caller
//! in `fpr-router::Router::send`, never inside this pure fragmenter —
//! mirroring the separation the teacher keeps between pure state
//! transitions in `connection.rs` and the `Environment`-driven async glue
//! around them.

use fpr_proto::{
    CONTROL_ID, ConnectInfo, DEFAULT_MAX_HOPS, MacAddr, PAYLOAD_CAPACITY, Packet, PackageType,
    ProtocolError, ProtocolVersion,
};

/// Splits `bytes` into the ordered sequence of packets that carry it,
/// sharing one sequence number across every fragment.
///
/// A single packet (`PackageType::Single`) when `bytes` fits in one
/// payload; otherwise `Start`, zero or more `Continued`, then `End`.
pub fn fragment(
    local: MacAddr,
    dest: MacAddr,
    id: i32,
    max_hops: u8,
    version: ProtocolVersion,
    sequence_num: u32,
    bytes: &[u8],
) -> Result<Vec<Packet>, ProtocolError> {
    if bytes.len() <= PAYLOAD_CAPACITY {
        let packet = Packet::new(
            PackageType::Single,
            id,
            local,
            dest,
            0,
            max_hops,
            version,
            sequence_num,
            bytes,
        )?;
        return Ok(vec![packet]);
    }

    let chunks: Vec<&[u8]> = bytes.chunks(PAYLOAD_CAPACITY).collect();
    let last = chunks.len() - 1;
    let mut packets = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.into_iter().enumerate() {
        let package_type = match index {
            0 => PackageType::Start,
            n if n == last => PackageType::End,
            _ => PackageType::Continued,
        };
        packets.push(Packet::new(
            package_type,
            id,
            local,
            dest,
            0,
            max_hops,
            version,
            sequence_num,
            chunk,
        )?);
    }
    Ok(packets)
}

/// Per-router outbound state: the shared sequence counter every message's
/// fragments draw from.
#[derive(Debug, Default)]
pub struct TransmitPipeline {
    tx_seq: u32,
}

impl TransmitPipeline {
    /// Creates a fresh pipeline with its sequence counter at 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next outbound sequence number.
    ///
    /// Wraps on overflow; per the spec's sequence-rollover resolution, a
    /// wrapped counter forces the caller to restart the handshake rather
    /// than silently reusing sequence 0 as a live value.
    pub fn next_sequence(&mut self) -> u32 {
        self.tx_seq = self.tx_seq.wrapping_add(1);
        self.tx_seq
    }

    /// Fragments one application message, assigning it a fresh sequence
    /// number shared by every resulting packet.
    pub fn build_message(
        &mut self,
        local: MacAddr,
        dest: MacAddr,
        id: i32,
        max_hops: Option<u8>,
        version: ProtocolVersion,
        bytes: &[u8],
    ) -> Result<Vec<Packet>, ProtocolError> {
        let sequence_num = self.next_sequence();
        fragment(local, dest, id, max_hops.unwrap_or(DEFAULT_MAX_HOPS), version, sequence_num, bytes)
    }

    /// Builds a control packet (handshake step or device-info broadcast)
    /// carrying `info`. Control packets do not participate in replay
    /// protection and always carry sequence number 0.
    ///
    /// `ConnectInfo`'s encoded size is const-asserted in `fpr-proto` to fit
    /// within `PAYLOAD_CAPACITY`, so this can never exceed the payload size
    /// check `Packet::new` performs.
    #[must_use]
    #[allow(clippy::expect_used, reason = "ConnectInfo is const-asserted to fit PAYLOAD_CAPACITY")]
    pub fn build_control(
        local: MacAddr,
        dest: MacAddr,
        version: ProtocolVersion,
        info: ConnectInfo,
    ) -> Packet {
        let payload = info.to_payload_bytes();
        Packet::new(PackageType::Single, CONTROL_ID, local, dest, 0, DEFAULT_MAX_HOPS, version, 0, &payload)
            .expect("ConnectInfo payload always fits PAYLOAD_CAPACITY")
    }
}

#[cfg(test)]
mod tests {
    use fpr_proto::MAX_NAME_LEN;

    use super::*;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([2, 0, 0, 0, 0, n])
    }

    #[test]
    fn short_message_is_single_fragment() {
        let packets =
            fragment(mac(1), mac(2), 7, DEFAULT_MAX_HOPS, ProtocolVersion::new(1, 0, 0), 1, b"hi").unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].package_type(), PackageType::Single);
        assert_eq!(packets[0].payload(), b"hi");
    }

    #[test]
    fn long_message_splits_into_start_continued_end() {
        let bytes: Vec<u8> = (0..500u32).map(|i| (i * 0xA5) as u8).collect();
        let packets =
            fragment(mac(1), mac(2), 9, DEFAULT_MAX_HOPS, ProtocolVersion::new(1, 0, 0), 5, &bytes).unwrap();

        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].package_type(), PackageType::Start);
        assert_eq!(packets[1].package_type(), PackageType::Continued);
        assert_eq!(packets[2].package_type(), PackageType::End);
        assert!(packets.iter().all(|p| p.sequence_num() == 5));

        let reassembled: Vec<u8> = packets.iter().flat_map(|p| p.payload().to_vec()).collect();
        assert_eq!(reassembled, bytes);
    }

    #[test]
    fn sequence_counter_advances_per_message() {
        let mut pipeline = TransmitPipeline::new();
        let v = ProtocolVersion::new(1, 0, 0);
        let first = pipeline.build_message(mac(1), mac(2), 1, None, v, b"a").unwrap();
        let second = pipeline.build_message(mac(1), mac(2), 1, None, v, b"b").unwrap();
        assert_eq!(first[0].sequence_num(), 1);
        assert_eq!(second[0].sequence_num(), 2);
    }

    #[test]
    fn control_packet_carries_connect_info() {
        let v = ProtocolVersion::new(1, 0, 0);
        let info = ConnectInfo::new(
            &"h".repeat(MAX_NAME_LEN),
            mac(1),
            fpr_proto::Visibility::Public,
            Some([9; 16]),
            None,
        );
        let packet = TransmitPipeline::build_control(mac(1), MacAddr::BROADCAST, v, info);
        assert!(packet.is_control());
        let decoded = ConnectInfo::from_payload(packet.raw_payload()).unwrap();
        assert!(decoded.has_pwk());
    }
}
