//! Fuzz target for wire `Packet` boundary conditions.
//!
//! # Strategy
//!
//! - `package_type`: valid (0-3), off-by-one, random
//! - `payload_size`: zero, small, at-capacity, just-over-capacity, `u8::MAX`
//! - `hop_count`/`max_hops`: zero, equal, `hop_count > max_hops`, `u8::MAX`
//! - `id`: the control sentinel, zero, random
//!
//! # Invariants
//!
//! - `payload_size > PAYLOAD_CAPACITY` MUST return `ProtocolError::PayloadTooLarge`
//! - `package_type` outside 0-3 MUST return `ProtocolError::InvalidPackageType`
//! - a buffer shorter or longer than `Packet::WIRE_SIZE` MUST return `ProtocolError::TruncatedPacket`
//! - all decode errors MUST be structured (never panic)
//! - a packet built through `Packet::new` always round-trips through `encode`/`decode`

#![no_main]

use arbitrary::Arbitrary;
use fpr_proto::{MacAddr, Packet, PackageType, ProtocolError, ProtocolVersion, PAYLOAD_CAPACITY};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryPacket {
    package_type: PackageTypeByte,
    id: IdValue,
    origin_mac: [u8; 6],
    dest_mac: [u8; 6],
    hop_count: HopValue,
    max_hops: HopValue,
    version: u32,
    sequence_num: u32,
    payload_size: PayloadSize,
}

#[derive(Debug, Clone, Arbitrary)]
enum PackageTypeByte {
    Valid(u8),
    OffByOne,
    Random(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum IdValue {
    Control,
    Zero,
    Random(i32),
}

#[derive(Debug, Clone, Arbitrary)]
enum HopValue {
    Zero,
    One,
    Max,
    Random(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum PayloadSize {
    Zero,
    AtCapacity,
    JustOverCapacity,
    MaxU8,
    Random(u8),
}

fn hop(value: &HopValue) -> u8 {
    match *value {
        HopValue::Zero => 0,
        HopValue::One => 1,
        HopValue::Max => u8::MAX,
        HopValue::Random(v) => v,
    }
}

fuzz_target!(|boundary: BoundaryPacket| {
    let package_type_value = match boundary.package_type {
        PackageTypeByte::Valid(seed) => seed % 4,
        PackageTypeByte::OffByOne => 4,
        PackageTypeByte::Random(v) => v,
    };
    let id_value = match boundary.id {
        IdValue::Control => fpr_proto::CONTROL_ID,
        IdValue::Zero => 0,
        IdValue::Random(v) => v,
    };
    let payload_len = match boundary.payload_size {
        PayloadSize::Zero => 0,
        PayloadSize::AtCapacity => PAYLOAD_CAPACITY,
        PayloadSize::JustOverCapacity => PAYLOAD_CAPACITY + 1,
        PayloadSize::MaxU8 => u8::MAX as usize,
        PayloadSize::Random(v) => v as usize,
    }
    .min(PAYLOAD_CAPACITY + 8);

    // Directly assembled buffer: exercises Packet::decode's validation on
    // bytes that were never built through Packet::new.
    let mut buffer = vec![0u8; Packet::WIRE_SIZE];
    buffer[0] = package_type_value;
    buffer[1..5].copy_from_slice(&id_value.to_be_bytes());
    buffer[5..11].copy_from_slice(&boundary.origin_mac);
    buffer[11..17].copy_from_slice(&boundary.dest_mac);
    buffer[17] = hop(&boundary.hop_count);
    buffer[18] = hop(&boundary.max_hops);
    buffer[19..23].copy_from_slice(&boundary.version.to_be_bytes());
    buffer[23..27].copy_from_slice(&boundary.sequence_num.to_be_bytes());
    buffer[27] = payload_len.min(u8::from(true) as usize + 254) as u8;

    match Packet::decode(&buffer) {
        Ok(packet) => {
            assert!(package_type_value <= 3);
            assert!(packet.payload_size() <= PAYLOAD_CAPACITY);
            let _ = packet.origin_mac();
            let _ = packet.dest_mac();
            let _ = packet.version();
            let _ = packet.package_type();
        },
        Err(err) => {
            let _ = matches!(
                err,
                ProtocolError::InvalidPackageType(_)
                    | ProtocolError::PayloadTooLarge { .. }
                    | ProtocolError::TruncatedPacket { .. }
            );
        },
    }

    // Truncated/oversized buffers must always be rejected, never panic.
    if buffer.len() > 1 {
        assert!(Packet::decode(&buffer[..buffer.len() - 1]).is_err());
    }
    let mut too_long = buffer.clone();
    too_long.push(0);
    assert!(Packet::decode(&too_long).is_err());

    // A packet built through the validating constructor always round-trips.
    if let Ok(package_type) = PackageType::try_from_u8(package_type_value % 4) {
        let payload = vec![0xAA; payload_len.min(PAYLOAD_CAPACITY)];
        if let Ok(packet) = Packet::new(
            package_type,
            id_value,
            MacAddr::new(boundary.origin_mac),
            MacAddr::new(boundary.dest_mac),
            hop(&boundary.hop_count),
            hop(&boundary.max_hops),
            ProtocolVersion::from_u32(boundary.version),
            boundary.sequence_num,
            &payload,
        ) {
            let encoded = packet.encode();
            let decoded = Packet::decode(&encoded).expect("packet built by Packet::new always decodes");
            assert_eq!(decoded, packet);
            assert_eq!(decoded.payload(), payload.as_slice());
        }
    }
});
