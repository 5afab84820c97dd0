//! Fixed-layout wire packet: the single frame carried by the link layer.
//!
//! Mirrors the teacher's zero-copy `FrameHeader`/`Frame` split, but because
//! every FPR packet is the same size (no variable-length CBOR payload), the
//! header and the payload union live in one `repr(C, packed)` block whose
//! size is asserted at compile time against the link MTU.

use core::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{error::ProtocolError, mac::MacAddr, version::ProtocolVersion};

/// Capacity, in bytes, of the opaque/`ConnectInfo` payload union.
///
/// Matches the reference implementation's 180-byte payload capacity, chosen
/// to leave headroom under a ~250-byte radio frame once the fixed header and
/// link-layer framing are accounted for.
pub const PAYLOAD_CAPACITY: usize = 180;

/// Upper bound on a single link-layer datagram. `Packet::WIRE_SIZE` must fit
/// within this.
pub const FRAME_MTU: usize = 250;

/// `id` value reserved for handshake / device-info control packets.
pub const CONTROL_ID: i32 = -1;

/// Default time-to-live, in hops, for a message with no explicit override.
pub const DEFAULT_MAX_HOPS: u8 = 10;

/// Fragment role of a packet within a (possibly multi-fragment) message.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum PackageType {
    /// The entire message fits in one packet.
    Single = 0,
    /// First fragment of a multi-fragment message.
    Start = 1,
    /// A middle fragment.
    Continued = 2,
    /// The final fragment.
    End = 3,
}

impl PackageType {
    /// Decodes a wire byte into a `PackageType`.
    pub const fn try_from_u8(raw: u8) -> Result<Self, u8> {
        match raw {
            0 => Ok(Self::Single),
            1 => Ok(Self::Start),
            2 => Ok(Self::Continued),
            3 => Ok(Self::End),
            other => Err(other),
        }
    }
}

impl TryFrom<u8> for PackageType {
    type Error = ProtocolError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::try_from_u8(raw).map_err(ProtocolError::InvalidPackageType)
    }
}

/// The fixed-layout wire packet.
///
/// All multi-byte fields are stored as big-endian byte arrays rather than
/// native integers, matching the teacher's header convention for packed
/// structs (native multi-byte fields would be misaligned inside a
/// `repr(C, packed)` struct; explicit byte arrays make the layout portable
/// and the endianness unambiguous regardless of host architecture).
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct Packet {
    package_type: u8,
    id: [u8; 4],
    origin_mac: [u8; 6],
    dest_mac: [u8; 6],
    hop_count: u8,
    max_hops: u8,
    version: [u8; 4],
    sequence_num: [u8; 4],
    payload_size: u8,
    protocol: [u8; PAYLOAD_CAPACITY],
}

const _: () = assert!(
    core::mem::size_of::<Packet>() <= FRAME_MTU,
    "Packet must fit inside one link-layer datagram"
);

impl Packet {
    /// Exact on-wire size of a packet, in bytes.
    pub const WIRE_SIZE: usize = core::mem::size_of::<Packet>();

    /// Builds a new packet. `payload` is copied into the fixed-size union
    /// and its length becomes `payload_size`; it must not exceed
    /// [`PAYLOAD_CAPACITY`].
    pub fn new(
        package_type: PackageType,
        id: i32,
        origin_mac: MacAddr,
        dest_mac: MacAddr,
        hop_count: u8,
        max_hops: u8,
        version: ProtocolVersion,
        sequence_num: u32,
        payload: &[u8],
    ) -> Result<Self, ProtocolError> {
        if payload.len() > PAYLOAD_CAPACITY {
            return Err(ProtocolError::PayloadTooLarge { got: payload.len(), capacity: PAYLOAD_CAPACITY });
        }
        let mut protocol = [0u8; PAYLOAD_CAPACITY];
        protocol[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            package_type: package_type as u8,
            id: id.to_be_bytes(),
            origin_mac: origin_mac.octets(),
            dest_mac: dest_mac.octets(),
            hop_count,
            max_hops,
            version: version.to_u32().to_be_bytes(),
            sequence_num: sequence_num.to_be_bytes(),
            payload_size: payload.len() as u8,
            protocol,
        })
    }

    /// Decodes a packet from an exact-size byte slice.
    ///
    /// Validates (i) the slice is exactly [`Packet::WIRE_SIZE`] bytes, (ii)
    /// `package_type` is in range, and (iii) `payload_size` does not exceed
    /// the payload capacity. Version routing (per spec §5.E step 3) is a
    /// higher-level policy and is not enforced here.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != Self::WIRE_SIZE {
            return Err(ProtocolError::TruncatedPacket { expected: Self::WIRE_SIZE, got: bytes.len() });
        }
        let packet = Self::read_from_bytes(bytes)
            .map_err(|_| ProtocolError::TruncatedPacket { expected: Self::WIRE_SIZE, got: bytes.len() })?;
        PackageType::try_from_u8(packet.package_type).map_err(ProtocolError::InvalidPackageType)?;
        if packet.payload_size as usize > PAYLOAD_CAPACITY {
            return Err(ProtocolError::PayloadTooLarge {
                got: packet.payload_size as usize,
                capacity: PAYLOAD_CAPACITY,
            });
        }
        Ok(packet)
    }

    /// Encodes this packet to its fixed-size wire representation.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// The fragment role of this packet. Panics only if the packet was
    /// constructed by unsafe means bypassing [`Packet::decode`]/[`Packet::new`];
    /// both validate `package_type` on construction.
    #[must_use]
    pub fn package_type(&self) -> PackageType {
        PackageType::try_from_u8(self.package_type)
            .unwrap_or_else(|_| unreachable!("package_type validated at construction"))
    }

    /// The message identifier. `-1` means this is a control packet.
    #[must_use]
    pub fn id(&self) -> i32 {
        i32::from_be_bytes(self.id)
    }

    /// True if this is a control (handshake / device-info) packet.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.id() == CONTROL_ID
    }

    /// The packet's originating MAC address.
    #[must_use]
    pub fn origin_mac(&self) -> MacAddr {
        MacAddr::new(self.origin_mac)
    }

    /// The packet's destination MAC address (broadcast means "any").
    #[must_use]
    pub fn dest_mac(&self) -> MacAddr {
        MacAddr::new(self.dest_mac)
    }

    /// Current hop count (distance travelled so far).
    #[must_use]
    pub fn hop_count(&self) -> u8 {
        self.hop_count
    }

    /// Sets the hop count. Used by extenders before retransmitting.
    pub fn set_hop_count(&mut self, hop_count: u8) {
        self.hop_count = hop_count;
    }

    /// Maximum hops before this packet must be dropped.
    #[must_use]
    pub fn max_hops(&self) -> u8 {
        self.max_hops
    }

    /// Protocol version of the sender.
    #[must_use]
    pub fn version(&self) -> ProtocolVersion {
        ProtocolVersion::from_u32(u32::from_be_bytes(self.version))
    }

    /// The sequence number shared by every fragment of this message.
    #[must_use]
    pub fn sequence_num(&self) -> u32 {
        u32::from_be_bytes(self.sequence_num)
    }

    /// Bytes actually used in the payload union for this fragment.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.payload_size as usize
    }

    /// The payload bytes actually used by this fragment (`payload_size`
    /// bytes out of the fixed [`PAYLOAD_CAPACITY`]-byte union).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.protocol[..self.payload_size()]
    }

    /// The raw fixed-size payload union, for reinterpreting as a
    /// `ConnectInfo` when [`Packet::is_control`] is true.
    #[must_use]
    pub fn raw_payload(&self) -> &[u8; PAYLOAD_CAPACITY] {
        &self.protocol
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("package_type", &self.package_type())
            .field("id", &self.id())
            .field("origin_mac", &self.origin_mac())
            .field("dest_mac", &self.dest_mac())
            .field("hop_count", &self.hop_count)
            .field("max_hops", &self.max_hops)
            .field("version", &self.version())
            .field("sequence_num", &self.sequence_num())
            .field("payload_size", &self.payload_size)
            .finish()
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
impl Eq for Packet {}
