//! `ConnectInfo`: the control-packet payload carried in handshake / device-info
//! packets.
//!
//! The wire `protocol` union is a fixed-size opaque byte block; when a
//! packet's `id == -1` those same bytes are reinterpreted as a `ConnectInfo`
//! record via a zero-copy cast, mirroring how the teacher's `Payload` enum
//! distinguishes interpretations of one wire slot by an out-of-band tag (here,
//! `Packet::is_control()` rather than an opcode field).

use core::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{error::ProtocolError, mac::MacAddr, packet::PAYLOAD_CAPACITY};

/// Maximum length of a peer's display name, not counting the NUL terminator.
pub const MAX_NAME_LEN: usize = 31;

/// Whether a host advertises itself to unknown clients.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Visibility {
    /// Broadcasts device-info and accepts discovery from unknown clients.
    Public = 0,
    /// Does not broadcast; only reachable by clients that already know its
    /// MAC address.
    Private = 1,
}

impl Visibility {
    const fn try_from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Public),
            1 => Some(Self::Private),
            _ => None,
        }
    }
}

/// The handshake / device-info control payload.
///
/// Laid out identically to the opaque application payload so that it can be
/// cast in place from a control packet's `protocol` union without copying.
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct ConnectInfo {
    name: [u8; MAX_NAME_LEN + 1],
    sender_mac: [u8; 6],
    visibility: u8,
    has_pwk: u8,
    has_lwk: u8,
    _padding: u8,
    pwk: [u8; 16],
    lwk: [u8; 16],
}

const _: () = assert!(core::mem::size_of::<ConnectInfo>() <= PAYLOAD_CAPACITY);

impl ConnectInfo {
    /// Builds a `ConnectInfo` advertising (optionally) a PWK and/or LWK.
    ///
    /// `name` longer than [`MAX_NAME_LEN`] bytes is truncated.
    #[must_use]
    pub fn new(
        name: &str,
        sender_mac: MacAddr,
        visibility: Visibility,
        pwk: Option<[u8; 16]>,
        lwk: Option<[u8; 16]>,
    ) -> Self {
        let mut name_buf = [0u8; MAX_NAME_LEN + 1];
        let bytes = name.as_bytes();
        let copy_len = bytes.len().min(MAX_NAME_LEN);
        name_buf[..copy_len].copy_from_slice(&bytes[..copy_len]);

        Self {
            name: name_buf,
            sender_mac: sender_mac.octets(),
            visibility: visibility as u8,
            has_pwk: u8::from(pwk.is_some()),
            has_lwk: u8::from(lwk.is_some()),
            _padding: 0,
            pwk: pwk.unwrap_or([0; 16]),
            lwk: lwk.unwrap_or([0; 16]),
        }
    }

    /// Casts a control packet's raw payload union into a `ConnectInfo`.
    pub fn from_payload(raw: &[u8; PAYLOAD_CAPACITY]) -> Result<Self, ProtocolError> {
        let size = core::mem::size_of::<Self>();
        Self::read_from_bytes(&raw[..size])
            .map_err(|_| ProtocolError::TruncatedPacket { expected: size, got: raw.len() })
    }

    /// Serializes into the fixed-size payload union for embedding in a
    /// [`crate::Packet`]. Bytes beyond the struct's own size are zero.
    #[must_use]
    pub fn to_payload_bytes(self) -> [u8; PAYLOAD_CAPACITY] {
        let mut out = [0u8; PAYLOAD_CAPACITY];
        let bytes = self.as_bytes();
        out[..bytes.len()].copy_from_slice(bytes);
        out
    }

    /// The advertised display name, decoded up to its NUL terminator.
    pub fn name(&self) -> Result<&str, ProtocolError> {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..end]).map_err(|_| ProtocolError::InvalidName)
    }

    /// The sender's MAC address.
    #[must_use]
    pub fn sender_mac(&self) -> MacAddr {
        MacAddr::new(self.sender_mac)
    }

    /// Visibility the sender advertises.
    #[must_use]
    pub fn visibility(&self) -> Option<Visibility> {
        Visibility::try_from_u8(self.visibility)
    }

    /// True if a PWK is attached.
    #[must_use]
    pub fn has_pwk(&self) -> bool {
        self.has_pwk != 0
    }

    /// True if an LWK is attached.
    #[must_use]
    pub fn has_lwk(&self) -> bool {
        self.has_lwk != 0
    }

    /// The attached PWK, if any.
    #[must_use]
    pub fn pwk(&self) -> Option<[u8; 16]> {
        self.has_pwk().then_some(self.pwk)
    }

    /// The attached LWK, if any.
    #[must_use]
    pub fn lwk(&self) -> Option<[u8; 16]> {
        self.has_lwk().then_some(self.lwk)
    }
}

impl fmt::Debug for ConnectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectInfo")
            .field("name", &self.name())
            .field("sender_mac", &self.sender_mac())
            .field("visibility", &self.visibility())
            .field("has_pwk", &self.has_pwk())
            .field("has_lwk", &self.has_lwk())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_payload_bytes() {
        let info =
            ConnectInfo::new("h", MacAddr::new([2, 0, 0, 0, 0, 1]), Visibility::Public, Some([7; 16]), None);
        let raw = info.to_payload_bytes();

        let decoded = ConnectInfo::from_payload(&raw).expect("valid ConnectInfo");
        assert_eq!(decoded.name().unwrap(), "h");
        assert_eq!(decoded.sender_mac(), MacAddr::new([2, 0, 0, 0, 0, 1]));
        assert!(decoded.has_pwk());
        assert!(!decoded.has_lwk());
        assert_eq!(decoded.pwk(), Some([7; 16]));
    }

    #[test]
    fn truncates_overlong_name() {
        let long_name = "x".repeat(MAX_NAME_LEN + 10);
        let info = ConnectInfo::new(&long_name, MacAddr::BROADCAST, Visibility::Private, None, None);
        assert_eq!(info.name().unwrap().len(), MAX_NAME_LEN);
    }
}
