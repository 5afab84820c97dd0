//! Key material for the Fast Peer Router handshake.
//!
//! A FPR session key (PWK or LWK) is a 128-bit value drawn from a
//! cryptographic RNG. This crate only carries the key *material* —
//! generation, constant-time comparison, and secure erasure on drop. The
//! four-message handshake state machine that drives when keys are
//! generated, sent, and verified lives in `fpr-core`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Byte length of a PWK/LWK.
pub const KEY_LEN: usize = 16;

/// A 128-bit session key (PWK or LWK).
///
/// Equality is constant-time (`subtle::ConstantTimeEq`) so that verifying a
/// peer-supplied key never leaks timing information about where the first
/// mismatching byte is. The bytes are zeroized when the key is dropped.
#[derive(Clone, Copy, Zeroize)]
pub struct Key128([u8; KEY_LEN]);

impl Key128 {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh key from the supplied random byte source.
    ///
    /// `fill` is expected to write cryptographically random bytes, mirroring
    /// `Environment::random_bytes` — this crate has no RNG of its own.
    pub fn generate(fill: impl FnOnce(&mut [u8])) -> Self {
        let mut bytes = [0u8; KEY_LEN];
        fill(&mut bytes);
        Self(bytes)
    }

    /// The raw key bytes, for embedding in a `ConnectInfo` control payload.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; KEY_LEN] {
        self.0
    }
}

impl PartialEq for Key128 {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}
impl Eq for Key128 {}

impl fmt::Debug for Key128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key128(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_keys_compare_equal() {
        let a = Key128::from_bytes([7; KEY_LEN]);
        let b = Key128::from_bytes([7; KEY_LEN]);
        assert_eq!(a, b);
    }

    #[test]
    fn differing_keys_compare_unequal() {
        let a = Key128::from_bytes([7; KEY_LEN]);
        let mut other = [7; KEY_LEN];
        other[15] = 8;
        let b = Key128::from_bytes(other);
        assert_ne!(a, b);
    }

    #[test]
    fn generate_uses_supplied_source() {
        let key = Key128::generate(|buf| buf.fill(0x42));
        assert_eq!(key.to_bytes(), [0x42; KEY_LEN]);
    }

    #[test]
    fn debug_does_not_print_key_material() {
        let key = Key128::from_bytes([1; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "Key128(..)");
    }
}
