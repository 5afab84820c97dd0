//! Environment abstraction for deterministic testing.
//!
//! Decouples the protocol state machines from system resources (time,
//! randomness) so that `fpr-harness` can drive them under a seeded virtual
//! clock and RNG while `fpr-node` drives the same code against real system
//! resources.

use std::time::Duration;

/// Abstract environment providing time, randomness, and the one async
/// primitive the protocol needs.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards.
/// - `random_bytes()` uses cryptographically secure entropy in production.
/// - Methods are infallible except in exceptional circumstances (e.g. OS
///   entropy exhaustion, misconfigured simulation).
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; `fpr-harness` uses
    /// a virtual instant advanced by the simulation driver.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// The only async method in the trait. Used by the transmit pipeline's
    /// inter-fragment pause and by the loop/reconnect tasks' tick interval —
    /// never by the pure state-machine methods themselves.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// Used only for PWK/LWK generation. Given the same RNG seed, a
    /// simulation environment must produce the same sequence of bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`, e.g. for a sequence-rollover nonce.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
