//! Production [`Environment`] implementation using system time and RNG.
//!
//! Grounded on the teacher's `lockframe-server::system_env::SystemEnv`: real
//! `std::time::Instant` for the clock, `tokio::time::sleep` for the one async
//! primitive the protocol needs, and `getrandom` for cryptographic key
//! material. `fpr-harness` swaps this for a seeded virtual clock/RNG; nothing
//! else in the workspace depends on which one is plugged in.

use std::time::Duration;

use crate::env::Environment;

/// Production environment using system time and cryptographic RNG.
#[derive(Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Creates a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - node cannot generate session keys");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::disallowed_methods)]
    fn time_advances() {
        let env = SystemEnv::new();
        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();
        assert!(t2 > t1);
    }

    #[test]
    fn random_bytes_fills_buffer() {
        let env = SystemEnv::new();
        let mut bytes = [0u8; 64];
        env.random_bytes(&mut bytes);
        assert!(bytes.iter().filter(|&&b| b != 0).count() > 32);
    }

    #[tokio::test]
    async fn sleep_waits_at_least_the_requested_duration() {
        let env = SystemEnv::new();
        let start = env.now();
        env.sleep(Duration::from_millis(30)).await;
        assert!(env.now() - start >= Duration::from_millis(30));
    }
}
