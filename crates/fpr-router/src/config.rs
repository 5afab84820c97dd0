//! Build-time constants and runtime configuration for the router.

use std::time::Duration;

/// Pause between non-final fragments of an outbound message, giving the
/// receiver's link layer a chance to drain (reference: 2 ms).
pub const INTER_FRAGMENT_PAUSE: Duration = Duration::from_millis(2);

/// How often a HOST broadcasts device-info.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(5);

/// How often the keepalive/reconnect task scans for stale peers.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// A CONNECTED peer not heard from for longer than this is demoted back to
/// `Discovered`.
pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on simultaneously CONNECTED clients for a HOST.
pub const DEFAULT_MAX_PEERS: usize = 8;

/// Multiplier applied to every periodic interval in [`PowerMode::LowPower`].
pub const LOW_POWER_SCALE_FACTOR: u32 = 4;

/// Power mode, scaling every periodic task's interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerMode {
    /// Reference intervals, unscaled.
    #[default]
    Normal,
    /// Every periodic interval multiplied by [`LOW_POWER_SCALE_FACTOR`].
    LowPower,
}

impl PowerMode {
    /// Scales `interval` according to this power mode.
    #[must_use]
    pub fn scale(self, interval: Duration) -> Duration {
        match self {
            Self::Normal => interval,
            Self::LowPower => interval * LOW_POWER_SCALE_FACTOR,
        }
    }
}

/// Whether a host (or client re-scan) admits peers automatically or only
/// after an application callback approves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// New peers are admitted without an application round-trip.
    #[default]
    Auto,
    /// Admission is gated on the registered request/selection callback.
    Manual,
}

/// HOST-role configuration.
#[derive(Debug, Clone, Copy)]
pub struct HostConfig {
    /// Maximum simultaneously CONNECTED clients.
    pub max_peers: usize,
    /// AUTO or MANUAL admission.
    pub mode: ConnectionMode,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self { max_peers: DEFAULT_MAX_PEERS, mode: ConnectionMode::Auto }
    }
}

/// CLIENT-role configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientConfig {
    /// AUTO or MANUAL host selection.
    pub mode: ConnectionMode,
}

/// Top-level router configuration, supplied at `init()`.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Display name this node advertises in `ConnectInfo`.
    pub name: String,
    /// Radio channel to bind the link layer to. Not interpreted by the
    /// router itself; passed through to the `LinkLayer` implementation.
    pub channel: u8,
    /// Power mode, scaling every periodic interval.
    pub power_mode: PowerMode,
    /// Broadcast interval before power-mode scaling.
    pub broadcast_interval: Duration,
    /// Reconnect-scan interval before power-mode scaling.
    pub reconnect_interval: Duration,
    /// Idle duration after which a CONNECTED peer is demoted.
    pub reconnect_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            channel: 0,
            power_mode: PowerMode::default(),
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_power_scales_intervals() {
        assert_eq!(
            PowerMode::LowPower.scale(Duration::from_secs(1)),
            Duration::from_secs(u64::from(LOW_POWER_SCALE_FACTOR))
        );
        assert_eq!(PowerMode::Normal.scale(Duration::from_secs(1)), Duration::from_secs(1));
    }
}
