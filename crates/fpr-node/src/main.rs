//! Fast Peer Router node binary.
//!
//! Wires `fpr-core::SystemEnv` (real clock + OS RNG) and
//! `UdpBroadcastLink` (a UDP-broadcast stand-in for the reference radio
//! medium) into one `fpr_router::Router`, then drives its cooperating tasks
//! — receive, periodic broadcast/keepalive — from a single `select!` loop,
//! matching the spec's "small number of long-lived cooperating tasks" model
//! for a resource-constrained node.
//!
//! ```bash
//! fpr-node --name host-a --mac 02:00:00:00:00:01 --role host --bind 0.0.0.0:9400
//! fpr-node --name client-b --mac 02:00:00:00:00:02 --role client --bind 0.0.0.0:9400
//! ```

mod udp_link;

use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use fpr_core::SystemEnv;
use fpr_proto::{FRAME_MTU, MacAddr};
use fpr_router::{PowerMode, Role, Router, RouterConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::udp_link::UdpBroadcastLink;

/// Fast Peer Router node
#[derive(Parser, Debug)]
#[command(name = "fpr-node")]
#[command(about = "Fast Peer Router demonstration node")]
#[command(version)]
struct Args {
    /// Display name this node advertises
    #[arg(long)]
    name: String,

    /// This node's MAC address, colon-separated hex (e.g. 02:00:00:00:00:01)
    #[arg(long)]
    mac: String,

    /// Role to start in
    #[arg(long, value_enum, default_value_t = CliRole::Client)]
    role: CliRole,

    /// Local UDP address to bind the broadcast medium to
    #[arg(long, default_value = "0.0.0.0:9400")]
    bind: String,

    /// Subnet broadcast address frames are sent to
    #[arg(long, default_value = "255.255.255.255:9400")]
    broadcast: String,

    /// Radio channel passed through to the link layer (not interpreted here)
    #[arg(long, default_value_t = 0)]
    channel: u8,

    /// Scale every periodic interval for a low-power node
    #[arg(long)]
    low_power: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliRole {
    Client,
    Host,
    Extender,
}

impl From<CliRole> for Role {
    fn from(role: CliRole) -> Self {
        match role {
            CliRole::Client => Role::Client,
            CliRole::Host => Role::Host,
            CliRole::Extender => Role::Extender,
        }
    }
}

fn parse_mac(raw: &str) -> Result<MacAddr, String> {
    let mut octets = [0u8; 6];
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 6 {
        return Err(format!("expected 6 colon-separated octets, got {}", parts.len()));
    }
    for (slot, part) in octets.iter_mut().zip(parts) {
        *slot = u8::from_str_radix(part, 16).map_err(|e| format!("invalid octet '{part}': {e}"))?;
    }
    Ok(MacAddr::new(octets))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let local_mac = parse_mac(&args.mac)?;
    let bind_addr: SocketAddr = args.bind.parse()?;
    let broadcast_addr: SocketAddr = args.broadcast.parse()?;

    tracing::info!(%local_mac, role = ?args.role, "fpr-node starting");

    let (link, receiver) = udp_link::bind(bind_addr, broadcast_addr).await?;
    tracing::info!(bound = %link.local_addr()?, "bound UDP broadcast medium");

    let env = SystemEnv::new();
    let mut router = Router::new(env, link, local_mac);

    let config = RouterConfig {
        name: args.name,
        channel: args.channel,
        power_mode: if args.low_power { PowerMode::LowPower } else { PowerMode::Normal },
        ..RouterConfig::default()
    };
    router.init(config).await?;
    router.start()?;
    router.set_mode(args.role.into()).await?;

    tracing::info!(version = %Router::<SystemEnv, UdpBroadcastLink>::get_protocol_version_string(), "router started");

    run(router, receiver, local_mac).await
}

async fn run(
    mut router: Router<SystemEnv, UdpBroadcastLink>,
    receiver: udp_link::UdpReceiver,
    local_mac: MacAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut recv_buf = [0u8; FRAME_MTU];
    let mut loop_ticker = tokio::time::interval(router.broadcast_interval());
    let mut reconnect_ticker = tokio::time::interval(router.reconnect_interval());

    loop {
        tokio::select! {
            result = receiver.recv(&mut recv_buf) => {
                match result {
                    Ok(len) => dispatch_frame(&mut router, &recv_buf[..len], local_mac).await,
                    Err(e) => tracing::warn!(error = %e, "receive error"),
                }
            }
            _ = loop_ticker.tick() => router.run_loop_tick().await,
            _ = reconnect_ticker.tick() => router.run_reconnect_tick().await,
        }
    }
}

/// Decodes just enough of an inbound frame to recover `origin_mac` (the
/// medium itself carries no link-layer address), drops our own looped-back
/// broadcasts, and hands the frame to the router.
async fn dispatch_frame(
    router: &mut Router<SystemEnv, UdpBroadcastLink>,
    bytes: &[u8],
    local_mac: MacAddr,
) {
    let Ok(packet) = fpr_proto::Packet::decode(bytes) else {
        return;
    };
    if packet.origin_mac() == local_mac {
        return;
    }
    router.on_frame(packet.origin_mac(), packet.dest_mac(), 0, bytes).await;
}
