//! `UdpBroadcastLink`: a concrete [`LinkLayer`] standing in for the real
//! radio driver.
//!
//! Generalizes the teacher's `QuinnTransport` (a concrete transport behind an
//! abstract boundary, bound once and shared via `Arc`) to a genuinely
//! broadcast medium: one UDP socket with `SO_BROADCAST` set, sending every
//! frame — unicast or broadcast alike — to the subnet broadcast address. This
//! mirrors the reference radio medium, where every frame reaches every
//! receiver in range and MAC-based addressing is resolved by the FPR packet
//! fields, not by the medium itself. `register_peer`/`unregister_peer` are
//! no-ops here; a real radio driver would use them to program MAC-filtering
//! hardware, which a UDP socket has no equivalent of.
//!
//! [`LinkLayer`] has no `recv` method — receiving is driven externally by
//! whoever owns the medium, not by the router (see the spec's §6 driver
//! contract: `register_recv_cb`). [`UdpReceiver`] is the receive half,
//! sharing the same bound socket via a cloned `Arc` so it can be polled from
//! the node's main select loop while [`UdpBroadcastLink`] is moved into the
//! `Router`.

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use fpr_proto::MacAddr;
use fpr_router::{LinkError, LinkLayer};
use tokio::net::UdpSocket;

/// The send/registration half of the UDP-broadcast medium, implementing
/// [`LinkLayer`].
pub struct UdpBroadcastLink {
    socket: Arc<UdpSocket>,
    broadcast_addr: SocketAddr,
}

/// The receive half of the UDP-broadcast medium.
///
/// Shares the same bound socket as its paired [`UdpBroadcastLink`].
pub struct UdpReceiver {
    socket: Arc<UdpSocket>,
}

/// Binds one UDP socket on `bind_addr` with broadcast sends enabled, and
/// splits it into a send half ([`UdpBroadcastLink`]) and a receive half
/// ([`UdpReceiver`]).
pub async fn bind(
    bind_addr: SocketAddr,
    broadcast_addr: SocketAddr,
) -> std::io::Result<(UdpBroadcastLink, UdpReceiver)> {
    let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
    socket.set_broadcast(true)?;
    Ok((
        UdpBroadcastLink { socket: Arc::clone(&socket), broadcast_addr },
        UdpReceiver { socket },
    ))
}

impl UdpBroadcastLink {
    /// The address this link is actually bound to (useful when `bind_addr`'s
    /// port was 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl UdpReceiver {
    /// Receives the next frame from the medium into `buf`, returning the
    /// number of bytes written.
    ///
    /// The medium carries no link-layer address of its own (only a UDP
    /// socket address, which is not a MAC); the caller recovers `src_mac` by
    /// decoding the FPR packet's `origin_mac` field.
    pub async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        let (len, _from) = self.socket.recv_from(buf).await?;
        Ok(len)
    }
}

#[async_trait]
impl LinkLayer for UdpBroadcastLink {
    async fn register_peer(&self, mac: MacAddr) -> Result<(), LinkError> {
        tracing::debug!(%mac, "register_peer (no-op on a broadcast UDP medium)");
        Ok(())
    }

    async fn unregister_peer(&self, mac: MacAddr) -> Result<(), LinkError> {
        tracing::debug!(%mac, "unregister_peer (no-op on a broadcast UDP medium)");
        Ok(())
    }

    async fn send(&self, _mac: MacAddr, bytes: &[u8]) -> Result<(), LinkError> {
        self.socket
            .send_to(bytes, self.broadcast_addr)
            .await
            .map(|_| ())
            .map_err(|e| LinkError::SendFailed(e.to_string()))
    }
}
