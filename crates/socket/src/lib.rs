//! relay-socket: one shared UDP receive socket and one shared UDP send
//! socket for the whole process, demultiplexing inbound RTP to translation
//! cabins by SSRC.
//!
//! A dedicated router task owns the receive socket; cabins never bind their
//! own sockets. This mirrors the upstream's "shared socket manager" design,
//! which exists because SFUs commonly expect a single stable RTP
//! destination per relay rather than one UDP port per speaker.

pub mod error;

pub use error::{Result, SocketHubError};

use dashmap::DashMap;
use relay_core::CabinKey;
use relay_ports::PortAllocator;
use socket2::{Domain, Socket, Type};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

pub const DEFAULT_RX_PORT: u16 = 35000;
const RECV_BUFFER_BYTES: usize = 1024 * 1024;
const MAX_DATAGRAM_BYTES: usize = 4096;
const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Invoked by the router task for every datagram routed to a cabin. Must
/// not block: decode/resample work happens inline with the router loop.
pub type RtpCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

pub struct SocketHubConfig {
    pub rx_addr: SocketAddr,
    /// If set, the send socket binds to this local port (for SFUs that
    /// expect symmetric source/destination ports). `None` leaves it
    /// ephemeral.
    pub tx_source_port: Option<u16>,
}

impl Default for SocketHubConfig {
    fn default() -> Self {
        Self {
            rx_addr: SocketAddr::new(std::net::Ipv4Addr::UNSPECIFIED.into(), DEFAULT_RX_PORT),
            tx_source_port: None,
        }
    }
}

struct Registration {
    ssrc: u32,
    ports: (u16, u16),
    callback: RtpCallback,
}

struct Inner {
    rx_socket: UdpSocket,
    tx_socket: UdpSocket,
    ssrc_to_cabin: DashMap<u32, CabinKey>,
    cabins: DashMap<CabinKey, Registration>,
    ports: Arc<PortAllocator>,
    running: AtomicBool,
}

#[derive(Clone)]
pub struct SharedSocketHub {
    inner: Arc<Inner>,
}

impl SharedSocketHub {
    pub async fn bind(config: SocketHubConfig, ports: Arc<PortAllocator>) -> Result<Self> {
        let rx_socket = bind_with_recv_buffer(config.rx_addr, RECV_BUFFER_BYTES)
            .map_err(|source| SocketHubError::BindReceive { addr: config.rx_addr, source })?;

        let tx_bind_addr = SocketAddr::new(
            std::net::Ipv4Addr::UNSPECIFIED.into(),
            config.tx_source_port.unwrap_or(0),
        );
        let tx_socket = UdpSocket::bind(tx_bind_addr)
            .await
            .map_err(SocketHubError::BindSend)?;

        debug!(rx_addr = %config.rx_addr, "shared socket hub bound");

        Ok(Self {
            inner: Arc::new(Inner {
                rx_socket,
                tx_socket,
                ssrc_to_cabin: DashMap::new(),
                cabins: DashMap::new(),
                ports,
                running: AtomicBool::new(true),
            }),
        })
    }

    /// Allocates two bookkeeping ports for the cabin and registers its SSRC
    /// and callback. The returned ports are reported to the SFU for
    /// observability; all actual traffic still flows over the shared
    /// sockets.
    pub async fn register(
        &self,
        cabin_key: CabinKey,
        ssrc: u32,
        callback: RtpCallback,
    ) -> Result<(u16, u16)> {
        if self.inner.cabins.contains_key(&cabin_key) {
            return Err(SocketHubError::AlreadyRegistered);
        }

        let rx_port = self.inner.ports.allocate(0).await?;
        let tx_port = match self.inner.ports.allocate(0).await {
            Ok(p) => p,
            Err(e) => {
                self.inner.ports.release(rx_port);
                return Err(e.into());
            }
        };

        self.inner.ssrc_to_cabin.insert(ssrc, cabin_key.clone());
        self.inner.cabins.insert(
            cabin_key,
            Registration {
                ssrc,
                ports: (rx_port, tx_port),
                callback,
            },
        );

        Ok((rx_port, tx_port))
    }

    pub fn unregister(&self, cabin_key: &CabinKey) {
        if let Some((_, reg)) = self.inner.cabins.remove(cabin_key) {
            self.inner.ssrc_to_cabin.remove(&reg.ssrc);
            self.inner.ports.release(reg.ports.0);
            self.inner.ports.release(reg.ports.1);
        }
    }

    pub fn registered_ssrc(&self, cabin_key: &CabinKey) -> Option<u32> {
        self.inner.cabins.get(cabin_key).map(|r| r.ssrc)
    }

    pub fn registered_count(&self) -> usize {
        self.inner.cabins.len()
    }

    pub async fn send(&self, packet: &[u8], dest: SocketAddr) -> bool {
        match self.inner.tx_socket.send_to(packet, dest).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, %dest, "failed to send RTP packet to SFU");
                false
            }
        }
    }

    pub fn shutdown(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
    }

    /// Spawns the router task, which owns the receive socket for the
    /// lifetime of the hub. SSRC routing: exact match dispatches to that
    /// cabin; with no match and exactly one cabin registered, that cabin's
    /// SSRC is rewritten to the observed value (auto-learn); otherwise the
    /// packet is dropped.
    pub fn spawn_router(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { router_loop(inner).await })
    }
}

async fn router_loop(inner: Arc<Inner>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
    while inner.running.load(Ordering::SeqCst) {
        let recv = tokio::time::timeout(RECV_TIMEOUT, inner.rx_socket.recv_from(&mut buf)).await;
        let (len, _from) = match recv {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                warn!(error = %e, "error reading from shared receive socket");
                continue;
            }
            Err(_timeout) => continue,
        };

        if len < relay_rtp::FIXED_HEADER_LEN {
            trace!(len, "dropping undersized datagram");
            continue;
        }

        let ssrc = match relay_rtp::peek_ssrc(&buf[..len]) {
            Ok(s) => s,
            Err(_) => continue,
        };

        if let Some(cabin_key) = inner.ssrc_to_cabin.get(&ssrc).map(|r| r.clone()) {
            if let Some(reg) = inner.cabins.get(&cabin_key) {
                (reg.callback)(&buf[..len]);
            }
            continue;
        }

        if inner.cabins.len() == 1 {
            if let Some(mut entry) = inner.cabins.iter_mut().next() {
                let cabin_key = entry.key().clone();
                let old_ssrc = entry.value().ssrc;
                entry.value_mut().ssrc = ssrc;
                inner.ssrc_to_cabin.remove(&old_ssrc);
                inner.ssrc_to_cabin.insert(ssrc, cabin_key);
                debug!(old_ssrc, new_ssrc = ssrc, "auto-learned SSRC for sole registered cabin");
                (entry.value().callback)(&buf[..len]);
            }
            continue;
        }

        trace!(ssrc, "dropping datagram for unknown SSRC");
    }
}

fn bind_with_recv_buffer(addr: SocketAddr, recv_buffer_bytes: usize) -> std::io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_recv_buffer_size(recv_buffer_bytes)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}
