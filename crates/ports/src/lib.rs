//! relay-ports: a thread-safe UDP port allocator.
//!
//! Mirrors the behaviour of a classic trial-bind port manager: allocation
//! probes whether a port can actually be bound before handing it out,
//! rather than trusting an in-memory free list alone (another process on
//! the host may already hold the port).

pub mod error;

pub use error::{PortError, Result};

use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct PortRange {
    pub lo: u16,
    pub hi: u16,
}

impl PortRange {
    pub fn new(lo: u16, hi: u16) -> Self {
        assert!(lo <= hi, "port range lo must be <= hi");
        Self { lo, hi }
    }

    fn contains(&self, port: u16) -> bool {
        port >= self.lo && port <= self.hi
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UsageStats {
    pub total: u32,
    pub used: u32,
}

impl UsageStats {
    pub fn available(&self) -> u32 {
        self.total.saturating_sub(self.used)
    }

    pub fn percent_used(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.used) / f64::from(self.total) * 100.0
        }
    }
}

struct State {
    range: PortRange,
    used: HashSet<u16>,
}

/// Allocates and tracks UDP ports within a configured range. All mutation
/// is serialized by a single mutex; bind probing happens while holding the
/// lock so two concurrent callers never race on the same candidate port.
pub struct PortAllocator {
    state: Mutex<State>,
}

impl PortAllocator {
    pub fn new(range: PortRange) -> Self {
        Self {
            state: Mutex::new(State {
                range,
                used: HashSet::new(),
            }),
        }
    }

    /// Allocates a port. If `requested` is non-zero, tries that port first;
    /// otherwise (or on failure) scans the configured range for the first
    /// bindable, unused port. Returns `0` (meaning "let the OS choose, and
    /// the caller must not expect it to be tracked here") if the range is
    /// fully exhausted.
    pub async fn allocate(&self, requested: u16) -> Result<u16> {
        if requested != 0 && self.try_reserve(requested).await {
            return Ok(requested);
        }

        let candidates: Vec<u16> = {
            let state = self.state.lock();
            (state.range.lo..=state.range.hi)
                .filter(|p| !state.used.contains(p))
                .collect()
        };

        for port in candidates {
            if self.try_reserve(port).await {
                return Ok(port);
            }
        }

        debug!("port range exhausted, falling back to ephemeral port 0");
        Ok(0)
    }

    /// Probes bindability of `port` outside the lock (the trial bind is the
    /// only async part), then atomically marks it used if still free.
    async fn try_reserve(&self, port: u16) -> bool {
        {
            let state = self.state.lock();
            if state.used.contains(&port) {
                return false;
            }
        }

        if !bind_probe(port).await {
            return false;
        }

        let mut state = self.state.lock();
        if state.used.contains(&port) {
            return false;
        }
        state.used.insert(port);
        true
    }

    pub fn release(&self, port: u16) {
        self.state.lock().used.remove(&port);
    }

    pub fn is_in_range(&self, port: u16) -> bool {
        self.state.lock().range.contains(port)
    }

    pub fn stats(&self) -> UsageStats {
        let state = self.state.lock();
        let total = u32::from(state.range.hi - state.range.lo + 1);
        UsageStats {
            total,
            used: state.used.len() as u32,
        }
    }

    pub fn range(&self) -> PortRange {
        self.state.lock().range
    }

    pub fn set_range(&self, range: PortRange) {
        self.state.lock().range = range;
    }

    /// Releases every tracked port. Emergency-use only (e.g. a supervisor
    /// restarting the relay after a crash of a dependent process).
    pub fn cleanup_all(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.used.len();
        state.used.clear();
        count
    }
}

async fn bind_probe(port: u16) -> bool {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    UdpSocket::bind(addr).await.is_ok()
}
