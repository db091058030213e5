//! Host port allocation for published lab services.
//!
//! Allocation is check-then-use: a port is reported free if it can be bound
//! right now, and the engine binds it moments later. Losing that race shows
//! up as a failed container launch.

use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};

use labvisor_common::error::{LabError, Result};

/// Source of host ports for newly launched lab containers.
pub trait PortAllocator: Send + Sync {
    /// Returns a port that is currently unused by the host TCP stack.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::PortExhausted`] if no free port can be found.
    fn allocate(&self) -> Result<u16>;
}

/// Allocator that probes the local TCP stack by binding.
#[derive(Debug)]
pub struct LocalPortAllocator {
    bind_host: IpAddr,
    range: Option<RangeInclusive<u16>>,
    cursor: AtomicUsize,
}

impl LocalPortAllocator {
    /// Allocates kernel-chosen ephemeral ports on all interfaces.
    #[must_use]
    pub const fn ephemeral() -> Self {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            range: None,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Allocates ports from `range` on all interfaces.
    #[must_use]
    pub const fn with_range(range: RangeInclusive<u16>) -> Self {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            range: Some(range),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Probes on `host` instead of all interfaces.
    #[must_use]
    pub const fn bind_host(mut self, host: IpAddr) -> Self {
        self.bind_host = host;
        self
    }

    fn is_free(&self, port: u16) -> bool {
        TcpListener::bind((self.bind_host, port)).is_ok()
    }

    fn allocate_ephemeral(&self) -> Result<u16> {
        let listener = TcpListener::bind((self.bind_host, 0)).map_err(|e| LabError::PortExhausted {
            message: format!("cannot bind an ephemeral port on {}: {e}", self.bind_host),
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| LabError::PortExhausted {
                message: format!("cannot read bound address: {e}"),
            })?
            .port();
        Ok(port)
    }

    /// Scans the range starting after the last allocation so concurrent
    /// creations in this process do not all race for the lowest port.
    fn allocate_in_range(&self, range: &RangeInclusive<u16>) -> Result<u16> {
        let start = *range.start();
        let len = usize::from(*range.end() - start) + 1;
        let offset = self.cursor.fetch_add(1, Ordering::Relaxed);
        for step in 0..len {
            let idx = (offset + step) % len;
            let Ok(delta) = u16::try_from(idx) else {
                continue;
            };
            let port = start + delta;
            if self.is_free(port) {
                self.cursor.store(idx + 1, Ordering::Relaxed);
                return Ok(port);
            }
            tracing::trace!(port, "port in use");
        }
        Err(LabError::PortExhausted {
            message: format!("all ports in {}-{} are in use", range.start(), range.end()),
        })
    }
}

impl Default for LocalPortAllocator {
    fn default() -> Self {
        Self::ephemeral()
    }
}

impl PortAllocator for LocalPortAllocator {
    fn allocate(&self) -> Result<u16> {
        let port = match &self.range {
            Some(range) => self.allocate_in_range(range)?,
            None => self.allocate_ephemeral()?,
        };
        tracing::debug!(port, "allocated host port");
        Ok(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    #[test]
    fn ephemeral_port_is_non_zero_and_bindable() {
        let alloc = LocalPortAllocator::ephemeral().bind_host(loopback());
        let port = alloc.allocate().unwrap();
        assert_ne!(port, 0);
        assert!(TcpListener::bind((loopback(), port)).is_ok());
    }

    #[test]
    fn occupied_port_is_skipped() {
        let held = TcpListener::bind((loopback(), 0)).unwrap();
        let busy = held.local_addr().unwrap().port();
        let Some(next) = busy.checked_add(1) else {
            return;
        };
        let alloc = LocalPortAllocator::with_range(busy..=next).bind_host(loopback());
        // Whatever the cursor position, the held port is never handed out.
        for _ in 0..3 {
            match alloc.allocate() {
                Ok(port) => assert_eq!(port, next),
                Err(err) => assert!(matches!(err, LabError::PortExhausted { .. })),
            }
        }
    }

    #[test]
    fn exhausted_range_is_reported() {
        let held = TcpListener::bind((loopback(), 0)).unwrap();
        let busy = held.local_addr().unwrap().port();
        let alloc = LocalPortAllocator::with_range(busy..=busy).bind_host(loopback());
        let err = alloc.allocate().unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains(&busy.to_string()));
    }

    #[test]
    fn allocations_rotate_through_the_range() {
        let probe = TcpListener::bind((loopback(), 0)).unwrap();
        let base = probe.local_addr().unwrap().port();
        drop(probe);
        let Some(end) = base.checked_add(3) else {
            return;
        };
        let alloc = LocalPortAllocator::with_range(base..=end).bind_host(loopback());
        let first = alloc.allocate().unwrap();
        let second = alloc.allocate().unwrap();
        assert_ne!(first, second);
    }
}
