use std::collections::HashSet;
use std::net::TcpListener;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use vite_ssg_core::{Error, Result};

/// Hands out preview ports from a bounded range.
///
/// A port is only handed out when no other live lease holds it and it can
/// currently be bound on the loopback interface. Clones share the same set
/// of leases, so concurrent runs never receive the same port.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    range: RangeInclusive<u16>,
    leased: Arc<Mutex<HashSet<u16>>>,
}

/// A port reserved for one run; released on drop
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    leased: Arc<Mutex<HashSet<u16>>>,
}

impl PortAllocator {
    pub fn new(range: RangeInclusive<u16>) -> Self {
        Self {
            range,
            leased: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn allocate(&self) -> Result<PortLease> {
        let mut leased = self.leased.lock().unwrap_or_else(PoisonError::into_inner);

        for port in self.range.clone() {
            if leased.contains(&port) {
                continue;
            }
            if TcpListener::bind(("127.0.0.1", port)).is_ok() {
                leased.insert(port);
                debug!(port, "leased preview port");
                return Ok(PortLease {
                    port,
                    leased: Arc::clone(&self.leased),
                });
            }
        }

        Err(Error::ServerStart(format!(
            "No free port in range {}..={}",
            self.range.start(),
            self.range.end()
        )))
    }

    /// Number of ports currently leased
    pub fn in_use(&self) -> usize {
        self.leased
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.leased
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.port);
        debug!(port = self.port, "released preview port");
    }
}
