//! Per-host request pacing
//!
//! Runs for different sources may hit the same host, so pacing is keyed by
//! hostname rather than by source. Each host gets one handle, created on first
//! use through the map's entry API so two runs can never install competing
//! handles for the same host.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

type HostSlot = Arc<Mutex<Option<Instant>>>;

/// Registry of per-host handles shared by all concurrent runs
#[derive(Debug)]
pub struct HostLimiter {
    min_interval: Duration,
    hosts: DashMap<String, HostSlot>,
}

/// Exclusive access to a host; the next request to it waits until this drops
#[derive(Debug)]
pub struct HostPermit {
    _guard: OwnedMutexGuard<Option<Instant>>,
}

impl HostLimiter {
    /// Creates a limiter; a zero interval serialises requests without delaying them
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            hosts: DashMap::new(),
        }
    }

    /// Number of hosts seen so far
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    fn slot(&self, host: &str) -> HostSlot {
        self.hosts
            .entry(host.to_ascii_lowercase())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Waits for the host's handle and for the minimum interval to pass
    pub async fn acquire(&self, host: &str) -> HostPermit {
        let mut guard = self.slot(host).lock_owned().await;

        if let Some(last) = *guard {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!("Waiting {:?} before next request to {}", wait, host);
                tokio::time::sleep(wait).await;
            }
        }

        *guard = Some(Instant::now());
        HostPermit { _guard: guard }
    }
}
