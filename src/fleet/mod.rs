// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fleet-wide metrics aggregation.
//!
//! One [`refresh`](FleetAggregator::refresh) pass probes every saved device
//! concurrently, merges the results with cache-backed fallback for
//! unreachable devices, recomputes fleet totals, and atomically publishes
//! the new snapshot. A device that errors is excluded from the reachable
//! set but keeps its last-known metrics, so totals degrade gracefully
//! instead of jumping to zero.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use axefleet::event::EventBus;
//! use axefleet::fleet::FleetAggregator;
//! use axefleet::protocol::DeviceProbe;
//! use axefleet::store::{MemoryMetricsCache, SavedDevice};
//!
//! # async fn example() -> axefleet::Result<()> {
//! let aggregator = FleetAggregator::new(
//!     DeviceProbe::new()?,
//!     Arc::new(MemoryMetricsCache::new()),
//!     EventBus::new(),
//! );
//!
//! let fleet = vec![SavedDevice::new("Garage", "192.168.1.44".parse()?)];
//! let snapshot = aggregator.refresh(&fleet).await?;
//! println!("{} GH/s total", snapshot.total_hashrate);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::error::Result;
use crate::event::{EventBus, FleetEvent};
use crate::metrics::DeviceMetrics;
use crate::protocol::DeviceProbe;
use crate::store::{CachedDeviceMetrics, MetricsCacheStore, SavedDevice};
use crate::types::{BestDifficulty, DeviceAddress};

/// The published result of one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct FleetSnapshot {
    /// Sum of hashrate over all merged devices, in GH/s.
    pub total_hashrate: f64,
    /// Sum of power over all merged devices, in W.
    pub total_power: f64,
    /// Highest best-difficulty across the fleet.
    pub best_difficulty: Option<BestDifficulty>,
    /// Merged per-device metrics (fresh, previous in-memory, or cached).
    pub per_device: HashMap<DeviceAddress, DeviceMetrics>,
    /// Addresses that answered successfully in this pass.
    ///
    /// Replaced wholesale each pass, never incrementally mutated, so
    /// consumers can never observe a mix of old and new reachability.
    pub reachable: HashSet<DeviceAddress>,
}

impl FleetSnapshot {
    /// Returns true if `address` answered in the most recent pass.
    #[must_use]
    pub fn is_reachable(&self, address: &DeviceAddress) -> bool {
        self.reachable.contains(address)
    }

    fn compute(
        per_device: HashMap<DeviceAddress, DeviceMetrics>,
        reachable: HashSet<DeviceAddress>,
    ) -> Self {
        let total_hashrate = per_device.values().map(|m| m.hashrate).sum();
        let total_power = per_device.values().map(|m| m.power).sum();
        let best_difficulty = per_device
            .values()
            .filter_map(|m| m.best_difficulty)
            .reduce(BestDifficulty::max);

        Self {
            total_hashrate,
            total_power,
            best_difficulty,
            per_device,
            reachable,
        }
    }
}

/// Aggregates metrics across the saved-device fleet.
pub struct FleetAggregator {
    probe: DeviceProbe,
    cache: Arc<dyn MetricsCacheStore>,
    events: EventBus,
    probe_timeout: Duration,
    snapshot_tx: watch::Sender<FleetSnapshot>,
    /// Single-flight guard: only one refresh pass may run at a time.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl FleetAggregator {
    /// Creates an aggregator with the default poll timeout.
    #[must_use]
    pub fn new(probe: DeviceProbe, cache: Arc<dyn MetricsCacheStore>, events: EventBus) -> Self {
        let (snapshot_tx, _) = watch::channel(FleetSnapshot::default());
        Self {
            probe,
            cache,
            events,
            probe_timeout: DeviceProbe::POLL_TIMEOUT,
            snapshot_tx,
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Sets the per-device probe timeout.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> FleetSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Returns a watcher that observes every published snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<FleetSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Seeds the snapshot from the durable cache, for cold-start display
    /// before the first refresh pass lands.
    ///
    /// Nothing is marked reachable; cached data is display-only.
    pub fn prime_from_cache(&self, devices: &[SavedDevice]) {
        let cached = self.cache.load_all();
        let per_device: HashMap<DeviceAddress, DeviceMetrics> = devices
            .iter()
            .filter_map(|device| {
                cached
                    .get(&device.address)
                    .map(|entry| (device.address, entry.to_metrics()))
            })
            .collect();

        if per_device.is_empty() {
            return;
        }

        tracing::debug!(devices = per_device.len(), "Primed snapshot from cache");
        self.snapshot_tx
            .send_replace(FleetSnapshot::compute(per_device, HashSet::new()));
    }

    /// Runs one aggregation pass over `devices`.
    ///
    /// Probes every device concurrently, merges failures against the
    /// previous in-memory value (else the durable cache), recomputes totals
    /// strictly from the merged map, publishes the snapshot atomically, and
    /// persists the merged metrics.
    ///
    /// A call arriving while a pass is already in flight is a no-op that
    /// returns the current snapshot: a stale pass can never supersede a
    /// newer one.
    ///
    /// # Errors
    ///
    /// Individual probe failures are recovered locally and never fail the
    /// pass; the signature stays fallible for parity with the rest of the
    /// crate's operations.
    pub async fn refresh(&self, devices: &[SavedDevice]) -> Result<FleetSnapshot> {
        let Ok(_guard) = self.refresh_gate.try_lock() else {
            tracing::debug!("Refresh already in flight, returning current snapshot");
            return Ok(self.snapshot());
        };

        // Snapshot the fleet list up front so concurrent edits by the host
        // cannot race this pass.
        let devices = devices.to_vec();
        let addresses: Vec<DeviceAddress> = {
            let mut seen = HashSet::new();
            devices
                .iter()
                .map(|d| d.address)
                .filter(|a| seen.insert(*a))
                .collect()
        };

        tracing::debug!(devices = addresses.len(), "Starting aggregation pass");

        let mut probes = JoinSet::new();
        for address in &addresses {
            let probe = self.probe.clone();
            let address = *address;
            let timeout = self.probe_timeout;
            probes.spawn(async move { (address, probe.system_info(&address, timeout).await) });
        }

        let mut fetched: HashMap<DeviceAddress, DeviceMetrics> = HashMap::new();
        let mut reachable: HashSet<DeviceAddress> = HashSet::new();

        while let Some(joined) = probes.join_next().await {
            let Ok((address, result)) = joined else {
                continue;
            };
            match result {
                Ok(info) => {
                    reachable.insert(address);
                    fetched.insert(address, DeviceMetrics::from(&info));
                }
                Err(err) => {
                    tracing::debug!(address = %address, error = %err, "Probe failed, will fall back");
                }
            }
        }

        let previous = self.snapshot_tx.borrow().per_device.clone();
        let cached = self.cache.load_all();

        let mut merged: HashMap<DeviceAddress, DeviceMetrics> = HashMap::new();
        for address in &addresses {
            let entry = if let Some(fresh) = fetched.remove(address) {
                match previous.get(address) {
                    Some(prev) => prev.merged_with(&fresh),
                    None => fresh,
                }
            } else if let Some(prev) = previous.get(address) {
                prev.clone()
            } else if let Some(entry) = cached.get(address) {
                entry.to_metrics()
            } else {
                continue;
            };
            merged.insert(*address, entry);
        }

        // All fetches have resolved; publish and persist. The reachable set
        // is replaced in one step, never OR'd with the previous pass.
        let snapshot = FleetSnapshot::compute(merged, reachable);
        self.snapshot_tx.send_replace(snapshot.clone());
        self.events.publish(FleetEvent::FleetRefreshed {
            reachable: snapshot.reachable.len(),
            total: addresses.len(),
        });

        let to_persist: HashMap<DeviceAddress, CachedDeviceMetrics> = snapshot
            .per_device
            .iter()
            .map(|(address, metrics)| (*address, CachedDeviceMetrics::capture(metrics)))
            .collect();
        self.cache.save_all(&to_persist);

        tracing::info!(
            reachable = snapshot.reachable.len(),
            total = addresses.len(),
            total_hashrate = snapshot.total_hashrate,
            "Aggregation pass completed"
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryMetricsCache;

    fn metrics(hashrate: f64, power: f64, diff_millions: Option<f64>) -> DeviceMetrics {
        DeviceMetrics {
            hashrate,
            power,
            best_difficulty: diff_millions.map(BestDifficulty::from_millions),
            ..DeviceMetrics::default()
        }
    }

    #[test]
    fn compute_totals_are_exact_sums_and_max() {
        let a: DeviceAddress = "10.0.0.1".parse().unwrap();
        let b: DeviceAddress = "10.0.0.2".parse().unwrap();

        let per_device = HashMap::from([
            (a, metrics(1000.0, 20.0, Some(5.0))),
            (b, metrics(480.0, 13.5, Some(12.0))),
        ]);

        let snapshot = FleetSnapshot::compute(per_device, HashSet::from([a, b]));

        assert_eq!(snapshot.total_hashrate, 1480.0);
        assert_eq!(snapshot.total_power, 33.5);
        assert_eq!(snapshot.best_difficulty.unwrap().as_millions(), 12.0);
    }

    #[test]
    fn compute_with_no_difficulties_has_none() {
        let a: DeviceAddress = "10.0.0.1".parse().unwrap();
        let per_device = HashMap::from([(a, metrics(100.0, 5.0, None))]);

        let snapshot = FleetSnapshot::compute(per_device, HashSet::new());
        assert!(snapshot.best_difficulty.is_none());
    }

    #[tokio::test]
    async fn prime_from_cache_populates_snapshot_without_reachability() {
        let device = SavedDevice::new("Garage", "10.0.0.1".parse().unwrap());

        let cache = MemoryMetricsCache::new();
        cache.save_all(&HashMap::from([(
            device.address,
            CachedDeviceMetrics::capture(&metrics(512.0, 14.0, None)),
        )]));

        let aggregator = FleetAggregator::new(
            DeviceProbe::new().unwrap(),
            Arc::new(cache),
            EventBus::new(),
        );
        aggregator.prime_from_cache(std::slice::from_ref(&device));

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.total_hashrate, 512.0);
        assert!(!snapshot.is_reachable(&device.address));
    }

    #[tokio::test]
    async fn prime_from_cache_ignores_unsaved_addresses() {
        let saved = SavedDevice::new("Garage", "10.0.0.1".parse().unwrap());
        let orphan: DeviceAddress = "10.0.0.9".parse().unwrap();

        let cache = MemoryMetricsCache::new();
        cache.save_all(&HashMap::from([(
            orphan,
            CachedDeviceMetrics::capture(&metrics(512.0, 14.0, None)),
        )]));

        let aggregator = FleetAggregator::new(
            DeviceProbe::new().unwrap(),
            Arc::new(cache),
            EventBus::new(),
        );
        aggregator.prime_from_cache(std::slice::from_ref(&saved));

        assert!(aggregator.snapshot().per_device.is_empty());
    }
}
