// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory store implementations.
//!
//! Useful for tests and for hosts that do their own persistence.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{CachedDeviceMetrics, MetricsCacheStore, SavedDevice, SavedDeviceStore};
use crate::types::DeviceAddress;

/// An in-memory [`SavedDeviceStore`].
#[derive(Debug, Default)]
pub struct MemoryDeviceStore {
    devices: RwLock<Vec<SavedDevice>>,
}

impl MemoryDeviceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `devices`.
    #[must_use]
    pub fn with_devices(devices: Vec<SavedDevice>) -> Self {
        Self {
            devices: RwLock::new(devices),
        }
    }
}

impl SavedDeviceStore for MemoryDeviceStore {
    fn load(&self) -> Vec<SavedDevice> {
        self.devices.read().clone()
    }

    fn save(&self, devices: &[SavedDevice]) {
        *self.devices.write() = devices.to_vec();
    }
}

/// An in-memory [`MetricsCacheStore`].
#[derive(Debug, Default)]
pub struct MemoryMetricsCache {
    entries: RwLock<HashMap<DeviceAddress, CachedDeviceMetrics>>,
}

impl MemoryMetricsCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache pre-populated with `entries`.
    #[must_use]
    pub fn with_entries(entries: HashMap<DeviceAddress, CachedDeviceMetrics>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl MetricsCacheStore for MemoryMetricsCache {
    fn load_all(&self) -> HashMap<DeviceAddress, CachedDeviceMetrics> {
        self.entries.read().clone()
    }

    fn save_all(&self, entries: &HashMap<DeviceAddress, CachedDeviceMetrics>) {
        *self.entries.write() = entries.clone();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::metrics::DeviceMetrics;

    #[test]
    fn device_store_round_trip() {
        let store = MemoryDeviceStore::new();
        let devices = vec![SavedDevice::new("One", "10.0.0.1".parse().unwrap())];

        store.save(&devices);
        assert_eq!(store.load(), devices);
    }

    #[test]
    fn cache_prune_through_default_impl() {
        let keep: DeviceAddress = "10.0.0.1".parse().unwrap();
        let gone: DeviceAddress = "10.0.0.2".parse().unwrap();

        let snapshot = CachedDeviceMetrics::capture(&DeviceMetrics {
            hashrate: 100.0,
            ..DeviceMetrics::default()
        });

        let cache = MemoryMetricsCache::new();
        cache.save_all(&HashMap::from([
            (keep, snapshot.clone()),
            (gone, snapshot),
        ]));

        cache.prune(&HashSet::from([keep]));

        let remaining = cache.load_all();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains_key(&keep));
    }
}
