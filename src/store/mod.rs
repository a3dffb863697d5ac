// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persisted fleet state.
//!
//! The core logic never touches ambient global state: the saved-device list
//! and the metrics cache are reached through the [`SavedDeviceStore`] and
//! [`MetricsCacheStore`] traits, so hosts can plug in their own storage and
//! tests can run against the in-memory implementations.
//!
//! The cache is an optimization for cold-start display, never a source of
//! truth: every storage failure degrades to "no cached data" instead of
//! propagating.

mod json_file;
mod memory;
mod saved_device;

use std::collections::{HashMap, HashSet};

pub use json_file::JsonStore;
pub use memory::{MemoryDeviceStore, MemoryMetricsCache};
pub use saved_device::{CachedDeviceMetrics, SavedDevice};

use crate::types::DeviceAddress;

/// Access to the persisted, ordered saved-device list.
///
/// Order is significant: it defines display order and access priority.
pub trait SavedDeviceStore: Send + Sync {
    /// Loads all saved devices, in persisted order.
    ///
    /// Storage failures degrade to an empty list.
    fn load(&self) -> Vec<SavedDevice>;

    /// Replaces the persisted list.
    ///
    /// Storage failures are logged and dropped.
    fn save(&self, devices: &[SavedDevice]);
}

/// Access to the durable address → last-known-metrics map.
pub trait MetricsCacheStore: Send + Sync {
    /// Loads the full cache.
    ///
    /// Storage failures degrade to an empty map.
    fn load_all(&self) -> HashMap<DeviceAddress, CachedDeviceMetrics>;

    /// Replaces the full cache.
    ///
    /// Storage failures are logged and dropped.
    fn save_all(&self, entries: &HashMap<DeviceAddress, CachedDeviceMetrics>);

    /// Drops every entry whose address is not in `live`, so removed devices
    /// leave no orphaned cache data behind.
    fn prune(&self, live: &HashSet<DeviceAddress>) {
        let mut entries = self.load_all();
        let before = entries.len();
        entries.retain(|address, _| live.contains(address));

        if entries.len() != before {
            tracing::debug!(
                removed = before - entries.len(),
                "Pruned orphaned cache entries"
            );
            self.save_all(&entries);
        }
    }
}
