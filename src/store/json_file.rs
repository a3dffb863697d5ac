// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON-file-backed store implementation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{CachedDeviceMetrics, MetricsCacheStore, SavedDevice, SavedDeviceStore};
use crate::types::DeviceAddress;

/// Format version is carried in the file name; a format change bumps the
/// name and silently orphans the old file instead of migrating it.
const DEVICES_FILE: &str = "devices.v1.json";
const METRICS_CACHE_FILE: &str = "metrics-cache.v2.json";

/// File-backed implementation of both store traits.
///
/// All operations are best-effort: a missing, unreadable or corrupt file
/// reads as empty, and write failures are logged and dropped. The files
/// live directly under the directory the host provides.
///
/// # Examples
///
/// ```no_run
/// use axefleet::store::{JsonStore, SavedDeviceStore};
///
/// let store = JsonStore::new("/var/lib/axefleet");
/// let devices = store.load();
/// ```
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Creates a store rooted at `dir`.
    ///
    /// The directory is created lazily on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        if !path.exists() {
            return None;
        }

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to read store file");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to decode store file");
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) {
        if let Err(err) = self.try_write_json(name, value) {
            tracing::warn!(file = %name, error = %err, "Failed to write store file");
        }
    }

    fn try_write_json<T: Serialize>(&self, name: &str, value: &T) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string_pretty(value)?;
        fs::write(self.dir.join(name), contents)
    }

    /// Returns the directory this store writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SavedDeviceStore for JsonStore {
    fn load(&self) -> Vec<SavedDevice> {
        self.read_json(DEVICES_FILE).unwrap_or_default()
    }

    fn save(&self, devices: &[SavedDevice]) {
        self.write_json(DEVICES_FILE, &devices);
    }
}

impl MetricsCacheStore for JsonStore {
    fn load_all(&self) -> HashMap<DeviceAddress, CachedDeviceMetrics> {
        self.read_json(METRICS_CACHE_FILE).unwrap_or_default()
    }

    fn save_all(&self, entries: &HashMap<DeviceAddress, CachedDeviceMetrics>) {
        self.write_json(METRICS_CACHE_FILE, entries);
    }
}
