// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persisted device records.

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::DeviceMetrics;
use crate::types::{BestDifficulty, DeviceAddress};

/// A device the user has added to their fleet.
///
/// Identity and equality are defined by `address`, not `id`: re-adding a
/// device at the same address is the same device, even though it gets a
/// fresh record id.
///
/// # Examples
///
/// ```
/// use axefleet::store::SavedDevice;
///
/// let a = SavedDevice::new("Garage", "192.168.1.44".parse().unwrap());
/// let b = SavedDevice::new("Renamed", "192.168.1.44".parse().unwrap());
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDevice {
    /// Record identifier, unique per save action.
    pub id: Uuid,
    /// User-facing name.
    pub display_name: String,
    /// The device address; the identity of this record.
    pub address: DeviceAddress,
}

impl SavedDevice {
    /// Creates a new record with a fresh id.
    #[must_use]
    pub fn new(display_name: impl Into<String>, address: DeviceAddress) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            address,
        }
    }
}

impl PartialEq for SavedDevice {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for SavedDevice {}

impl Hash for SavedDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

/// The durable form of a metrics snapshot.
///
/// Stored keyed by device address, with an ISO-8601 timestamp so consumers
/// can judge staleness. Optional fields stay absent when the device never
/// reported them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedDeviceMetrics {
    /// Hashrate in GH/s.
    pub hashrate: f64,
    /// Power draw in W.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    /// Best share difficulty in millions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_difficulty: Option<f64>,
    /// Device hostname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Mining pool URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_url: Option<String>,
    /// Chip temperature in °C.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// When this snapshot was captured.
    pub last_updated: DateTime<Utc>,
}

impl CachedDeviceMetrics {
    /// Captures a metrics snapshot for persistence, stamped now.
    #[must_use]
    pub fn capture(metrics: &DeviceMetrics) -> Self {
        Self {
            hashrate: metrics.hashrate,
            power: Some(metrics.power),
            best_difficulty: metrics.best_difficulty.map(|d| d.as_millions()),
            hostname: metrics.hostname.clone(),
            pool_url: metrics.pool_url.clone(),
            temperature: (metrics.temperature != 0.0).then_some(metrics.temperature),
            last_updated: Utc::now(),
        }
    }

    /// Rehydrates the cached snapshot into live metrics form.
    #[must_use]
    pub fn to_metrics(&self) -> DeviceMetrics {
        DeviceMetrics {
            hashrate: self.hashrate,
            temperature: self.temperature.unwrap_or_default(),
            power: self.power.unwrap_or_default(),
            best_difficulty: self.best_difficulty.map(BestDifficulty::from_millions),
            pool_url: self.pool_url.clone(),
            hostname: self.hostname.clone(),
            block_height: None,
            network_difficulty: None,
        }
    }
}
