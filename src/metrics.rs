// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalized per-device metrics.

use crate::response::SystemInfo;
use crate::types::BestDifficulty;

/// A normalized metrics snapshot for one device.
///
/// Produced from a raw [`SystemInfo`] payload; never persisted directly
/// (the durable form is [`CachedDeviceMetrics`](crate::store::CachedDeviceMetrics)).
///
/// # Examples
///
/// ```
/// use axefleet::metrics::DeviceMetrics;
/// use axefleet::response::SystemInfo;
///
/// let info = SystemInfo::from_json(r#"{"hashRate":500.0,"temp":60.0,"power":15.0}"#).unwrap();
/// let metrics = DeviceMetrics::from(&info);
/// assert_eq!(metrics.efficiency(), Some(30.0)); // 15 W / 0.5 TH
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceMetrics {
    /// Hashrate in GH/s.
    pub hashrate: f64,
    /// Chip temperature in °C.
    pub temperature: f64,
    /// Power draw in W.
    pub power: f64,
    /// Best share difficulty, normalized to millions.
    pub best_difficulty: Option<BestDifficulty>,
    /// Mining pool URL.
    pub pool_url: Option<String>,
    /// Device hostname.
    pub hostname: Option<String>,
    /// Current block height, if known.
    pub block_height: Option<u64>,
    /// Current network difficulty, if known.
    pub network_difficulty: Option<f64>,
}

impl DeviceMetrics {
    /// Derived efficiency in W/TH, or `None` while the device reports zero
    /// hashrate (freshly booted or stalled).
    #[must_use]
    pub fn efficiency(&self) -> Option<f64> {
        if self.hashrate > 0.0 {
            Some(self.power / (self.hashrate / 1000.0))
        } else {
            None
        }
    }

    /// Merges a newer snapshot into this one, returning the result.
    ///
    /// All fields take the newer value, with one field-level exception: a
    /// known-good non-zero temperature survives a newer reading that would
    /// zero it out (firmware briefly reports 0 °C after a settings change).
    #[must_use]
    pub fn merged_with(&self, newer: &Self) -> Self {
        let mut merged = newer.clone();
        if merged.temperature == 0.0 && self.temperature > 0.0 {
            merged.temperature = self.temperature;
        }
        merged
    }
}

/// Selector for a single chartable metric field.
///
/// History and chart consumers pick a field by tag instead of holding a
/// closure per series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricField {
    /// Hashrate in GH/s.
    Hashrate,
    /// Chip temperature in °C.
    Temperature,
    /// Power draw in W.
    Power,
    /// Derived efficiency in W/TH.
    Efficiency,
}

impl MetricField {
    /// Reads the selected field out of a snapshot.
    ///
    /// Returns `None` only for [`Efficiency`](Self::Efficiency) while the
    /// device reports zero hashrate.
    #[must_use]
    pub fn value_in(&self, metrics: &DeviceMetrics) -> Option<f64> {
        match self {
            Self::Hashrate => Some(metrics.hashrate),
            Self::Temperature => Some(metrics.temperature),
            Self::Power => Some(metrics.power),
            Self::Efficiency => metrics.efficiency(),
        }
    }
}

impl From<&SystemInfo> for DeviceMetrics {
    fn from(info: &SystemInfo) -> Self {
        let best_difficulty = info
            .best_diff
            .as_deref()
            .and_then(|raw| raw.parse::<BestDifficulty>().ok());

        Self {
            hashrate: info.hash_rate,
            temperature: info.temp,
            power: info.power,
            best_difficulty,
            pool_url: info.stratum_url.clone(),
            hostname: info.hostname.clone(),
            block_height: info.block_height,
            network_difficulty: info.network_difficulty,
        }
    }
}
