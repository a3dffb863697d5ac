// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ephemeral scan results.

use crate::response::SystemInfo;
use crate::store::SavedDevice;
use crate::types::DeviceAddress;

/// A device found during a scan session.
///
/// Lives only for the duration of the scan; selecting it turns it into a
/// [`SavedDevice`].
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredDevice {
    /// Where the device answered.
    pub address: DeviceAddress,
    /// Display name (hostname, falling back to the address).
    pub name: String,
    /// Hashrate in GH/s at scan time.
    pub hashrate: f64,
    /// Chip temperature in °C at scan time.
    pub temperature: f64,
    /// Raw best-difficulty string as reported by the firmware.
    pub best_difficulty: Option<String>,
    /// Power draw in W at scan time.
    pub power: f64,
    /// Mining pool URL, if configured.
    pub pool_url: Option<String>,
    /// Block height, if the firmware exposes it.
    pub block_height: Option<u64>,
    /// Network difficulty, if the firmware exposes it.
    pub network_difficulty: Option<f64>,
}

impl DiscoveredDevice {
    /// Builds a discovery from a status payload.
    #[must_use]
    pub fn from_status(address: DeviceAddress, info: &SystemInfo) -> Self {
        let name = info
            .hostname
            .clone()
            .unwrap_or_else(|| address.to_string());

        Self {
            address,
            name,
            hashrate: info.hash_rate,
            temperature: info.temp,
            best_difficulty: info.best_diff.clone(),
            power: info.power,
            pool_url: info.stratum_url.clone(),
            block_height: info.block_height,
            network_difficulty: info.network_difficulty,
        }
    }

    /// Converts this discovery into a saved device.
    #[must_use]
    pub fn into_saved(self) -> SavedDevice {
        SavedDevice::new(self.name, self.address)
    }
}
