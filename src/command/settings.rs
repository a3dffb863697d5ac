// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Partial settings update for `PATCH /api/system`.

use serde::Serialize;

/// A partial device settings update.
///
/// Only fields that were explicitly set are serialized, so the device keeps
/// its current value for everything else.
///
/// # Examples
///
/// ```
/// use axefleet::command::SettingsPatch;
///
/// let patch = SettingsPatch::new()
///     .with_fan_speed(75)
///     .with_auto_fan(false)
///     .with_stratum("solo.ckpool.org", 3333, "bc1q.worker1");
///
/// let json = serde_json::to_value(&patch).unwrap();
/// assert_eq!(json["fanspeed"], 75);
/// assert!(json.get("hostname").is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsPatch {
    /// Fan speed in percent (ignored by the firmware while auto-fan is on).
    #[serde(rename = "fanspeed", skip_serializing_if = "Option::is_none")]
    fan_speed: Option<u16>,

    /// Automatic fan speed control.
    #[serde(rename = "autofanspeed", skip_serializing_if = "Option::is_none")]
    auto_fan: Option<bool>,

    /// Mining pool URL.
    #[serde(rename = "stratumURL", skip_serializing_if = "Option::is_none")]
    stratum_url: Option<String>,

    /// Mining pool port.
    #[serde(rename = "stratumPort", skip_serializing_if = "Option::is_none")]
    stratum_port: Option<u16>,

    /// Mining pool worker/user string.
    #[serde(rename = "stratumUser", skip_serializing_if = "Option::is_none")]
    stratum_user: Option<String>,

    /// Device hostname.
    #[serde(rename = "hostname", skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
}

impl SettingsPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fan speed in percent (0-100).
    #[must_use]
    pub fn with_fan_speed(mut self, percent: u16) -> Self {
        self.fan_speed = Some(percent.min(100));
        self
    }

    /// Enables or disables automatic fan control.
    #[must_use]
    pub fn with_auto_fan(mut self, enabled: bool) -> Self {
        self.auto_fan = Some(enabled);
        self
    }

    /// Sets the mining pool connection.
    #[must_use]
    pub fn with_stratum(
        mut self,
        url: impl Into<String>,
        port: u16,
        user: impl Into<String>,
    ) -> Self {
        self.stratum_url = Some(url.into());
        self.stratum_port = Some(port);
        self.stratum_user = Some(user.into());
        self
    }

    /// Sets the device hostname.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Returns true if no field was set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fan_speed.is_none()
            && self.auto_fan.is_none()
            && self.stratum_url.is_none()
            && self.stratum_port.is_none()
            && self.stratum_user.is_none()
            && self.hostname.is_none()
    }
}
