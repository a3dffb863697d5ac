// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP probe for the device status API.

use std::time::Duration;

use reqwest::Client;

use crate::command::SettingsPatch;
use crate::error::ProbeError;
use crate::response::SystemInfo;
use crate::types::DeviceAddress;

/// Single HTTP access point for all device communication.
///
/// The probe is cheap to clone (it wraps a shared connection pool) and holds
/// no per-device state; the target address and timeout are supplied per
/// call. Request timeouts are always caller-driven because the right bound
/// differs by context: short while sweeping a subnet, longer for an AP-mode
/// gateway or an interactive connection.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use axefleet::protocol::DeviceProbe;
/// use axefleet::types::DeviceAddress;
///
/// # async fn example() -> axefleet::Result<()> {
/// let probe = DeviceProbe::new()?;
/// let address: DeviceAddress = "192.168.1.44".parse()?;
///
/// let info = probe.system_info(&address, DeviceProbe::POLL_TIMEOUT).await?;
/// println!("{} GH/s", info.hash_rate);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DeviceProbe {
    client: Client,
    port: u16,
}

impl DeviceProbe {
    /// Per-probe timeout while sweeping a subnet.
    pub const SCAN_TIMEOUT: Duration = Duration::from_secs(2);
    /// Per-attempt timeout for the AP-mode gateway, which can be slow to
    /// answer while it is still bringing its access point up.
    pub const AP_TIMEOUT: Duration = Duration::from_secs(5);
    /// Timeout for connection establishment and steady-state polling.
    pub const POLL_TIMEOUT: Duration = Duration::from_secs(8);

    /// Default device API port.
    pub const DEFAULT_PORT: u16 = 80;

    /// Creates a probe with the default device port.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self, ProbeError> {
        Self::with_port(Self::DEFAULT_PORT)
    }

    /// Creates a probe targeting a non-standard device port.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_port(port: u16) -> Result<Self, ProbeError> {
        // No client-wide timeout: every request carries its own bound.
        let client = Client::builder().build().map_err(ProbeError::Transport)?;
        Ok(Self { client, port })
    }

    fn url(&self, address: &DeviceAddress, path: &str) -> String {
        if self.port == Self::DEFAULT_PORT {
            format!("http://{address}{path}")
        } else {
            format!("http://{address}:{}{path}", self.port)
        }
    }

    /// Fetches and decodes the device status.
    ///
    /// Issues one `GET /api/system/info` bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ProbeError`]: `Timeout`, `Unreachable`,
    /// `HttpStatus` for a non-success response, or `Decode` (retaining the
    /// raw body) when the payload is not a status object.
    pub async fn system_info(
        &self,
        address: &DeviceAddress,
        timeout: Duration,
    ) -> Result<SystemInfo, ProbeError> {
        let url = self.url(address, "/api/system/info");
        tracing::debug!(address = %address, ?timeout, "Probing device status");

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| classify(err, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::HttpStatus(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|err| classify(err, timeout))?;

        SystemInfo::from_json(&body)
    }

    /// Applies a partial settings update via `PATCH /api/system`.
    ///
    /// An empty patch is a no-op and issues no request.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ProbeError`] on transport failure or a
    /// non-success response status.
    pub async fn update_settings(
        &self,
        address: &DeviceAddress,
        patch: &SettingsPatch,
    ) -> Result<(), ProbeError> {
        if patch.is_empty() {
            return Ok(());
        }

        let url = self.url(address, "/api/system");
        tracing::debug!(address = %address, "Updating device settings");

        let response = self
            .client
            .patch(&url)
            .timeout(Self::POLL_TIMEOUT)
            .json(patch)
            .send()
            .await
            .map_err(|err| classify(err, Self::POLL_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }

    /// Restarts the device via `POST /api/system/restart`.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ProbeError`] on transport failure or a
    /// non-success response status.
    pub async fn restart(&self, address: &DeviceAddress) -> Result<(), ProbeError> {
        self.post(address, "/api/system/restart").await
    }

    /// Starts a firmware update via `POST /api/system/OTA`.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ProbeError`] on transport failure or a
    /// non-success response status.
    pub async fn start_ota(&self, address: &DeviceAddress) -> Result<(), ProbeError> {
        self.post(address, "/api/system/OTA").await
    }

    async fn post(&self, address: &DeviceAddress, path: &str) -> Result<(), ProbeError> {
        let url = self.url(address, path);
        tracing::info!(address = %address, path = %path, "Sending device command");

        let response = self
            .client
            .post(&url)
            .timeout(Self::POLL_TIMEOUT)
            .send()
            .await
            .map_err(|err| classify(err, Self::POLL_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }
}

/// Maps a transport error to the probe taxonomy.
fn classify(err: reqwest::Error, timeout: Duration) -> ProbeError {
    if err.is_timeout() {
        // u64 is plenty: timeouts here are seconds, not centuries.
        #[allow(clippy::cast_possible_truncation)]
        let millis = timeout.as_millis() as u64;
        ProbeError::Timeout(millis)
    } else if err.is_connect() {
        ProbeError::Unreachable(err.to_string())
    } else {
        ProbeError::Transport(err)
    }
}
