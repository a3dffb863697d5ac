// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsed `/api/system/info` status payload.

use serde::Deserialize;

use crate::error::ProbeError;

/// Fields every firmware build reports; their absence is worth naming in a
/// decode diagnostic.
const REQUIRED_FIELDS: &[&str] = &["hashRate", "temp", "power"];

/// Device status as reported by `GET /api/system/info`.
///
/// All numeric units are as reported by the firmware: hashrate in GH/s,
/// temperature in °C, power in W, voltages in mV, frequency in MHz. The
/// best-difficulty value stays a raw string here; normalization happens in
/// [`DeviceMetrics`](crate::metrics::DeviceMetrics).
///
/// # Examples
///
/// ```
/// use axefleet::response::SystemInfo;
///
/// let body = r#"{"hashRate":512.5,"temp":58.0,"power":14.2,"bestDiff":"5M","hostname":"bitaxe-garage"}"#;
/// let info = SystemInfo::from_json(body).unwrap();
/// assert_eq!(info.hash_rate, 512.5);
/// assert_eq!(info.hostname.as_deref(), Some("bitaxe-garage"));
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemInfo {
    /// Current hashrate in GH/s.
    #[serde(rename = "hashRate")]
    pub hash_rate: f64,

    /// Chip temperature in °C.
    #[serde(rename = "temp", default)]
    pub temp: f64,

    /// Power draw in W.
    #[serde(rename = "power", default)]
    pub power: f64,

    /// Best share difficulty, as a scaled string (e.g. `"5M"`).
    #[serde(rename = "bestDiff", default)]
    pub best_diff: Option<String>,

    /// Fan speed in percent.
    #[serde(rename = "fanspeed", default)]
    pub fanspeed: Option<u32>,

    /// Device hostname.
    #[serde(rename = "hostname", default)]
    pub hostname: Option<String>,

    /// ASIC model identifier (e.g. `"BM1368"`).
    #[serde(rename = "ASICModel", default)]
    pub asic_model: Option<String>,

    /// Firmware version string.
    #[serde(rename = "version", default)]
    pub version: Option<String>,

    /// Mining pool URL the device submits work to.
    #[serde(rename = "stratumURL", default)]
    pub stratum_url: Option<String>,

    /// Mining pool port.
    #[serde(rename = "stratumPort", default)]
    pub stratum_port: Option<u16>,

    /// Mining pool worker/user string.
    #[serde(rename = "stratumUser", default)]
    pub stratum_user: Option<String>,

    /// Seconds since last boot.
    #[serde(rename = "uptimeSeconds", default)]
    pub uptime_seconds: Option<u64>,

    /// Shares accepted by the pool since boot.
    #[serde(rename = "sharesAccepted", default)]
    pub shares_accepted: Option<u64>,

    /// Shares rejected by the pool since boot.
    #[serde(rename = "sharesRejected", default)]
    pub shares_rejected: Option<u64>,

    /// Configured core voltage in mV.
    #[serde(rename = "coreVoltage", default)]
    pub core_voltage: Option<u32>,

    /// Measured core voltage in mV.
    #[serde(rename = "coreVoltageActual", default)]
    pub core_voltage_actual: Option<u32>,

    /// ASIC frequency in MHz.
    #[serde(rename = "frequency", default)]
    pub frequency: Option<u32>,

    /// Input voltage in mV.
    #[serde(rename = "voltage", default)]
    pub voltage: Option<f64>,

    /// Current block height, if the firmware exposes it.
    #[serde(rename = "blockHeight", default)]
    pub block_height: Option<u64>,

    /// Current network difficulty, if the firmware exposes it.
    #[serde(rename = "networkDifficulty", default)]
    pub network_difficulty: Option<f64>,
}

impl SystemInfo {
    /// Decodes a raw response body.
    ///
    /// On failure the raw body is retained in the error together with a
    /// best-effort hint naming the missing fields, so a scan or aggregation
    /// pass can report what was unexpected without aborting.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Decode`] when the body is not a well-formed
    /// status object.
    pub fn from_json(body: &str) -> Result<Self, ProbeError> {
        serde_json::from_str(body).map_err(|err| ProbeError::Decode {
            hint: decode_hint(body, &err),
            body: body.to_string(),
        })
    }
}

/// Builds a diagnostic hint for a failed decode.
///
/// If the body is valid JSON, names the required fields it lacks; otherwise
/// falls back to the serde error message.
fn decode_hint(body: &str, err: &serde_json::Error) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => {
            let missing: Vec<&str> = REQUIRED_FIELDS
                .iter()
                .filter(|field| !map.contains_key(**field))
                .copied()
                .collect();
            if missing.is_empty() {
                Some(err.to_string())
            } else {
                Some(format!("missing fields: {}", missing.join(", ")))
            }
        }
        Ok(_) => Some("body is not a JSON object".to_string()),
        Err(_) => Some(err.to_string()),
    }
}
