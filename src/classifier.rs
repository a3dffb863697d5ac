// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Heuristic device family classification.
//!
//! Devices do not advertise a stable capability flag, so family
//! identification is best-effort string matching over the status payload.
//! A false negative is treated as "no device found" by callers, never as an
//! error.

use crate::response::SystemInfo;

/// Product-name fragments that identify a compatible device when they occur
/// in the hostname or firmware version string.
const NAME_FRAGMENTS: &[&str] = &["bitaxe", "axeos", "nerdaxe", "luckyminer"];

/// ASIC model prefixes used by the supported device families. A match
/// requires the prefix to be followed by a digit (e.g. `BM1368`), so that a
/// bare `"BM"` or an unrelated model string does not qualify.
const ASIC_PREFIXES: &[&str] = &["BM"];

/// Decides whether a status responder is a compatible device.
///
/// Pure predicate: matches known product-name fragments (case-insensitive)
/// against hostname and firmware version, or a known ASIC-model prefix
/// followed by a digit.
///
/// # Examples
///
/// ```
/// use axefleet::classifier::is_compatible;
/// use axefleet::response::SystemInfo;
///
/// let info = SystemInfo::from_json(r#"{"hashRate":500.0,"hostname":"Bitaxe-Garage"}"#).unwrap();
/// assert!(is_compatible(&info));
///
/// let info = SystemInfo::from_json(r#"{"hashRate":0.0,"hostname":"printer"}"#).unwrap();
/// assert!(!is_compatible(&info));
/// ```
#[must_use]
pub fn is_compatible(info: &SystemInfo) -> bool {
    let name_match = [info.hostname.as_deref(), info.version.as_deref()]
        .into_iter()
        .flatten()
        .any(contains_known_fragment);

    name_match || info.asic_model.as_deref().is_some_and(is_known_asic_model)
}

fn contains_known_fragment(value: &str) -> bool {
    let lowered = value.to_lowercase();
    NAME_FRAGMENTS
        .iter()
        .any(|fragment| lowered.contains(fragment))
}

fn is_known_asic_model(model: &str) -> bool {
    let model = model.trim();
    ASIC_PREFIXES.iter().any(|prefix| {
        model
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with(hostname: Option<&str>, version: Option<&str>, asic: Option<&str>) -> SystemInfo {
        SystemInfo {
            hostname: hostname.map(String::from),
            version: version.map(String::from),
            asic_model: asic.map(String::from),
            ..SystemInfo::default()
        }
    }

    #[test]
    fn matches_hostname_fragment_case_insensitive() {
        assert!(is_compatible(&info_with(Some("Bitaxe-Attic"), None, None)));
        assert!(is_compatible(&info_with(Some("NERDAXE-01"), None, None)));
    }

    #[test]
    fn matches_firmware_version_fragment() {
        assert!(is_compatible(&info_with(
            Some("esp-device"),
            Some("AxeOS v2.4.1"),
            None
        )));
    }

    #[test]
    fn matches_asic_model_prefix_with_digit() {
        assert!(is_compatible(&info_with(None, None, Some("BM1366"))));
        assert!(is_compatible(&info_with(None, None, Some("BM1370"))));
    }

    #[test]
    fn rejects_prefix_without_digit() {
        assert!(!is_compatible(&info_with(None, None, Some("BM"))));
        assert!(!is_compatible(&info_with(None, None, Some("BMx99"))));
    }

    #[test]
    fn rejects_unrelated_responder() {
        assert!(!is_compatible(&info_with(
            Some("octoprint"),
            Some("1.9.3"),
            Some("ESP32")
        )));
    }

    #[test]
    fn rejects_empty_status() {
        assert!(!is_compatible(&SystemInfo::default()));
    }
}
