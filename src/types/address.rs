// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validated device address type.
//!
//! A [`DeviceAddress`] is an IPv4 dotted quad that has been validated at
//! construction time. Invalid strings are rejected before any network call
//! is made with them.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ProbeError;

/// A validated IPv4 device address.
///
/// # Examples
///
/// ```
/// use axefleet::types::DeviceAddress;
///
/// let addr: DeviceAddress = "192.168.1.44".parse().unwrap();
/// assert_eq!(addr.to_string(), "192.168.1.44");
///
/// assert!("not-an-ip".parse::<DeviceAddress>().is_err());
/// assert!("192.168.1".parse::<DeviceAddress>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddress(Ipv4Addr);

impl DeviceAddress {
    /// The fixed gateway address of a device running as its own access
    /// point, before it has joined a home network.
    pub const AP_MODE: Self = Self(Ipv4Addr::new(192, 168, 4, 1));

    /// Creates an address from a raw IPv4 value.
    #[must_use]
    pub const fn new(ip: Ipv4Addr) -> Self {
        Self(ip)
    }

    /// Returns the underlying IPv4 address.
    #[must_use]
    pub const fn ip(&self) -> Ipv4Addr {
        self.0
    }

    /// Returns true if this is the AP-mode gateway address.
    #[must_use]
    pub fn is_ap_mode(&self) -> bool {
        *self == Self::AP_MODE
    }
}

impl FromStr for DeviceAddress {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<Ipv4Addr>()
            .map(Self)
            .map_err(|_| ProbeError::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Ipv4Addr> for DeviceAddress {
    fn from(ip: Ipv4Addr) -> Self {
        Self(ip)
    }
}

impl Serialize for DeviceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
