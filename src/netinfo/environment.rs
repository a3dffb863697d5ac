// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Active-interface lookup.
//!
//! The scanner needs two things from the host's network stack: a preflight
//! answer ("do we have local network access at all?") and the local /24
//! prefix to enumerate. Both derive from the active interface's IPv4
//! address, abstracted behind [`NetworkEnvironment`] so tests can substitute
//! a fixed or absent address.

use std::net::{Ipv4Addr, UdpSocket};

/// Source of the active local IPv4 address.
pub trait NetworkEnvironment: Send + Sync {
    /// Returns the IPv4 address of the active network interface, or `None`
    /// when the host has no usable local network.
    fn local_ipv4(&self) -> Option<Ipv4Addr>;
}

/// The real host network stack.
///
/// Determines the active interface by connecting a UDP socket to a public
/// address and reading the socket's local address. No packet is sent;
/// `connect` on a UDP socket only selects a route.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNetwork;

impl SystemNetwork {
    /// Creates a new system network environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl NetworkEnvironment for SystemNetwork {
    fn local_ipv4(&self) -> Option<Ipv4Addr> {
        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:53").ok()?;

        match socket.local_addr().ok()? {
            std::net::SocketAddr::V4(addr) if !addr.ip().is_loopback() => Some(*addr.ip()),
            _ => None,
        }
    }
}

/// Returns the /24 prefix octets of an address.
///
/// Home and office LANs are assumed to be /24; this is a best-effort
/// heuristic, not topology discovery.
#[must_use]
pub fn subnet_prefix(ip: Ipv4Addr) -> [u8; 3] {
    let octets = ip.octets();
    [octets[0], octets[1], octets[2]]
}

/// A fixed-address environment, for tests and headless hosts.
#[derive(Debug, Clone, Copy)]
pub struct StaticNetwork(pub Option<Ipv4Addr>);

impl NetworkEnvironment for StaticNetwork {
    fn local_ipv4(&self) -> Option<Ipv4Addr> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subnet_prefix_takes_first_three_octets() {
        let prefix = subnet_prefix(Ipv4Addr::new(192, 168, 1, 77));
        assert_eq!(prefix, [192, 168, 1]);
    }

    #[test]
    fn static_network_reports_configured_address() {
        let env = StaticNetwork(Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(env.local_ipv4(), Some(Ipv4Addr::new(10, 0, 0, 5)));

        let offline = StaticNetwork(None);
        assert!(offline.local_ipv4().is_none());
    }
}
