// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events published by fleet components.

use crate::metrics::DeviceMetrics;
use crate::scanner::{DiscoveredDevice, ScanState};
use crate::types::DeviceAddress;

/// An event published on the fleet [`EventBus`](super::EventBus).
#[derive(Debug, Clone)]
pub enum FleetEvent {
    /// A scan session started.
    ScanStarted,

    /// A compatible device answered during a scan.
    ///
    /// Emitted incrementally, as soon as each discovery arrives.
    DeviceDiscovered(DiscoveredDevice),

    /// A scan session reached a terminal state.
    ScanFinished(ScanState),

    /// The connection controller established a connection.
    Connected(DeviceAddress),

    /// The connection controller disconnected.
    Disconnected {
        /// The device that was connected, if an address was configured.
        address: Option<DeviceAddress>,
        /// Human-readable reason, for surfacing to the user.
        reason: String,
    },

    /// The connection controller received fresh metrics from a poll tick.
    MetricsUpdated {
        /// The polled device.
        address: DeviceAddress,
        /// The new snapshot.
        metrics: DeviceMetrics,
    },

    /// An aggregation pass completed and published a new snapshot.
    FleetRefreshed {
        /// Number of devices that answered this pass.
        reachable: usize,
        /// Number of devices in the pass.
        total: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_cloneable_for_broadcast() {
        let event = FleetEvent::FleetRefreshed {
            reachable: 2,
            total: 3,
        };
        let copy = event.clone();
        assert!(matches!(
            copy,
            FleetEvent::FleetRefreshed {
                reachable: 2,
                total: 3
            }
        ));
    }
}
