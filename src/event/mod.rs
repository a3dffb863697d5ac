// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fleet event broadcasting.
//!
//! Scanner, connection controller and aggregator announce progress through
//! a shared [`EventBus`] so the host application can drive its UI without
//! polling crate internals.

mod event_bus;
mod fleet_event;

pub use event_bus::EventBus;
pub use fleet_event::FleetEvent;
