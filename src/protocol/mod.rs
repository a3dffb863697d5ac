// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device wire protocol.
//!
//! Devices expose a small unauthenticated HTTP JSON API on port 80. All
//! communication in this crate goes through [`DeviceProbe`].

mod http;

pub use http::DeviceProbe;
