// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Local network environment and public network-info fallback.

mod blocks;
mod environment;

pub use blocks::{BlockInfo, NetworkInfoClient};
pub use environment::{NetworkEnvironment, StaticNetwork, SystemNetwork, subnet_prefix};
