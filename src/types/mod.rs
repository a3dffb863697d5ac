// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for fleet management.
//!
//! Each type validates its invariants at construction time, so downstream
//! code never has to re-check them.
//!
//! # Types
//!
//! - [`DeviceAddress`] - validated IPv4 dotted-quad address
//! - [`BestDifficulty`] - scaled share-difficulty string, normalized to millions

mod address;
mod difficulty;

pub use address::DeviceAddress;
pub use difficulty::BestDifficulty;
