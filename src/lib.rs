// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `axefleet` - A Rust library for managing a fleet of Bitaxe-class miners.
//!
//! This library discovers, connects to, polls, and aggregates metrics from
//! network-attached mining devices reachable over plain HTTP on a local
//! network.
//!
//! # Supported Features
//!
//! - **Discovery**: concurrent /24 address-space scanning with AP-mode
//!   short-circuit, cancellation, and a global scan budget
//! - **Connection**: per-device connect/poll state machine with automatic
//!   reconnect on network restore
//! - **Aggregation**: concurrent fleet refresh with cache-backed fallback,
//!   totals, and an atomically-published reachable set
//! - **Control**: fan, pool and hostname settings, restart, OTA trigger
//!
//! # Quick Start
//!
//! ## Scanning for devices
//!
//! ```no_run
//! use std::sync::Arc;
//! use axefleet::event::EventBus;
//! use axefleet::netinfo::SystemNetwork;
//! use axefleet::protocol::DeviceProbe;
//! use axefleet::scanner::AddressSpaceScanner;
//!
//! #[tokio::main]
//! async fn main() -> axefleet::Result<()> {
//!     let scanner = AddressSpaceScanner::new(
//!         DeviceProbe::new()?,
//!         Arc::new(SystemNetwork::new()),
//!         EventBus::new(),
//!     );
//!
//!     let report = scanner.scan().await?;
//!     for device in &report.devices {
//!         println!("{} at {} ({} GH/s)", device.name, device.address, device.hashrate);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Aggregating a saved fleet
//!
//! ```no_run
//! use std::sync::Arc;
//! use axefleet::event::EventBus;
//! use axefleet::fleet::FleetAggregator;
//! use axefleet::protocol::DeviceProbe;
//! use axefleet::store::{JsonStore, SavedDeviceStore};
//!
//! #[tokio::main]
//! async fn main() -> axefleet::Result<()> {
//!     let store = Arc::new(JsonStore::new("/var/lib/axefleet"));
//!     let aggregator = FleetAggregator::new(
//!         DeviceProbe::new()?,
//!         store.clone(),
//!         EventBus::new(),
//!     );
//!
//!     let devices = store.load();
//!     let snapshot = aggregator.refresh(&devices).await?;
//!     println!(
//!         "{}/{} reachable, {} GH/s",
//!         snapshot.reachable.len(),
//!         devices.len(),
//!         snapshot.total_hashrate
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Watching a single device
//!
//! ```no_run
//! use axefleet::connection::DeviceConnectionController;
//! use axefleet::event::EventBus;
//! use axefleet::protocol::DeviceProbe;
//!
//! #[tokio::main]
//! async fn main() -> axefleet::Result<()> {
//!     let controller = DeviceConnectionController::new(DeviceProbe::new()?, EventBus::new());
//!     controller.set_address(Some("192.168.1.44".parse()?));
//!     controller.connect().await?;
//!
//!     let mut metrics = controller.metrics();
//!     while metrics.changed().await.is_ok() {
//!         if let Some(snapshot) = metrics.borrow().clone() {
//!             println!("{:.1} GH/s @ {:.1} °C", snapshot.hashrate, snapshot.temperature);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod command;
pub mod connection;
pub mod error;
pub mod event;
pub mod fleet;
pub mod metrics;
pub mod netinfo;
pub mod protocol;
pub mod response;
pub mod scanner;
pub mod store;
pub mod types;

pub use command::SettingsPatch;
pub use connection::{ConnectionState, DeviceConnectionController, NetworkEvent, PollConfig};
pub use error::{Error, ParseError, ProbeError, Result};
pub use event::{EventBus, FleetEvent};
pub use fleet::{FleetAggregator, FleetSnapshot};
pub use metrics::{DeviceMetrics, MetricField};
pub use protocol::DeviceProbe;
pub use response::SystemInfo;
pub use scanner::{AddressSpaceScanner, DiscoveredDevice, ScanConfig, ScanReport, ScanState};
pub use store::{CachedDeviceMetrics, JsonStore, MetricsCacheStore, SavedDevice, SavedDeviceStore};
pub use types::{BestDifficulty, DeviceAddress};
