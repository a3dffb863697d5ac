// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Concurrent address-space scanning.
//!
//! A scan session probes the AP-mode gateway first (a device running as its
//! own access point is the common first-setup case), then sweeps the local
//! /24 with one bounded-timeout probe per candidate host. Discoveries are
//! surfaced incrementally through the [`EventBus`] and collected into the
//! final [`ScanReport`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use axefleet::event::EventBus;
//! use axefleet::netinfo::SystemNetwork;
//! use axefleet::protocol::DeviceProbe;
//! use axefleet::scanner::AddressSpaceScanner;
//!
//! # async fn example() -> axefleet::Result<()> {
//! let scanner = AddressSpaceScanner::new(
//!     DeviceProbe::new()?,
//!     Arc::new(SystemNetwork::new()),
//!     EventBus::new(),
//! );
//!
//! let report = scanner.scan().await?;
//! for device in &report.devices {
//!     println!("found {} at {}", device.name, device.address);
//! }
//! # Ok(())
//! # }
//! ```

mod discovered;

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

pub use discovered::DiscoveredDevice;

use crate::classifier::is_compatible;
use crate::error::{Error, Result};
use crate::event::{EventBus, FleetEvent};
use crate::netinfo::{NetworkEnvironment, subnet_prefix};
use crate::protocol::DeviceProbe;
use crate::types::DeviceAddress;

/// Host range swept on the local /24.
const HOST_RANGE: std::ops::RangeInclusive<u8> = 1..=254;

/// Lifecycle of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// No scan has run yet.
    Idle,
    /// A session is in flight.
    Scanning,
    /// The session finished; all probes resolved or the budget expired with
    /// at least one discovery.
    Completed,
    /// The budget expired without a single discovery ("no devices found").
    TimedOut,
    /// The session was cancelled, either explicitly or by a newer scan.
    Cancelled,
}

impl ScanState {
    /// Returns true once the session has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Cancelled)
    }
}

/// Timing knobs for a scan session.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Per-probe timeout during the subnet sweep.
    pub probe_timeout: Duration,
    /// Per-attempt timeout for the AP-mode gateway.
    pub ap_timeout: Duration,
    /// Attempts against the AP-mode gateway before falling back to the sweep.
    pub ap_attempts: u32,
    /// Wall-clock budget for the whole session.
    pub budget: Duration,
    /// The AP-mode gateway address.
    pub ap_address: DeviceAddress,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DeviceProbe::SCAN_TIMEOUT,
            ap_timeout: DeviceProbe::AP_TIMEOUT,
            ap_attempts: 3,
            budget: Duration::from_secs(30),
            ap_address: DeviceAddress::AP_MODE,
        }
    }
}

impl ScanConfig {
    /// Sets the per-probe timeout for the subnet sweep.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the wall-clock budget for the whole session.
    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Overrides the AP-mode gateway address.
    #[must_use]
    pub fn with_ap_address(mut self, address: DeviceAddress) -> Self {
        self.ap_address = address;
        self
    }
}

/// The outcome of one scan session.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Terminal state the session reached.
    pub state: ScanState,
    /// Discoveries, deduplicated by address, in arrival order.
    pub devices: Vec<DiscoveredDevice>,
}

impl ScanReport {
    /// Returns true when the session ended without finding anything.
    ///
    /// Callers surface this as "no devices found" and guide the user to
    /// check power and network.
    #[must_use]
    pub fn found_none(&self) -> bool {
        self.devices.is_empty() && self.state != ScanState::Cancelled
    }

    /// Unwraps the discoveries, turning an empty completed session into
    /// [`Error::NoDevicesFound`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDevicesFound`] when the scan ran to its end and
    /// found nothing.
    pub fn require_devices(self) -> Result<Vec<DiscoveredDevice>> {
        if self.found_none() {
            Err(Error::NoDevicesFound)
        } else {
            Ok(self.devices)
        }
    }
}

/// Scans the local address space for compatible devices.
///
/// Each scan session owns a cancellation token; starting a new session
/// cancels the previous one first, and [`cancel`](Self::cancel) stops the
/// current one. Cancelled probes may finish their HTTP exchange, but their
/// results are discarded.
pub struct AddressSpaceScanner {
    probe: DeviceProbe,
    network: Arc<dyn NetworkEnvironment>,
    events: EventBus,
    config: ScanConfig,
    state_tx: watch::Sender<ScanState>,
    session: parking_lot::Mutex<Option<CancellationToken>>,
}

impl AddressSpaceScanner {
    /// Creates a scanner with the default [`ScanConfig`].
    #[must_use]
    pub fn new(probe: DeviceProbe, network: Arc<dyn NetworkEnvironment>, events: EventBus) -> Self {
        let (state_tx, _) = watch::channel(ScanState::Idle);
        Self {
            probe,
            network,
            events,
            config: ScanConfig::default(),
            state_tx,
            session: parking_lot::Mutex::new(None),
        }
    }

    /// Replaces the scan configuration.
    #[must_use]
    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns a watcher over the scan state machine.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ScanState> {
        self.state_tx.subscribe()
    }

    /// Cancels the scan currently in flight, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.session.lock().as_ref() {
            token.cancel();
        }
    }

    /// Runs one scan session to completion.
    ///
    /// Starting a session while another is in flight cancels the older one;
    /// the older call returns a `Cancelled` report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] when the local-network preflight
    /// fails; no probe is issued in that case. Individual probe failures
    /// during the session are never errors — an unanswered address simply
    /// isn't a device.
    pub async fn scan(&self) -> Result<ScanReport> {
        // Preflight before anything touches the network.
        let Some(local_ip) = self.network.local_ipv4() else {
            tracing::warn!("Local network preflight failed, refusing to scan");
            return Err(Error::PermissionDenied);
        };

        let token = CancellationToken::new();
        if let Some(previous) = self.session.lock().replace(token.clone()) {
            previous.cancel();
        }

        self.state_tx.send_replace(ScanState::Scanning);
        self.events.publish(FleetEvent::ScanStarted);
        tracing::info!(local_ip = %local_ip, budget_secs = self.config.budget.as_secs(), "Scan session started");

        // One wall-clock budget for the whole session, AP phase included.
        let deadline = tokio::time::Instant::now() + self.config.budget;

        // An AP-mode device is a single-device network; finding one ends
        // the session immediately.
        match self.probe_ap_gateway(&token, deadline).await {
            ApProbe::Found(device) => {
                self.events
                    .publish(FleetEvent::DeviceDiscovered(device.clone()));
                return Ok(self.finalize(ScanState::Completed, vec![device]));
            }
            ApProbe::Cancelled => return Ok(self.finalize(ScanState::Cancelled, Vec::new())),
            ApProbe::BudgetExpired => {
                token.cancel();
                return Ok(self.finalize(ScanState::TimedOut, Vec::new()));
            }
            ApProbe::NotFound => {}
        }

        let (state, devices) = self.sweep_subnet(local_ip, &token, deadline).await;
        Ok(self.finalize(state, devices))
    }

    /// Probes one manually-entered address and classifies the responder.
    ///
    /// This is the manual-entry counterpart to a scan: the user typed an
    /// address, so a non-answer or an incompatible responder is an error
    /// worth telling them about, not a silent miss.
    ///
    /// # Errors
    ///
    /// Returns the probe error when the address does not answer, or
    /// [`Error::NotCompatibleDevice`] when the responder is not a supported
    /// device.
    pub async fn verify(&self, address: &DeviceAddress) -> Result<DiscoveredDevice> {
        let info = self
            .probe
            .system_info(address, DeviceProbe::POLL_TIMEOUT)
            .await?;

        if !is_compatible(&info) {
            tracing::debug!(address = %address, "Manual entry rejected by classifier");
            return Err(Error::NotCompatibleDevice);
        }

        Ok(DiscoveredDevice::from_status(*address, &info))
    }

    /// Probes the AP-mode gateway with retries.
    async fn probe_ap_gateway(
        &self,
        token: &CancellationToken,
        deadline: tokio::time::Instant,
    ) -> ApProbe {
        for attempt in 1..=self.config.ap_attempts {
            if token.is_cancelled() {
                return ApProbe::Cancelled;
            }

            let result = tokio::select! {
                () = token.cancelled() => return ApProbe::Cancelled,
                () = tokio::time::sleep_until(deadline) => return ApProbe::BudgetExpired,
                result = self
                    .probe
                    .system_info(&self.config.ap_address, self.config.ap_timeout) => result,
            };

            match result {
                Ok(info) if is_compatible(&info) => {
                    tracing::info!(attempt, "AP-mode device found, short-circuiting scan");
                    return ApProbe::Found(DiscoveredDevice::from_status(
                        self.config.ap_address,
                        &info,
                    ));
                }
                Ok(_) => {
                    tracing::debug!(attempt, "AP-mode responder is not a compatible device");
                    return ApProbe::NotFound;
                }
                Err(err) => {
                    tracing::debug!(attempt, error = %err, "AP-mode probe failed");
                }
            }
        }
        ApProbe::NotFound
    }

    /// Sweeps the local /24, collecting discoveries until all probes
    /// resolve, the budget expires, or the session is cancelled.
    async fn sweep_subnet(
        &self,
        local_ip: Ipv4Addr,
        token: &CancellationToken,
        deadline: tokio::time::Instant,
    ) -> (ScanState, Vec<DiscoveredDevice>) {
        let prefix = subnet_prefix(local_ip);
        tracing::debug!(
            prefix = %format!("{}.{}.{}.x", prefix[0], prefix[1], prefix[2]),
            "Sweeping local subnet"
        );

        // Probe tasks never touch shared state; results funnel through this
        // channel, the single serialized append path.
        let (tx, mut rx) = mpsc::channel::<DiscoveredDevice>(32);

        for host in HOST_RANGE {
            let address =
                DeviceAddress::new(Ipv4Addr::new(prefix[0], prefix[1], prefix[2], host));
            let probe = self.probe.clone();
            let timeout = self.config.probe_timeout;
            let token = token.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let result = tokio::select! {
                    () = token.cancelled() => return,
                    result = probe.system_info(&address, timeout) => result,
                };

                match result {
                    Ok(info) if is_compatible(&info) => {
                        let _ = tx.send(DiscoveredDevice::from_status(address, &info)).await;
                    }
                    // Non-answers and incompatible responders are not errors
                    // at scan granularity.
                    Ok(_) | Err(_) => {}
                }
            });
        }
        drop(tx);

        let mut devices: Vec<DiscoveredDevice> = Vec::new();
        let mut seen: HashSet<DeviceAddress> = HashSet::new();
        let mut budget_expired = false;

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    return (ScanState::Cancelled, devices);
                }
                () = tokio::time::sleep_until(deadline) => {
                    budget_expired = true;
                    token.cancel();
                    break;
                }
                received = rx.recv() => match received {
                    Some(device) => {
                        if seen.insert(device.address) {
                            tracing::info!(address = %device.address, name = %device.name, "Device discovered");
                            self.events
                                .publish(FleetEvent::DeviceDiscovered(device.clone()));
                            devices.push(device);
                        }
                    }
                    None => break,
                },
            }
        }

        if budget_expired && devices.is_empty() {
            (ScanState::TimedOut, devices)
        } else {
            (ScanState::Completed, devices)
        }
    }

    fn finalize(&self, state: ScanState, devices: Vec<DiscoveredDevice>) -> ScanReport {
        self.state_tx.send_replace(state);
        self.events.publish(FleetEvent::ScanFinished(state));
        tracing::info!(?state, found = devices.len(), "Scan session finished");
        ScanReport { state, devices }
    }
}

enum ApProbe {
    Found(DiscoveredDevice),
    NotFound,
    Cancelled,
    BudgetExpired,
}
