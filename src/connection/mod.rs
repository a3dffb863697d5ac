// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection lifecycle for the actively-viewed device.
//!
//! A [`DeviceConnectionController`] owns exactly one device slot: connect,
//! poll on a fixed interval, disconnect on failure, reconnect when the host
//! reports the network came back. At most one connect/poll cycle is ever in
//! flight per controller.
//!
//! # Examples
//!
//! ```no_run
//! use axefleet::connection::DeviceConnectionController;
//! use axefleet::event::EventBus;
//! use axefleet::protocol::DeviceProbe;
//!
//! # async fn example() -> axefleet::Result<()> {
//! let controller = DeviceConnectionController::new(DeviceProbe::new()?, EventBus::new());
//! controller.set_address(Some("192.168.1.44".parse()?));
//! controller.connect().await?;
//!
//! let mut metrics = controller.metrics();
//! metrics.changed().await.ok();
//! if let Some(snapshot) = metrics.borrow().clone() {
//!     println!("{} GH/s", snapshot.hashrate);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::event::{EventBus, FleetEvent};
use crate::metrics::DeviceMetrics;
use crate::netinfo::NetworkInfoClient;
use crate::protocol::DeviceProbe;
use crate::types::DeviceAddress;

/// Connection state of the device slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected; the poll loop is running.
    Connected,
}

impl ConnectionState {
    /// Returns true if the slot is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Network lifecycle events the host environment raises into the
/// controller (interface up/down, app returning to the foreground).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The local network went away.
    Lost,
    /// The local network is available again.
    Restored,
}

/// Timing knobs for the poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Interval between poll ticks.
    pub interval: Duration,
    /// Backoff before retrying the post-connect configuration race.
    pub race_backoff: Duration,
    /// Per-probe timeout.
    pub probe_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            race_backoff: Duration::from_millis(500),
            probe_timeout: DeviceProbe::POLL_TIMEOUT,
        }
    }
}

impl PollConfig {
    /// Sets the poll interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the race-retry backoff.
    #[must_use]
    pub fn with_race_backoff(mut self, backoff: Duration) -> Self {
        self.race_backoff = backoff;
        self
    }

    /// Sets the per-probe timeout.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

/// Owns the connect/poll lifecycle of the currently selected device.
pub struct DeviceConnectionController {
    inner: Arc<Inner>,
}

struct Inner {
    probe: DeviceProbe,
    events: EventBus,
    config: PollConfig,
    network_info: Option<NetworkInfoClient>,
    address: parking_lot::RwLock<Option<DeviceAddress>>,
    state_tx: watch::Sender<ConnectionState>,
    metrics_tx: watch::Sender<Option<DeviceMetrics>>,
    last_error: parking_lot::RwLock<Option<String>>,
    poll_token: parking_lot::Mutex<Option<CancellationToken>>,
    /// Single-flight guard: set while a connect attempt is in flight.
    connecting: AtomicBool,
    /// True when the last disconnect was caused by network loss, so a
    /// `Restored` event should reconnect automatically.
    lost_by_network: AtomicBool,
}

impl DeviceConnectionController {
    /// Creates a controller with the default [`PollConfig`].
    #[must_use]
    pub fn new(probe: DeviceProbe, events: EventBus) -> Self {
        Self::with_options(probe, events, PollConfig::default(), None)
    }

    /// Creates a controller with explicit timing and an optional fallback
    /// network-info client used to backfill block height and network
    /// difficulty when the firmware omits them.
    #[must_use]
    pub fn with_options(
        probe: DeviceProbe,
        events: EventBus,
        config: PollConfig,
        network_info: Option<NetworkInfoClient>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (metrics_tx, _) = watch::channel(None);

        Self {
            inner: Arc::new(Inner {
                probe,
                events,
                config,
                network_info,
                address: parking_lot::RwLock::new(None),
                state_tx,
                metrics_tx,
                last_error: parking_lot::RwLock::new(None),
                poll_token: parking_lot::Mutex::new(None),
                connecting: AtomicBool::new(false),
                lost_by_network: AtomicBool::new(false),
            }),
        }
    }

    /// Configures (or clears) the selected device address.
    pub fn set_address(&self, address: Option<DeviceAddress>) {
        *self.inner.address.write() = address;
    }

    /// Returns the configured address.
    #[must_use]
    pub fn address(&self) -> Option<DeviceAddress> {
        *self.inner.address.read()
    }

    /// Returns a watcher over the connection state.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Returns a watcher over the latest polled metrics.
    #[must_use]
    pub fn metrics(&self) -> watch::Receiver<Option<DeviceMetrics>> {
        self.inner.metrics_tx.subscribe()
    }

    /// Returns the most recent user-facing connection error.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }

    /// Connects to the configured device and starts the poll loop.
    ///
    /// A call while already connecting or connected is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationMissing`] without a network call when
    /// no address is configured, or the probe error when the initial status
    /// fetch fails (the controller is left `Disconnected`).
    pub async fn connect(&self) -> Result<()> {
        let inner = self.inner.as_ref();

        // Single-flight: a second connect() while one is running is ignored.
        if inner.connecting.swap(true, Ordering::SeqCst) {
            tracing::debug!("Connect already in flight, ignoring");
            return Ok(());
        }
        let guard = ConnectingGuard(inner);

        if inner.state_tx.borrow().is_connected() {
            return Ok(());
        }

        let Some(address) = *inner.address.read() else {
            return Err(Error::ConfigurationMissing);
        };

        inner.state_tx.send_replace(ConnectionState::Connecting);
        tracing::info!(address = %address, "Connecting to device");

        match inner
            .probe
            .system_info(&address, inner.config.probe_timeout)
            .await
        {
            Ok(info) => {
                inner.publish_metrics(address, DeviceMetrics::from(&info)).await;
                inner.state_tx.send_replace(ConnectionState::Connected);
                *inner.last_error.write() = None;
                inner.lost_by_network.store(false, Ordering::SeqCst);
                inner.events.publish(FleetEvent::Connected(address));

                let token = CancellationToken::new();
                if let Some(previous) = inner.poll_token.lock().replace(token.clone()) {
                    previous.cancel();
                }
                tokio::spawn(poll_loop(Arc::clone(&self.inner), token));

                drop(guard);
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                inner.set_disconnected(&reason, false);
                drop(guard);
                Err(err.into())
            }
        }
    }

    /// Disconnects and stops the poll loop.
    pub fn disconnect(&self) {
        self.inner.cancel_poll();
        self.inner.set_disconnected("disconnected", false);
    }

    /// Feeds a host-raised network lifecycle event into the controller.
    ///
    /// `Lost` force-cancels the poll loop; `Restored` reconnects only when
    /// the previous disconnect was network-caused (not a data error).
    pub async fn handle_network_event(&self, event: NetworkEvent) {
        match event {
            NetworkEvent::Lost => {
                if *self.inner.state_tx.borrow() != ConnectionState::Disconnected {
                    tracing::info!("Network lost, disconnecting");
                    self.inner.cancel_poll();
                    self.inner.set_disconnected("network connection lost", true);
                }
            }
            NetworkEvent::Restored => {
                let should_reconnect = !self.inner.state_tx.borrow().is_connected()
                    && self.inner.lost_by_network.load(Ordering::SeqCst);
                if should_reconnect {
                    tracing::info!("Network restored, reconnecting");
                    if let Err(err) = self.connect().await {
                        tracing::warn!(error = %err, "Automatic reconnect failed");
                    }
                }
            }
        }
    }
}

/// Clears the connecting flag when a connect attempt ends however it ends.
struct ConnectingGuard<'a>(&'a Inner);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.connecting.store(false, Ordering::SeqCst);
    }
}

impl Inner {
    fn cancel_poll(&self) {
        if let Some(token) = self.poll_token.lock().take() {
            token.cancel();
        }
    }

    fn set_disconnected(&self, reason: &str, network_caused: bool) {
        self.state_tx.send_replace(ConnectionState::Disconnected);
        *self.last_error.write() = Some(reason.to_string());
        self.lost_by_network.store(network_caused, Ordering::SeqCst);
        self.events.publish(FleetEvent::Disconnected {
            address: *self.address.read(),
            reason: reason.to_string(),
        });
    }

    /// Publishes a fresh snapshot, backfilling network-wide values from the
    /// fallback endpoint when the firmware omits them.
    async fn publish_metrics(&self, address: DeviceAddress, mut metrics: DeviceMetrics) {
        if metrics.block_height.is_none()
            && let Some(client) = &self.network_info
        {
            match client.latest_block().await {
                Ok(block) => {
                    metrics.block_height = Some(block.height);
                    metrics.network_difficulty = Some(block.difficulty);
                }
                Err(err) => {
                    tracing::debug!(error = %err, "Network info backfill unavailable");
                }
            }
        }

        self.metrics_tx.send_replace(Some(metrics.clone()));
        self.events
            .publish(FleetEvent::MetricsUpdated { address, metrics });
    }
}

/// The steady-state poll loop.
///
/// Runs until cancelled or until a poll tick fails. The configured address
/// is re-read every tick; a missing address immediately after connect (the
/// configuration race) earns exactly one silent retry.
async fn poll_loop(inner: Arc<Inner>, token: CancellationToken) {
    let interval = inner.config.interval;
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    let mut race_grace = true;

    tracing::debug!(?interval, "Poll loop started");

    loop {
        tokio::select! {
            () = token.cancelled() => {
                tracing::debug!("Poll loop cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        let Some(address) = *inner.address.read() else {
            // The configured address can vanish for one tick right after a
            // fresh connect while the host finishes updating its settings.
            if race_grace {
                race_grace = false;
                tracing::debug!("Configuration race after connect, retrying once");
                tokio::select! {
                    () = token.cancelled() => return,
                    () = tokio::time::sleep(inner.config.race_backoff) => {}
                }
                continue;
            }
            inner.cancel_poll();
            inner.set_disconnected(Error::ConfigurationMissing.to_string().as_str(), false);
            return;
        };

        match inner
            .probe
            .system_info(&address, inner.config.probe_timeout)
            .await
        {
            Ok(info) => {
                race_grace = false;
                inner.publish_metrics(address, DeviceMetrics::from(&info)).await;
            }
            Err(err) => {
                if token.is_cancelled() {
                    return;
                }
                tracing::warn!(address = %address, error = %err, "Poll failed, disconnecting");
                inner.cancel_poll();
                inner.set_disconnected(&err.to_string(), false);
                return;
            }
        }
    }
}
