// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the device HTTP API using wiremock.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use axefleet::command::SettingsPatch;
use axefleet::connection::{ConnectionState, DeviceConnectionController, PollConfig};
use axefleet::event::EventBus;
use axefleet::fleet::FleetAggregator;
use axefleet::metrics::DeviceMetrics;
use axefleet::netinfo::{NetworkInfoClient, StaticNetwork};
use axefleet::protocol::DeviceProbe;
use axefleet::scanner::{AddressSpaceScanner, ScanConfig, ScanState};
use axefleet::store::{CachedDeviceMetrics, MemoryMetricsCache, MetricsCacheStore, SavedDevice};
use axefleet::types::DeviceAddress;
use axefleet::{Error, ProbeError};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A status payload for a healthy compatible device.
fn device_body(hashrate: f64, temp: f64, power: f64, hostname: &str) -> serde_json::Value {
    serde_json::json!({
        "hashRate": hashrate,
        "temp": temp,
        "power": power,
        "bestDiff": "5M",
        "hostname": hostname,
        "ASICModel": "BM1368",
        "version": "v2.4.1",
        "stratumURL": "public-pool.io",
        "stratumPort": 21496,
        "uptimeSeconds": 3600
    })
}

/// A probe whose default port is the mock server's.
fn probe_for(server: &MockServer) -> DeviceProbe {
    DeviceProbe::with_port(server.address().port()).unwrap()
}

fn loopback(host: u8) -> DeviceAddress {
    DeviceAddress::new(Ipv4Addr::new(127, 0, 0, host))
}

// ============================================================================
// DeviceProbe Tests
// ============================================================================

mod probe {
    use super::*;

    #[tokio::test]
    async fn system_info_decodes_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(device_body(512.0, 58.5, 14.0, "bitaxe")),
            )
            .mount(&server)
            .await;

        let probe = probe_for(&server);
        let info = probe
            .system_info(&loopback(1), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(info.hash_rate, 512.0);
        assert_eq!(info.hostname.as_deref(), Some("bitaxe"));
    }

    #[tokio::test]
    async fn server_error_is_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let probe = probe_for(&server);
        let err = probe
            .system_info(&loopback(1), Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::HttpStatus(500)));
    }

    #[tokio::test]
    async fn malformed_body_keeps_raw_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>router admin</html>"))
            .mount(&server)
            .await;

        let probe = probe_for(&server);
        let err = probe
            .system_info(&loopback(1), Duration::from_secs(2))
            .await
            .unwrap_err();

        match err {
            ProbeError::Decode { body, .. } => assert!(body.contains("router admin")),
            other => panic!("expected decode error, got: {other}"),
        }
    }

    #[tokio::test]
    async fn slow_device_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(device_body(1.0, 1.0, 1.0, "bitaxe"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let probe = probe_for(&server);
        let err = probe
            .system_info(&loopback(1), Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::Timeout(_)), "got: {err}");
    }

    #[tokio::test]
    async fn update_settings_patches_system() {
        let server = MockServer::start().await;
        let patch = SettingsPatch::new().with_fan_speed(75).with_auto_fan(false);

        Mock::given(method("PATCH"))
            .and(path("/api/system"))
            .and(body_json(serde_json::json!({
                "fanspeed": 75,
                "autofanspeed": false
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let probe = probe_for(&server);
        probe.update_settings(&loopback(1), &patch).await.unwrap();
    }

    #[tokio::test]
    async fn restart_posts_to_device() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/system/restart"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let probe = probe_for(&server);
        probe.restart(&loopback(1)).await.unwrap();
    }

    #[tokio::test]
    async fn ota_posts_to_device() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/system/OTA"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let probe = probe_for(&server);
        probe.start_ota(&loopback(1)).await.unwrap();
    }
}

// ============================================================================
// FleetAggregator Tests
// ============================================================================

mod aggregator {
    use super::*;

    fn fleet_of(addresses: &[DeviceAddress]) -> Vec<SavedDevice> {
        addresses
            .iter()
            .enumerate()
            .map(|(i, addr)| SavedDevice::new(format!("Device {i}"), *addr))
            .collect()
    }

    #[tokio::test]
    async fn reachable_set_is_exactly_the_successful_probes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(device_body(1000.0, 60.0, 20.0, "bitaxe-a")),
            )
            .mount(&server)
            .await;

        // Device A answers via the mock; nothing listens on 127.0.0.2.
        let device_a = loopback(1);
        let device_b = loopback(2);
        let fleet = fleet_of(&[device_a, device_b]);

        let aggregator = FleetAggregator::new(
            probe_for(&server),
            Arc::new(MemoryMetricsCache::new()),
            EventBus::new(),
        )
        .with_probe_timeout(Duration::from_secs(2));

        let snapshot = aggregator.refresh(&fleet).await.unwrap();

        assert!(snapshot.is_reachable(&device_a));
        assert!(!snapshot.is_reachable(&device_b));
        assert_eq!(snapshot.reachable.len(), 1);
        assert_eq!(snapshot.total_hashrate, 1000.0);
        assert_eq!(snapshot.total_power, 20.0);
        assert!(!snapshot.per_device.contains_key(&device_b));
    }

    #[tokio::test]
    async fn unreachable_device_falls_back_to_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(device_body(1000.0, 60.0, 20.0, "bitaxe-a")),
            )
            .mount(&server)
            .await;

        let device_a = loopback(1);
        let device_b = loopback(2);
        let fleet = fleet_of(&[device_a, device_b]);

        // Device B has a durable cache entry from a previous run.
        let cache = MemoryMetricsCache::new();
        cache.save_all(&HashMap::from([(
            device_b,
            CachedDeviceMetrics::capture(&DeviceMetrics {
                hashrate: 480.0,
                power: 13.0,
                temperature: 55.0,
                ..DeviceMetrics::default()
            }),
        )]));

        let aggregator = FleetAggregator::new(probe_for(&server), Arc::new(cache), EventBus::new())
            .with_probe_timeout(Duration::from_secs(2));

        let snapshot = aggregator.refresh(&fleet).await.unwrap();

        // Cached metrics count toward totals but never toward reachability.
        assert_eq!(snapshot.total_hashrate, 1480.0);
        assert_eq!(snapshot.per_device[&device_b].hashrate, 480.0);
        assert!(!snapshot.is_reachable(&device_b));
    }

    #[tokio::test]
    async fn fresh_zero_temperature_is_preserved_from_previous_pass() {
        let server = MockServer::start().await;

        // First pass reports a real temperature, second pass zeroes it.
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(device_body(500.0, 61.0, 14.0, "bitaxe")),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(device_body(505.0, 0.0, 14.1, "bitaxe")),
            )
            .mount(&server)
            .await;

        let device = loopback(1);
        let fleet = fleet_of(&[device]);

        let aggregator = FleetAggregator::new(
            probe_for(&server),
            Arc::new(MemoryMetricsCache::new()),
            EventBus::new(),
        )
        .with_probe_timeout(Duration::from_secs(2));

        aggregator.refresh(&fleet).await.unwrap();
        let snapshot = aggregator.refresh(&fleet).await.unwrap();

        let merged = &snapshot.per_device[&device];
        assert_eq!(merged.hashrate, 505.0);
        assert_eq!(merged.temperature, 61.0, "known-good temperature was lost");
    }

    #[tokio::test]
    async fn refresh_persists_merged_metrics_to_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(device_body(500.0, 61.0, 14.0, "bitaxe")),
            )
            .mount(&server)
            .await;

        let device = loopback(1);
        let cache = Arc::new(MemoryMetricsCache::new());

        let aggregator =
            FleetAggregator::new(probe_for(&server), cache.clone(), EventBus::new())
                .with_probe_timeout(Duration::from_secs(2));
        aggregator.refresh(&fleet_of(&[device])).await.unwrap();

        let persisted = cache.load_all();
        assert_eq!(persisted[&device].hashrate, 500.0);
        assert_eq!(persisted[&device].hostname.as_deref(), Some("bitaxe"));
    }

    #[tokio::test]
    async fn device_reported_stats_survive_between_passes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(device_body(500.0, 61.0, 14.0, "bitaxe")),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        // Device goes dark afterwards.
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let device = loopback(1);
        let fleet = fleet_of(&[device]);

        let aggregator = FleetAggregator::new(
            probe_for(&server),
            Arc::new(MemoryMetricsCache::new()),
            EventBus::new(),
        )
        .with_probe_timeout(Duration::from_secs(2));

        let first = aggregator.refresh(&fleet).await.unwrap();
        assert!(first.is_reachable(&device));

        let second = aggregator.refresh(&fleet).await.unwrap();
        // Promptly reported unreachable, but the totals keep the last-known
        // values instead of dropping to zero mid-outage.
        assert!(!second.is_reachable(&device));
        assert_eq!(second.total_hashrate, 500.0);
    }
}

// ============================================================================
// AddressSpaceScanner Tests
// ============================================================================

mod scanner {
    use super::*;

    /// Scan config pointed at loopback: the "AP gateway" and the swept /24
    /// both resolve to 127.0.0.x, where only the mock server answers.
    fn loopback_scan_config() -> ScanConfig {
        ScanConfig::default()
            .with_ap_address(loopback(250))
            .with_probe_timeout(Duration::from_secs(1))
            .with_budget(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn preflight_failure_issues_no_probes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(device_body(500.0, 60.0, 14.0, "bitaxe")),
            )
            .mount(&server)
            .await;

        let scanner = AddressSpaceScanner::new(
            probe_for(&server),
            Arc::new(StaticNetwork(None)),
            EventBus::new(),
        )
        .with_config(loopback_scan_config());

        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_discovers_compatible_device() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(device_body(512.0, 58.0, 14.0, "bitaxe-attic")),
            )
            .mount(&server)
            .await;

        let scanner = AddressSpaceScanner::new(
            probe_for(&server),
            Arc::new(StaticNetwork(Some(Ipv4Addr::new(127, 0, 0, 1)))),
            EventBus::new(),
        )
        .with_config(loopback_scan_config());

        let report = scanner.scan().await.unwrap();

        assert_eq!(report.state, ScanState::Completed);
        assert_eq!(report.devices.len(), 1);
        assert_eq!(report.devices[0].address, loopback(1));
        assert_eq!(report.devices[0].name, "bitaxe-attic");
    }

    #[tokio::test]
    async fn ap_gateway_short_circuits_the_sweep() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(device_body(512.0, 58.0, 14.0, "bitaxe-setup")),
            )
            .mount(&server)
            .await;

        // The AP address is the responder itself: one probe must suffice.
        let scanner = AddressSpaceScanner::new(
            probe_for(&server),
            Arc::new(StaticNetwork(Some(Ipv4Addr::new(127, 0, 0, 1)))),
            EventBus::new(),
        )
        .with_config(loopback_scan_config().with_ap_address(loopback(1)));

        let report = scanner.scan().await.unwrap();

        assert_eq!(report.state, ScanState::Completed);
        assert_eq!(report.devices.len(), 1);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn verify_accepts_a_compatible_manual_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(device_body(512.0, 58.0, 14.0, "bitaxe-shed")),
            )
            .mount(&server)
            .await;

        let scanner = AddressSpaceScanner::new(
            probe_for(&server),
            Arc::new(StaticNetwork(Some(Ipv4Addr::new(127, 0, 0, 1)))),
            EventBus::new(),
        );

        let device = scanner.verify(&loopback(1)).await.unwrap();
        assert_eq!(device.name, "bitaxe-shed");
    }

    #[tokio::test]
    async fn verify_rejects_an_incompatible_responder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hashRate": 0.0,
                "hostname": "nas"
            })))
            .mount(&server)
            .await;

        let scanner = AddressSpaceScanner::new(
            probe_for(&server),
            Arc::new(StaticNetwork(Some(Ipv4Addr::new(127, 0, 0, 1)))),
            EventBus::new(),
        );

        let err = scanner.verify(&loopback(1)).await.unwrap_err();
        assert!(matches!(err, Error::NotCompatibleDevice));
    }

    #[tokio::test]
    async fn incompatible_responders_are_not_discoveries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hashRate": 0.0,
                "hostname": "octoprint",
                "ASICModel": "ESP32"
            })))
            .mount(&server)
            .await;

        let scanner = AddressSpaceScanner::new(
            probe_for(&server),
            Arc::new(StaticNetwork(Some(Ipv4Addr::new(127, 0, 0, 1)))),
            EventBus::new(),
        )
        .with_config(loopback_scan_config());

        let report = scanner.scan().await.unwrap();

        assert!(report.devices.is_empty());
        assert!(report.found_none());
    }
}

// ============================================================================
// DeviceConnectionController Tests
// ============================================================================

mod connection {
    use super::*;

    fn fast_poll() -> PollConfig {
        PollConfig::default()
            .with_interval(Duration::from_millis(50))
            .with_race_backoff(Duration::from_millis(10))
            .with_probe_timeout(Duration::from_secs(2))
    }

    #[tokio::test]
    async fn connect_establishes_and_polls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(device_body(512.0, 58.0, 14.0, "bitaxe")),
            )
            .mount(&server)
            .await;

        let controller = DeviceConnectionController::with_options(
            probe_for(&server),
            EventBus::new(),
            fast_poll(),
            None,
        );
        controller.set_address(Some(loopback(1)));
        controller.connect().await.unwrap();

        assert_eq!(*controller.state().borrow(), ConnectionState::Connected);

        // The poll loop keeps fetching after the initial connect probe.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(server.received_requests().await.unwrap().len() >= 2);

        let metrics = controller.metrics().borrow().clone().unwrap();
        assert_eq!(metrics.hashrate, 512.0);

        controller.disconnect();
    }

    #[tokio::test]
    async fn configuration_race_is_retried_once_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(device_body(512.0, 58.0, 14.0, "bitaxe")),
            )
            .mount(&server)
            .await;

        let controller = DeviceConnectionController::with_options(
            probe_for(&server),
            EventBus::new(),
            fast_poll(),
            None,
        );
        let address = loopback(1);
        controller.set_address(Some(address));
        controller.connect().await.unwrap();

        // Simulate the host briefly clearing the address right after a
        // fresh connect, then restoring it before the retry lands.
        controller.set_address(None);
        tokio::time::sleep(Duration::from_millis(60)).await;
        controller.set_address(Some(address));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            *controller.state().borrow(),
            ConnectionState::Connected,
            "one configuration race must not disconnect"
        );

        controller.disconnect();
    }

    #[tokio::test]
    async fn persistent_missing_address_disconnects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(device_body(512.0, 58.0, 14.0, "bitaxe")),
            )
            .mount(&server)
            .await;

        let controller = DeviceConnectionController::with_options(
            probe_for(&server),
            EventBus::new(),
            fast_poll(),
            None,
        );
        controller.set_address(Some(loopback(1)));
        controller.connect().await.unwrap();

        // Address never comes back: grace covers one tick, not two.
        controller.set_address(None);

        let mut state = controller.state();
        let disconnected = tokio::time::timeout(
            Duration::from_secs(2),
            state.wait_for(|s| *s == ConnectionState::Disconnected),
        )
        .await;
        assert!(disconnected.is_ok(), "controller never disconnected");
    }

    #[tokio::test]
    async fn poll_error_disconnects_and_halts_polling() {
        let server = MockServer::start().await;
        // The connect probe succeeds, every poll afterwards fails.
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(device_body(512.0, 58.0, 14.0, "bitaxe")),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let controller = DeviceConnectionController::with_options(
            probe_for(&server),
            EventBus::new(),
            fast_poll(),
            None,
        );
        controller.set_address(Some(loopback(1)));
        controller.connect().await.unwrap();

        let mut state = controller.state();
        tokio::time::timeout(
            Duration::from_secs(2),
            state.wait_for(|s| *s == ConnectionState::Disconnected),
        )
        .await
        .expect("poll error must disconnect")
        .unwrap();

        assert!(controller.last_error().is_some());

        // Polling halted: the request count stays put.
        let after_disconnect = server.received_requests().await.unwrap().len();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            server.received_requests().await.unwrap().len(),
            after_disconnect
        );
    }

    #[tokio::test]
    async fn metrics_backfill_from_blocks_endpoint() {
        let device_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(device_body(512.0, 58.0, 14.0, "bitaxe")),
            )
            .mount(&device_server)
            .await;

        let blocks_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/blocks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"height": 905_123, "difficulty": 127.6e12}
            ])))
            .mount(&blocks_server)
            .await;

        let network_info = NetworkInfoClient::with_base_url(blocks_server.uri()).unwrap();
        let controller = DeviceConnectionController::with_options(
            probe_for(&device_server),
            EventBus::new(),
            fast_poll(),
            Some(network_info),
        );
        controller.set_address(Some(loopback(1)));
        controller.connect().await.unwrap();

        let metrics = controller.metrics().borrow().clone().unwrap();
        assert_eq!(metrics.block_height, Some(905_123));
        assert_eq!(metrics.network_difficulty, Some(127.6e12));

        controller.disconnect();
    }
}
