// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `axefleet` library.
//!
//! The hierarchy separates per-probe network failures ([`ProbeError`]),
//! payload parsing failures ([`ParseError`]), and crate-level operational
//! errors ([`Error`]).

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A single device probe failed.
    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    /// A value or payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// No device address is configured.
    ///
    /// This is a precondition failure, not a network failure: operations
    /// that require a selected device return it without issuing any request.
    #[error("no device address configured")]
    ConfigurationMissing,

    /// A responder answered the status query but is not a compatible device.
    #[error("responder is not a compatible device")]
    NotCompatibleDevice,

    /// The local-network reachability preflight failed.
    ///
    /// Surfaced before any probe is issued so callers can guide the user to
    /// grant local network access.
    #[error("local network access denied")]
    PermissionDenied,

    /// A scan finished without discovering any device.
    #[error("no devices found")]
    NoDevicesFound,
}

/// Errors produced by a single HTTP probe against one device address.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The address is not a valid IPv4 dotted quad.
    #[error("invalid device address: {0}")]
    InvalidAddress(String),

    /// The request did not complete within the caller-supplied timeout.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The host refused the connection or is down.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// No active network interface is available.
    #[error("not connected to a network")]
    NoNetwork,

    /// The device answered with a non-success HTTP status.
    #[error("device returned HTTP {0}")]
    HttpStatus(u16),

    /// The response body could not be decoded as a device status payload.
    ///
    /// The raw body is retained so callers can tell the user which fields
    /// were unexpected or missing without failing silently.
    #[error("failed to decode status payload{}", hint_suffix(.hint))]
    Decode {
        /// Best-effort description of the missing or unexpected fields.
        hint: Option<String>,
        /// The raw response body, for diagnostics.
        body: String,
    },

    /// Underlying HTTP transport failure not covered by a more specific
    /// variant (TLS setup, malformed response framing, client build).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_deref()
        .map(|h| format!(" ({h})"))
        .unwrap_or_default()
}

impl ProbeError {
    /// Returns true if this error means the device simply did not answer.
    ///
    /// Scan-granularity callers treat these as "no device here", not as a
    /// failure worth surfacing.
    #[must_use]
    pub fn is_no_answer(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unreachable(_))
    }
}

/// Errors related to parsing device-reported values.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the response.
    #[error("missing field in response: {0}")]
    MissingField(String),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
