// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Public blocks-endpoint fallback.
//!
//! Older firmware builds do not report block height or network difficulty
//! themselves. This client fetches both from a public blocks endpoint,
//! caching the answer in-process so steady-state polling does not hammer a
//! third-party API.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;

use crate::error::ProbeError;

/// Default public blocks endpoint.
const DEFAULT_BASE_URL: &str = "https://mempool.space";

/// Minimum interval between upstream fetches.
const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Request timeout for the public endpoint.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Height and difficulty of the latest block.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BlockInfo {
    /// Block height.
    pub height: u64,
    /// Network difficulty at that block.
    pub difficulty: f64,
}

/// Client for the public blocks endpoint.
///
/// # Examples
///
/// ```no_run
/// use axefleet::netinfo::NetworkInfoClient;
///
/// # async fn example() -> axefleet::Result<()> {
/// let client = NetworkInfoClient::new()?;
/// let block = client.latest_block().await?;
/// println!("height {}", block.height);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct NetworkInfoClient {
    client: Client,
    base_url: String,
    cached: Mutex<Option<(Instant, BlockInfo)>>,
}

impl NetworkInfoClient {
    /// Creates a client against the default public endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self, ProbeError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ProbeError::Transport)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            cached: Mutex::new(None),
        })
    }

    /// Returns the latest block, from cache when fresh enough.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ProbeError`] when the upstream fetch fails and
    /// no cached value is available.
    pub async fn latest_block(&self) -> Result<BlockInfo, ProbeError> {
        if let Some((fetched_at, block)) = *self.cached.lock()
            && fetched_at.elapsed() < REFRESH_INTERVAL
        {
            return Ok(block);
        }

        match self.fetch().await {
            Ok(block) => {
                *self.cached.lock() = Some((Instant::now(), block));
                Ok(block)
            }
            Err(err) => {
                // A stale answer beats no answer for display purposes.
                if let Some((_, block)) = *self.cached.lock() {
                    tracing::debug!(error = %err, "Blocks endpoint failed, serving stale value");
                    return Ok(block);
                }
                Err(err)
            }
        }
    }

    async fn fetch(&self) -> Result<BlockInfo, ProbeError> {
        let url = format!("{}/api/v1/blocks", self.base_url);
        tracing::debug!(url = %url, "Fetching latest block info");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::HttpStatus(status.as_u16()));
        }

        let blocks: Vec<BlockInfo> = response.json().await.map_err(|err| ProbeError::Decode {
            hint: Some(err.to_string()),
            body: String::new(),
        })?;

        blocks.first().copied().ok_or_else(|| ProbeError::Decode {
            hint: Some("empty blocks list".to_string()),
            body: String::new(),
        })
    }
}

fn classify_transport(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        #[allow(clippy::cast_possible_truncation)]
        let millis = REQUEST_TIMEOUT.as_millis() as u64;
        ProbeError::Timeout(millis)
    } else if err.is_connect() {
        ProbeError::NoNetwork
    } else {
        ProbeError::Transport(err)
    }
}
