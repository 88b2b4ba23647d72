// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::{
    config::FetcherConfig,
    error::{ClientBuildSnafu, FetchError, HttpSnafu, InvalidTimeoutSnafu, NetworkSnafu},
    types::{FetchResult, ProgressSink},
};

/// Upper bound for buffer preallocation taken from an advertised length.
/// Servers can lie about Content-Length, so the buffer grows past this on
/// demand instead of trusting the header outright.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Retrieves a remote resource into memory.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url` completely, reporting byte counts to `progress` as the
    /// body arrives.
    async fn fetch(
        &self,
        url: &str,
        progress: &dyn ProgressSink,
    ) -> Result<FetchResult, FetchError>;
}

/// Fetches over HTTP(S) with a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client:     reqwest::Client,
    chunk_size: usize,
}

impl HttpFetcher {
    /// Create a fetcher from the given configuration
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(to_std_duration(timeout)?);
        }
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(to_std_duration(connect_timeout)?);
        }
        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua);
        }

        let client = builder.build().context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            chunk_size: config.chunk_size.max(1),
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        progress: &dyn ProgressSink,
    ) -> Result<FetchResult, FetchError> {
        let response = self.client.get(url).send().await.context(NetworkSnafu)?;

        ensure!(
            response.status().is_success(),
            HttpSnafu {
                status: response.status().as_u16(),
                url,
            }
        );

        let total = response.content_length();
        #[allow(clippy::cast_possible_truncation)]
        let capacity = total.map_or(self.chunk_size, |len| len.min(MAX_PREALLOCATION) as usize);
        let mut buffer = BytesMut::with_capacity(capacity);
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.context(NetworkSnafu)?;
            for piece in chunk.chunks(self.chunk_size) {
                buffer.extend_from_slice(piece);
                progress.on_progress(buffer.len() as u64, total);
            }
        }

        let bytes = buffer.freeze();
        let size = bytes.len() as u64;
        // Empty bodies never enter the loop; report completion regardless.
        progress.on_progress(size, total);
        debug!(url, size, "fetch complete");

        Ok(FetchResult { bytes, size })
    }
}

fn to_std_duration(value: jiff::SignedDuration) -> Result<std::time::Duration, FetchError> {
    std::time::Duration::try_from(value).map_err(|e| {
        InvalidTimeoutSnafu {
            value,
            message: e.to_string(),
        }
        .build()
    })
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;

    use super::*;

    #[test]
    fn test_negative_timeout_is_rejected() {
        let config = FetcherConfig::builder()
            .timeout(SignedDuration::from_secs(-1))
            .build();
        let err = HttpFetcher::new(&config).unwrap_err();
        assert!(matches!(err, FetchError::InvalidTimeout { .. }));
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let config = FetcherConfig::builder().chunk_size(0).build();
        let fetcher = HttpFetcher::new(&config).unwrap();
        assert_eq!(fetcher.chunk_size, 1);
    }
}
