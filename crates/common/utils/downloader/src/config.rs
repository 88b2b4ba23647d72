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

use bon::Builder;
use jiff::SignedDuration;
use smart_default::SmartDefault;

/// Progress is reported once per this many bytes received (8 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Configuration for the fetcher
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct FetcherConfig {
    /// Size of the pieces the response body is consumed in; one progress
    /// report is emitted per piece (default: 8 KiB)
    #[default(DEFAULT_CHUNK_SIZE)]
    #[builder(default = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Overall timeout for one request. None leaves the transfer unbounded.
    pub timeout: Option<SignedDuration>,

    /// Timeout for establishing the connection
    pub connect_timeout: Option<SignedDuration>,

    /// Custom User-Agent header
    #[builder(into)]
    pub user_agent: Option<String>,
}
