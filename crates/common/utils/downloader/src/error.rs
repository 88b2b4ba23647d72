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

use std::error::Error as StdError;

use jiff::SignedDuration;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FetchError {
    #[snafu(display("Network error: {}", error_chain(source)))]
    Network { source: reqwest::Error },

    #[snafu(display("HTTP error {status} for URL: {url}"))]
    Http { status: u16, url: String },

    #[snafu(display("Failed to build HTTP client: {}", error_chain(source)))]
    ClientBuild { source: reqwest::Error },

    #[snafu(display("Invalid timeout {value}: {message}"))]
    InvalidTimeout {
        value:   SignedDuration,
        message: String,
    },
}

/// Render an error and every source beneath it as a single line.
///
/// reqwest's top-level message ("error sending request for url") hides the
/// interesting part (connection refused, DNS failure, timeout), which lives
/// further down the source chain.
#[must_use]
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(source) = current {
        let text = source.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = source.source();
    }
    message
}
