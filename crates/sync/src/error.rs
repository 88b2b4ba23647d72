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

use std::path::PathBuf;

use downloader::FetchError;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("target list {} not found", path.display()))]
    TargetsNotFound { path: PathBuf },

    #[snafu(display("history file {} not found", path.display()))]
    HistoryNotFound { path: PathBuf },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ConfigRead {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("malformed record in {}: {source}", path.display()))]
    ConfigFormat {
        path:   PathBuf,
        source: serde_json::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("{source}"))]
    Transfer {
        source: FetchError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("failed to read local file {}: {source}", path.display()))]
    LocalRead {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    Persistence {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("failed to encode record: {source}"))]
    Encode {
        source: serde_json::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("diff computation failed: {source}"))]
    DiffTask {
        source: tokio::task::JoinError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("target name '{name}' appears more than once in {}", path.display()))]
    DuplicateTarget { name: String, path: PathBuf },

    #[snafu(display("invalid local path: {}", path.display()))]
    InvalidLocalPath { path: PathBuf },
}
