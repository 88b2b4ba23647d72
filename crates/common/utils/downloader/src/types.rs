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

use bytes::Bytes;

/// Body of a completed fetch, held in memory
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Downloaded content
    pub bytes: Bytes,
    /// Number of bytes received
    pub size:  u64,
}

/// Receives byte counts while a transfer is in flight.
///
/// `total` is `None` when the server did not advertise a length up front.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, downloaded: u64, total: Option<u64>);
}

impl<F> ProgressSink for F
where
    F: Fn(u64, Option<u64>) + Send + Sync,
{
    fn on_progress(&self, downloaded: u64, total: Option<u64>) { self(downloaded, total); }
}

/// A sink that discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _downloaded: u64, _total: Option<u64>) {}
}
