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

use std::{borrow::Cow, time::Duration};

use bon::Builder;
use similar::TextDiff;
use smart_default::SmartDefault;

/// Sole diff line when there is no previous content to compare with
pub const NEW_CONTENT_LINE: &str = "new file";

/// Sole diff line when either side looks binary
pub const BINARY_CONTENT_LINE: &str = "binary content differs";

/// Outcome of comparing previous and fetched content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub changed: bool,
    pub diff:    Vec<String>,
}

impl Comparison {
    fn unchanged() -> Self {
        Self {
            changed: false,
            diff:    Vec::new(),
        }
    }

    fn changed_with(line: impl Into<String>) -> Self {
        Self {
            changed: true,
            diff:    vec![line.into()],
        }
    }
}

/// Produces unified line diffs between two versions of a file.
///
/// Only used for reporting: whatever it returns, the caller's decision to
/// write has already been made by fingerprint comparison.
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct DiffEngine {
    /// Inputs larger than this (either side) are not line-diffed
    #[default(4 * 1024 * 1024)]
    #[builder(default = 4 * 1024 * 1024)]
    max_input_bytes: usize,

    /// Budget for the diff algorithm before it settles for an approximate
    /// result
    #[default(_code = "Duration::from_secs(1)")]
    #[builder(default = Duration::from_secs(1))]
    timeout: Duration,

    /// Unchanged lines shown around each hunk
    #[default = 3]
    #[builder(default = 3)]
    context_lines: usize,
}

impl DiffEngine {
    /// Compare `old` (absent when there was no local file) against `new`.
    ///
    /// `label` names the file in the `--- a/` and `+++ b/` headers.
    #[must_use]
    pub fn compare(&self, label: &str, old: Option<&[u8]>, new: &[u8]) -> Comparison {
        let Some(old) = old else {
            return Comparison::changed_with(NEW_CONTENT_LINE);
        };
        if old == new {
            return Comparison::unchanged();
        }
        if is_binary(old) || is_binary(new) {
            return Comparison::changed_with(BINARY_CONTENT_LINE);
        }
        if old.len() > self.max_input_bytes || new.len() > self.max_input_bytes {
            return Comparison::changed_with(format!(
                "diff skipped: content exceeds {} bytes",
                self.max_input_bytes
            ));
        }

        let old_text = decode(old);
        let new_text = decode(new);
        let text_diff = TextDiff::configure()
            .timeout(self.timeout)
            .diff_lines(old_text.as_ref(), new_text.as_ref());
        let rendered = text_diff
            .unified_diff()
            .context_radius(self.context_lines)
            .header(&format!("a/{label}"), &format!("b/{label}"))
            .to_string();

        let diff: Vec<String> = rendered.lines().map(str::to_owned).collect();
        if diff.is_empty() {
            // Bytes differ but the lossy decodings agree (e.g. two different
            // invalid sequences both became U+FFFD).
            return Comparison::changed_with("content differs only in undecodable bytes");
        }

        Comparison {
            changed: true,
            diff,
        }
    }
}

/// Decode as UTF-8, replacing invalid sequences
fn decode(bytes: &[u8]) -> Cow<'_, str> { String::from_utf8_lossy(bytes) }

fn is_binary(bytes: &[u8]) -> bool { bytes.contains(&0) }
