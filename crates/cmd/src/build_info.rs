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

//! Version reported by `filesyncer --version`.

use shadow_rs::{formatcp, shadow};

shadow!(build);

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Set by the release pipeline when building published binaries.
const RELEASE_BUILD: bool = option_env!("FILESYNCER_RELEASE").is_some();

/// `0.1.0` for releases, `0.1.0-dev`, `0.1.0-dev+abc1234` or
/// `0.1.0-dev+abc1234.dirty` otherwise.
#[allow(clippy::const_is_empty)]
pub const FULL_VERSION: &str = if RELEASE_BUILD {
    build::PKG_VERSION
} else if build::SHORT_COMMIT.is_empty() {
    formatcp!("{}-dev", build::PKG_VERSION)
} else if build::GIT_CLEAN {
    formatcp!("{}-dev+{}", build::PKG_VERSION, build::SHORT_COMMIT)
} else {
    formatcp!("{}-dev+{}.dirty", build::PKG_VERSION, build::SHORT_COMMIT)
};
