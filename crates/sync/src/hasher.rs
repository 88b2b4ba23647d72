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

use std::{fmt, io::ErrorKind, path::Path};

use sha2::{Digest, Sha256};
use snafu::ResultExt;
use tokio::{fs, io::AsyncReadExt};

use crate::error::{LocalReadSnafu, Result};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// SHA-256 digest of a byte sequence, used for change detection
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] { &self.0 }

    /// Lowercase hex rendering
    #[must_use]
    pub fn to_hex(&self) -> String { self.to_string() }

    fn from_hasher(hasher: Sha256) -> Self {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Self(digest)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Fingerprint({})", &hex[..16])
    }
}

/// Fingerprint an in-memory byte sequence
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint::from_hasher(hasher)
}

/// Fingerprint the file at `path`.
///
/// Returns `Ok(None)` when nothing exists there, which is the normal state
/// before a target's first sync.
pub async fn fingerprint_of_local_file(path: &Path) -> Result<Option<Fingerprint>> {
    let mut file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).context(LocalReadSnafu { path }),
    };

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = file
            .read(&mut buffer)
            .await
            .context(LocalReadSnafu { path })?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(Some(Fingerprint::from_hasher(hasher)))
}
