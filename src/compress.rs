// ─────────────────────────────────────────────────────────────────────────────
// vaultchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
// ─────────────────────────────────────────────────────────────────────────────
//! Compression codec: the vault data archive is always zstd, default level 7.

use std::io::Write;

use crate::error::{Result, VaultError};

pub const DEFAULT_LEVEL: i32 = 7;

/// Compress `data` with zstd at `level`.
pub fn compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let level = level.clamp(1, 22);
    let mut encoder = zstd::Encoder::new(Vec::new(), level).map_err(|e| VaultError::io("<zstd encoder>", e))?;
    encoder.write_all(data).map_err(|e| VaultError::io("<zstd encoder>", e))?;
    encoder.finish().map_err(|e| VaultError::io("<zstd encoder>", e))
}

/// Decompress a zstd-compressed buffer.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::stream::decode_all(data).map_err(|e| VaultError::io("<zstd decoder>", e))
}
