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
//! ~/.config/vaultchain/config.toml — engine tunables only.
//!
//! The passphrase and the source directory are supplied per call by the
//! caller; this config never holds secrets or paths to back up.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cipher::CipherAlgo;
use crate::error::{Result, VaultError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Zstd compression level used when closing a vault's data archive.
    pub zstd_level: i32,
    /// Rolling-signature block size, in bytes.
    pub block_size: u32,
    /// Strong-hash length, in bytes, used inside each signature block.
    pub crypto_hash_len: u8,
    /// Cipher written for new vaults. Readers accept both regardless of
    /// this setting.
    pub cipher: CipherAlgo,
    /// scrypt log2(N) cost parameter for key derivation.
    pub scrypt_log_n: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            zstd_level: 7,
            block_size: 4,
            crypto_hash_len: 8,
            cipher: CipherAlgo::Aes256Gcm,
            scrypt_log_n: 15,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vaultchain").join("config.toml"))
}

impl EngineConfig {
    /// Load config from disk, falling back to defaults if missing or
    /// unparseable.
    pub fn load() -> Self {
        if let Some(path) = config_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "could not parse engine config, using defaults");
                    }
                }
            }
        }
        EngineConfig::default()
    }

    fn load_from(path: &PathBuf) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| VaultError::io(path.clone(), e))?;
        toml::from_str(&text).map_err(|e| VaultError::Config(format!("invalid TOML in {}: {e}", path.display())))
    }

    pub fn save(&self) -> Result<()> {
        let path = config_path()
            .ok_or_else(|| VaultError::Config("cannot determine config directory for this OS".into()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::io(parent.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| VaultError::Config(format!("failed to serialize engine config: {e}")))?;
        fs::write(&path, text).map_err(|e| VaultError::io(path.clone(), e))?;
        tracing::info!(path = %path.display(), "engine config saved");
        Ok(())
    }
}
