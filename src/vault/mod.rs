//! Vault data model: the JSON-serializable pieces of a vault's metadata,
//! plus the shared member-name constants both the writer and reader use.

pub mod reader;
pub mod writer;

use serde::{Deserialize, Serialize};

pub use reader::VaultReader;
pub use writer::VaultWriter;

pub const OUTER_PREFIX: &str = "backup";
pub const DATA_CREATED_PREFIX: &str = "created";
pub const DATA_UPDATED_PREFIX: &str = "updated";

pub const MEMBER_METADATA: &str = "backup/metadata.json.gpg";
pub const MEMBER_LIST: &str = "backup/list.json.gpg";
pub const MEMBER_SIGS: &str = "backup/sigs.json.gpg";
pub const MEMBER_STATE: &str = "backup/state.json.gpg";
pub const MEMBER_DATA: &str = "backup/data.tar.zst.gpg";

/// Fixed extraction/append order for the five outer members.
pub const MEMBER_ORDER: [&str; 5] = [
    MEMBER_METADATA,
    MEMBER_LIST,
    MEMBER_SIGS,
    MEMBER_STATE,
    MEMBER_DATA,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultKind {
    Full,
    Incremental,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviousVaultRef {
    pub file_name: String,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultMetadata {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: VaultKind,
    pub dir_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_vault: Option<PreviousVaultRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigEntry {
    pub file: String,
    /// base64 of the opaque rolling-signature bytes.
    pub sig: String,
}
