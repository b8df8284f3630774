// Snapshot types shared by the server and its clients.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Content-derived summary of the whole workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RulesFingerprint {
    /// First 12 hex characters of the SHA-256 over every file.
    pub hash: String,
    /// Latest modification time across all files; `None` for an empty tree.
    pub updated_at: Option<DateTime<Utc>>,
}

impl RulesFingerprint {
    /// RFC 3339 rendering of `updated_at` used in status payloads and the
    /// rules header.
    pub fn updated_at_rfc3339(&self) -> Option<String> {
        self.updated_at.map(format_timestamp)
    }
}

/// `+00:00` offset with microseconds, dropping the fraction when it is zero.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    let precision =
        if at.timestamp_subsec_micros() == 0 { SecondsFormat::Secs } else { SecondsFormat::Micros };
    at.to_rfc3339_opts(precision, false)
}

/// Payload of the status surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub server_id: String,
    pub workspace_root: String,
    pub rules_hash: String,
    pub rules_updated_at: Option<String>,
}

impl ServerStatus {
    pub fn new(server_id: impl Into<String>, workspace_root: impl Into<String>, fingerprint: &RulesFingerprint) -> Self {
        Self {
            server_id: server_id.into(),
            workspace_root: workspace_root.into(),
            rules_hash: fingerprint.hash.clone(),
            rules_updated_at: fingerprint.updated_at_rfc3339(),
        }
    }
}

/// One node of the browser file tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Folder { name: String, children: Vec<TreeNode> },
    File { name: String },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            Self::Folder { name, .. } | Self::File { name } => name,
        }
    }
}
