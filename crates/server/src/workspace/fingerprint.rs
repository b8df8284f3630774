// Workspace fingerprint for change detection.
//
// SHA-256 over every file sorted by relative path: path bytes, a `|`
// separator, then the raw content. Recomputed from disk on every call.

use std::fs::File;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use focal_common::types::RulesFingerprint;
use sha2::{Digest, Sha256};

use super::{Result, WorkspaceError, WorkspaceStore};

/// Hex characters kept from the digest.
pub const FINGERPRINT_HEX_LEN: usize = 12;

const PATH_SEPARATOR: &[u8] = b"|";

impl WorkspaceStore {
    pub fn fingerprint(&self) -> Result<RulesFingerprint> {
        let mut hasher = Sha256::new();
        let mut latest: Option<DateTime<Utc>> = None;

        for (rel_path, path) in self.sorted_files()? {
            hasher.update(rel_path.as_bytes());
            hasher.update(PATH_SEPARATOR);
            stream_into(&mut hasher, &path)?;

            let modified = modified_at(&path)?;
            if latest.map_or(true, |current| modified > current) {
                latest = Some(modified);
            }
        }

        let mut hash = hex_encode(&hasher.finalize());
        hash.truncate(FINGERPRINT_HEX_LEN);
        Ok(RulesFingerprint { hash, updated_at: latest })
    }
}

fn stream_into(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let mut file =
        File::open(path).map_err(|e| WorkspaceError::io("failed to open file for hashing", path, e))?;
    io::copy(&mut file, hasher)
        .map_err(|e| WorkspaceError::io("failed to read file for hashing", path, e))?;
    Ok(())
}

fn modified_at(path: &Path) -> Result<DateTime<Utc>> {
    let modified = path
        .metadata()
        .and_then(|meta| meta.modified())
        .map_err(|e| WorkspaceError::io("failed to read modification time", path, e))?;
    Ok(DateTime::<Utc>::from(modified))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}
