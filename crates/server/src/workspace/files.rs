// File and folder CRUD used by the browser file manager.
//
// These calls only touch the filesystem; announcing the change to push
// channels is the caller's job once the call returns `Ok`.

use std::fs;
use std::path::Path;

use super::{Result, WorkspaceError, WorkspaceStore};

impl WorkspaceStore {
    pub fn read_file(&self, rel_path: &str) -> Result<String> {
        let path = self.resolve_safe(rel_path)?;
        if !path.is_file() {
            return Err(WorkspaceError::NotFound(rel_path.to_string()));
        }
        fs::read_to_string(&path).map_err(|e| WorkspaceError::io("failed to read file", &path, e))
    }

    /// Write `content`, creating parent folders as needed. Returns the
    /// number of bytes written.
    pub fn write_file(&self, rel_path: &str, content: &str) -> Result<usize> {
        let path = self.resolve_safe(rel_path)?;
        ensure_parent(&path)?;
        fs::write(&path, content).map_err(|e| WorkspaceError::io("failed to write file", &path, e))?;
        Ok(content.len())
    }

    /// Delete a file. Returns `false` when there was no file to delete.
    pub fn delete_file(&self, rel_path: &str) -> Result<bool> {
        let path = self.resolve_safe(rel_path)?;
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| WorkspaceError::io("failed to delete file", &path, e))?;
        Ok(true)
    }

    pub fn create_folder(&self, rel_path: &str) -> Result<()> {
        let path = self.resolve_safe(rel_path)?;
        fs::create_dir_all(&path).map_err(|e| WorkspaceError::io("failed to create folder", &path, e))
    }

    /// Delete a folder and everything below it. Returns `false` when there
    /// was no folder to delete.
    ///
    /// Children are removed before their parent. If a removal fails, the
    /// entries already removed stay gone and the rest are left in place.
    pub fn delete_folder(&self, rel_path: &str) -> Result<bool> {
        let path = self.resolve_safe(rel_path)?;
        if path == self.canonical_root()? {
            return Err(WorkspaceError::RootProtected);
        }
        if !path.is_dir() {
            return Ok(false);
        }
        remove_tree(&path)?;
        Ok(true)
    }

    /// Move or rename an entry, creating the destination's parent folders.
    pub fn move_entry(&self, src: &str, dst: &str) -> Result<()> {
        let root = self.canonical_root()?;
        let from = self.resolve_safe(src)?;
        let to = self.resolve_safe(dst)?;
        if from == root || to == root {
            return Err(WorkspaceError::RootProtected);
        }
        if fs::symlink_metadata(&from).is_err() {
            return Err(WorkspaceError::NotFound(src.to_string()));
        }
        ensure_parent(&to)?;
        fs::rename(&from, &to).map_err(|e| WorkspaceError::io("failed to move entry", &from, e))
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent)
            .map_err(|e| WorkspaceError::io("failed to create parent folder", parent, e)),
        None => Ok(()),
    }
}

/// Post-order removal. Symlinks are unlinked, never followed.
fn remove_tree(dir: &Path) -> Result<()> {
    let entries =
        fs::read_dir(dir).map_err(|e| WorkspaceError::io("failed to list folder", dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| WorkspaceError::io("failed to list folder", dir, e))?;
        let path = entry.path();
        let file_type =
            entry.file_type().map_err(|e| WorkspaceError::io("failed to stat", &path, e))?;
        if file_type.is_dir() {
            remove_tree(&path)?;
        } else {
            fs::remove_file(&path).map_err(|e| WorkspaceError::io("failed to delete file", &path, e))?;
        }
    }
    fs::remove_dir(dir).map_err(|e| WorkspaceError::io("failed to delete folder", dir, e))
}
