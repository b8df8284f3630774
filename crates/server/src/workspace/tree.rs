use std::fs;
use std::path::Path;

use focal_common::types::TreeNode;

use super::{is_linked_file_inside, Result, WorkspaceError, WorkspaceStore};

impl WorkspaceStore {
    /// Nested listing of the workspace: folders before files, names compared
    /// case-insensitively. Symlinks appear only when they point at a file
    /// inside the root.
    pub fn tree(&self) -> Result<Vec<TreeNode>> {
        let root = self.canonical_root()?;
        build_tree(&root, &root)
    }
}

fn build_tree(root: &Path, dir: &Path) -> Result<Vec<TreeNode>> {
    let entries = fs::read_dir(dir).map_err(|e| WorkspaceError::io("failed to list folder", dir, e))?;
    let mut nodes = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| WorkspaceError::io("failed to list folder", dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| WorkspaceError::io("failed to stat", &path, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if file_type.is_dir() {
            nodes.push(TreeNode::Folder { name, children: build_tree(root, &path)? });
        } else if file_type.is_file() || (file_type.is_symlink() && is_linked_file_inside(root, &path)) {
            nodes.push(TreeNode::File { name });
        }
    }
    nodes.sort_by_key(|node| (matches!(node, TreeNode::File { .. }), node.name().to_lowercase()));
    Ok(nodes)
}
