// Workspace store: the rules directory tree and its path-safety boundary.
//
// Every filesystem path the server touches is produced by
// `WorkspaceStore::resolve_safe`, which refuses anything that resolves
// outside the workspace root.

pub mod files;
pub mod fingerprint;
pub mod tree;

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use focal_common::naming::{AGENTS_DIR, CORE_DIR};
use thiserror::Error;
use tracing::{debug, info};

const MAX_SYMLINK_HOPS: usize = 40;

/// Core files seeded on first start, in instruction order.
pub const DEFAULT_CORE_FILES: &[(&str, &str)] = &[
    ("core/system.md", "# System\n\nFOCAL MCP system prompt.\n"),
    ("core/style.md", "# Style\n\nFOCAL MCP style guide.\n"),
    ("core/safety.md", "# Safety\n\nFOCAL MCP safety rules.\n"),
    ("core/tool_policy.md", "# Tool Policy\n\nFOCAL MCP tool usage rules.\n"),
];

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("path `{0}` resolves outside the workspace root")]
    PathTraversal(String),

    #[error("`{0}` does not exist")]
    NotFound(String),

    #[error("the workspace root itself cannot be deleted or moved")]
    RootProtected,

    #[error("{context} `{}`: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WorkspaceError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { context, path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Owner of the on-disk workspace tree.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    root: PathBuf,
}

impl WorkspaceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root as configured (not canonicalized).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root, `core/` and `agents/`, and seed missing default
    /// core files. Existing files are never overwritten.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.root.clone(), self.root.join(CORE_DIR), self.root.join(AGENTS_DIR)] {
            fs::create_dir_all(&dir)
                .map_err(|e| WorkspaceError::io("failed to create directory", &dir, e))?;
        }

        for (rel_path, content) in DEFAULT_CORE_FILES {
            let path = self.root.join(rel_path);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())
                        .map_err(|e| WorkspaceError::io("failed to seed default file", &path, e))?;
                    info!(path = rel_path, "seeded default core file");
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(WorkspaceError::io("failed to seed default file", &path, e)),
            }
        }
        Ok(())
    }

    /// Canonical form of the root. The root must exist.
    pub fn canonical_root(&self) -> Result<PathBuf> {
        fs::canonicalize(&self.root)
            .map_err(|e| WorkspaceError::io("failed to resolve workspace root", &self.root, e))
    }

    /// Resolve a caller-supplied relative path to an absolute path inside
    /// the root.
    ///
    /// Leading slashes are stripped, `..` is applied, and symlinks along the
    /// way are followed, including links whose target does not exist yet. The
    /// target itself does not need to exist. Fails with
    /// [`WorkspaceError::PathTraversal`] when the result is neither the root
    /// nor one of its descendants.
    pub fn resolve_safe(&self, rel_path: &str) -> Result<PathBuf> {
        let root = self.canonical_root()?;
        let trimmed = rel_path.trim_start_matches('/');
        let traversal = || WorkspaceError::PathTraversal(rel_path.to_string());

        // Components still to apply, last one on top.
        let mut pending: Vec<OsString> = Vec::new();
        for component in Path::new(trimmed).components().rev() {
            match component {
                Component::RootDir | Component::Prefix(_) => return Err(traversal()),
                other => pending.push(other.as_os_str().to_os_string()),
            }
        }

        let mut resolved = root.clone();
        let mut hops = 0;
        while let Some(segment) = pending.pop() {
            match Path::new(&segment).components().next() {
                Some(Component::CurDir) | None => {}
                Some(Component::ParentDir) => {
                    resolved.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => resolved.push(&segment),
                Some(Component::Normal(_)) => {
                    resolved.push(&segment);
                    let Some(target) = read_symlink(&resolved)? else {
                        continue;
                    };
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return Err(WorkspaceError::io(
                            "too many levels of symbolic links",
                            &resolved,
                            io::Error::other("symlink loop"),
                        ));
                    }
                    resolved.pop();
                    for component in target.components().rev() {
                        pending.push(component.as_os_str().to_os_string());
                    }
                }
            }
        }

        if resolved != root && !resolved.starts_with(&root) {
            debug!(rel_path, resolved = %resolved.display(), "blocked path traversal");
            return Err(traversal());
        }
        Ok(resolved)
    }

    /// Lazily enumerate every regular file under the root, plus symlinks to
    /// regular files inside the root. Linked directories are not descended.
    /// Order is unspecified.
    pub fn list_files(&self) -> Result<FileWalker> {
        let root = self.canonical_root()?;
        Ok(FileWalker { stack: vec![root.clone()], root, pending: Vec::new() })
    }

    /// Every file under the root, sorted by relative path.
    pub fn sorted_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let root = self.canonical_root()?;
        let mut files = Vec::new();
        for path in self.list_files()? {
            let path = path?;
            files.push((relative_to(&root, &path), path));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// `/`-separated path of `path` relative to the root.
    pub fn relative_of(&self, path: &Path) -> Result<String> {
        Ok(relative_to(&self.canonical_root()?, path))
    }
}

fn relative_to(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Target of `path` if it is a symlink. Entries that cannot be inspected
/// (usually missing) are not links.
fn read_symlink(path: &Path) -> Result<Option<PathBuf>> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => fs::read_link(path)
            .map(Some)
            .map_err(|e| WorkspaceError::io("failed to read symlink", path, e)),
        _ => Ok(None),
    }
}

/// Whether `path` is a symlink to a regular file inside `root`.
pub(crate) fn is_linked_file_inside(root: &Path, path: &Path) -> bool {
    match (fs::canonicalize(path), fs::metadata(path)) {
        (Ok(target), Ok(meta)) => meta.is_file() && target.starts_with(root),
        _ => false,
    }
}

/// Depth-first iterator over the regular files of a directory tree.
pub struct FileWalker {
    root: PathBuf,
    stack: Vec<PathBuf>,
    pending: Vec<PathBuf>,
}

impl Iterator for FileWalker {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(file) = self.pending.pop() {
                return Some(Ok(file));
            }
            let dir = self.stack.pop()?;
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => return Some(Err(WorkspaceError::io("failed to list directory", &dir, e))),
            };
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => return Some(Err(WorkspaceError::io("failed to list directory", &dir, e))),
                };
                let file_type = match entry.file_type() {
                    Ok(file_type) => file_type,
                    Err(e) => {
                        return Some(Err(WorkspaceError::io("failed to stat", entry.path(), e)))
                    }
                };
                if file_type.is_dir() {
                    self.stack.push(entry.path());
                } else if file_type.is_file()
                    || (file_type.is_symlink() && is_linked_file_inside(&self.root, &entry.path()))
                {
                    self.pending.push(entry.path());
                }
            }
        }
    }
}
