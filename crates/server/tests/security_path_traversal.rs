use std::sync::Arc;

use focal_server::rpc::methods::{Dispatcher, McpError};
use focal_server::workspace::{WorkspaceError, WorkspaceStore};
use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn ensured_store(tmp: &TempDir) -> WorkspaceStore {
    let store = WorkspaceStore::new(tmp.path().join("workspace"));
    store.ensure().expect("workspace should initialize");
    store
}

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,7}"
}

/// A walk of named segments and `..` steps that never climbs above its
/// starting directory.
fn contained_path() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::option::weighted(0.7, segment()), 0..8).prop_map(|steps| {
        let mut depth = 0usize;
        let mut parts = Vec::new();
        for step in steps {
            match step {
                Some(name) => {
                    depth += 1;
                    parts.push(name);
                }
                None if depth > 0 => {
                    depth -= 1;
                    parts.push("..".to_string());
                }
                None => {}
            }
        }
        parts.join("/")
    })
}

/// Descend `depth` segments, climb `depth + extra` times, then name a file.
fn escaping_path() -> impl Strategy<Value = String> {
    (prop::collection::vec(segment(), 0..4), 1usize..4, segment()).prop_map(|(down, extra, leaf)| {
        let ups = vec![".."; down.len() + extra];
        let mut parts: Vec<String> = down;
        parts.extend(ups.into_iter().map(str::to_string));
        parts.push(leaf);
        parts.join("/")
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn contained_paths_resolve_inside_root(path in contained_path(), leading_slash in any::<bool>()) {
        let tmp = TempDir::new().unwrap();
        let store = ensured_store(&tmp);
        let root = store.canonical_root().unwrap();
        let input = if leading_slash { format!("/{path}") } else { path };

        let resolved = store.resolve_safe(&input).unwrap();
        prop_assert!(resolved.starts_with(&root), "{} escaped {}", resolved.display(), root.display());
    }

    #[test]
    fn escaping_paths_are_rejected(path in escaping_path()) {
        let tmp = TempDir::new().unwrap();
        let store = ensured_store(&tmp);

        prop_assert!(matches!(store.resolve_safe(&path), Err(WorkspaceError::PathTraversal(_))));
    }
}

#[test]
fn crud_never_touches_files_outside_root() {
    let tmp = TempDir::new().unwrap();
    let store = ensured_store(&tmp);
    let victim = tmp.path().join("victim.md");
    std::fs::write(&victim, "keep me").unwrap();

    assert!(store.read_file("../victim.md").is_err());
    assert!(store.write_file("../victim.md", "owned").is_err());
    assert!(store.delete_file("../victim.md").is_err());
    assert!(store.delete_folder("..").is_err());
    assert!(store.move_entry("../victim.md", "core/victim.md").is_err());

    assert_eq!(std::fs::read_to_string(&victim).unwrap(), "keep me");
}

#[test]
fn resource_uri_traversal_is_blocked() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("secret.md"), "secret").unwrap();
    let dispatcher = Dispatcher::new(Arc::new(ensured_store(&tmp)));

    let error = dispatcher
        .handle("resources/read", Some(json!({"uri": "focal:///../secret.md"})))
        .unwrap_err();
    assert!(matches!(error, McpError::PathTraversal(_)));
    assert_eq!(error.to_rpc_error().message, "Path traversal blocked");
}

#[cfg(unix)]
#[test]
fn symlinked_escape_is_neither_listed_nor_readable() {
    use std::os::unix::fs::symlink;

    let tmp = TempDir::new().unwrap();
    let store = ensured_store(&tmp);
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("outside.md"), "# outside").unwrap();
    symlink(outside.path().join("outside.md"), store.root().join("agents/escape.md")).unwrap();
    symlink(outside.path(), store.root().join("agents/linked")).unwrap();

    let dispatcher = Dispatcher::new(Arc::new(store));
    let resources = dispatcher.handle("resources/list", None).unwrap();
    let listed = resources.to_string();
    assert!(!listed.contains("escape.md"));
    assert!(!listed.contains("linked"));

    for uri in ["focal:///agents/escape.md", "focal:///agents/linked/outside.md"] {
        let error = dispatcher.handle("resources/read", Some(json!({"uri": uri}))).unwrap_err();
        assert_eq!(error.to_rpc_error().message, "Path traversal blocked", "{uri}");
    }
}

#[cfg(unix)]
#[test]
fn dangling_symlink_inside_root_behaves_like_its_target() {
    use std::os::unix::fs::symlink;

    let tmp = TempDir::new().unwrap();
    let store = ensured_store(&tmp);
    let root = store.canonical_root().unwrap();
    symlink(root.join("agents/target.md"), root.join("agents/alias.md")).unwrap();
    let dispatcher = Dispatcher::new(Arc::new(store));

    let error = dispatcher
        .handle("resources/read", Some(json!({"uri": "focal:///agents/alias.md"})))
        .unwrap_err();
    assert_eq!(error.to_rpc_error().message, "Resource not found");

    dispatcher.store().write_file("agents/alias.md", "# Target").unwrap();
    assert_eq!(std::fs::read_to_string(root.join("agents/target.md")).unwrap(), "# Target");

    let read = dispatcher
        .handle("resources/read", Some(json!({"uri": "focal:///agents/alias.md"})))
        .unwrap();
    assert_eq!(read["contents"][0]["text"], "# Target");
}
