// Mapping between workspace-relative paths, prompt names and resource URIs.
//
// Prompt names are derived from `core/**.md` and `agents/**.md` files:
// `agents/reviewer.md` <-> `agents.reviewer`. Only paths whose segments
// contain no `.` besides the `.md` suffix have a name, so the mapping
// inverts exactly.

pub const CORE_DIR: &str = "core";
pub const AGENTS_DIR: &str = "agents";

/// Top-level directories whose markdown files are surfaced as prompts.
pub const PROMPT_DIRS: &[&str] = &[CORE_DIR, AGENTS_DIR];

pub const RESOURCE_URI_PREFIX: &str = "focal:///";
pub const MARKDOWN_MIME_TYPE: &str = "text/markdown";

const PROMPT_SUFFIX: &str = ".md";

/// Prompt name for a `/`-separated relative path, or `None` when the file
/// is not a prompt.
pub fn prompt_name_for_path(rel_path: &str) -> Option<String> {
    let stem = rel_path.strip_suffix(PROMPT_SUFFIX)?;
    let segments: Vec<&str> = stem.split('/').collect();
    let (domain, rest) = segments.split_first()?;
    if !PROMPT_DIRS.contains(domain) || rest.is_empty() {
        return None;
    }
    if rest.iter().any(|segment| segment.is_empty() || segment.contains('.')) {
        return None;
    }
    Some(segments.join("."))
}

/// Relative path for a prompt name, or `None` when the name is outside the
/// `core.` / `agents.` domains.
pub fn path_for_prompt_name(name: &str) -> Option<String> {
    let in_domain = PROMPT_DIRS.iter().any(|dir| {
        name.strip_prefix(dir).is_some_and(|rest| rest.starts_with('.'))
    });
    if !in_domain {
        return None;
    }
    Some(format!("{}{PROMPT_SUFFIX}", name.replace('.', "/")))
}

pub fn resource_uri(rel_path: &str) -> String {
    format!("{RESOURCE_URI_PREFIX}{rel_path}")
}

/// Relative path addressed by a `focal:///` URI.
pub fn path_for_resource_uri(uri: &str) -> Option<&str> {
    uri.strip_prefix(RESOURCE_URI_PREFIX)
}
