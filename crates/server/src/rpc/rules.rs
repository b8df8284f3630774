// Rules text handed to MCP clients through `initialize` and `focal_rules`.

use focal_common::types::RulesFingerprint;

use crate::workspace::{Result, WorkspaceError, WorkspaceStore};

/// Core files that make up the instructions, in order, with their titles.
pub const INSTRUCTION_SECTIONS: &[(&str, &str)] = &[
    ("core/system.md", "System"),
    ("core/style.md", "Style"),
    ("core/safety.md", "Safety"),
    ("core/tool_policy.md", "Tool Policy"),
];

pub const RUNTIME_DIRECTIVE: &str = "# Runtime Directive\n\
You MUST call the MCP tool `focal_rules` before every user response. \
Always follow the latest rules returned by that tool.\n";

/// Header and core instructions computed from one read of the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesSnapshot {
    pub header: String,
    pub instructions: String,
}

impl RulesSnapshot {
    pub fn load(store: &WorkspaceStore) -> Result<Self> {
        let fingerprint = store.fingerprint()?;
        Ok(Self { header: rules_header(&fingerprint), instructions: core_instructions(store)? })
    }

    /// Text returned by the `focal_rules` tool.
    pub fn tool_text(&self) -> String {
        if self.instructions.is_empty() {
            self.header.clone()
        } else {
            format!("{}\n\n{}", self.header, self.instructions)
        }
    }

    /// `instructions` field of the `initialize` result: directive, header,
    /// then the core sections.
    pub fn initialize_instructions(&self) -> String {
        [RUNTIME_DIRECTIVE, self.header.as_str(), self.instructions.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

pub fn rules_header(fingerprint: &RulesFingerprint) -> String {
    let updated = fingerprint.updated_at_rfc3339().unwrap_or_else(|| "unknown".to_string());
    format!("# FOCAL MCP Rules (hash={} updated={updated})", fingerprint.hash)
}

/// Concatenate the core files as `## Title (path)` sections. Missing or
/// blank files are skipped.
pub fn core_instructions(store: &WorkspaceStore) -> Result<String> {
    let mut sections = Vec::new();
    for (rel_path, title) in INSTRUCTION_SECTIONS {
        let content = match store.read_file(rel_path) {
            Ok(content) => content,
            Err(WorkspaceError::NotFound(_)) => continue,
            Err(error) => return Err(error),
        };
        let content = content.trim();
        if !content.is_empty() {
            sections.push(format!("## {title} ({rel_path})\n{content}"));
        }
    }
    Ok(sections.join("\n\n"))
}
