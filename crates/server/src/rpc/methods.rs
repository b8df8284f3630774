use std::sync::Arc;

use focal_common::naming::{
    path_for_prompt_name, path_for_resource_uri, prompt_name_for_path, resource_uri,
    MARKDOWN_MIME_TYPE,
};
use focal_common::protocol::jsonrpc::{RpcError, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};
use focal_common::protocol::mcp_methods as methods;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use super::rules::RulesSnapshot;
use crate::workspace::{WorkspaceError, WorkspaceStore};

pub const SERVER_NAME: &str = "FOCAL MCP";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const FOCAL_RULES_DESCRIPTION: &str =
    "Fetch the latest FOCAL MCP rules. Must be called before responding to the user.";

// ── Errors ──────────────────────────────────────────────────────────

/// Dispatcher failure. `Display` is the message sent to the client.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Method not found")]
    MethodNotFound(String),

    #[error("Invalid params")]
    InvalidParams(String),

    #[error("Unknown tool")]
    UnknownTool(Option<String>),

    #[error("Missing prompt name")]
    MissingPromptName,

    #[error("Unknown prompt name")]
    UnknownPromptName(String),

    #[error("Prompt not found")]
    PromptNotFound(String),

    #[error("Invalid resource URI")]
    InvalidResourceUri(Option<String>),

    #[error("Resource not found")]
    ResourceNotFound(String),

    #[error("Path traversal blocked")]
    PathTraversal(String),

    #[error("Internal error")]
    Workspace(#[source] WorkspaceError),

    #[error("Internal error")]
    TaskFailed(String),
}

impl McpError {
    pub fn code(&self) -> i32 {
        match self {
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::Workspace(_) | Self::TaskFailed(_) => INTERNAL_ERROR,
            _ => INVALID_PARAMS,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.code() == INTERNAL_ERROR
    }

    pub fn to_rpc_error(&self) -> RpcError {
        let mut error = RpcError::new(self.code(), self.to_string());
        if let Self::InvalidParams(reason) = self {
            error.data = Some(json!({ "reason": reason }));
        }
        error
    }
}

impl From<WorkspaceError> for McpError {
    fn from(error: WorkspaceError) -> Self {
        match error {
            WorkspaceError::PathTraversal(path) => Self::PathTraversal(path),
            other => Self::Workspace(other),
        }
    }
}

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
}

/// Params carrying a `name`. The value is kept untyped so that a name of
/// the wrong JSON type fails the same way as an unknown one.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct NameParams {
    #[serde(default)]
    pub name: Option<Value>,
}

impl NameParams {
    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct UriParams {
    #[serde(default)]
    pub uri: Option<Value>,
}

impl UriParams {
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_ref().and_then(Value::as_str)
    }
}

/// Text form of a param value for error reporting: strings as-is, anything
/// else as JSON.
fn param_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Every method the server answers, with its decoded params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpRequest {
    Initialize(InitializeParams),
    Initialized,
    Cancelled,
    SetLogLevel,
    Ping,
    ToolsList,
    ToolsCall(NameParams),
    PromptsList,
    PromptsGet(NameParams),
    ResourcesTemplatesList,
    ResourcesList,
    ResourcesRead(UriParams),
    ResourcesSubscribe,
    ResourcesUnsubscribe,
}

impl McpRequest {
    /// Decode a method name and its params. Absent or null params are
    /// treated as an empty object.
    pub fn parse(method: &str, params: Option<Value>) -> Result<Self, McpError> {
        let request = match method {
            methods::INITIALIZE => Self::Initialize(decode_params(method, params)?),
            methods::NOTIFICATIONS_INITIALIZED => Self::Initialized,
            methods::NOTIFICATIONS_CANCELLED => Self::Cancelled,
            methods::LOGGING_SET_LEVEL => Self::SetLogLevel,
            methods::PING => Self::Ping,
            methods::TOOLS_LIST => Self::ToolsList,
            methods::TOOLS_CALL => Self::ToolsCall(decode_params(method, params)?),
            methods::PROMPTS_LIST => Self::PromptsList,
            methods::PROMPTS_GET => Self::PromptsGet(decode_params(method, params)?),
            methods::RESOURCES_TEMPLATES_LIST => Self::ResourcesTemplatesList,
            methods::RESOURCES_LIST => Self::ResourcesList,
            methods::RESOURCES_READ => Self::ResourcesRead(decode_params(method, params)?),
            methods::RESOURCES_SUBSCRIBE => Self::ResourcesSubscribe,
            methods::RESOURCES_UNSUBSCRIBE => Self::ResourcesUnsubscribe,
            other => return Err(McpError::MethodNotFound(other.to_string())),
        };
        Ok(request)
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::Initialize(_) => methods::INITIALIZE,
            Self::Initialized => methods::NOTIFICATIONS_INITIALIZED,
            Self::Cancelled => methods::NOTIFICATIONS_CANCELLED,
            Self::SetLogLevel => methods::LOGGING_SET_LEVEL,
            Self::Ping => methods::PING,
            Self::ToolsList => methods::TOOLS_LIST,
            Self::ToolsCall(_) => methods::TOOLS_CALL,
            Self::PromptsList => methods::PROMPTS_LIST,
            Self::PromptsGet(_) => methods::PROMPTS_GET,
            Self::ResourcesTemplatesList => methods::RESOURCES_TEMPLATES_LIST,
            Self::ResourcesList => methods::RESOURCES_LIST,
            Self::ResourcesRead(_) => methods::RESOURCES_READ,
            Self::ResourcesSubscribe => methods::RESOURCES_SUBSCRIBE,
            Self::ResourcesUnsubscribe => methods::RESOURCES_UNSUBSCRIBE,
        }
    }
}

fn decode_params<T: DeserializeOwned + Default>(
    method: &str,
    params: Option<Value>,
) -> Result<T, McpError> {
    match params {
        None | Some(Value::Null) => Ok(T::default()),
        Some(params) => serde_json::from_value(params).map_err(|error| {
            McpError::InvalidParams(format!("failed to decode {method} params: {error}"))
        }),
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────

/// Answers MCP requests from the current workspace contents. Holds no
/// state besides the store; every call re-reads the filesystem.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<WorkspaceStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<WorkspaceStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    pub fn handle(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        self.dispatch(McpRequest::parse(method, params)?)
    }

    pub fn dispatch(&self, request: McpRequest) -> Result<Value, McpError> {
        match request {
            McpRequest::Initialize(params) => self.initialize(params),
            McpRequest::Initialized
            | McpRequest::Cancelled
            | McpRequest::SetLogLevel
            | McpRequest::Ping
            | McpRequest::ResourcesSubscribe
            | McpRequest::ResourcesUnsubscribe => Ok(json!({})),
            McpRequest::ToolsList => Ok(tools_list()),
            McpRequest::ToolsCall(params) => self.tools_call(params),
            McpRequest::PromptsList => self.prompts_list(),
            McpRequest::PromptsGet(params) => self.prompts_get(params),
            McpRequest::ResourcesTemplatesList => Ok(json!({ "resourceTemplates": [] })),
            McpRequest::ResourcesList => self.resources_list(),
            McpRequest::ResourcesRead(params) => self.resources_read(params),
        }
    }

    fn initialize(&self, params: InitializeParams) -> Result<Value, McpError> {
        let rules = RulesSnapshot::load(&self.store)?;
        Ok(json!({
            "protocolVersion": params.protocol_version.as_deref().unwrap_or("unknown"),
            "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
            "capabilities": {
                "prompts": { "listChanged": true },
                "resources": { "listChanged": true },
                "tools": {},
                "logging": {},
            },
            "instructions": rules.initialize_instructions(),
        }))
    }

    fn tools_call(&self, params: NameParams) -> Result<Value, McpError> {
        if params.name() != Some(methods::FOCAL_RULES_TOOL) {
            return Err(McpError::UnknownTool(params.name.as_ref().map(param_text)));
        }
        let rules = RulesSnapshot::load(&self.store)?;
        Ok(json!({
            "content": [{ "type": "text", "text": rules.tool_text() }],
        }))
    }

    fn prompts_list(&self) -> Result<Value, McpError> {
        let mut names: Vec<String> = self
            .store
            .sorted_files()?
            .iter()
            .filter_map(|(rel_path, _)| prompt_name_for_path(rel_path))
            .collect();
        names.sort();
        let prompts: Vec<Value> =
            names.into_iter().map(|name| json!({ "name": name, "description": "" })).collect();
        Ok(json!({ "prompts": prompts }))
    }

    fn prompts_get(&self, params: NameParams) -> Result<Value, McpError> {
        let name = match &params.name {
            None => return Err(McpError::MissingPromptName),
            Some(Value::String(name)) if name.is_empty() => return Err(McpError::MissingPromptName),
            Some(Value::String(name)) => name.clone(),
            Some(other) => return Err(McpError::UnknownPromptName(param_text(other))),
        };
        let rel_path =
            path_for_prompt_name(&name).ok_or_else(|| McpError::UnknownPromptName(name.clone()))?;
        let content = self.store.read_file(&rel_path).map_err(|error| match error {
            WorkspaceError::NotFound(_) => McpError::PromptNotFound(name.clone()),
            other => other.into(),
        })?;
        Ok(json!({
            "description": "",
            "messages": [{ "role": "system", "content": content }],
        }))
    }

    fn resources_list(&self) -> Result<Value, McpError> {
        // Files come back sorted by relative path, which is also URI order.
        let resources: Vec<Value> = self
            .store
            .sorted_files()?
            .into_iter()
            .map(|(rel_path, _)| {
                json!({
                    "uri": resource_uri(&rel_path),
                    "name": rel_path,
                    "mimeType": MARKDOWN_MIME_TYPE,
                })
            })
            .collect();
        Ok(json!({ "resources": resources }))
    }

    fn resources_read(&self, params: UriParams) -> Result<Value, McpError> {
        let Some(uri) = params.uri().map(str::to_string) else {
            return Err(McpError::InvalidResourceUri(params.uri.as_ref().map(param_text)));
        };
        let Some(rel_path) = path_for_resource_uri(&uri) else {
            return Err(McpError::InvalidResourceUri(Some(uri)));
        };
        let text = self.store.read_file(rel_path).map_err(|error| match error {
            WorkspaceError::NotFound(_) => McpError::ResourceNotFound(uri.clone()),
            other => other.into(),
        })?;
        Ok(json!({
            "contents": [{ "uri": uri, "mimeType": MARKDOWN_MIME_TYPE, "text": text }],
        }))
    }
}

fn tools_list() -> Value {
    json!({
        "tools": [{
            "name": methods::FOCAL_RULES_TOOL,
            "description": FOCAL_RULES_DESCRIPTION,
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false,
            },
        }],
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn dispatcher(tmp: &TempDir) -> Dispatcher {
        let store = WorkspaceStore::new(tmp.path().join("ws"));
        store.ensure().unwrap();
        Dispatcher::new(Arc::new(store))
    }

    // ── parsing ────────────────────────────────────────────────────

    #[test]
    fn parse_treats_missing_and_null_params_as_empty() {
        assert_eq!(
            McpRequest::parse("prompts/get", None).unwrap(),
            McpRequest::PromptsGet(NameParams::default())
        );
        assert_eq!(
            McpRequest::parse("initialize", Some(Value::Null)).unwrap(),
            McpRequest::Initialize(InitializeParams::default())
        );
    }

    #[test]
    fn parse_rejects_non_object_params() {
        let error = McpRequest::parse("tools/call", Some(json!(["focal_rules"]))).unwrap_err();
        assert!(matches!(error, McpError::InvalidParams(_)));
        assert_eq!(error.code(), INVALID_PARAMS);
        assert!(error.to_rpc_error().data.is_some());
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert!(matches!(McpRequest::parse("Ping", None), Err(McpError::MethodNotFound(_))));
    }

    #[test]
    fn every_registered_method_parses_and_round_trips_its_name() {
        for method in methods::IMPLEMENTED_METHODS {
            let request = McpRequest::parse(method, None).unwrap();
            assert_eq!(request.method(), *method);
        }
    }

    // ── error mapping ──────────────────────────────────────────────

    #[test]
    fn error_codes_follow_jsonrpc_conventions() {
        assert_eq!(McpError::MethodNotFound("x".into()).code(), METHOD_NOT_FOUND);
        assert_eq!(McpError::UnknownTool(None).code(), INVALID_PARAMS);
        assert_eq!(McpError::PathTraversal("..".into()).code(), INVALID_PARAMS);
        assert_eq!(McpError::TaskFailed("panic".into()).code(), INTERNAL_ERROR);

        let io = WorkspaceError::io(
            "failed to read file",
            "/tmp/x",
            std::io::Error::other("disk on fire"),
        );
        let rpc = McpError::from(io).to_rpc_error();
        assert_eq!(rpc.code, INTERNAL_ERROR);
        assert_eq!(rpc.message, "Internal error");
        assert!(rpc.data.is_none());
    }

    // ── no-op methods ──────────────────────────────────────────────

    #[test]
    fn no_op_methods_return_empty_object() {
        let tmp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp);
        for method in [
            "notifications/initialized",
            "notifications/cancelled",
            "logging/setLevel",
            "resources/subscribe",
            "resources/unsubscribe",
            "ping",
        ] {
            assert_eq!(dispatcher.handle(method, Some(json!({"level": "debug"}))).unwrap(), json!({}));
        }
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let tmp = TempDir::new().unwrap();
        let error = dispatcher(&tmp).handle("tools/execute", None).unwrap_err();
        assert_eq!(error.to_rpc_error(), RpcError::new(METHOD_NOT_FOUND, "Method not found"));
    }

    // ── initialize ─────────────────────────────────────────────────

    #[test]
    fn initialize_echoes_protocol_version_and_reports_capabilities() {
        let tmp = TempDir::new().unwrap();
        let result = dispatcher(&tmp)
            .handle("initialize", Some(json!({"protocolVersion": "2025-03-26"})))
            .unwrap();

        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"], json!({"name": "FOCAL MCP", "version": SERVER_VERSION}));
        assert_eq!(result["capabilities"]["prompts"]["listChanged"], true);
        assert_eq!(result["capabilities"]["resources"]["listChanged"], true);

        let instructions = result["instructions"].as_str().unwrap();
        assert!(instructions.starts_with("# Runtime Directive\n"));
        assert!(instructions.contains("# FOCAL MCP Rules (hash="));
        assert!(instructions.contains("## System (core/system.md)\n# System"));
    }

    #[test]
    fn initialize_without_version_reports_unknown() {
        let tmp = TempDir::new().unwrap();
        let result = dispatcher(&tmp).handle("initialize", None).unwrap();
        assert_eq!(result["protocolVersion"], "unknown");
    }

    // ── tools ──────────────────────────────────────────────────────

    #[test]
    fn tools_list_describes_focal_rules() {
        let tmp = TempDir::new().unwrap();
        let result = dispatcher(&tmp).handle("tools/list", None).unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "focal_rules");
        assert_eq!(tools[0]["inputSchema"]["additionalProperties"], false);
    }

    #[test]
    fn tools_call_focal_rules_returns_header_and_instructions() {
        let tmp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp);
        let result = dispatcher.handle("tools/call", Some(json!({"name": "focal_rules"}))).unwrap();

        let content = result["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "text");
        let text = content[0]["text"].as_str().unwrap();
        let hash = dispatcher.store().fingerprint().unwrap().hash;
        assert!(text.starts_with(&format!("# FOCAL MCP Rules (hash={hash} updated=")));
        assert!(text.contains("\n\n## System (core/system.md)\n"));
    }

    #[test]
    fn tools_call_with_other_name_is_unknown_tool() {
        let tmp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp);
        let cases = [
            json!({"name": "bogus"}),
            json!({}),
            json!({"name": 42}),
            json!({"name": ["focal_rules"]}),
        ];
        for params in cases {
            let error = dispatcher.handle("tools/call", Some(params)).unwrap_err();
            assert_eq!(error.to_rpc_error(), RpcError::new(INVALID_PARAMS, "Unknown tool"));
        }
    }

    // ── prompts ────────────────────────────────────────────────────

    #[test]
    fn prompts_list_on_fresh_workspace_has_four_core_prompts() {
        let tmp = TempDir::new().unwrap();
        let result = dispatcher(&tmp).handle("prompts/list", None).unwrap();
        assert_eq!(
            result,
            json!({"prompts": [
                {"name": "core.safety", "description": ""},
                {"name": "core.style", "description": ""},
                {"name": "core.system", "description": ""},
                {"name": "core.tool_policy", "description": ""},
            ]})
        );
    }

    #[test]
    fn prompts_list_skips_files_outside_prompt_dirs() {
        let tmp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp);
        let root = dispatcher.store().root().to_path_buf();
        fs::write(root.join("README.md"), "notes").unwrap();
        fs::create_dir_all(root.join("agents/team")).unwrap();
        fs::write(root.join("agents/team/lead.md"), "lead").unwrap();

        let result = dispatcher.handle("prompts/list", None).unwrap();
        let names: Vec<&str> =
            result["prompts"].as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
        assert_eq!(names[0], "agents.team.lead");
        assert!(!names.iter().any(|name| name.contains("README")));
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn prompts_get_returns_system_message() {
        let tmp = TempDir::new().unwrap();
        let result =
            dispatcher(&tmp).handle("prompts/get", Some(json!({"name": "core.style"}))).unwrap();
        assert_eq!(
            result,
            json!({
                "description": "",
                "messages": [{"role": "system", "content": "# Style\n\nFOCAL MCP style guide.\n"}],
            })
        );
    }

    #[test]
    fn prompts_get_error_cases() {
        let tmp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp);

        let cases = [
            (json!({}), "Missing prompt name"),
            (json!({"name": ""}), "Missing prompt name"),
            (json!({"name": "docs.readme"}), "Unknown prompt name"),
            (json!({"name": 7}), "Unknown prompt name"),
            (json!({"name": "agents.ghost"}), "Prompt not found"),
        ];
        for (params, message) in cases {
            let error = dispatcher.handle("prompts/get", Some(params)).unwrap_err();
            assert_eq!(error.to_rpc_error(), RpcError::new(INVALID_PARAMS, message));
        }
    }

    // ── resources ──────────────────────────────────────────────────

    #[test]
    fn resources_list_includes_every_file_sorted_by_uri() {
        let tmp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp);
        fs::write(dispatcher.store().root().join("notes.txt"), "n").unwrap();

        let result = dispatcher.handle("resources/list", None).unwrap();
        let uris: Vec<&str> = result["resources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["uri"].as_str().unwrap())
            .collect();
        assert_eq!(
            uris,
            vec![
                "focal:///core/safety.md",
                "focal:///core/style.md",
                "focal:///core/system.md",
                "focal:///core/tool_policy.md",
                "focal:///notes.txt",
            ]
        );
        assert_eq!(result["resources"][4]["name"], "notes.txt");
        assert_eq!(result["resources"][4]["mimeType"], "text/markdown");
    }

    #[test]
    fn resources_read_returns_content() {
        let tmp = TempDir::new().unwrap();
        let result = dispatcher(&tmp)
            .handle("resources/read", Some(json!({"uri": "focal:///core/safety.md"})))
            .unwrap();
        assert_eq!(
            result["contents"][0],
            json!({
                "uri": "focal:///core/safety.md",
                "mimeType": "text/markdown",
                "text": "# Safety\n\nFOCAL MCP safety rules.\n",
            })
        );
    }

    #[test]
    fn resources_read_error_cases() {
        let tmp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp);

        let cases = [
            (json!({}), "Invalid resource URI"),
            (json!({"uri": "file:///etc/passwd"}), "Invalid resource URI"),
            (json!({"uri": 42}), "Invalid resource URI"),
            (json!({"uri": {"path": "focal:///core/system.md"}}), "Invalid resource URI"),
            (json!({"uri": "focal:///does/not/exist.md"}), "Resource not found"),
            (json!({"uri": "focal:///../../etc/passwd"}), "Path traversal blocked"),
        ];
        for (params, message) in cases {
            let error = dispatcher.handle("resources/read", Some(params)).unwrap_err();
            assert_eq!(error.to_rpc_error(), RpcError::new(INVALID_PARAMS, message));
        }
    }

    #[test]
    fn resource_templates_are_always_empty() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            dispatcher(&tmp).handle("resources/templates/list", None).unwrap(),
            json!({"resourceTemplates": []})
        );
    }
}
