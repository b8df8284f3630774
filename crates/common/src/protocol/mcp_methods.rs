// MCP method name constants, mirrored in contracts/mcp-methods.json.

// ── Lifecycle ──────────────────────────────────────────────────────
pub const INITIALIZE: &str = "initialize";
pub const NOTIFICATIONS_INITIALIZED: &str = "notifications/initialized";
pub const NOTIFICATIONS_CANCELLED: &str = "notifications/cancelled";
pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
pub const PING: &str = "ping";

// ── Tools ──────────────────────────────────────────────────────────
pub const TOOLS_LIST: &str = "tools/list";
pub const TOOLS_CALL: &str = "tools/call";

// ── Prompts ────────────────────────────────────────────────────────
pub const PROMPTS_LIST: &str = "prompts/list";
pub const PROMPTS_GET: &str = "prompts/get";

// ── Resources ──────────────────────────────────────────────────────
pub const RESOURCES_LIST: &str = "resources/list";
pub const RESOURCES_READ: &str = "resources/read";
pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";

// ── Server → client notifications ──────────────────────────────────
pub const PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";

/// All methods the server dispatches.
pub const IMPLEMENTED_METHODS: &[&str] = &[
    INITIALIZE,
    NOTIFICATIONS_INITIALIZED,
    NOTIFICATIONS_CANCELLED,
    LOGGING_SET_LEVEL,
    PING,
    TOOLS_LIST,
    TOOLS_CALL,
    PROMPTS_LIST,
    PROMPTS_GET,
    RESOURCES_LIST,
    RESOURCES_READ,
    RESOURCES_TEMPLATES_LIST,
    RESOURCES_SUBSCRIBE,
    RESOURCES_UNSUBSCRIBE,
];

/// Notifications pushed after every workspace mutation, in send order.
pub const LIST_CHANGED_NOTIFICATIONS: &[&str] = &[PROMPTS_LIST_CHANGED, RESOURCES_LIST_CHANGED];

/// The single tool the server exposes.
pub const FOCAL_RULES_TOOL: &str = "focal_rules";
