/// Name of the single MCP tool exposed by the server.
pub const TOOL_FIND_DEFINITION: &str = "find_typescript_definition";

/// Server name reported in the MCP `initialize` handshake.
pub const SERVER_NAME: &str = "typescript-definition-finder";

/// MCP protocol revision spoken by both transports.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Project-local config file, looked up in the workspace root.
pub const PROJECT_CONFIG_FILE: &str = ".tsdef.toml";

/// Global config file name under `<config_dir>/tsdef/`.
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Prefix of environment variables that override config values.
pub const ENV_PREFIX: &str = "TSDEF_";

/// Default port of the SSE transport.
pub const DEFAULT_SSE_PORT: u16 = 3012;

/// Default bind address of the SSE transport.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";

/// SSE endpoints.
pub const SSE_PATH: &str = "/sse";
pub const MESSAGES_PATH: &str = "/messages";

/// Files marking a TypeScript project root.
pub const PROJECT_ROOT_MARKERS: &[&str] = &["tsconfig.json", "jsconfig.json", "package.json"];

/// Maximum re-export hops followed when resolving an imported name.
pub const MAX_REEXPORT_DEPTH: usize = 8;
