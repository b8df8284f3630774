// Server configuration.
//
// Settings resolve in order: command-line flag, environment variable,
// `~/.focal_mcp/config.toml`, built-in default.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8765;
pub const DEFAULT_LOG_FILTER: &str = "info";

pub const ENV_HOST: &str = "FOCAL_MCP_HOST";
pub const ENV_PORT: &str = "FOCAL_MCP_PORT";
pub const ENV_WORKSPACE: &str = "FOCAL_MCP_WORKSPACE";
pub const ENV_LOG_FILTER: &str = "FOCAL_MCP_LOG_FILTER";
pub const ENV_CORS_ORIGINS: &str = "FOCAL_MCP_CORS_ORIGINS";

/// `~/.focal_mcp`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".focal_mcp"))
}

/// `~/.focal_mcp/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    global_dir().map(|dir| dir.join("config.toml"))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid port `{0}`")]
    InvalidPort(String),

    #[error("invalid listen address `{0}`")]
    InvalidListenAddr(String),

    #[error("could not determine home directory for the default workspace")]
    NoHomeDir,
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub workspace: Option<PathBuf>,
    pub log_filter: Option<String>,
    pub cors_origins: Vec<String>,
}

impl FileConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Io { path: path.to_path_buf(), source }),
        };
        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub workspace: Option<PathBuf>,
    pub log_filter: Option<String>,
}

/// Fully resolved settings for one server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub workspace_root: PathBuf,
    pub log_filter: String,
    /// Origins allowed to call the API cross-origin. Empty means same-origin
    /// only; `*` allows any origin.
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn resolve(cli: &CliOverrides, file: FileConfig) -> Result<Self, ConfigError> {
        Self::resolve_with(cli, file, |key| std::env::var(key), dirs::home_dir())
    }

    /// Testable constructor that accepts an environment lookup function and
    /// a home directory.
    fn resolve_with<F>(
        cli: &CliOverrides,
        file: FileConfig,
        env: F,
        home: Option<PathBuf>,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = cli
            .host
            .clone()
            .or_else(|| env(ENV_HOST).ok())
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.into());

        let port = match (cli.port, env(ENV_PORT).ok()) {
            (Some(port), _) => port,
            (None, Some(raw)) => raw.trim().parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            (None, None) => file.port.unwrap_or(DEFAULT_PORT),
        };

        let listen_addr = parse_listen_addr(&host, port)?;

        let workspace_root = match cli
            .workspace
            .clone()
            .or_else(|| env(ENV_WORKSPACE).ok().map(PathBuf::from))
            .or(file.workspace)
        {
            Some(path) => expand_home(&path, home.as_deref()),
            None => home.ok_or(ConfigError::NoHomeDir)?.join(".focal_mcp").join("workspace"),
        };

        let log_filter = cli
            .log_filter
            .clone()
            .or_else(|| env(ENV_LOG_FILTER).ok())
            .or(file.log_filter)
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.into());

        let cors_origins = match env(ENV_CORS_ORIGINS) {
            Ok(raw) => split_origins(&raw),
            Err(_) => file.cors_origins,
        };

        Ok(Self { listen_addr, workspace_root, log_filter, cors_origins })
    }
}

fn parse_listen_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    if host.eq_ignore_ascii_case("localhost") {
        return Ok(SocketAddr::from(([127, 0, 0, 1], port)));
    }
    let candidate = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    candidate.parse().map_err(|_| ConfigError::InvalidListenAddr(candidate))
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|origin| !origin.is_empty()).map(ToOwned::to_owned).collect()
}
