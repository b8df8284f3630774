// focald: FOCAL MCP server entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use focal_server::config::{default_config_path, CliOverrides, FileConfig, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "focald", version, about = "Serve a rules workspace to MCP clients")]
struct Args {
    /// Interface to listen on.
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Workspace root directory.
    #[arg(long, value_name = "PATH")]
    workspace: Option<PathBuf>,

    /// Log filter directive, e.g. `info` or `focal_server=debug`. `RUST_LOG`
    /// takes precedence when set.
    #[arg(long)]
    log_filter: Option<String>,

    /// Config file [default: ~/.focal_mcp/config.toml].
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            host: self.host.clone(),
            port: self.port,
            workspace: self.workspace.clone(),
            log_filter: self.log_filter.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let file_config = match args.config.clone().or_else(default_config_path) {
        Some(path) => FileConfig::load_from(&path)?,
        None => FileConfig::default(),
    };
    let config = ServerConfig::resolve(&args.overrides(), file_config)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .with_context(|| format!("invalid log filter `{}`", config.log_filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(workspace_root = %config.workspace_root.display(), "starting focald");
    focal_server::runtime::run(config).await.context("focald terminated unexpectedly")
}
