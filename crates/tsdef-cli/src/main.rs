mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::find::FindArgs;
use commands::serve_mcp::Transport;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tsdef_core::config::Config;

#[derive(Parser, Debug)]
#[command(name = "tsdef", version, about = "Find TypeScript definitions for AI agents over MCP")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Extra config file layered over the global and project config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory whose `.tsdef.toml` is loaded
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server (stdio unless --sse is given)
    Serve {
        #[arg(long, conflicts_with = "sse")]
        stdio: bool,

        /// Serve over HTTP with server-sent events
        #[arg(long)]
        sse: bool,

        #[arg(long)]
        port: Option<u16>,

        /// Bind address for --sse
        #[arg(long)]
        bind: Option<String>,
    },
    /// Resolve one symbol and print the results
    Find {
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        line_content: String,

        #[arg(long, required_unless_present = "column")]
        symbol: Option<String>,

        /// 1-based column in --line-content
        #[arg(long)]
        column: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = Config::load_with_file(Some(&cli.workspace), cli.config.as_deref())
        .context("Failed to load configuration")?;
    init_logging(&config.logging.level);

    match cli.command {
        None => commands::serve_mcp::run(config, Transport::Stdio).await,
        Some(Commands::Serve {
            sse, port, bind, ..
        }) => {
            if let Some(port) = port {
                config.transport.port = port;
            }
            if let Some(bind) = bind {
                config.transport.bind_addr = bind;
            }
            let transport = if sse { Transport::Sse } else { Transport::Stdio };
            commands::serve_mcp::run(config, transport).await
        }
        Some(Commands::Find {
            file,
            line_content,
            symbol,
            column,
        }) => {
            let args = FindArgs {
                file,
                line_content,
                symbol,
                column,
            };
            commands::find::run(&config, args, &mut std::io::stdout().lock())
        }
    }
}

/// Logs always go to stderr; stdout carries the protocol.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_serves_stdio() {
        let cli = Cli::try_parse_from(["tsdef"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.workspace, PathBuf::from("."));
    }

    #[test]
    fn serve_flags_parse() {
        let cli = Cli::try_parse_from(["tsdef", "serve", "--sse", "--port", "4000", "--bind", "0.0.0.0"])
            .unwrap();
        match cli.command {
            Some(Commands::Serve {
                sse, port, bind, stdio,
            }) => {
                assert!(sse);
                assert!(!stdio);
                assert_eq!(port, Some(4000));
                assert_eq!(bind.as_deref(), Some("0.0.0.0"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from(["tsdef", "serve", "--sse", "--stdio"]).is_err());
    }

    #[test]
    fn find_requires_a_locator() {
        assert!(
            Cli::try_parse_from(["tsdef", "find", "--file", "a.ts", "--line-content", "x"]).is_err()
        );
        let cli = Cli::try_parse_from([
            "tsdef", "find", "--file", "a.ts", "--line-content", "const a = 1;", "--column", "7",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Find { column: Some(7), symbol: None, .. })
        ));
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["tsdef", "serve", "--config", "/tmp/t.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.toml")));
    }
}
