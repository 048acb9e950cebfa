use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tsdef_core::config::Config;
use tsdef_mcp::server::{ServerContext, run_stdio};
use tsdef_mcp::sse::run_sse_server;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Sse,
}

/// Serve until the transport ends or Ctrl-C arrives.
pub async fn run(config: Config, transport: Transport) -> Result<()> {
    let context = Arc::new(ServerContext::from_config(config));
    let backend = Arc::clone(&context.backend);

    let served = async {
        match transport {
            Transport::Stdio => {
                let context = Arc::clone(&context);
                tokio::task::spawn_blocking(move || {
                    run_stdio(&context).map_err(|e| anyhow::anyhow!("MCP server error: {}", e))
                })
                .await
                .context("stdio server task failed")?
            }
            Transport::Sse => run_sse_server(Arc::clone(&context))
                .await
                .map_err(|e| anyhow::anyhow!("MCP server error: {}", e)),
        }
    };

    tokio::select! {
        result = served => {
            backend.shutdown();
            result
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("SIGINT received, shutting down");
            backend.shutdown();
            // The stdio reader is parked on a blocking read that cannot be cancelled.
            std::process::exit(0);
        }
    }
}
