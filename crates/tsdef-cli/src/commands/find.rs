use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;
use tsdef_core::config::Config;
use tsdef_core::types::SymbolQuery;
use tsdef_query::{SnippetExtractor, backend_from_config, find_definition};

pub struct FindArgs {
    pub file: PathBuf,
    pub line_content: String,
    pub symbol: Option<String>,
    pub column: Option<u32>,
}

/// One-shot query; prints the results as an indented JSON array.
pub fn run(config: &Config, args: FindArgs, out: &mut impl Write) -> Result<()> {
    let file = std::fs::canonicalize(&args.file)
        .with_context(|| format!("Failed to resolve {}", args.file.display()))?;
    let query = match (args.symbol, args.column) {
        (Some(symbol), _) => SymbolQuery::by_name(&file, Some(&args.line_content), symbol),
        (None, Some(column)) => SymbolQuery::by_column(&file, Some(&args.line_content), column),
        (None, None) => anyhow::bail!("either --symbol or --column is required"),
    };
    debug!(?query, "running one-shot query");

    let backend = backend_from_config(&config.resolver);
    let extractor = SnippetExtractor::from_config(&config.snippet);
    let results = find_definition(&query, backend.as_ref(), &extractor);
    backend.shutdown();

    let results = results?;
    writeln!(out, "{}", serde_json::to_string_pretty(&results)?)?;
    Ok(())
}
