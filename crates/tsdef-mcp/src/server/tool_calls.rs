use super::*;
use crate::protocol::INTERNAL_ERROR;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use tsdef_core::error::QueryError;
use tsdef_core::types::{DefinitionResult, SymbolQuery};
use tsdef_query::find_definition;

pub(super) struct ToolCallParams<'a> {
    pub id: Option<Value>,
    pub tool_name: &'a str,
    pub arguments: Option<&'a Value>,
    pub context: &'a ServerContext,
}

/// Every way a `tools/call` can fail.
#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing arguments")]
    MissingArguments,

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Debug, Deserialize)]
struct FindDefinitionArgs {
    file_path: String,
    #[serde(default)]
    line_content: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    column_number: Option<u32>,
}

impl FindDefinitionArgs {
    /// `symbol` wins when both locators are present.
    fn into_query(self) -> Result<SymbolQuery, ToolCallError> {
        let line_content = self.line_content.as_deref();
        match (self.symbol, self.column_number) {
            (Some(symbol), _) => Ok(SymbolQuery::by_name(&self.file_path, line_content, symbol)),
            (None, Some(column)) => Ok(SymbolQuery::by_column(&self.file_path, line_content, column)),
            (None, None) => Err(ToolCallError::InvalidArguments(
                "either `symbol` or `column_number` is required".into(),
            )),
        }
    }
}

pub(super) fn handle_tool_call(params: ToolCallParams<'_>) -> JsonRpcResponse {
    let ToolCallParams {
        id,
        tool_name,
        arguments,
        context,
    } = params;

    let outcome = dispatch(context, tool_name, arguments);
    into_response(id, outcome)
}

/// Run the named tool.
pub(super) fn dispatch(
    context: &ServerContext,
    tool_name: &str,
    arguments: Option<&Value>,
) -> Result<Vec<DefinitionResult>, ToolCallError> {
    match tool_name {
        constants::TOOL_FIND_DEFINITION => {
            let arguments = arguments.ok_or(ToolCallError::MissingArguments)?;
            let args: FindDefinitionArgs = serde_json::from_value(arguments.clone())
                .map_err(|e| ToolCallError::InvalidArguments(e.to_string()))?;
            let query = args.into_query()?;
            Ok(find_definition(&query, context.backend.as_ref(), &context.extractor)?)
        }
        other => Err(ToolCallError::UnknownTool(other.to_string())),
    }
}

/// Unknown tools are protocol errors; everything else is reported inside a
/// successful response with `isError` set.
pub(super) fn into_response(
    id: Option<Value>,
    outcome: Result<Vec<DefinitionResult>, ToolCallError>,
) -> JsonRpcResponse {
    match outcome {
        Ok(results) => match serde_json::to_string_pretty(&results) {
            Ok(text) => tool_text_response(id, text),
            Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Internal error: {}", e)),
        },
        Err(ToolCallError::UnknownTool(name)) => {
            JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Unknown tool: {}", name))
        }
        Err(e) => {
            warn!(error = %e, "tool call failed");
            tool_error_response(id, e.to_string())
        }
    }
}
