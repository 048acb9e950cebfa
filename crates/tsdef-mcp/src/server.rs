use crate::protocol::{JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND, PARSE_ERROR};
use crate::tools;
use serde_json::{Value, json};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{debug, error, info};
use tsdef_core::config::Config;
use tsdef_core::constants;
use tsdef_core::resolver::ResolverBackend;
use tsdef_query::{SnippetExtractor, backend_from_config};

mod tool_calls;

pub use tool_calls::ToolCallError;

/// Everything a request handler needs; shared by both transports.
pub struct ServerContext {
    pub config: Config,
    pub backend: Arc<dyn ResolverBackend>,
    pub extractor: SnippetExtractor,
}

impl ServerContext {
    pub fn new(config: Config, backend: Arc<dyn ResolverBackend>, extractor: SnippetExtractor) -> Self {
        Self {
            config,
            backend,
            extractor,
        }
    }

    pub fn from_config(config: Config) -> Self {
        let backend = backend_from_config(&config.resolver);
        let extractor = SnippetExtractor::from_config(&config.snippet);
        Self::new(config, backend, extractor)
    }
}

/// Run the MCP server loop on stdin/stdout.
pub fn run_stdio(context: &ServerContext) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    info!(backend = context.backend.name(), "MCP server running on stdio");
    serve_lines(context, stdin.lock(), stdout.lock())?;
    info!("stdin closed, MCP server stopping");
    Ok(())
}

/// Newline-delimited JSON-RPC: one request per line, one response per line.
pub fn serve_lines<R: BufRead, W: Write>(
    context: &ServerContext,
    reader: R,
    mut writer: W,
) -> io::Result<()> {
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("stdin read error: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => handle_request(context, &request),
            Err(e) => Some(JsonRpcResponse::error(
                None,
                PARSE_ERROR,
                format!("Parse error: {}", e),
            )),
        };

        if let Some(response) = response {
            writeln!(writer, "{}", serde_json::to_string(&response)?)?;
            writer.flush()?;
        }
    }
    Ok(())
}

/// Dispatch one request. Notifications produce no response.
pub fn handle_request(context: &ServerContext, request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
    debug!(method = %request.method, "request received");
    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            request.id.clone(),
            json!({
                "protocolVersion": constants::MCP_PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": constants::SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        ),
        "notifications/initialized" | "notifications/cancelled" => return None,
        "ping" => JsonRpcResponse::success(request.id.clone(), json!({})),
        "tools/list" => {
            let tools = tools::list_tools();
            JsonRpcResponse::success(request.id.clone(), json!({ "tools": tools }))
        }
        "tools/call" => {
            let tool_name = request
                .params
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let arguments = request.params.get("arguments").filter(|v| !v.is_null());

            tool_calls::handle_tool_call(tool_calls::ToolCallParams {
                id: request.id.clone(),
                tool_name,
                arguments,
                context,
            })
        }
        _ if request.is_notification() => return None,
        _ => JsonRpcResponse::error(
            request.id.clone(),
            METHOD_NOT_FOUND,
            format!("Method not found: {}", request.method),
        ),
    };
    Some(response)
}

fn tool_text_response(id: Option<Value>, text: String) -> JsonRpcResponse {
    JsonRpcResponse::success(
        id,
        json!({
            "content": [{"type": "text", "text": text}]
        }),
    )
}

fn tool_error_response(id: Option<Value>, message: String) -> JsonRpcResponse {
    JsonRpcResponse::success(
        id,
        json!({
            "content": [{"type": "text", "text": format!("Error: {}", message)}],
            "isError": true
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tsdef_core::types::DefinitionResult;

    pub(super) fn context() -> ServerContext {
        ServerContext::from_config(Config::default())
    }

    pub(super) fn make_request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(json!(1)),
            method: method.into(),
            params,
        }
    }

    fn fixture(rel: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../testdata/fixtures/ts-sample")
            .join(rel)
    }

    fn text_of(response: &JsonRpcResponse) -> String {
        let result = response.result.as_ref().expect("result should be present");
        result["content"][0]["text"]
            .as_str()
            .expect("text content")
            .to_string()
    }

    #[test]
    fn initialize_reports_server_info() {
        let resp = handle_request(&context(), &make_request("initialize", json!({}))).unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "typescript-definition-finder");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[test]
    fn notifications_get_no_response() {
        let ctx = context();
        let mut req = make_request("notifications/initialized", json!({}));
        req.id = None;
        assert!(handle_request(&ctx, &req).is_none());
        req.method = "notifications/whatever".into();
        assert!(handle_request(&ctx, &req).is_none());
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let resp = handle_request(&context(), &make_request("resources/list", json!({}))).unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "Method not found: resources/list");
    }

    #[test]
    fn tools_list_exposes_the_definition_tool() {
        let resp = handle_request(&context(), &make_request("tools/list", json!({}))).unwrap();
        let result = resp.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        let tool = &tools[0];
        assert_eq!(tool["name"], "find_typescript_definition");
        assert!(tool["description"].as_str().unwrap().contains("/ts-def"));
        let schema = &tool["inputSchema"];
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["file_path", "line_content"]));
        for key in ["file_path", "line_content", "symbol", "column_number"] {
            assert!(schema["properties"].get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn tools_call_returns_pretty_json_results() {
        let file = fixture("src/indent.ts");
        let resp = handle_request(
            &context(),
            &make_request(
                "tools/call",
                json!({
                    "name": "find_typescript_definition",
                    "arguments": {
                        "file_path": file.to_string_lossy(),
                        "line_content": "function getIndentation(line: string): number {",
                        "symbol": "getIndentation"
                    }
                }),
            ),
        )
        .unwrap();
        assert!(resp.error.is_none());
        let result = resp.result.as_ref().unwrap();
        assert!(result.get("isError").is_none());

        let text = text_of(&resp);
        assert!(text.starts_with("[\n  {"));
        let parsed: Vec<DefinitionResult> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0].location, "Line 4, Column 10");
        assert_eq!(parsed[0].file, file.display().to_string());
        let raw: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw[0]["type"], "Definition");
        assert!(raw[0]["codeSnippet"].as_str().unwrap().contains("getIndentation"));
    }

    #[test]
    fn stdio_loop_answers_each_line_and_reports_parse_errors() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            "not json\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let mut out = Vec::new();
        serve_lines(&context(), input.as_bytes(), &mut out).unwrap();

        let lines: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[0]["result"], json!({}));
        assert_eq!(lines[1]["error"]["code"], -32700);
        assert!(lines[1]["id"].is_null());
        assert_eq!(lines[2]["id"], 2);
        assert!(lines[2]["result"]["tools"].is_array());
    }
}
