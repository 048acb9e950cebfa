use crate::framing::{read_message, write_message};
use lsp_types::notification::Notification;
use lsp_types::request::Request;
use lsp_types::{
    ClientCapabilities, ClientInfo, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    GotoCapability, HoverClientCapabilities, InitializeParams, InitializedParams, MarkupKind,
    TextDocumentClientCapabilities, TextDocumentIdentifier, TextDocumentItem, Url, WorkspaceFolder,
};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, trace, warn};
use tsdef_core::constants::SERVER_NAME;
use tsdef_core::error::ResolverError;
use tsdef_core::text::read_source;

type Reader = Box<dyn BufRead + Send>;
type Writer = Box<dyn Write + Send>;

/// Synchronous client for one language server process.
pub struct LspClient {
    reader: Reader,
    writer: Writer,
    child: Option<Child>,
    root: PathBuf,
    next_id: i64,
    open: HashSet<Url>,
    closed: bool,
}

impl LspClient {
    /// Spawn `command` rooted at `root` and complete the `initialize`
    /// handshake.
    pub fn spawn(command: &[String], root: &Path) -> Result<Self, ResolverError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ResolverError::Session("empty language server command".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ResolverError::Spawn {
                command: command.join(" "),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ResolverError::Session("language server stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ResolverError::Session("language server stdout unavailable".into()))?;

        debug!(command = %command.join(" "), root = %root.display(), "spawned language server");
        let mut client = Self::from_parts(
            Box::new(BufReader::new(stdout)),
            Box::new(stdin),
            Some(child),
            root,
        );
        client.initialize()?;
        Ok(client)
    }

    /// Wrap an already connected transport. No handshake is performed.
    pub fn from_parts(reader: Reader, writer: Writer, child: Option<Child>, root: &Path) -> Self {
        Self {
            reader,
            writer,
            child,
            root: root.to_path_buf(),
            next_id: 1,
            open: HashSet::new(),
            closed: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn initialize(&mut self) -> Result<(), ResolverError> {
        let root_uri = file_url(&self.root)?;
        let name = self
            .root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("workspace")
            .to_string();

        let goto = GotoCapability {
            dynamic_registration: Some(false),
            link_support: Some(true),
        };
        let params = InitializeParams {
            process_id: Some(std::process::id()),
            root_uri: Some(root_uri.clone()),
            workspace_folders: Some(vec![WorkspaceFolder {
                uri: root_uri,
                name,
            }]),
            client_info: Some(ClientInfo {
                name: SERVER_NAME.to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ClientCapabilities {
                text_document: Some(TextDocumentClientCapabilities {
                    definition: Some(goto.clone()),
                    type_definition: Some(goto),
                    hover: Some(HoverClientCapabilities {
                        dynamic_registration: Some(false),
                        content_format: Some(vec![MarkupKind::Markdown, MarkupKind::PlainText]),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = self.request::<lsp_types::request::Initialize>(params)?;
        trace!(server = ?result.server_info, "language server initialized");
        self.notify::<lsp_types::notification::Initialized>(InitializedParams {})
    }

    /// Send a request and block until its response arrives. Requests the
    /// server sends in the meantime are answered with empty results.
    pub fn request<R: Request>(&mut self, params: R::Params) -> Result<R::Result, ResolverError> {
        let id = self.next_id;
        self.next_id += 1;

        let params = serde_json::to_value(params)
            .map_err(|e| ResolverError::protocol(format!("encode {}: {e}", R::METHOD)))?;
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": R::METHOD,
            "params": params,
        }))?;

        loop {
            let message = read_message(&mut self.reader)?.ok_or_else(|| {
                ResolverError::protocol(format!("server closed the stream awaiting {}", R::METHOD))
            })?;

            let method = message.get("method").and_then(Value::as_str);
            match (method, message.get("id")) {
                (Some(method), Some(server_id)) => {
                    let reply = server_request_reply(method, message.get("params"));
                    let server_id = server_id.clone();
                    self.send(&json!({"jsonrpc": "2.0", "id": server_id, "result": reply}))?;
                }
                (Some(method), None) => trace!(method, "server notification"),
                (None, Some(reply_id)) if reply_id.as_i64() == Some(id) => {
                    if let Some(error) = message.get("error") {
                        return Err(ResolverError::Server {
                            code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                            message: error
                                .get("message")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                        });
                    }
                    let result = message.get("result").cloned().unwrap_or(Value::Null);
                    return serde_json::from_value(result).map_err(|e| {
                        ResolverError::protocol(format!("decode {} result: {e}", R::METHOD))
                    });
                }
                (None, other) => trace!(id = ?other, "ignoring stale response"),
            }
        }
    }

    pub fn notify<N: Notification>(&mut self, params: N::Params) -> Result<(), ResolverError> {
        let params = serde_json::to_value(params)
            .map_err(|e| ResolverError::protocol(format!("encode {}: {e}", N::METHOD)))?;
        self.send(&json!({"jsonrpc": "2.0", "method": N::METHOD, "params": params}))
    }

    /// Open `path` with its current contents, re-opening it if the server
    /// already has a copy. Returns the document URI and text.
    pub fn sync_document(&mut self, path: &Path) -> Result<(Url, String), ResolverError> {
        let text = read_source(path).map_err(|e| ResolverError::read(path, e))?;
        let uri = file_url(path)?;

        if self.open.contains(&uri) {
            self.close_document(&uri)?;
        }
        self.notify::<lsp_types::notification::DidOpenTextDocument>(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri.clone(),
                language_id: language_id(path).to_string(),
                version: 1,
                text: text.clone(),
            },
        })?;
        self.open.insert(uri.clone());
        Ok((uri, text))
    }

    pub fn close_document(&mut self, uri: &Url) -> Result<(), ResolverError> {
        if !self.open.remove(uri) {
            return Ok(());
        }
        self.notify::<lsp_types::notification::DidCloseTextDocument>(DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
        })
    }

    pub fn close_all(&mut self) {
        let open: Vec<Url> = self.open.iter().cloned().collect();
        for uri in open {
            if let Err(e) = self.close_document(&uri) {
                debug!(%uri, error = %e, "failed to close document");
            }
        }
    }

    /// `shutdown` + `exit`, then reap the process. Idempotent.
    pub fn terminate(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.request::<lsp_types::request::Shutdown>(()) {
            debug!(error = %e, "language server shutdown request failed");
        }
        if let Err(e) = self.notify::<lsp_types::notification::Exit>(()) {
            debug!(error = %e, "language server exit notification failed");
        }

        let Some(mut child) = self.child.take() else {
            return;
        };
        for _ in 0..20 {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(%status, "language server exited");
                    return;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                Err(_) => break,
            }
        }
        warn!("language server did not exit, killing it");
        let _ = child.kill();
        let _ = child.wait();
    }

    fn send(&mut self, message: &Value) -> Result<(), ResolverError> {
        write_message(&mut self.writer, message)?;
        Ok(())
    }
}

impl Drop for LspClient {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Reply to a server-initiated request. `workspace/configuration` expects
/// one entry per requested item.
fn server_request_reply(method: &str, params: Option<&Value>) -> Value {
    match method {
        "workspace/configuration" => {
            let items = params
                .and_then(|p| p.get("items"))
                .and_then(Value::as_array)
                .map(|items| items.len())
                .unwrap_or(0);
            Value::Array(vec![Value::Null; items])
        }
        _ => Value::Null,
    }
}

pub fn file_url(path: &Path) -> Result<Url, ResolverError> {
    let absolute = std::path::absolute(path)?;
    Url::from_file_path(&absolute)
        .map_err(|_| ResolverError::protocol(format!("cannot build file URI for {}", absolute.display())))
}

fn language_id(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tsx") => "typescriptreact",
        Some("js" | "mjs" | "cjs") => "javascript",
        Some("jsx") => "javascriptreact",
        _ => "typescript",
    }
}
