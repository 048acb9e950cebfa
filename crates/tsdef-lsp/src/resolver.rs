use crate::client::LspClient;
use lsp_types::request::{GotoDefinition, GotoTypeDefinition, HoverRequest};
use lsp_types::{
    GotoDefinitionParams, GotoDefinitionResponse, Hover, HoverContents, HoverParams, Location,
    LocationLink, MarkedString, Position, Range, TextDocumentIdentifier, TextDocumentPositionParams,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use tsdef_core::config::{ResolverConfig, SessionPolicy};
use tsdef_core::constants::PROJECT_ROOT_MARKERS;
use tsdef_core::error::ResolverError;
use tsdef_core::resolver::{ResolverBackend, SymbolResolver};
use tsdef_core::text::{LineIndex, read_source};
use tsdef_core::types::{DefinitionCandidate, DefinitionKind, HoverInfo, SourcePosition, TextSpan};

type SharedClient = Arc<Mutex<LspClient>>;

/// Resolver that delegates to an external language server.
pub struct LanguageServerBackend {
    command: Vec<String>,
    policy: SessionPolicy,
    pool: Mutex<HashMap<PathBuf, SharedClient>>,
}

impl LanguageServerBackend {
    pub fn new(command: Vec<String>, policy: SessionPolicy) -> Self {
        Self {
            command,
            policy,
            pool: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.server_command.clone(), config.session)
    }

    fn pooled_client(&self, root: &Path) -> Result<SharedClient, ResolverError> {
        let mut pool = self
            .pool
            .lock()
            .map_err(|_| ResolverError::Session("session pool lock poisoned".into()))?;
        if let Some(client) = pool.get(root) {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(Mutex::new(LspClient::spawn(&self.command, root)?));
        info!(root = %root.display(), "pooled language server started");
        pool.insert(root.to_path_buf(), Arc::clone(&client));
        Ok(client)
    }
}

impl ResolverBackend for LanguageServerBackend {
    fn name(&self) -> &'static str {
        "language_server"
    }

    fn open_session(&self, file: &Path) -> Result<Box<dyn SymbolResolver>, ResolverError> {
        let root = project_root(file);
        let client = match self.policy {
            SessionPolicy::PerQuery => SessionClient::Owned(LspClient::spawn(&self.command, &root)?),
            SessionPolicy::Pooled => SessionClient::Pooled(self.pooled_client(&root)?),
        };
        Ok(Box::new(LanguageServerSession { client }))
    }

    fn shutdown(&self) {
        let Ok(mut pool) = self.pool.lock() else {
            return;
        };
        for (root, client) in pool.drain() {
            debug!(root = %root.display(), "stopping pooled language server");
            if let Ok(mut client) = client.lock() {
                client.terminate();
            }
        }
    }
}

enum SessionClient {
    Owned(LspClient),
    Pooled(SharedClient),
}

/// One query against a language server. Owned clients are shut down when
/// the session drops; pooled ones only close the documents it opened.
pub struct LanguageServerSession {
    client: SessionClient,
}

impl LanguageServerSession {
    fn with_client<T>(
        &mut self,
        f: impl FnOnce(&mut LspClient) -> Result<T, ResolverError>,
    ) -> Result<T, ResolverError> {
        match &mut self.client {
            SessionClient::Owned(client) => f(client),
            SessionClient::Pooled(shared) => {
                let mut client = shared
                    .lock()
                    .map_err(|_| ResolverError::Session("language server lock poisoned".into()))?;
                f(&mut client)
            }
        }
    }

    fn goto(
        &mut self,
        file: &Path,
        position: SourcePosition,
        kind: DefinitionKind,
    ) -> Result<Vec<DefinitionCandidate>, ResolverError> {
        let response = self.with_client(|client| {
            let (uri, text) = client.sync_document(file)?;
            let params = GotoDefinitionParams {
                text_document_position_params: TextDocumentPositionParams {
                    text_document: TextDocumentIdentifier { uri },
                    position: lsp_position(&text, position),
                },
                work_done_progress_params: Default::default(),
                partial_result_params: Default::default(),
            };
            match kind {
                DefinitionKind::Definition => client.request::<GotoDefinition>(params),
                DefinitionKind::TypeDefinition => client.request::<GotoTypeDefinition>(params),
            }
        })?;
        let candidates = response
            .map(|r| candidates_from_response(r, kind))
            .unwrap_or_default();
        debug!(file = %file.display(), %position, kind = kind.as_str(), found = candidates.len(), "language server lookup");
        Ok(candidates)
    }
}

impl SymbolResolver for LanguageServerSession {
    fn definition_at(
        &mut self,
        file: &Path,
        position: SourcePosition,
    ) -> Result<Vec<DefinitionCandidate>, ResolverError> {
        self.goto(file, position, DefinitionKind::Definition)
    }

    fn type_definition_at(
        &mut self,
        file: &Path,
        position: SourcePosition,
    ) -> Result<Vec<DefinitionCandidate>, ResolverError> {
        self.goto(file, position, DefinitionKind::TypeDefinition)
    }

    fn hover_at(
        &mut self,
        file: &Path,
        position: SourcePosition,
    ) -> Result<Option<HoverInfo>, ResolverError> {
        let hover = self.with_client(|client| {
            let (uri, text) = client.sync_document(file)?;
            client.request::<HoverRequest>(HoverParams {
                text_document_position_params: TextDocumentPositionParams {
                    text_document: TextDocumentIdentifier { uri },
                    position: lsp_position(&text, position),
                },
                work_done_progress_params: Default::default(),
            })
        })?;
        Ok(hover.map(hover_info).filter(|h| !h.is_empty()))
    }
}

impl Drop for LanguageServerSession {
    fn drop(&mut self) {
        match &mut self.client {
            SessionClient::Owned(client) => client.terminate(),
            SessionClient::Pooled(shared) => {
                if let Ok(mut client) = shared.lock() {
                    client.close_all();
                }
            }
        }
    }
}

/// Nearest ancestor directory holding a project marker, else the file's
/// own directory.
pub fn project_root(file: &Path) -> PathBuf {
    let absolute = std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
    let start = absolute.parent().unwrap_or(&absolute);
    start
        .ancestors()
        .find(|dir| PROJECT_ROOT_MARKERS.iter().any(|m| dir.join(m).is_file()))
        .unwrap_or(start)
        .to_path_buf()
}

/// 1-based character position to an LSP (0-based, UTF-16) position.
fn lsp_position(text: &str, position: SourcePosition) -> Position {
    let line = position.line.saturating_sub(1) as usize;
    let character = position.column.saturating_sub(1) as usize;
    let utf16 = LineIndex::new(text)
        .utf16_col(line, character)
        .unwrap_or(character as u32);
    Position::new(line as u32, utf16)
}

fn candidates_from_response(response: GotoDefinitionResponse, kind: DefinitionKind) -> Vec<DefinitionCandidate> {
    let links: Vec<LocationLink> = match response {
        GotoDefinitionResponse::Scalar(location) => vec![link_from_location(location)],
        GotoDefinitionResponse::Array(locations) => locations.into_iter().map(link_from_location).collect(),
        GotoDefinitionResponse::Link(links) => links,
    };

    let mut texts: HashMap<PathBuf, Option<String>> = HashMap::new();
    let mut out = Vec::new();
    for link in links {
        let Ok(path) = link.target_uri.to_file_path() else {
            debug!(uri = %link.target_uri, "skipping non-file definition");
            continue;
        };
        let text = texts
            .entry(path.clone())
            .or_insert_with(|| read_source(&path).ok());
        let Some(text) = text.as_deref() else {
            debug!(file = %path.display(), "definition target unreadable");
            continue;
        };
        let index = LineIndex::new(text);
        let Some(span) = span_of(&index, link.target_selection_range) else {
            continue;
        };
        let mut candidate = DefinitionCandidate::new(path, kind, span);
        if link.target_range != link.target_selection_range
            && let Some(enclosing) = span_of(&index, link.target_range)
        {
            candidate = candidate.with_enclosing(enclosing);
        }
        out.push(candidate);
    }
    out
}

fn link_from_location(location: Location) -> LocationLink {
    LocationLink {
        origin_selection_range: None,
        target_uri: location.uri,
        target_range: location.range,
        target_selection_range: location.range,
    }
}

fn span_of(index: &LineIndex, range: Range) -> Option<TextSpan> {
    let start = index.offset_utf16(range.start.line as usize, range.start.character)?;
    let end = index
        .offset_utf16(range.end.line as usize, range.end.character)
        .unwrap_or(start);
    Some(TextSpan::new(start, end))
}

/// Split hover contents into the rendered signature and documentation.
fn hover_info(hover: Hover) -> HoverInfo {
    let (code, prose): (Vec<String>, Vec<String>) = match hover.contents {
        HoverContents::Scalar(marked) => split_marked(vec![marked]),
        HoverContents::Array(marked) => split_marked(marked),
        HoverContents::Markup(markup) => split_markdown(&markup.value),
    };
    let type_text = code.join("\n");
    HoverInfo {
        kind: hover_kind(&type_text),
        type_text,
        doc: prose.join("\n").trim().to_string(),
    }
}

fn split_marked(marked: Vec<MarkedString>) -> (Vec<String>, Vec<String>) {
    let mut code = Vec::new();
    let mut prose = Vec::new();
    for m in marked {
        match m {
            MarkedString::LanguageString(ls) => code.push(ls.value),
            MarkedString::String(s) => {
                let (c, p) = split_markdown(&s);
                code.extend(c);
                prose.extend(p);
            }
        }
    }
    (code, prose)
}

/// Fenced code blocks go to the signature, everything else to the doc.
fn split_markdown(markdown: &str) -> (Vec<String>, Vec<String>) {
    let mut code = Vec::new();
    let mut prose = Vec::new();
    let mut block: Option<Vec<&str>> = None;
    for line in markdown.lines() {
        if line.trim_start().starts_with("```") {
            match block.take() {
                Some(lines) => code.push(lines.join("\n")),
                None => block = Some(Vec::new()),
            }
            continue;
        }
        match block.as_mut() {
            Some(lines) => lines.push(line),
            None => prose.push(line.to_string()),
        }
    }
    if let Some(lines) = block {
        code.push(lines.join("\n"));
    }
    (code, prose)
}

/// `(method) Foo.bar(): void` → `method`, `function foo(): void` → `function`.
fn hover_kind(type_text: &str) -> String {
    let text = type_text.trim_start();
    if let Some(rest) = text.strip_prefix('(')
        && let Some(end) = rest.find(')')
    {
        return rest[..end].to_string();
    }
    text.split_whitespace()
        .next()
        .filter(|word| word.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or_default()
        .to_string()
}
