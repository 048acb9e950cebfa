use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 1-based line/column inside a source file.
///
/// Columns count characters, not bytes, so a position computed from a line
/// of text can be handed back to the same line without re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}, Column {}", self.line, self.column)
    }
}

/// How the caller points at the symbol inside `line_content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolLocator {
    /// First occurrence of this text in the line.
    Name(String),
    /// Explicit 1-based column.
    Column(u32),
}

/// One "go to definition" request as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolQuery {
    pub file_path: PathBuf,
    pub line_content: Option<String>,
    pub locator: SymbolLocator,
}

impl SymbolQuery {
    pub fn by_name(
        file_path: impl Into<PathBuf>,
        line_content: Option<&str>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            line_content: line_content.map(String::from),
            locator: SymbolLocator::Name(symbol.into()),
        }
    }

    pub fn by_column(
        file_path: impl Into<PathBuf>,
        line_content: Option<&str>,
        column: u32,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            line_content: line_content.map(String::from),
            locator: SymbolLocator::Column(column),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefinitionKind {
    Definition,
    TypeDefinition,
}

impl DefinitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::Definition => "Definition",
            DefinitionKind::TypeDefinition => "TypeDefinition",
        }
    }
}

/// Byte range reported by a resolver. `end` is optional because several
/// resolvers only know where a declaration starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextSpan {
    pub start: usize,
    pub end: Option<usize>,
}

impl TextSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn at(start: usize) -> Self {
        Self { start, end: None }
    }

    /// End offset, falling back to the start when unknown.
    pub fn end_or_start(&self) -> usize {
        self.end.unwrap_or(self.start).max(self.start)
    }
}

/// A location a resolver believes declares the queried symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionCandidate {
    pub file: PathBuf,
    pub kind: DefinitionKind,
    /// Usually just the declared name token.
    pub span: TextSpan,
    /// Full declaration span, when the resolver knows it.
    pub enclosing: Option<TextSpan>,
}

impl DefinitionCandidate {
    pub fn new(file: impl Into<PathBuf>, kind: DefinitionKind, span: TextSpan) -> Self {
        Self {
            file: file.into(),
            kind,
            span,
            enclosing: None,
        }
    }

    pub fn with_enclosing(mut self, enclosing: TextSpan) -> Self {
        self.enclosing = Some(enclosing);
        self
    }
}

/// Record returned to the agent for every readable candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionResult {
    pub file: String,
    #[serde(rename = "type")]
    pub kind: DefinitionKind,
    pub location: String,
    #[serde(rename = "codeSnippet")]
    pub code_snippet: String,
}

/// Quick-info for a position: kind, rendered type and documentation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HoverInfo {
    pub kind: String,
    #[serde(rename = "type")]
    pub type_text: String,
    pub doc: String,
}

impl HoverInfo {
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty() && self.type_text.is_empty() && self.doc.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_result_serializes_with_wire_keys_in_order() {
        let result = DefinitionResult {
            file: "/tmp/a.ts".into(),
            kind: DefinitionKind::TypeDefinition,
            location: "Line 3, Column 7".into(),
            code_snippet: "   3 > type A = string;\n".into(),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"file":"/tmp/a.ts","type":"TypeDefinition","location":"Line 3, Column 7","codeSnippet":"   3 > type A = string;\n"}"#
        );
    }

    #[test]
    fn position_display_matches_location_format() {
        assert_eq!(SourcePosition::new(12, 4).to_string(), "Line 12, Column 4");
    }

    #[test]
    fn span_end_never_precedes_start() {
        assert_eq!(TextSpan::at(10).end_or_start(), 10);
        assert_eq!(TextSpan::new(10, 4).end_or_start(), 10);
        assert_eq!(TextSpan::new(10, 14).end_or_start(), 14);
    }
}
