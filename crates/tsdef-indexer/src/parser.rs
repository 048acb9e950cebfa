use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to load {0} grammar: {1}")]
    Language(&'static str, String),
    #[error("parser returned no tree")]
    NoTree,
}

/// Grammar flavour used for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    /// TSX grammar, also used for plain JavaScript sources.
    Tsx,
}

impl Dialect {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "ts" | "mts" | "cts" => Some(Dialect::TypeScript),
            "tsx" | "js" | "jsx" | "mjs" | "cjs" => Some(Dialect::Tsx),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::TypeScript => "typescript",
            Dialect::Tsx => "tsx",
        }
    }
}

/// `.d.ts`, `.d.mts` and `.d.cts` files only carry declarations.
pub fn is_declaration_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(".d.ts") || n.ends_with(".d.mts") || n.ends_with(".d.cts"))
        .unwrap_or(false)
}

pub fn parse_file(source: &str, dialect: Dialect) -> Result<tree_sitter::Tree, ParseError> {
    let language: tree_sitter::Language = match dialect {
        Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
    };
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| ParseError::Language(dialect.name(), e.to_string()))?;
    parser.parse(source, None).ok_or(ParseError::NoTree)
}
