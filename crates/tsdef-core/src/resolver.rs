use crate::error::ResolverError;
use crate::types::{DefinitionCandidate, HoverInfo, SourcePosition};
use std::path::Path;

/// Semantic lookups at a source position.
///
/// Implementations decide what "definition" means (a language server, a
/// syntax index, a test stub). An empty vector means "nothing found" and is
/// not an error.
pub trait SymbolResolver {
    fn definition_at(
        &mut self,
        file: &Path,
        position: SourcePosition,
    ) -> Result<Vec<DefinitionCandidate>, ResolverError>;

    fn type_definition_at(
        &mut self,
        file: &Path,
        position: SourcePosition,
    ) -> Result<Vec<DefinitionCandidate>, ResolverError>;

    fn hover_at(
        &mut self,
        file: &Path,
        position: SourcePosition,
    ) -> Result<Option<HoverInfo>, ResolverError>;
}

/// Factory of resolver sessions.
///
/// One session is opened per query and dropped when the query ends; any
/// process or cache it owns is released by its `Drop`.
pub trait ResolverBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn open_session(&self, file: &Path) -> Result<Box<dyn SymbolResolver>, ResolverError>;

    /// Release long-lived resources (pooled sessions). Called on shutdown.
    fn shutdown(&self) {}
}
