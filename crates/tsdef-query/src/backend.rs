use std::sync::Arc;
use tracing::info;
use tsdef_core::config::{ResolverBackendKind, ResolverConfig};
use tsdef_core::resolver::ResolverBackend;
use tsdef_indexer::SyntaxBackend;
use tsdef_lsp::LanguageServerBackend;

/// Build the resolver backend selected by `resolver.backend`.
pub fn backend_from_config(config: &ResolverConfig) -> Arc<dyn ResolverBackend> {
    let backend: Arc<dyn ResolverBackend> = match config.backend {
        ResolverBackendKind::Syntax => Arc::new(SyntaxBackend),
        ResolverBackendKind::LanguageServer => Arc::new(LanguageServerBackend::from_config(config)),
    };
    info!(
        backend = backend.name(),
        session = ?config.session,
        "resolver backend selected"
    );
    backend
}
