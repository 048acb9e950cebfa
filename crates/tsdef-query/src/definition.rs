use crate::position::resolve_position;
use crate::resolve::resolve_candidates;
use crate::snippet::SnippetExtractor;
use tracing::{info, warn};
use tsdef_core::error::QueryError;
use tsdef_core::resolver::ResolverBackend;
use tsdef_core::types::{DefinitionCandidate, DefinitionResult, SymbolQuery};

/// Run one query end to end: position, resolver session, fallback chain,
/// snippet per candidate.
///
/// Candidates keep the order the resolver returned them in. Candidates whose
/// file can no longer be read are skipped, so an empty list is a valid
/// answer.
pub fn find_definition(
    query: &SymbolQuery,
    backend: &dyn ResolverBackend,
    extractor: &SnippetExtractor,
) -> Result<Vec<DefinitionResult>, QueryError> {
    let position = resolve_position(query)?;

    let candidates = {
        let mut session = backend.open_session(&query.file_path)?;
        resolve_candidates(session.as_mut(), &query.file_path, position)?
    };

    let results = assemble(&candidates, extractor);
    info!(
        file = %query.file_path.display(),
        %position,
        backend = backend.name(),
        candidates = candidates.len(),
        results = results.len(),
        "definition query complete"
    );
    Ok(results)
}

/// Extract every readable candidate, in order.
pub fn assemble(candidates: &[DefinitionCandidate], extractor: &SnippetExtractor) -> Vec<DefinitionResult> {
    candidates
        .iter()
        .filter_map(|candidate| match extractor.extract(candidate) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(file = %candidate.file.display(), error = %e, "skipping unreadable definition");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::tests::StubResolver;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tsdef_core::error::ResolverError;
    use tsdef_core::resolver::SymbolResolver;
    use tsdef_core::types::{DefinitionKind, HoverInfo, TextSpan};
    use tsdef_indexer::SyntaxBackend;

    fn fixture(rel: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../testdata/fixtures/ts-sample")
            .join(rel)
    }

    /// Backend handing out one prepared stub per query.
    struct StubBackend(Mutex<Option<StubResolver>>);

    impl ResolverBackend for StubBackend {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn open_session(&self, _: &Path) -> Result<Box<dyn SymbolResolver>, ResolverError> {
            let stub = self
                .0
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| ResolverError::Session("stub already used".into()))?;
            Ok(Box::new(stub))
        }
    }

    #[test]
    fn scenario_self_defining_function() {
        let file = fixture("src/indent.ts");
        let query = SymbolQuery::by_name(
            &file,
            Some("function getIndentation(line: string): number {"),
            "getIndentation",
        );
        let results = find_definition(&query, &SyntaxBackend, &SnippetExtractor::default()).unwrap();

        assert!(!results.is_empty());
        let first = &results[0];
        assert_eq!(first.file, file.display().to_string());
        assert_eq!(first.kind, DefinitionKind::Definition);
        assert_eq!(first.location, "Line 4, Column 10");
        assert!(first.code_snippet.contains("getIndentation"));
        assert!(first.code_snippet.contains("   4 > function getIndentation"));
        assert!(first.code_snippet.contains("   6 +   return match"));
        assert!(first.code_snippet.contains("   7   }"));
    }

    #[test]
    fn scenario_dependency_outside_project_sources() {
        let file = fixture("src/index.ts");
        let query = SymbolQuery::by_name(
            &file,
            Some("  return formatNumber(circle.area()) + ' / ' + formatNumber(depth + deepest);"),
            "formatNumber",
        );
        let results = find_definition(&query, &SyntaxBackend, &SnippetExtractor::default()).unwrap();

        assert_eq!(results.len(), 1);
        let target = PathBuf::from(&results[0].file);
        assert!(target.exists());
        assert_ne!(target, file);
        assert!(results[0].file.contains("node_modules"));
        assert!(!results[0].code_snippet.is_empty());
        assert!(results[0].code_snippet.contains("export declare function formatNumber"));
    }

    #[test]
    fn imported_local_function_resolves_across_files() {
        let file = fixture("src/index.ts");
        let query = SymbolQuery::by_name(
            &file,
            Some("const depth = getIndentation('    return 1;');"),
            "getIndentation",
        );
        let results = find_definition(&query, &SyntaxBackend, &SnippetExtractor::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].file.ends_with("indent.ts"));
        assert_eq!(results[0].location, "Line 4, Column 10");
    }

    #[test]
    fn annotated_variable_member_falls_through_to_interface() {
        let file = fixture("src/index.ts");
        let query = SymbolQuery::by_name(
            &file,
            Some("  return formatNumber(circle.area()) + ' / ' + formatNumber(depth + deepest);"),
            "area",
        );
        let results = find_definition(&query, &SyntaxBackend, &SnippetExtractor::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].file.ends_with("shapes.ts"));
        assert!(results[0].code_snippet.contains(" > ") && results[0].code_snippet.contains("area(): number;"));
    }

    #[test]
    fn hover_only_answers_yield_no_results() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("h.ts");
        std::fs::write(&file, "declare const thing: unknown;\nthing;\n").unwrap();
        let backend = StubBackend(Mutex::new(Some(StubResolver {
            hover: Some(HoverInfo {
                kind: "const".into(),
                type_text: "const thing: unknown".into(),
                doc: String::new(),
            }),
            ..Default::default()
        })));
        let query = SymbolQuery::by_name(&file, Some("thing;"), "thing");
        let results = find_definition(&query, &backend, &SnippetExtractor::default()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn resolver_order_is_preserved_and_unreadable_candidates_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.ts");
        let b = dir.path().join("b.ts");
        std::fs::write(&a, "export const a = 1;\n").unwrap();
        std::fs::write(&b, "export const b = 2;\n").unwrap();
        let query_file = dir.path().join("q.ts");
        std::fs::write(&query_file, "a + b;\n").unwrap();

        let backend = StubBackend(Mutex::new(Some(StubResolver {
            definitions: vec![
                DefinitionCandidate::new(&b, DefinitionKind::Definition, TextSpan::new(13, 14)),
                DefinitionCandidate::new(dir.path().join("gone.ts"), DefinitionKind::Definition, TextSpan::at(0)),
                DefinitionCandidate::new(&a, DefinitionKind::Definition, TextSpan::new(13, 14)),
            ],
            ..Default::default()
        })));
        let query = SymbolQuery::by_name(&query_file, Some("a + b;"), "b");
        let results = find_definition(&query, &backend, &SnippetExtractor::default()).unwrap();

        let files: Vec<_> = results.iter().map(|r| r.file.clone()).collect();
        assert_eq!(files, [b.display().to_string(), a.display().to_string()]);
        assert_eq!(results[0].location, "Line 1, Column 14");
    }

    #[test]
    fn position_errors_stop_before_the_resolver() {
        let file = fixture("src/indent.ts");
        let backend = StubBackend(Mutex::new(None));

        let missing = SymbolQuery::by_name(&file, None, "getIndentation");
        assert!(matches!(
            find_definition(&missing, &backend, &SnippetExtractor::default()),
            Err(QueryError::MissingLineContent)
        ));

        let absent = SymbolQuery::by_name(
            &file,
            Some("function getIndentation(line: string): number {"),
            "nonExistentSymbol",
        );
        let err = find_definition(&absent, &backend, &SnippetExtractor::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Symbol \"nonExistentSymbol\" not found in line_content"
        );
    }

    #[test]
    fn session_failures_surface_as_resolver_errors() {
        let file = fixture("src/indent.ts");
        let backend = StubBackend(Mutex::new(None));
        let query = SymbolQuery::by_name(&file, Some("export { getIndentation };"), "getIndentation");
        assert!(matches!(
            find_definition(&query, &backend, &SnippetExtractor::default()),
            Err(QueryError::Resolver(_))
        ));
    }
}
