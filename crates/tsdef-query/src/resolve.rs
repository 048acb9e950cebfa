use std::path::Path;
use tracing::{debug, info};
use tsdef_core::error::ResolverError;
use tsdef_core::resolver::SymbolResolver;
use tsdef_core::types::{DefinitionCandidate, DefinitionKind, SourcePosition};

/// Definition, then type definition, then hover.
///
/// Hover information is only logged: when neither lookup finds a location
/// the result is empty even if the resolver could describe the symbol.
pub fn resolve_candidates(
    resolver: &mut dyn SymbolResolver,
    file: &Path,
    position: SourcePosition,
) -> Result<Vec<DefinitionCandidate>, ResolverError> {
    let definitions = resolver.definition_at(file, position)?;
    if !definitions.is_empty() {
        return Ok(tagged(definitions, DefinitionKind::Definition));
    }

    let type_definitions = resolver.type_definition_at(file, position)?;
    if !type_definitions.is_empty() {
        debug!(file = %file.display(), %position, "no definition, using type definition");
        return Ok(tagged(type_definitions, DefinitionKind::TypeDefinition));
    }

    match resolver.hover_at(file, position)? {
        Some(hover) => info!(
            file = %file.display(),
            %position,
            kind = %hover.kind,
            type_text = %hover.type_text,
            doc = %hover.doc,
            "no definition found, hover only"
        ),
        None => debug!(file = %file.display(), %position, "nothing found at position"),
    }
    Ok(Vec::new())
}

fn tagged(candidates: Vec<DefinitionCandidate>, kind: DefinitionKind) -> Vec<DefinitionCandidate> {
    candidates
        .into_iter()
        .map(|c| DefinitionCandidate { kind, ..c })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tsdef_core::types::{HoverInfo, TextSpan};

    /// Resolver returning canned answers and recording which lookups ran.
    #[derive(Default)]
    pub(crate) struct StubResolver {
        pub definitions: Vec<DefinitionCandidate>,
        pub type_definitions: Vec<DefinitionCandidate>,
        pub hover: Option<HoverInfo>,
        pub calls: Vec<&'static str>,
    }

    impl SymbolResolver for StubResolver {
        fn definition_at(
            &mut self,
            _: &Path,
            _: SourcePosition,
        ) -> Result<Vec<DefinitionCandidate>, ResolverError> {
            self.calls.push("definition");
            Ok(self.definitions.clone())
        }

        fn type_definition_at(
            &mut self,
            _: &Path,
            _: SourcePosition,
        ) -> Result<Vec<DefinitionCandidate>, ResolverError> {
            self.calls.push("type_definition");
            Ok(self.type_definitions.clone())
        }

        fn hover_at(
            &mut self,
            _: &Path,
            _: SourcePosition,
        ) -> Result<Option<HoverInfo>, ResolverError> {
            self.calls.push("hover");
            Ok(self.hover.clone())
        }
    }

    fn candidate(file: &str, start: usize) -> DefinitionCandidate {
        DefinitionCandidate::new(file, DefinitionKind::Definition, TextSpan::at(start))
    }

    fn run(stub: &mut StubResolver) -> Vec<DefinitionCandidate> {
        resolve_candidates(stub, Path::new("q.ts"), SourcePosition::new(1, 1)).unwrap()
    }

    #[test]
    fn definitions_short_circuit_the_chain() {
        let mut stub = StubResolver {
            definitions: vec![candidate("b.ts", 4), candidate("a.ts", 1)],
            type_definitions: vec![candidate("t.ts", 0)],
            ..Default::default()
        };
        let found = run(&mut stub);
        assert_eq!(stub.calls, ["definition"]);
        let files: Vec<_> = found.iter().map(|c| c.file.to_str().unwrap()).collect();
        assert_eq!(files, ["b.ts", "a.ts"]);
    }

    #[test]
    fn type_definitions_are_tagged() {
        let mut stub = StubResolver {
            type_definitions: vec![candidate("t.ts", 0)],
            ..Default::default()
        };
        let found = run(&mut stub);
        assert_eq!(stub.calls, ["definition", "type_definition"]);
        assert_eq!(found[0].kind, DefinitionKind::TypeDefinition);
    }

    #[test]
    fn hover_alone_yields_an_empty_list() {
        let mut stub = StubResolver {
            hover: Some(HoverInfo {
                kind: "function".into(),
                type_text: "function f(): void".into(),
                doc: "Does things.".into(),
            }),
            ..Default::default()
        };
        let found = run(&mut stub);
        assert_eq!(stub.calls, ["definition", "type_definition", "hover"]);
        assert!(found.is_empty());
    }

    #[test]
    fn nothing_at_all_is_not_an_error() {
        let mut stub = StubResolver::default();
        assert!(run(&mut stub).is_empty());
    }
}
