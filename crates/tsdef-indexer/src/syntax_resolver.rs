//! In-process resolver backed by tree-sitter outlines.
//!
//! Binds names with lexical scoping inside a file and follows imports and
//! re-exports across files. It does not type-check: member access is only
//! resolved through namespaces, `this`, and declared or constructed types.

use crate::languages::typescript;
use crate::languages::{DeclarationKind, ExportLink, ImportBinding, ImportedName, ModuleOutline};
use crate::module_resolve::resolve_module;
use crate::parser::{Dialect, is_declaration_file, parse_file};
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;
use tsdef_core::constants::MAX_REEXPORT_DEPTH;
use tsdef_core::error::ResolverError;
use tsdef_core::resolver::{ResolverBackend, SymbolResolver};
use tsdef_core::text::{LineIndex, read_source};
use tsdef_core::types::{DefinitionCandidate, DefinitionKind, HoverInfo, SourcePosition, TextSpan};

const NAME_NODE_KINDS: &[&str] = &[
    "identifier",
    "type_identifier",
    "property_identifier",
    "private_property_identifier",
    "shorthand_property_identifier",
    "shorthand_property_identifier_pattern",
];

#[derive(Debug, Default)]
pub struct SyntaxBackend;

impl ResolverBackend for SyntaxBackend {
    fn name(&self) -> &'static str {
        "syntax"
    }

    fn open_session(&self, file: &Path) -> Result<Box<dyn SymbolResolver>, ResolverError> {
        debug!(file = %file.display(), "opening syntax resolver session");
        Ok(Box::new(SyntaxSession::default()))
    }
}

pub struct ParsedModule {
    pub path: PathBuf,
    pub source: String,
    pub tree: tree_sitter::Tree,
    pub outline: ModuleOutline,
}

/// What a name at a position binds to.
#[derive(Clone)]
enum Target {
    Decl { module: Rc<ParsedModule>, index: usize },
    /// A whole module (namespace import, module specifier).
    Module(Rc<ParsedModule>),
    /// An import whose module could not be resolved; points at the local
    /// binding itself.
    Binding {
        module: Rc<ParsedModule>,
        range: Range<usize>,
        statement: Range<usize>,
    },
}

impl Target {
    fn key(&self) -> (PathBuf, usize, usize) {
        match self {
            Target::Decl { module, index } => {
                let range = &module.outline.declarations[*index].name_range;
                (module.path.clone(), range.start, range.end)
            }
            Target::Module(module) => (module.path.clone(), 0, 0),
            Target::Binding { module, range, .. } => (module.path.clone(), range.start, range.end),
        }
    }

    fn candidate(&self, kind: DefinitionKind) -> DefinitionCandidate {
        match self {
            Target::Decl { module, index } => {
                let decl = &module.outline.declarations[*index];
                DefinitionCandidate::new(
                    module.path.clone(),
                    kind,
                    TextSpan::new(decl.name_range.start, decl.name_range.end),
                )
                .with_enclosing(TextSpan::new(decl.node_range.start, decl.node_range.end))
            }
            Target::Module(module) => {
                DefinitionCandidate::new(module.path.clone(), kind, TextSpan::at(0))
            }
            Target::Binding { module, range, .. } => {
                DefinitionCandidate::new(module.path.clone(), kind, TextSpan::new(range.start, range.end))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Space {
    Value,
    Type,
    Any,
}

impl Space {
    fn admits(self, kind: DeclarationKind) -> bool {
        match self {
            Space::Value => kind.is_value(),
            Space::Type => kind.is_type_space(),
            Space::Any => true,
        }
    }
}

/// Tracks re-export hops so cycles and long chains terminate.
#[derive(Default)]
struct Walk {
    depth: usize,
    visited: HashSet<(PathBuf, String)>,
}

/// One query's worth of parsed modules.
#[derive(Default)]
pub struct SyntaxSession {
    modules: HashMap<PathBuf, Rc<ParsedModule>>,
    /// Declarations whose annotated type is currently being resolved.
    expanding: HashSet<(PathBuf, usize)>,
}

impl SyntaxSession {
    fn load(&mut self, path: &Path) -> Result<Rc<ParsedModule>, ResolverError> {
        if let Some(module) = self.modules.get(path) {
            return Ok(Rc::clone(module));
        }

        let source = read_source(path).map_err(|e| ResolverError::read(path, e))?;
        let dialect = Dialect::from_path(path).unwrap_or(Dialect::TypeScript);
        let tree = parse_file(&source, dialect).map_err(|e| ResolverError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let outline = typescript::extract(&tree, &source, is_declaration_file(path));
        debug!(
            file = %path.display(),
            declarations = outline.declarations.len(),
            imports = outline.imports.len(),
            "parsed module"
        );

        let module = Rc::new(ParsedModule {
            path: path.to_path_buf(),
            source,
            tree,
            outline,
        });
        self.modules.insert(path.to_path_buf(), Rc::clone(&module));
        Ok(module)
    }

    fn load_quiet(&mut self, path: &Path) -> Option<Rc<ParsedModule>> {
        match self.load(path) {
            Ok(module) => Some(module),
            Err(e) => {
                debug!(file = %path.display(), error = %e, "skipping unreadable module");
                None
            }
        }
    }

    /// Byte offset of a 1-based position, `None` when outside the file.
    fn offset_of(module: &ParsedModule, position: SourcePosition) -> Option<usize> {
        let line = (position.line as usize).checked_sub(1)?;
        let column = (position.column as usize).checked_sub(1)?;
        LineIndex::new(&module.source).offset(line, column)
    }

    fn targets_at(&mut self, file: &Path, position: SourcePosition) -> Result<Vec<Target>, ResolverError> {
        let module = self.load(file)?;
        let Some(offset) = Self::offset_of(&module, position) else {
            return Ok(Vec::new());
        };
        let mut targets = self.resolve_at(&module, offset);
        dedup_targets(&mut targets);
        Ok(targets)
    }

    fn resolve_at(&mut self, module: &Rc<ParsedModule>, offset: usize) -> Vec<Target> {
        // Module specifier strings jump to the module itself.
        if let Some((specifier, _)) = module
            .outline
            .module_specifiers
            .iter()
            .find(|(_, range)| range.start <= offset && offset < range.end)
        {
            return resolve_module(&module.path, specifier)
                .and_then(|path| self.load_quiet(&path))
                .map(|m| vec![Target::Module(m)])
                .unwrap_or_default();
        }

        let end = (offset + 1).min(module.source.len());
        let Some(node) = module
            .tree
            .root_node()
            .named_descendant_for_byte_range(offset, end)
        else {
            return Vec::new();
        };
        if !NAME_NODE_KINDS.contains(&node.kind()) {
            return Vec::new();
        }
        let name = &module.source[node.byte_range()];

        // On a declaration's own name.
        let own: Vec<Target> = module
            .outline
            .declarations
            .iter()
            .enumerate()
            .filter(|(_, d)| d.name_range == node.byte_range())
            .map(|(index, _)| Target::Decl {
                module: Rc::clone(module),
                index,
            })
            .collect();
        if !own.is_empty() {
            return own;
        }

        // On an import binding.
        if let Some(binding) = module
            .outline
            .imports
            .iter()
            .find(|i| i.local_range == node.byte_range())
            .cloned()
        {
            return self.follow_import(module, &binding, &mut Walk::default());
        }

        let parent = node.parent();
        match parent.map(|p| p.kind()) {
            Some("member_expression")
                if parent.and_then(|p| p.child_by_field_name("property")) == Some(node) =>
            {
                let Some(object) = parent.and_then(|p| p.child_by_field_name("object")) else {
                    return Vec::new();
                };
                let owners = self.resolve_expression(module, object);
                self.members_of_all(&owners, name)
            }
            Some("nested_type_identifier")
                if parent.and_then(|p| p.child_by_field_name("name")) == Some(node) =>
            {
                let Some(parent) = parent else {
                    return Vec::new();
                };
                let dotted: String = module.source[parent.byte_range()]
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                self.resolve_dotted(module, &dotted, offset)
            }
            Some("nested_type_identifier" | "nested_identifier" | "member_expression") => {
                self.resolve_name(module, name, offset, Space::Any, &mut Walk::default())
            }
            _ => match node.kind() {
                "identifier" | "shorthand_property_identifier" => {
                    self.resolve_name(module, name, offset, Space::Value, &mut Walk::default())
                }
                "type_identifier" => {
                    self.resolve_name(module, name, offset, Space::Type, &mut Walk::default())
                }
                _ => Vec::new(),
            },
        }
    }

    /// Targets an expression evaluates to, as far as syntax can tell.
    fn resolve_expression(&mut self, module: &Rc<ParsedModule>, node: tree_sitter::Node) -> Vec<Target> {
        match node.kind() {
            "identifier" => {
                let name = &module.source[node.byte_range()];
                self.resolve_name(module, name, node.start_byte(), Space::Value, &mut Walk::default())
            }
            "this" => enclosing_class(module, node).into_iter().collect(),
            "member_expression" => {
                let (Some(object), Some(property)) = (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("property"),
                ) else {
                    return Vec::new();
                };
                let owners = self.resolve_expression(module, object);
                let name = &module.source[property.byte_range()];
                self.members_of_all(&owners, name)
            }
            "parenthesized_expression" | "non_null_expression" => node
                .named_child(0)
                .map(|inner| self.resolve_expression(module, inner))
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// `a.b.C` starting from the scope at `offset`.
    fn resolve_dotted(&mut self, module: &Rc<ParsedModule>, dotted: &str, offset: usize) -> Vec<Target> {
        let mut parts = dotted.split('.');
        let Some(first) = parts.next() else {
            return Vec::new();
        };
        let rest: Vec<&str> = parts.collect();
        let space = if rest.is_empty() { Space::Type } else { Space::Any };
        let mut current = self.resolve_name(module, first, offset, space, &mut Walk::default());
        for part in rest {
            current = self.members_of_all(&current, part);
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// Innermost lexical binding of `name` visible at `offset`, then imports.
    fn resolve_name(
        &mut self,
        module: &Rc<ParsedModule>,
        name: &str,
        offset: usize,
        space: Space,
        walk: &mut Walk,
    ) -> Vec<Target> {
        let visible: Vec<(usize, &Range<usize>)> = module
            .outline
            .declarations
            .iter()
            .enumerate()
            .filter(|(_, d)| {
                d.name == name
                    && !d.kind.is_member()
                    && space.admits(d.kind)
                    && d.scope_range.start <= offset
                    && offset <= d.scope_range.end
            })
            .map(|(i, d)| (i, &d.scope_range))
            .collect();

        if let Some(innermost) = visible.iter().map(|(_, r)| r.len()).min() {
            return visible
                .iter()
                .filter(|(_, r)| r.len() == innermost)
                .map(|(index, _)| Target::Decl {
                    module: Rc::clone(module),
                    index: *index,
                })
                .collect();
        }

        let imports: Vec<ImportBinding> = module.outline.imports_named(name).cloned().collect();
        imports
            .iter()
            .flat_map(|binding| self.follow_import(module, binding, walk))
            .collect()
    }

    fn follow_import(&mut self, module: &Rc<ParsedModule>, binding: &ImportBinding, walk: &mut Walk) -> Vec<Target> {
        let fallback = || {
            vec![Target::Binding {
                module: Rc::clone(module),
                range: binding.local_range.clone(),
                statement: binding.node_range.clone(),
            }]
        };

        let Some(target) =
            resolve_module(&module.path, &binding.source).and_then(|path| self.load_quiet(&path))
        else {
            debug!(specifier = %binding.source, "module not resolved, using import binding");
            return fallback();
        };

        let found = match &binding.imported {
            ImportedName::Namespace => match target.outline.export_assignment.clone() {
                Some(assigned) => self.top_level(&target, &assigned, walk),
                None => vec![Target::Module(target)],
            },
            ImportedName::Default => self.find_export(&target, "default", walk),
            ImportedName::Named(name) => self.find_export(&target, name, walk),
        };
        if found.is_empty() { fallback() } else { found }
    }

    /// Top-level declarations (or imports) named `name`.
    fn top_level(&mut self, module: &Rc<ParsedModule>, name: &str, walk: &mut Walk) -> Vec<Target> {
        let decls = declarations_where(module, |d| d.name == name && d.top_level);
        if !decls.is_empty() {
            return decls;
        }
        let imports: Vec<ImportBinding> = module.outline.imports_named(name).cloned().collect();
        imports
            .iter()
            .flat_map(|binding| self.follow_import(module, binding, walk))
            .collect()
    }

    /// What `module` exports as `name`, following re-exports.
    fn find_export(&mut self, module: &Rc<ParsedModule>, name: &str, walk: &mut Walk) -> Vec<Target> {
        if walk.depth > MAX_REEXPORT_DEPTH
            || !walk.visited.insert((module.path.clone(), name.to_string()))
        {
            return Vec::new();
        }
        walk.depth += 1;
        let found = self.find_export_inner(module, name, walk);
        walk.depth -= 1;
        found
    }

    fn find_export_inner(&mut self, module: &Rc<ParsedModule>, name: &str, walk: &mut Walk) -> Vec<Target> {
        let outline = &module.outline;

        if name == "default" {
            let defaults = declarations_where(module, |d| d.is_default);
            if !defaults.is_empty() {
                return defaults;
            }
            if let Some(local) = outline.default_export.clone() {
                return self.top_level(module, &local, walk);
            }
            if let Some(assigned) = outline.export_assignment.clone() {
                return self.top_level(module, &assigned, walk);
            }
        }

        let direct = declarations_where(module, |d| d.name == name && d.top_level && d.exported);
        if !direct.is_empty() {
            return direct;
        }

        for link in outline.exports.clone() {
            let found = match link {
                ExportLink::Local { local, exported } if exported == name => {
                    self.top_level(module, &local, walk)
                }
                ExportLink::From {
                    source,
                    imported,
                    exported,
                } if exported == name => match self.module_from(module, &source) {
                    Some(target) => self.find_export(&target, &imported, walk),
                    None => Vec::new(),
                },
                ExportLink::NamespaceFrom { source, exported } if exported == name => self
                    .module_from(module, &source)
                    .map(|m| vec![Target::Module(m)])
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            if !found.is_empty() {
                return found;
            }
        }

        // `export = ns` exposes the namespace's members.
        if let Some(assigned) = outline.export_assignment.as_deref() {
            let members =
                declarations_where(module, |d| d.name == name && d.namespace.as_deref() == Some(assigned));
            if !members.is_empty() {
                return members;
            }
        }

        for link in outline.exports.clone() {
            if let ExportLink::AllFrom { source } = link
                && name != "default"
                && let Some(target) = self.module_from(module, &source)
            {
                let found = self.find_export(&target, name, walk);
                if !found.is_empty() {
                    return found;
                }
            }
        }

        Vec::new()
    }

    fn module_from(&mut self, module: &ParsedModule, specifier: &str) -> Option<Rc<ParsedModule>> {
        let path = resolve_module(&module.path, specifier)?;
        self.load_quiet(&path)
    }

    fn members_of_all(&mut self, owners: &[Target], name: &str) -> Vec<Target> {
        let mut found: Vec<Target> = owners
            .iter()
            .flat_map(|owner| self.members_of(owner, name))
            .collect();
        dedup_targets(&mut found);
        found
    }

    /// Member `name` of a namespace, module, class-like or typed binding.
    fn members_of(&mut self, owner: &Target, name: &str) -> Vec<Target> {
        match owner {
            Target::Module(module) => self.find_export(module, name, &mut Walk::default()),
            Target::Binding { .. } => Vec::new(),
            Target::Decl { module, index } => {
                let decl = &module.outline.declarations[*index];
                let within = decl.node_range.clone();
                match decl.kind {
                    DeclarationKind::Namespace => {
                        let ns = decl.name.clone();
                        declarations_where(module, |d| {
                            d.name == name
                                && d.namespace.as_deref() == Some(ns.as_str())
                                && contains(&within, &d.node_range)
                        })
                    }
                    DeclarationKind::Class | DeclarationKind::Interface | DeclarationKind::Enum => {
                        declarations_where(module, |d| {
                            d.name == name && d.kind.is_member() && contains(&within, &d.scope_range)
                        })
                    }
                    _ => {
                        let types = self.declared_type(module, *index);
                        types.iter().flat_map(|ty| self.members_of(ty, name)).collect()
                    }
                }
            }
        }
    }

    /// Resolve the annotated type of a declaration.
    ///
    /// A declaration whose type is already being resolved further up the
    /// stack yields nothing, so `declare const X: X.Static` next to
    /// `namespace X` terminates.
    fn declared_type(&mut self, module: &Rc<ParsedModule>, index: usize) -> Vec<Target> {
        let decl = &module.outline.declarations[index];
        let Some(type_name) = decl.type_name.clone() else {
            return Vec::new();
        };
        let at = decl.name_range.start;
        let key = (module.path.clone(), at);
        if self.expanding.len() > MAX_REEXPORT_DEPTH || !self.expanding.insert(key.clone()) {
            return Vec::new();
        }
        let found = self.resolve_dotted(module, &type_name, at);
        self.expanding.remove(&key);
        found
    }

    /// Declared type of each target, or the target itself when it is a type.
    fn type_targets(&mut self, targets: Vec<Target>) -> Vec<Target> {
        let mut out = Vec::new();
        for target in targets {
            let Target::Decl { module, index } = &target else {
                continue;
            };
            let decl = &module.outline.declarations[*index];
            if decl.kind.is_type() {
                out.push(target.clone());
                continue;
            }
            let index = *index;
            let module = Rc::clone(module);
            out.extend(self.declared_type(&module, index));
        }
        dedup_targets(&mut out);
        out
    }
}

impl SymbolResolver for SyntaxSession {
    fn definition_at(
        &mut self,
        file: &Path,
        position: SourcePosition,
    ) -> Result<Vec<DefinitionCandidate>, ResolverError> {
        let targets = self.targets_at(file, position)?;
        debug!(file = %file.display(), %position, found = targets.len(), "syntax definition lookup");
        Ok(targets
            .iter()
            .map(|t| t.candidate(DefinitionKind::Definition))
            .collect())
    }

    fn type_definition_at(
        &mut self,
        file: &Path,
        position: SourcePosition,
    ) -> Result<Vec<DefinitionCandidate>, ResolverError> {
        let targets = self.targets_at(file, position)?;
        let types = self.type_targets(targets);
        debug!(file = %file.display(), %position, found = types.len(), "syntax type definition lookup");
        Ok(types
            .iter()
            .map(|t| t.candidate(DefinitionKind::TypeDefinition))
            .collect())
    }

    fn hover_at(
        &mut self,
        file: &Path,
        position: SourcePosition,
    ) -> Result<Option<HoverInfo>, ResolverError> {
        let targets = self.targets_at(file, position)?;
        Ok(targets.first().map(|target| match target {
            Target::Decl { module, index } => {
                let decl = &module.outline.declarations[*index];
                HoverInfo {
                    kind: decl.kind.as_str().to_string(),
                    type_text: decl.signature.clone(),
                    doc: decl.doc.clone().unwrap_or_default(),
                }
            }
            Target::Module(module) => HoverInfo {
                kind: "module".to_string(),
                type_text: format!("module \"{}\"", module.path.display()),
                doc: String::new(),
            },
            Target::Binding {
                module, statement, ..
            } => HoverInfo {
                kind: "alias".to_string(),
                type_text: module.source[statement.clone()]
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                doc: String::new(),
            },
        }))
    }
}

fn declarations_where(
    module: &Rc<ParsedModule>,
    pred: impl Fn(&crate::languages::Declaration) -> bool,
) -> Vec<Target> {
    module
        .outline
        .declarations
        .iter()
        .enumerate()
        .filter(|(_, d)| pred(d))
        .map(|(index, _)| Target::Decl {
            module: Rc::clone(module),
            index,
        })
        .collect()
}

/// The class declaration whose body encloses `node`.
fn enclosing_class(module: &Rc<ParsedModule>, node: tree_sitter::Node) -> Option<Target> {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == "class_body"
            && let Some(class) = n.parent()
        {
            let range = class.byte_range();
            let index = module
                .outline
                .declarations
                .iter()
                .position(|d| d.kind == DeclarationKind::Class && d.node_range == range)?;
            return Some(Target::Decl {
                module: Rc::clone(module),
                index,
            });
        }
        current = n.parent();
    }
    None
}

fn contains(outer: &Range<usize>, inner: &Range<usize>) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

fn dedup_targets(targets: &mut Vec<Target>) {
    let mut seen = HashSet::new();
    targets.retain(|t| seen.insert(t.key()));
}
