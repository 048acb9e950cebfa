use super::{Declaration, DeclarationKind, ExportLink, ImportBinding, ImportedName, ModuleOutline};
use tree_sitter::Node;

/// Nodes that open a lexical scope.
const SCOPE_KINDS: &[&str] = &[
    "program",
    "statement_block",
    "class_body",
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "generator_function",
    "arrow_function",
    "method_definition",
    "for_statement",
    "for_in_statement",
    "catch_clause",
];

/// Nodes that hold class/interface/enum members.
const MEMBER_SCOPE_KINDS: &[&str] = &["class_body", "interface_body", "object_type", "enum_body"];

/// Wrappers between a declaration and the statement that owns it.
const STATEMENT_WRAPPERS: &[&str] = &[
    "lexical_declaration",
    "variable_declaration",
    "ambient_declaration",
    "export_statement",
];

const MEMBER_NAME_KINDS: &[&str] = &[
    "property_identifier",
    "private_property_identifier",
    "identifier",
    "type_identifier",
];

struct Ctx<'s> {
    source: &'s str,
    declaration_file: bool,
}

pub fn extract(tree: &tree_sitter::Tree, source: &str, declaration_file: bool) -> ModuleOutline {
    let mut outline = ModuleOutline::default();
    let ctx = Ctx {
        source,
        declaration_file,
    };
    extract_from_node(tree.root_node(), &ctx, &mut outline);
    outline
}

fn extract_from_node(node: Node, ctx: &Ctx, out: &mut ModuleOutline) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" | "function_signature" => {
            extract_named(node, ctx, out, DeclarationKind::Function);
        }
        "class_declaration" | "abstract_class_declaration" => {
            extract_named(node, ctx, out, DeclarationKind::Class);
        }
        "interface_declaration" => extract_named(node, ctx, out, DeclarationKind::Interface),
        "type_alias_declaration" => extract_named(node, ctx, out, DeclarationKind::TypeAlias),
        "enum_declaration" => extract_named(node, ctx, out, DeclarationKind::Enum),
        "internal_module" | "module" => extract_named(node, ctx, out, DeclarationKind::Namespace),
        "variable_declarator" => extract_variable(node, ctx, out),
        "required_parameter" | "optional_parameter" => {
            if let Some(pattern) = node.child_by_field_name("pattern") {
                let type_name = annotated_type_name(node, ctx);
                for name_node in pattern_names(pattern) {
                    push_declaration(
                        ctx,
                        out,
                        name_node,
                        node,
                        DeclarationKind::Parameter,
                        type_name.clone(),
                    );
                }
            }
        }
        "arrow_function" => {
            if let Some(param) = node.child_by_field_name("parameter") {
                for name_node in pattern_names(param) {
                    push_declaration(ctx, out, name_node, param, DeclarationKind::Parameter, None);
                }
            }
        }
        "catch_clause" => {
            if let Some(param) = node.child_by_field_name("parameter") {
                for name_node in pattern_names(param) {
                    push_declaration(ctx, out, name_node, param, DeclarationKind::Parameter, None);
                }
            }
        }
        "method_definition" | "method_signature" | "abstract_method_signature" => {
            extract_member(node, ctx, out, DeclarationKind::Method);
        }
        "public_field_definition" | "property_signature" => {
            extract_member(node, ctx, out, DeclarationKind::Property);
        }
        "enum_body" => extract_enum_members(node, ctx, out),
        "import_statement" => extract_import(node, ctx, out),
        "export_statement" => extract_export(node, ctx, out),
        _ => {}
    }

    extract_children(node, ctx, out);
}

fn extract_children(node: Node, ctx: &Ctx, out: &mut ModuleOutline) {
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            extract_from_node(child, ctx, out);
        }
    }
}

fn extract_named(node: Node, ctx: &Ctx, out: &mut ModuleOutline, kind: DeclarationKind) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    push_declaration(ctx, out, name_node, node, kind, None);
}

fn extract_variable(node: Node, ctx: &Ctx, out: &mut ModuleOutline) {
    let Some(name) = node.child_by_field_name("name") else {
        return;
    };
    let type_name = annotated_type_name(node, ctx).or_else(|| constructed_type_name(node, ctx));
    for name_node in pattern_names(name) {
        push_declaration(
            ctx,
            out,
            name_node,
            node,
            DeclarationKind::Variable,
            type_name.clone(),
        );
    }
}

fn extract_member(node: Node, ctx: &Ctx, out: &mut ModuleOutline, kind: DeclarationKind) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    if !MEMBER_NAME_KINDS.contains(&name_node.kind()) {
        return;
    }
    let type_name = annotated_type_name(node, ctx);
    push_declaration(ctx, out, name_node, node, kind, type_name);
}

fn extract_enum_members(node: Node, ctx: &Ctx, out: &mut ModuleOutline) {
    for i in 0..node.named_child_count() {
        let Some(child) = node.named_child(i) else {
            continue;
        };
        match child.kind() {
            "property_identifier" => {
                push_declaration(ctx, out, child, child, DeclarationKind::EnumMember, None);
            }
            "enum_assignment" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    push_declaration(ctx, out, name_node, child, DeclarationKind::EnumMember, None);
                }
            }
            _ => {}
        }
    }
}

fn push_declaration(
    ctx: &Ctx,
    out: &mut ModuleOutline,
    name_node: Node,
    node: Node,
    kind: DeclarationKind,
    type_name: Option<String>,
) {
    let name = declared_name(name_node, ctx);
    if name.is_empty() {
        return;
    }

    let (scope_range, top_level, namespace) = if kind.is_member() {
        let scope = member_scope(node);
        (
            scope
                .map(|s| s.byte_range())
                .unwrap_or(0..ctx.source.len()),
            false,
            None,
        )
    } else {
        lexical_scope(node, ctx)
    };

    let statement = outer_statement(node);
    let export = ancestor_export(node);
    let exported = export.is_some()
        || (ctx.declaration_file && (top_level || namespace.is_some()) && !kind.is_member());
    let is_default = export.map(|e| has_token(e, "default")).unwrap_or(false);

    let extent = declaration_extent(node);
    let signature = node_text(statement, ctx)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    out.declarations.push(Declaration {
        name,
        kind,
        name_range: name_node.byte_range(),
        node_range: extent.byte_range(),
        scope_range,
        top_level,
        exported,
        is_default,
        namespace,
        type_name,
        signature,
        doc: doc_comment(statement, ctx),
    });
}

/// Returns (scope range, top level, enclosing namespace).
fn lexical_scope(node: Node, ctx: &Ctx) -> (std::ops::Range<usize>, bool, Option<String>) {
    let mut current = node.parent();
    while let Some(n) = current {
        if SCOPE_KINDS.contains(&n.kind()) {
            let top_level = n.kind() == "program";
            let namespace = if n.kind() == "statement_block" {
                n.parent()
                    .filter(|p| matches!(p.kind(), "internal_module" | "module"))
                    .and_then(|p| p.child_by_field_name("name"))
                    .map(|name| declared_name(name, ctx))
            } else {
                None
            };
            let range = if top_level {
                0..ctx.source.len()
            } else {
                n.byte_range()
            };
            return (range, top_level, namespace);
        }
        current = n.parent();
    }
    (0..ctx.source.len(), true, None)
}

fn member_scope(node: Node) -> Option<Node> {
    let mut current = node.parent();
    while let Some(n) = current {
        if MEMBER_SCOPE_KINDS.contains(&n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// `const a = 1` spans the whole statement, not just `a = 1`.
fn declaration_extent(node: Node) -> Node {
    if node.kind() == "variable_declarator"
        && let Some(parent) = node.parent()
        && matches!(parent.kind(), "lexical_declaration" | "variable_declaration")
    {
        return parent;
    }
    node
}

fn outer_statement(node: Node) -> Node {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if !STATEMENT_WRAPPERS.contains(&parent.kind()) {
            break;
        }
        current = parent;
    }
    current
}

fn ancestor_export(node: Node) -> Option<Node> {
    let mut current = node.parent();
    while let Some(n) = current {
        match n.kind() {
            "export_statement" => return Some(n),
            k if STATEMENT_WRAPPERS.contains(&k) => current = n.parent(),
            _ => return None,
        }
    }
    None
}

fn extract_import(node: Node, ctx: &Ctx, out: &mut ModuleOutline) {
    if let Some(source_node) = node.child_by_field_name("source") {
        let source = string_value(source_node, ctx);
        out.module_specifiers
            .push((source.clone(), source_node.byte_range()));

        for i in 0..node.named_child_count() {
            let Some(clause) = node.named_child(i) else {
                continue;
            };
            if clause.kind() != "import_clause" {
                continue;
            }
            for j in 0..clause.named_child_count() {
                let Some(part) = clause.named_child(j) else {
                    continue;
                };
                match part.kind() {
                    "identifier" => push_import(out, part, node, ImportedName::Default, &source, ctx),
                    "namespace_import" => {
                        if let Some(ident) = first_named_of_kind(part, "identifier") {
                            push_import(out, ident, node, ImportedName::Namespace, &source, ctx);
                        }
                    }
                    "named_imports" => {
                        for k in 0..part.named_child_count() {
                            let Some(spec) = part.named_child(k) else {
                                continue;
                            };
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let Some(name) = spec.child_by_field_name("name") else {
                                continue;
                            };
                            let local = spec.child_by_field_name("alias").unwrap_or(name);
                            let imported = ImportedName::Named(declared_name(name, ctx));
                            push_import(out, local, node, imported, &source, ctx);
                        }
                    }
                    _ => {}
                }
            }
        }
        return;
    }

    // import x = require('y')
    if let Some(clause) = first_named_of_kind(node, "import_require_clause")
        && let Some(ident) = first_named_of_kind(clause, "identifier")
        && let Some(source_node) = clause.child_by_field_name("source")
    {
        let source = string_value(source_node, ctx);
        out.module_specifiers
            .push((source.clone(), source_node.byte_range()));
        push_import(out, ident, node, ImportedName::Namespace, &source, ctx);
    }
}

fn push_import(
    out: &mut ModuleOutline,
    local: Node,
    statement: Node,
    imported: ImportedName,
    source: &str,
    ctx: &Ctx,
) {
    out.imports.push(ImportBinding {
        local: node_text(local, ctx).to_string(),
        imported,
        source: source.to_string(),
        local_range: local.byte_range(),
        node_range: statement.byte_range(),
    });
}

fn extract_export(node: Node, ctx: &Ctx, out: &mut ModuleOutline) {
    if node.child_by_field_name("declaration").is_some() {
        // Handled when the declaration itself is visited.
        return;
    }

    let source_node = node.child_by_field_name("source");
    let source = source_node.map(|s| string_value(s, ctx));
    if let (Some(s), Some(n)) = (&source, source_node) {
        out.module_specifiers.push((s.clone(), n.byte_range()));
    }

    if let Some(value) = node.child_by_field_name("value") {
        if value.kind() == "identifier" {
            out.default_export = Some(node_text(value, ctx).to_string());
        }
        return;
    }

    if has_token(node, "=") {
        if let Some(expr) = first_named_of_kind(node, "identifier") {
            out.export_assignment = Some(node_text(expr, ctx).to_string());
        }
        return;
    }

    if let Some(clause) = first_named_of_kind(node, "export_clause") {
        for i in 0..clause.named_child_count() {
            let Some(spec) = clause.named_child(i) else {
                continue;
            };
            if spec.kind() != "export_specifier" {
                continue;
            }
            let Some(name) = spec.child_by_field_name("name") else {
                continue;
            };
            let local = declared_name(name, ctx);
            let exported = spec
                .child_by_field_name("alias")
                .map(|a| declared_name(a, ctx))
                .unwrap_or_else(|| local.clone());
            out.exports.push(match &source {
                Some(source) => ExportLink::From {
                    source: source.clone(),
                    imported: local,
                    exported,
                },
                None => ExportLink::Local { local, exported },
            });
        }
        return;
    }

    if let Some(source) = source {
        if let Some(ns) = first_named_of_kind(node, "namespace_export") {
            if let Some(name) = ns.named_child(0) {
                out.exports.push(ExportLink::NamespaceFrom {
                    source,
                    exported: declared_name(name, ctx),
                });
            }
        } else if has_token(node, "*") {
            out.exports.push(ExportLink::AllFrom { source });
        }
    }
}

/// Identifier nodes bound by a (possibly destructuring) pattern.
fn pattern_names(node: Node) -> Vec<Node> {
    let mut names = Vec::new();
    collect_pattern_names(node, &mut names);
    names
}

fn collect_pattern_names<'t>(node: Node<'t>, names: &mut Vec<Node<'t>>) {
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => names.push(node),
        "pair_pattern" => {
            if let Some(value) = node.child_by_field_name("value") {
                collect_pattern_names(value, names);
            }
        }
        "assignment_pattern" | "object_assignment_pattern" => {
            if let Some(left) = node.child_by_field_name("left") {
                collect_pattern_names(left, names);
            }
        }
        "object_pattern" | "array_pattern" | "rest_pattern" => {
            for i in 0..node.named_child_count() {
                if let Some(child) = node.named_child(i) {
                    collect_pattern_names(child, names);
                }
            }
        }
        _ => {}
    }
}

fn annotated_type_name(node: Node, ctx: &Ctx) -> Option<String> {
    let annotation = node.child_by_field_name("type")?;
    let ty = if annotation.kind() == "type_annotation" {
        annotation.named_child(0)?
    } else {
        annotation
    };
    type_head(ty, ctx)
}

/// `const x = new Foo()` is typed as `Foo`.
fn constructed_type_name(node: Node, ctx: &Ctx) -> Option<String> {
    let value = node.child_by_field_name("value")?;
    if value.kind() != "new_expression" {
        return None;
    }
    let constructor = value.child_by_field_name("constructor")?;
    match constructor.kind() {
        "identifier" | "member_expression" => Some(node_text(constructor, ctx).to_string()),
        _ => None,
    }
}

fn type_head(ty: Node, ctx: &Ctx) -> Option<String> {
    match ty.kind() {
        "type_identifier" | "nested_type_identifier" => Some(node_text(ty, ctx).to_string()),
        "generic_type" => type_head(ty.child_by_field_name("name")?, ctx),
        "array_type" => type_head(ty.named_child(0)?, ctx),
        _ => None,
    }
}

fn doc_comment(statement: Node, ctx: &Ctx) -> Option<String> {
    let prev = statement.prev_sibling()?;
    if prev.kind() != "comment" {
        return None;
    }
    if statement.start_position().row > prev.end_position().row + 1 {
        return None;
    }
    let text = node_text(prev, ctx);
    let body = text.strip_prefix("/**")?.strip_suffix("*/").unwrap_or(text);
    let lines: Vec<&str> = body
        .lines()
        .map(|l| {
            let l = l.trim();
            l.strip_prefix('*').map(str::trim).unwrap_or(l)
        })
        .collect();
    let cleaned = lines.join("\n").trim().to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

fn declared_name(node: Node, ctx: &Ctx) -> String {
    let text = node_text(node, ctx);
    if node.kind() == "string" {
        return string_literal(text).to_string();
    }
    text.to_string()
}

fn string_value(node: Node, ctx: &Ctx) -> String {
    string_literal(node_text(node, ctx)).to_string()
}

fn string_literal(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

fn has_token(node: Node, token: &str) -> bool {
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .any(|c| !c.is_named() && c.kind() == token)
}

fn first_named_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    (0..node.named_child_count())
        .filter_map(|i| node.named_child(i))
        .find(|c| c.kind() == kind)
}

fn node_text<'s>(node: Node, ctx: &Ctx<'s>) -> &'s str {
    &ctx.source[node.byte_range()]
}
