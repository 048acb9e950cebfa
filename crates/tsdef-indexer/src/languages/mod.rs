pub mod typescript;

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Function,
    Class,
    Interface,
    TypeAlias,
    Enum,
    EnumMember,
    Namespace,
    Variable,
    Parameter,
    Method,
    Property,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Function => "function",
            DeclarationKind::Class => "class",
            DeclarationKind::Interface => "interface",
            DeclarationKind::TypeAlias => "type",
            DeclarationKind::Enum => "enum",
            DeclarationKind::EnumMember => "enum member",
            DeclarationKind::Namespace => "namespace",
            DeclarationKind::Variable => "variable",
            DeclarationKind::Parameter => "parameter",
            DeclarationKind::Method => "method",
            DeclarationKind::Property => "property",
        }
    }

    /// Declarations that introduce a type name.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            DeclarationKind::Class
                | DeclarationKind::Interface
                | DeclarationKind::TypeAlias
                | DeclarationKind::Enum
        )
    }

    /// Declarations that live in a class/interface/enum body rather than a
    /// lexical scope.
    pub fn is_member(&self) -> bool {
        matches!(
            self,
            DeclarationKind::Method | DeclarationKind::Property | DeclarationKind::EnumMember
        )
    }

    /// Visible where a value is expected.
    pub fn is_value(&self) -> bool {
        !matches!(self, DeclarationKind::Interface | DeclarationKind::TypeAlias)
    }

    /// Visible where a type is expected.
    pub fn is_type_space(&self) -> bool {
        self.is_type() || matches!(self, DeclarationKind::Namespace)
    }
}

/// A named declaration found in a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Byte range of the declared name token.
    pub name_range: Range<usize>,
    /// Byte range of the whole declaration.
    pub node_range: Range<usize>,
    /// Byte range of the scope the name is visible in.
    pub scope_range: Range<usize>,
    pub top_level: bool,
    pub exported: bool,
    pub is_default: bool,
    /// Enclosing `namespace`, when declared directly inside one.
    pub namespace: Option<String>,
    /// Head of the annotated (or constructed) type, e.g. `Foo` or `ts.Node`.
    pub type_name: Option<String>,
    /// First line of the declaration.
    pub signature: String,
    /// Cleaned JSDoc block directly above the declaration.
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportedName {
    Named(String),
    Default,
    /// `import * as x` or `import x = require(..)`.
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub local: String,
    pub imported: ImportedName,
    pub source: String,
    pub local_range: Range<usize>,
    pub node_range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportLink {
    /// `export { local as exported }`
    Local { local: String, exported: String },
    /// `export { imported as exported } from 'source'`
    From {
        source: String,
        imported: String,
        exported: String,
    },
    /// `export * as exported from 'source'`
    NamespaceFrom { source: String, exported: String },
    /// `export * from 'source'`
    AllFrom { source: String },
}

/// Everything the resolver needs to know about one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleOutline {
    pub declarations: Vec<Declaration>,
    pub imports: Vec<ImportBinding>,
    pub exports: Vec<ExportLink>,
    /// `export = X`
    pub export_assignment: Option<String>,
    /// `export default X` where `X` is an identifier.
    pub default_export: Option<String>,
    /// `(module specifier, byte range of the specifier string)` of every
    /// import/export-from statement.
    pub module_specifiers: Vec<(String, Range<usize>)>,
}

impl ModuleOutline {
    pub fn declarations_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Declaration> {
        self.declarations.iter().filter(move |d| d.name == name)
    }

    pub fn imports_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a ImportBinding> {
        self.imports.iter().filter(move |i| i.local == local)
    }
}
