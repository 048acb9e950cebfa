pub mod languages;
pub mod module_resolve;
pub mod parser;
pub mod syntax_resolver;

pub use syntax_resolver::SyntaxBackend;
