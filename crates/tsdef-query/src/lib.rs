pub mod backend;
pub mod definition;
pub mod position;
pub mod resolve;
pub mod snippet;

pub use backend::backend_from_config;
pub use definition::find_definition;
pub use snippet::SnippetExtractor;
