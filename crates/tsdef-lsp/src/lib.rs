//! Language-server backed symbol resolution over stdio.

pub mod client;
pub mod framing;
pub mod resolver;

pub use resolver::LanguageServerBackend;
