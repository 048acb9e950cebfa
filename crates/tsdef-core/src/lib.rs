pub mod config;
pub mod constants;
pub mod error;
pub mod resolver;
pub mod text;
pub mod types;
