pub mod find;
pub mod serve_mcp;
