pub mod protocol;
pub mod server;
pub mod sse;
pub mod tools;
