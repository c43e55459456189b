// Adapters layer: concrete implementations for the outside world (filesystem cache, HTTP server).

pub mod http;
pub mod storage;
