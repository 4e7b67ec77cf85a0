//! HTTP read API and the server process wiring.

pub mod app;
pub mod server;
