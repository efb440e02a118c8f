//! HTTP surface of the bot process: liveness and Prometheus metrics.

pub use server::{ServerState, router, run_with_listener};

mod server;
