//! Transient loopback HTTP server that captures the provider's redirect.

mod config;
mod http;
mod server;

pub use config::{DEFAULT_CALLBACK_HOST, DEFAULT_CALLBACK_PORT, LocalServerConfig, redirect_uri};
pub use server::CallbackServer;
