pub mod file_system;
pub mod http_handler;
pub mod middleware;
pub mod process_runner;
pub mod webhook_client;

use std::sync::Arc;

use eyre::Result;

/// Re-export commonly used types from adapters
pub use file_system::FileSystemAdapter;
pub use http_handler::HttpHandler;
pub use middleware::*;
pub use process_runner::TokioCommandRunner;
pub use webhook_client::ReqwestWebhookClient;

use crate::{config::models::ServerConfig, core::Ports};

/// Wire the production adapters: real processes, real HTTP, the local disk.
pub fn system_ports(config: &ServerConfig) -> Result<Ports> {
    Ok(Ports {
        runner: Arc::new(TokioCommandRunner::new()),
        webhook: Arc::new(ReqwestWebhookClient::new(config.webhook.timeout)?),
        file_system: Arc::new(FileSystemAdapter::new()),
    })
}
