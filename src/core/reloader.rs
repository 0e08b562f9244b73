use std::{sync::Arc, time::Duration};

use crate::{
    config::models::ProxyConfig,
    core::error::ProvisioningFailure,
    ports::process::{CommandRunner, CommandSpec},
};

/// Asks the running proxy to pick up new site definitions without dropping connections.
pub struct ProxyReloader {
    runner: Arc<dyn CommandRunner>,
    reload_command: Vec<String>,
    timeout: Duration,
}

impl ProxyReloader {
    pub fn new(config: &ProxyConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            reload_command: config.reload_command.clone(),
            timeout: config.command_timeout,
        }
    }

    pub async fn reload(&self) -> Result<(), ProvisioningFailure> {
        let spec = CommandSpec::from_argv(&self.reload_command, self.timeout)
            .map_err(|e| ProvisioningFailure::Reload(e.to_string()))?;
        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| ProvisioningFailure::Reload(e.to_string()))?;

        if output.success() {
            tracing::info!(command = %spec, "Proxy reloaded");
            Ok(())
        } else {
            Err(ProvisioningFailure::Reload(output.summary()))
        }
    }
}
