//! SSH-backed device session
//!
//! Cisco platforms are driven through a [`CliShell`]; Linux hosts run each
//! command on its own exec channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::config::SshConfig;
use super::connection::SshConnection;
use super::shell::CliShell;
use crate::device::{DeviceSession, Os};
use crate::error::{NetdevMcpError, Result};
use crate::parse::GrammarRegistry;

/// One device session over SSH
pub struct SshDeviceSession {
    name: String,
    os: Os,
    grammars: Arc<GrammarRegistry>,
    command_timeout: Duration,
    connection: SshConnection,
    shell: Option<CliShell>,
}

impl SshDeviceSession {
    pub fn new(
        name: impl Into<String>,
        os: Os,
        config: SshConfig,
        grammars: Arc<GrammarRegistry>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            os,
            grammars,
            command_timeout,
            connection: SshConnection::new(config),
            shell: None,
        }
    }

    pub fn os(&self) -> Os {
        self.os
    }

    async fn establish(&mut self, timeout: Duration) -> Result<()> {
        self.connection.connect(timeout).await?;

        if self.os.uses_cli_shell() {
            let mut shell = CliShell::open(&self.connection, timeout).await?;
            for setup in self.os.session_setup() {
                shell.run(setup, self.command_timeout).await?;
            }
            info!(
                "CLI session on {} ready (prompt hostname {})",
                self.name,
                shell.hostname().unwrap_or("?")
            );
            self.shell = Some(shell);
        }

        Ok(())
    }

    fn shell_mut(&mut self) -> Result<&mut CliShell> {
        let (name, os) = (&self.name, self.os);
        self.shell.as_mut().ok_or_else(|| {
            NetdevMcpError::execution(format!(
                "device '{}' ({}) has no CLI shell; is it connected?",
                name, os
            ))
        })
    }
}

#[async_trait]
impl DeviceSession for SshDeviceSession {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connection.is_connected() && (!self.os.uses_cli_shell() || self.shell.is_some())
    }

    /// Transport, login, shell and pager setup share one deadline
    async fn connect(&mut self, timeout: Duration) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        match tokio::time::timeout(timeout, self.establish(timeout)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Connecting to {} did not finish within {:?}", self.name, timeout);
                self.disconnect().await?;
                Err(NetdevMcpError::connection(format!(
                    "Connection timeout after {:?}",
                    timeout
                )))
            }
        }
    }

    async fn execute(&mut self, command: &str) -> Result<String> {
        let timeout = self.command_timeout;
        if self.os.uses_cli_shell() {
            return self.shell_mut()?.run(command, timeout).await;
        }

        let output = self.connection.exec_command(command, timeout).await?;
        if !output.success() {
            debug!(
                "'{}' on {} exited with {:?}",
                command, self.name, output.exit_code
            );
        }
        Ok(output.combined_output())
    }

    async fn parse(&mut self, command: &str) -> Result<Value> {
        let grammars = Arc::clone(&self.grammars);
        let os = self.os;
        grammars.run_and_parse(self, os, command).await
    }

    async fn enable(&mut self) -> Result<()> {
        if !self.os.uses_cli_shell() {
            return Ok(());
        }
        let password = self.connection.config().enable_password.clone();
        let timeout = self.command_timeout;
        self.shell_mut()?.enable(password.as_deref(), timeout).await
    }

    async fn configure(&mut self, config: &str) -> Result<String> {
        if !self.os.uses_cli_shell() {
            return Err(NetdevMcpError::execution(format!(
                "device '{}' runs {}; configuration mode is only available on Cisco platforms",
                self.name, self.os
            )));
        }

        self.enable().await?;

        let lines: Vec<&str> = config.lines().collect();
        let timeout = self.command_timeout;
        self.shell_mut()?.configure(&lines, timeout).await
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(shell) = self.shell.take() {
            shell.close().await;
        }
        self.connection.close().await;
        Ok(())
    }
}
