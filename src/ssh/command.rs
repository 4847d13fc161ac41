//! Command execution over an SSH exec channel
//!
//! Used for Linux hosts: one channel per command, stdout/stderr collected
//! until the channel closes, bounded by a timeout.

use std::time::Duration;

use russh::ChannelMsg;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use super::connection::SshConnection;
use crate::error::{NetdevMcpError, Result};

/// What a Linux host returned for one command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,

    /// Absent when the host closed the channel without reporting a status
    pub exit_code: Option<u32>,
}

impl CommandOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit status 0, or no status reported
    pub fn success(&self) -> bool {
        self.exit_code.is_none_or(|code| code == 0)
    }

    /// Both streams as one capture, stdout first
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

impl SshConnection {
    /// Execute a command on a fresh exec channel
    ///
    /// On timeout a best-effort `pkill -f` for the command is sent on
    /// another channel before returning `Timeout`.
    pub async fn exec_command(
        &self,
        command: &str,
        timeout_duration: Duration,
    ) -> Result<CommandOutput> {
        let channel = self.open_channel().await?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| NetdevMcpError::execution(format!("Failed to exec command: {}", e)))?;

        match timeout(timeout_duration, collect_channel_output(channel)).await {
            Ok(output) => output,
            Err(_) => {
                warn!(
                    "Command timed out after {}ms, attempting abort",
                    timeout_duration.as_millis()
                );
                self.abort_command(command).await;
                Err(NetdevMcpError::Timeout(timeout_duration.as_millis() as u64))
            }
        }
    }

    /// Attempt to abort a running command by killing matching processes
    async fn abort_command(&self, command: &str) {
        let channel = match self.open_channel().await {
            Ok(ch) => ch,
            Err(e) => {
                error!("Failed to open channel for abort: {}", e);
                return;
            }
        };

        let abort_cmd = format!(
            "timeout 3s pkill -f '{}' 2>/dev/null || true",
            escape_command_for_shell(command)
        );

        debug!("Sending abort command: {}", abort_cmd);

        if let Err(e) = channel.exec(true, abort_cmd.as_str()).await {
            error!("Failed to exec abort command: {}", e);
            return;
        }

        let _ = timeout(Duration::from_secs(5), async {
            let mut channel = channel;
            while let Some(msg) = channel.wait().await {
                if matches!(msg, ChannelMsg::Close | ChannelMsg::Eof) {
                    break;
                }
            }
        })
        .await;
    }
}

/// Drain an exec channel into a [`CommandOutput`]
async fn collect_channel_output(
    mut channel: russh::Channel<russh::client::Msg>,
) -> Result<CommandOutput> {
    let mut output = CommandOutput::new();

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => output.stdout.push_str(&String::from_utf8_lossy(&data)),
            // stream 1 is stderr; anything else is folded into stdout
            ChannelMsg::ExtendedData { data, ext: 1 } => {
                output.stderr.push_str(&String::from_utf8_lossy(&data))
            }
            ChannelMsg::ExtendedData { data, .. } => {
                output.stdout.push_str(&String::from_utf8_lossy(&data))
            }
            ChannelMsg::ExitStatus { exit_status } => output.exit_code = Some(exit_status),
            ChannelMsg::ExitSignal { signal_name, .. } => {
                debug!("Remote command killed by signal {:?}", signal_name);
            }
            ChannelMsg::Close | ChannelMsg::Eof => break,
            _ => {}
        }
    }

    debug!(
        "exec finished: exit={:?} stdout={}B stderr={}B",
        output.exit_code,
        output.stdout.len(),
        output.stderr.len()
    );

    Ok(output)
}

/// Escape a command for use inside single quotes
///
/// ```
/// use netdev_mcp::ssh::escape_command_for_shell;
///
/// assert_eq!(escape_command_for_shell("echo 'hi'"), "echo '\"'\"'hi'\"'\"'");
/// ```
pub fn escape_command_for_shell(command: &str) -> String {
    command.replace('\'', "'\"'\"'")
}
