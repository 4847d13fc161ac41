//! Interactive CLI shell for Cisco platforms
//!
//! IOS-style devices do not run commands on exec channels reliably, so the
//! session opens a PTY shell and drives it by prompt detection: send a line,
//! read until the buffer ends in a prompt (`R1>`, `R1#`, `R1(config-if)#`).

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use russh::client;
use russh::{Channel, ChannelMsg};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::connection::SshConnection;
use crate::error::{NetdevMcpError, Result};
use crate::text::clean_output;

static PROMPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<host>[\w.\-/:@]+)(?P<mode>\([\w.\-]+\))?(?P<symbol>[>#])\s*$")
        .expect("CLI prompt pattern is valid")
});

/// Device replies that mean a configuration line was rejected
const CONFIG_ERROR_MARKERS: [&str; 3] = [
    "% Invalid input",
    "% Incomplete command",
    "% Ambiguous command",
];

/// Device replies that mean `enable` was refused
const ENABLE_FAILURE_MARKERS: [&str; 3] = ["% access denied", "% bad secrets", "% no password set"];

/// Poll interval while waiting for channel data
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A prompt seen at the end of the read buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub hostname: String,
    pub config_mode: bool,
    pub privileged: bool,
}

impl Prompt {
    /// Detect a prompt on the last line of `buffer`
    pub fn at_end_of(buffer: &str) -> Option<Self> {
        let last_line = buffer
            .rsplit(|c| c == '\n' || c == '\r')
            .next()
            .unwrap_or(buffer);
        let cleaned = clean_output(last_line);
        let caps = PROMPT.captures(cleaned.trim_start())?;
        Some(Self {
            hostname: caps["host"].to_string(),
            config_mode: caps.name("mode").is_some(),
            privileged: &caps["symbol"] == "#",
        })
    }
}

/// PTY shell on one device
pub struct CliShell {
    channel: Channel<client::Msg>,
    prompt: Option<Prompt>,
}

impl CliShell {
    /// Open a PTY shell and wait for the first prompt
    pub async fn open(connection: &SshConnection, timeout: Duration) -> Result<Self> {
        let channel = connection.open_channel().await?;

        channel
            .request_pty(true, "vt100", 511, 24, 0, 0, &[])
            .await
            .map_err(|e| NetdevMcpError::connection(format!("Failed to request PTY: {}", e)))?;

        channel
            .request_shell(true)
            .await
            .map_err(|e| NetdevMcpError::connection(format!("Failed to request shell: {}", e)))?;

        let mut shell = Self {
            channel,
            prompt: None,
        };
        shell.read_until_prompt(timeout).await?;

        debug!(
            "CLI shell ready on {}",
            shell.hostname().unwrap_or("<unknown>")
        );

        Ok(shell)
    }

    /// Hostname learned from the prompt
    pub fn hostname(&self) -> Option<&str> {
        self.prompt.as_ref().map(|p| p.hostname.as_str())
    }

    /// Whether the last prompt was a privileged (`#`) prompt
    pub fn is_privileged(&self) -> bool {
        self.prompt.as_ref().is_some_and(|p| p.privileged)
    }

    /// Send one command and return its output without echo and prompt
    pub async fn run(&mut self, command: &str, timeout: Duration) -> Result<String> {
        self.send_line(command).await?;
        let raw = self.read_until_prompt(timeout).await?;
        Ok(strip_echo_and_prompt(&raw))
    }

    /// Enter privileged mode, answering the password prompt if asked
    pub async fn enable(&mut self, password: Option<&str>, timeout: Duration) -> Result<()> {
        if self.is_privileged() {
            return Ok(());
        }

        self.send_line("enable").await?;

        let deadline = Instant::now() + timeout;
        let mut buffer = String::new();
        let mut password_sent = false;

        loop {
            let Some(chunk) = self.next_chunk(deadline, timeout).await? else {
                continue;
            };
            buffer.push_str(&chunk);
            let lowered = buffer.to_lowercase();

            if ENABLE_FAILURE_MARKERS.iter().any(|m| lowered.contains(m)) {
                return Err(NetdevMcpError::auth(format!(
                    "enable refused: {}",
                    clean_output(buffer.trim())
                )));
            }

            if let Some(prompt) = Prompt::at_end_of(&buffer) {
                let privileged = prompt.privileged;
                self.prompt = Some(prompt);
                if privileged {
                    debug!("Privileged prompt reached");
                    return Ok(());
                }
                if password_sent {
                    return Err(NetdevMcpError::auth("enable secret rejected"));
                }
            }

            if !password_sent && lowered.trim_end().ends_with("password:") {
                let password = password.ok_or_else(|| {
                    NetdevMcpError::auth("device asked for an enable secret but none is configured")
                })?;
                self.send_line(password).await?;
                password_sent = true;
                buffer.clear();
            }
        }
    }

    /// Apply configuration lines inside `configure terminal`
    ///
    /// Every line is sent even after a rejection so the device always gets
    /// back to exec mode; the first rejected line fails the call.
    pub async fn configure(&mut self, lines: &[&str], timeout: Duration) -> Result<String> {
        let mut transcript = String::new();
        let mut rejected: Option<String> = None;

        transcript.push_str(&self.run("configure terminal", timeout).await?);

        for line in lines.iter().map(|l| l.trim_end()).filter(|l| !l.trim().is_empty()) {
            let reply = self.run(line, timeout).await?;
            if rejected.is_none() && CONFIG_ERROR_MARKERS.iter().any(|m| reply.contains(m)) {
                warn!("Configuration line rejected: {}", line);
                rejected = Some(format!("{}: {}", line.trim(), reply.trim()));
            }
            append_line(&mut transcript, line);
            if !reply.is_empty() {
                append_line(&mut transcript, &reply);
            }
        }

        let tail = self.run("end", timeout).await?;
        if !tail.is_empty() {
            append_line(&mut transcript, &tail);
        }

        match rejected {
            Some(detail) => Err(NetdevMcpError::execution(format!(
                "Configuration rejected by device: {}",
                detail
            ))),
            None => Ok(transcript),
        }
    }

    /// Close the shell channel
    pub async fn close(self) {
        if let Err(e) = self.channel.eof().await {
            debug!("Shell EOF reported: {}", e);
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.channel
            .data(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| NetdevMcpError::execution(format!("Failed to send command: {}", e)))
    }

    /// Read until the buffer ends in a prompt
    async fn read_until_prompt(&mut self, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let mut buffer = String::new();

        loop {
            let Some(chunk) = self.next_chunk(deadline, timeout).await? else {
                continue;
            };
            buffer.push_str(&chunk);

            if let Some(prompt) = Prompt::at_end_of(&buffer) {
                self.prompt = Some(prompt);
                return Ok(buffer);
            }
        }
    }

    /// Next piece of output; `None` when the poll interval passed quietly
    async fn next_chunk(&mut self, deadline: Instant, timeout: Duration) -> Result<Option<String>> {
        if Instant::now() > deadline {
            return Err(NetdevMcpError::Timeout(timeout.as_millis() as u64));
        }

        match tokio::time::timeout(POLL_INTERVAL, self.channel.wait()).await {
            Ok(Some(ChannelMsg::Data { data })) | Ok(Some(ChannelMsg::ExtendedData { data, .. })) => {
                Ok(Some(String::from_utf8_lossy(&data).into_owned()))
            }
            Ok(Some(ChannelMsg::Close)) | Ok(Some(ChannelMsg::Eof)) | Ok(None) => Err(
                NetdevMcpError::execution("Shell channel closed by device"),
            ),
            Ok(Some(_)) | Err(_) => Ok(None),
        }
    }
}

fn append_line(transcript: &mut String, line: &str) {
    if !transcript.is_empty() && !transcript.ends_with('\n') {
        transcript.push('\n');
    }
    transcript.push_str(line);
}

/// Drop the echoed command (first line) and the trailing prompt (last line)
pub fn strip_echo_and_prompt(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "");
    let lines: Vec<&str> = normalized.lines().collect();
    if lines.len() > 2 {
        lines[1..lines.len() - 1].join("\n")
    } else {
        String::new()
    }
}
