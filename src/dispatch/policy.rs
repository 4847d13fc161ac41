//! Command-class allow/deny policy
//!
//! Checks run before any device is touched. A rejected request never
//! acquires a session.

use thiserror::Error;

use super::request::{CommandKind, CommandRequest};

/// Whitespace tokens that may not appear in a show command
pub const DISALLOWED_SHOW_TOKENS: [&str; 13] = [
    "|", "include", "exclude", "begin", "redirect", ">", "<", "config", "copy", "delete", "erase",
    "reload", "write",
];

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Command is empty.")]
    EmptyCommand,

    #[error("Command '{command}' is longer than the {limit} character limit.")]
    CommandTooLong { command: String, limit: usize },

    #[error("Empty configuration provided.")]
    EmptyConfiguration,

    #[error("Command '{0}' is not a 'show' command.")]
    NotShowCommand(String),

    #[error("Command '{command}' contains disallowed term '{token}'.")]
    DisallowedToken { command: String, token: String },

    #[error("Potentially dangerous command detected (erase). Operation aborted.")]
    DangerousCommand,

    #[error("Command '{0}' is not a 'ping' command.")]
    NotPingCommand(String),
}

/// Policy settings; only the length cap is configurable
#[derive(Debug, Clone, Copy, Default)]
pub struct Policy {
    max_chars: Option<usize>,
}

impl Policy {
    pub fn new(max_chars: Option<usize>) -> Self {
        Self { max_chars }
    }

    /// Check a request against its command class
    pub fn validate(&self, request: &CommandRequest) -> Result<(), PolicyError> {
        let raw = request.raw_command();

        if request.kind() == CommandKind::Config {
            if raw.trim().is_empty() {
                return Err(PolicyError::EmptyConfiguration);
            }
            if raw.to_lowercase().contains("erase") {
                return Err(PolicyError::DangerousCommand);
            }
            return Ok(());
        }

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PolicyError::EmptyCommand);
        }

        // class refusals take precedence over the length cap
        let lowered = trimmed.to_lowercase();
        match request.kind() {
            CommandKind::Show => {
                if !lowered.starts_with("show") {
                    return Err(PolicyError::NotShowCommand(raw.to_string()));
                }
                if let Some(token) = lowered
                    .split_whitespace()
                    .find(|part| DISALLOWED_SHOW_TOKENS.contains(part))
                {
                    return Err(PolicyError::DisallowedToken {
                        command: raw.to_string(),
                        token: token.to_string(),
                    });
                }
            }
            CommandKind::Ping if !lowered.starts_with("ping") => {
                return Err(PolicyError::NotPingCommand(raw.to_string()));
            }
            CommandKind::Ping | CommandKind::Linux | CommandKind::Config => {}
        }

        match self.max_chars {
            Some(limit) if trimmed.chars().count() > limit => Err(PolicyError::CommandTooLong {
                command: raw.to_string(),
                limit,
            }),
            _ => Ok(()),
        }
    }
}

/// Run commands with redirection or pipes through `sh -c`
pub fn wrap_linux_command(command: &str) -> String {
    if command.contains('>') || command.contains('|') {
        format!("sh -c \"{}\"", command)
    } else {
        command.to_string()
    }
}
