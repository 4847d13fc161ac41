use std::fmt;

/// Command class; decides which policy checks apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Show,
    Ping,
    Config,
    Linux,
}

impl CommandKind {
    /// Prefix put in front of execution errors for this class
    pub fn error_prefix(self) -> &'static str {
        match self {
            CommandKind::Show => "Execution error",
            CommandKind::Ping => "Ping execution error",
            CommandKind::Config => "Configuration error",
            CommandKind::Linux => "Linux command execution error",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Show => "show",
            CommandKind::Ping => "ping",
            CommandKind::Config => "config",
            CommandKind::Linux => "linux",
        };
        f.write_str(name)
    }
}

/// One command aimed at one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    device_name: String,
    raw_command: String,
    kind: CommandKind,
}

impl CommandRequest {
    pub fn new(
        device_name: impl Into<String>,
        raw_command: impl Into<String>,
        kind: CommandKind,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            raw_command: raw_command.into(),
            kind,
        }
    }

    pub fn show(device_name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(device_name, command, CommandKind::Show)
    }

    pub fn ping(device_name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(device_name, command, CommandKind::Ping)
    }

    pub fn linux(device_name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(device_name, command, CommandKind::Linux)
    }

    pub fn config(device_name: impl Into<String>, block: impl Into<String>) -> Self {
        Self::new(device_name, block, CommandKind::Config)
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// The command text exactly as the caller sent it
    pub fn raw_command(&self) -> &str {
        &self.raw_command
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }
}
