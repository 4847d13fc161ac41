//! SSH transport for device sessions
//!
//! One [`SshConnection`] per dispatch. Cisco devices are driven through an
//! interactive [`CliShell`]; Linux hosts use plain exec channels.

pub mod command;
pub mod config;
pub mod connection;
pub mod handler;
pub mod session;
pub mod shell;

// Re-exports
pub use command::{escape_command_for_shell, CommandOutput};
pub use config::SshConfig;
pub use connection::SshConnection;
pub use handler::SshHandler;
pub use session::SshDeviceSession;
pub use shell::{CliShell, Prompt};
