//! Network device MCP Server - guarded command dispatch for Cisco devices
//!
//! This crate provides an MCP server that runs commands on Cisco IOS, IOS-XE
//! and NX-OS devices (and Linux hosts) named in a testbed YAML file. Every
//! request passes a command-class policy before any device is touched; show
//! and ping output is parsed into structured records where a grammar exists
//! and returned raw otherwise.
//!
//! # MCP Tools
//!
//! - `run_show_command` - `show` commands only; pipes and output modifiers are refused
//! - `configure_device` - apply a configuration block (can be disabled with `--disable-configure`)
//! - `show_running_config` - `show run brief`, cleaned
//! - `show_logging` - `show logging last 250`, cleaned
//! - `ping_from_network_device` - `ping` commands only
//! - `run_linux_command` - any command on a Linux host
//!
//! Results are returned TOON-encoded with a token-savings note.
//!
//! # Example Usage (CLI)
//!
//! ```bash
//! netdev-mcp --testbed=testbed.yaml
//! ```
//!
//! # Example Usage (MCP Inspector)
//!
//! ```bash
//! npx @modelcontextprotocol/inspector ./target/release/netdev-mcp -- \
//!   --testbed=testbed.yaml --maxChars=none
//! ```

pub mod compact;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod parse;
pub mod server;
pub mod ssh;
pub mod text;
pub mod tools;

// Re-exports for convenience
pub use config::{Args, Config};
pub use device::{DeviceSession, Os, SessionProvider, TestbedSessions, Topology};
pub use dispatch::{CommandKind, CommandRequest, Dispatcher, PolicyError, ResultEnvelope, Status};
pub use error::{NetdevMcpError, Result};
pub use server::NetdevMcpServer;
pub use ssh::{CommandOutput, SshConfig, SshConnection, SshDeviceSession, SshHandler};
pub use tools::{CommandParams, ConfigureParams, DeviceParams, ToolName};
