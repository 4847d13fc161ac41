//! Configuration and CLI argument parsing for the network device MCP server

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{NetdevMcpError, Result};

/// Default connection timeout in seconds (connect + login + first prompt)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 120;

/// Default timeout for a single command in milliseconds
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 60_000; // 60 seconds

/// Default max characters for a single-line command (None = unlimited)
pub const DEFAULT_MAX_CHARS: Option<usize> = Some(1000);

/// Default compact serialization command; input and output paths are appended
pub const DEFAULT_COMPACT_COMMAND: &str = "npx @toon-format/cli";

/// Network device MCP Server CLI Arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "netdev-mcp")]
#[command(version)]
#[command(
    about = "MCP server exposing guarded show/ping/config commands on Cisco network devices"
)]
pub struct Args {
    /// Path to the testbed (device topology) YAML file
    #[arg(long, env = "NETDEV_MCP_TESTBED")]
    pub testbed: PathBuf,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, env = "NETDEV_MCP_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Per-command timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_COMMAND_TIMEOUT_MS, env = "NETDEV_MCP_COMMAND_TIMEOUT")]
    pub command_timeout: u64,

    /// Maximum characters for show/ping/linux command length.
    /// Use "none", "0", or negative value to disable limit.
    /// Default: 1000
    #[arg(long = "maxChars", env = "NETDEV_MCP_MAX_CHARS")]
    pub max_chars: Option<String>,

    /// Compact serialization command (program followed by its arguments)
    #[arg(long, default_value = DEFAULT_COMPACT_COMMAND, env = "NETDEV_MCP_COMPACT_COMMAND")]
    pub compact_command: String,

    /// Disable the configure_device tool
    #[arg(long, default_value = "false", env = "NETDEV_MCP_DISABLE_CONFIGURE")]
    pub disable_configure: bool,
}

/// Parsed and validated configuration
///
/// Built once in `main` and shared for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Testbed file path, checked to exist at startup
    pub testbed: PathBuf,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Command timeout
    pub command_timeout: Duration,

    /// Maximum command length (None = unlimited)
    pub max_chars: Option<usize>,

    /// Compact serialization program
    pub compact_program: String,

    /// Arguments placed before the input/output paths
    pub compact_args: Vec<String>,

    /// Whether the configure_device tool is disabled
    pub disable_configure: bool,
}

impl Config {
    /// Create Config from CLI Args
    pub fn from_args(args: Args) -> Result<Self> {
        validate_args(&args)?;

        let max_chars = parse_max_chars(args.max_chars.as_deref());
        let (compact_program, compact_args) = split_command_line(&args.compact_command)?;

        Ok(Config {
            testbed: args.testbed,
            connect_timeout: Duration::from_secs(args.connect_timeout),
            command_timeout: Duration::from_millis(args.command_timeout),
            max_chars,
            compact_program,
            compact_args,
            disable_configure: args.disable_configure,
        })
    }
}

/// Validate CLI arguments
fn validate_args(args: &Args) -> Result<()> {
    let mut errors = Vec::new();

    if args.testbed.as_os_str().is_empty() {
        errors.push("Missing required --testbed".to_string());
    } else if !args.testbed.is_file() {
        errors.push(format!(
            "Testbed file not found: {}",
            args.testbed.display()
        ));
    }

    if args.connect_timeout == 0 {
        errors.push("--connect-timeout must be greater than zero".to_string());
    }

    if args.command_timeout == 0 {
        errors.push("--command-timeout must be greater than zero".to_string());
    }

    if !errors.is_empty() {
        return Err(NetdevMcpError::Config(format!(
            "Configuration error:\n{}",
            errors.join("\n")
        )));
    }

    Ok(())
}

/// Parse max_chars argument
///
/// - "none" (case-insensitive) → None (unlimited)
/// - "0" or negative → None (unlimited)
/// - positive integer → Some(value)
/// - None (not provided) → DEFAULT_MAX_CHARS
pub fn parse_max_chars(value: Option<&str>) -> Option<usize> {
    match value {
        None => DEFAULT_MAX_CHARS,
        Some(s) => {
            let lowered = s.to_lowercase();
            if lowered == "none" {
                return None;
            }

            match s.parse::<i64>() {
                Ok(n) if n <= 0 => None,
                Ok(n) => Some(n as usize),
                Err(_) => DEFAULT_MAX_CHARS,
            }
        }
    }
}

/// Split the compact command into program and leading arguments
fn split_command_line(command: &str) -> Result<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| NetdevMcpError::config("--compact-command cannot be empty"))?;
    Ok((program, parts.collect()))
}
