//! Error types for the network device MCP server

use thiserror::Error;

use crate::dispatch::PolicyError;

/// Main error type for the network device MCP server
#[derive(Debug, Error)]
pub enum NetdevMcpError {
    /// Command rejected by the dispatch policy; never reaches a device
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// SSH connection failed
    #[error("SSH connection error: {0}")]
    Connection(String),

    /// Authentication failed (password, key, or enable secret)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Connection or command timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Device name not present in the testbed
    #[error("Device '{0}' not in testbed")]
    DeviceNotFound(String),

    /// Testbed file missing, unreadable or malformed
    #[error("Testbed error: {0}")]
    Topology(String),

    /// No grammar for the command, or the output did not match it
    #[error("Parse failed: {0}")]
    Parse(String),

    /// Remote or transport fault while running a command
    #[error("{0}")]
    Execution(String),

    /// Compact serialization subprocess failed
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// SSH key parsing error
    #[error("SSH key error: {0}")]
    SshKey(String),
}

/// Result type alias using NetdevMcpError
pub type Result<T> = std::result::Result<T, NetdevMcpError>;

impl NetdevMcpError {
    /// Create a connection error from a string
    pub fn connection(msg: impl Into<String>) -> Self {
        NetdevMcpError::Connection(msg.into())
    }

    /// Create an authentication error from a string
    pub fn auth(msg: impl Into<String>) -> Self {
        NetdevMcpError::Authentication(msg.into())
    }

    /// Create a testbed error from a string
    pub fn topology(msg: impl Into<String>) -> Self {
        NetdevMcpError::Topology(msg.into())
    }

    /// Create a parse error from a string
    pub fn parse(msg: impl Into<String>) -> Self {
        NetdevMcpError::Parse(msg.into())
    }

    /// Create an execution error from a string
    pub fn execution(msg: impl Into<String>) -> Self {
        NetdevMcpError::Execution(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        NetdevMcpError::Config(msg.into())
    }
}
