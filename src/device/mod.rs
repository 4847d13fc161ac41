//! Device session seams and the testbed-backed implementation
//!
//! The dispatcher only talks to [`SessionProvider`] and [`DeviceSession`].
//! [`TestbedSessions`] is the production provider: it reloads the testbed on
//! every call and hands out SSH-backed sessions.

pub mod platform;
pub mod testbed;
pub mod topology;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use platform::Os;
pub use testbed::TestbedSessions;
pub use topology::{DeviceSpec, Topology};

/// One session to one device, opened and closed within a single dispatch
#[async_trait]
pub trait DeviceSession: Send {
    /// Device name as it appears in the testbed
    fn name(&self) -> &str;

    /// Whether the session currently holds a live connection
    fn is_connected(&self) -> bool;

    /// Connect; a no-op when already connected
    async fn connect(&mut self, timeout: Duration) -> Result<()>;

    /// Run a command and return its raw text output
    async fn execute(&mut self, command: &str) -> Result<String>;

    /// Run a command and parse its output with the platform grammar.
    ///
    /// Fails with a parse error when no grammar exists or the output does
    /// not match the expected shape.
    async fn parse(&mut self, command: &str) -> Result<Value>;

    /// Enter privileged mode
    async fn enable(&mut self) -> Result<()>;

    /// Apply a configuration block and return the device transcript
    async fn configure(&mut self, config: &str) -> Result<String>;

    /// Drop the connection
    async fn disconnect(&mut self) -> Result<()>;
}

/// Resolves device names to fresh, unconnected sessions
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open a session for `device_name`
    async fn open(&self, device_name: &str) -> Result<Box<dyn DeviceSession>>;
}
