//! SSH connection to one device
//!
//! Owns a single russh session handle for the lifetime of one dispatch:
//! connect, authenticate, hand out channels, disconnect.

use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use russh::Channel;
use tokio::time::timeout;
use tracing::{debug, error, info};

use super::config::SshConfig;
use super::handler::SshHandler;
use crate::error::{NetdevMcpError, Result};

/// SSH connection
///
/// Not shared between dispatches; each call builds its own.
pub struct SshConnection {
    /// SSH configuration
    config: SshConfig,

    /// Active SSH session handle
    session: Option<Handle<SshHandler>>,
}

impl SshConnection {
    /// Create an unconnected SSH connection
    pub fn new(config: SshConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Connection parameters
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Establish the SSH connection
    ///
    /// If already connected, returns immediately. TCP connect and
    /// authentication together are bounded by `connect_timeout`.
    pub async fn connect(&mut self, connect_timeout: Duration) -> Result<()> {
        if self.is_connected() {
            debug!("Already connected to {}", self.config.host);
            return Ok(());
        }

        info!(
            "Connecting to SSH server {}:{}...",
            self.config.host, self.config.port
        );

        let session = match timeout(connect_timeout, self.do_connect()).await {
            Ok(result) => result?,
            Err(_) => {
                error!(
                    "SSH connection to {} timed out after {:?}",
                    self.config.host, connect_timeout
                );
                return Err(NetdevMcpError::connection(format!(
                    "Connection timeout after {:?}",
                    connect_timeout
                )));
            }
        };

        self.session = Some(session);

        info!(
            "Successfully connected to {}@{}:{}",
            self.config.username, self.config.host, self.config.port
        );

        Ok(())
    }

    /// Internal connection logic
    async fn do_connect(&self) -> Result<Handle<SshHandler>> {
        let ssh_config = Arc::new(client::Config::default());

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let mut session = client::connect(
            ssh_config,
            addr.as_str(),
            SshHandler::new(&self.config.host),
        )
        .await
        .map_err(|e| {
            error!("SSH connection to {} failed: {}", addr, e);
            NetdevMcpError::connection(e.to_string())
        })?;

        self.authenticate(&mut session).await?;

        Ok(session)
    }

    /// Authenticate with the SSH server
    async fn authenticate(&self, session: &mut Handle<SshHandler>) -> Result<()> {
        // Try password authentication first
        if let Some(ref password) = self.config.password {
            debug!(
                "Attempting password authentication for user '{}'",
                self.config.username
            );
            let auth_result = session
                .authenticate_password(&self.config.username, password)
                .await
                .map_err(|e| NetdevMcpError::auth(e.to_string()))?;

            if auth_result.success() {
                debug!("Password authentication successful");
                return Ok(());
            }

            // Fall through to key auth when both are configured
            if self.config.private_key.is_none() {
                return Err(NetdevMcpError::auth("Password authentication rejected"));
            }
        }

        if let Some(ref key_content) = self.config.private_key {
            debug!(
                "Attempting key authentication for user '{}'",
                self.config.username
            );

            let key = russh::keys::PrivateKey::from_openssh(key_content.as_bytes())
                .map_err(|e| NetdevMcpError::SshKey(format!("Failed to parse private key: {}", e)))?;

            let key_with_alg = PrivateKeyWithHashAlg::new(Arc::new(key), None);

            let auth_result = session
                .authenticate_publickey(&self.config.username, key_with_alg)
                .await
                .map_err(|e| NetdevMcpError::auth(e.to_string()))?;

            if auth_result.success() {
                debug!("Key authentication successful");
                return Ok(());
            }
            return Err(NetdevMcpError::auth("Key authentication rejected"));
        }

        Err(NetdevMcpError::auth(
            "No authentication method available (require password or private_key)",
        ))
    }

    /// Check if the connection is active
    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.is_closed())
    }

    /// Open a new session channel
    pub async fn open_channel(&self) -> Result<Channel<client::Msg>> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| NetdevMcpError::connection("SSH connection not established"))?;

        session
            .channel_open_session()
            .await
            .map_err(|e| NetdevMcpError::connection(format!("Failed to open channel: {}", e)))
    }

    /// Close the SSH connection
    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session
                .disconnect(russh::Disconnect::ByApplication, "", "")
                .await
            {
                debug!("Disconnect from {} reported: {}", self.config.host, e);
            }
            info!("SSH connection to {} closed", self.config.host);
        }
    }
}

impl std::fmt::Debug for SshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("username", &self.config.username)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_creation() {
        let config = SshConfig::new("localhost", "testuser")
            .with_port(22)
            .with_password("testpass");

        let connection = SshConnection::new(config);

        assert!(!connection.is_connected());
        assert_eq!(connection.config().username, "testuser");
    }

    #[tokio::test]
    async fn test_open_channel_requires_connection() {
        let connection = SshConnection::new(SshConfig::new("localhost", "testuser"));
        let result = connection.open_channel().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_close_without_connection_is_noop() {
        let mut connection = SshConnection::new(SshConfig::new("localhost", "testuser"));
        connection.close().await;
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 1 on loopback is closed on any sane test host
        let mut connection =
            SshConnection::new(SshConfig::new("127.0.0.1", "testuser").with_port(1).with_password("x"));
        let result = connection.connect(Duration::from_secs(5)).await;
        assert!(matches!(result, Err(NetdevMcpError::Connection(_))));
        assert!(!connection.is_connected());
    }
}
