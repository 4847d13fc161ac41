//! Testbed-backed session provider

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::platform::Os;
use super::topology::Topology;
use super::{DeviceSession, SessionProvider};
use crate::error::{NetdevMcpError, Result};
use crate::parse::GrammarRegistry;
use crate::ssh::{SshConfig, SshDeviceSession};

/// Opens SSH sessions for devices named in a testbed file
///
/// The file is read on every `open`, so edits take effect without a restart.
#[derive(Clone)]
pub struct TestbedSessions {
    path: PathBuf,
    grammars: Arc<GrammarRegistry>,
    command_timeout: Duration,
}

impl TestbedSessions {
    pub fn new(path: impl Into<PathBuf>, command_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            grammars: Arc::new(GrammarRegistry::with_defaults()),
            command_timeout,
        }
    }

    /// Build the SSH parameters for one device
    pub async fn ssh_config_for(&self, device_name: &str) -> Result<(SshConfig, Os)> {
        let topology = Topology::load(&self.path).await?;
        let device = topology
            .get_device(device_name)
            .ok_or_else(|| NetdevMcpError::DeviceNotFound(device_name.to_string()))?;

        let os = device.platform()?;
        let endpoint = device.endpoint()?;
        let login = topology.login_for(device)?;

        let mut config = SshConfig::new(endpoint.host, login.username).with_port(endpoint.port);
        if let Some(password) = login.password {
            config = config.with_password(password);
        }
        if let Some(path) = login.key_file {
            let key = tokio::fs::read_to_string(&path).await.map_err(|e| {
                NetdevMcpError::SshKey(format!("cannot read key file {}: {}", path.display(), e))
            })?;
            config = config.with_private_key(key);
        }
        if let Some(secret) = login.enable_password {
            config = config.with_enable_password(secret);
        }

        Ok((config, os))
    }
}

#[async_trait]
impl SessionProvider for TestbedSessions {
    async fn open(&self, device_name: &str) -> Result<Box<dyn DeviceSession>> {
        let (config, os) = self.ssh_config_for(device_name).await?;
        debug!(
            "Resolved {} ({}) to {}@{}:{}",
            device_name, os, config.username, config.host, config.port
        );

        Ok(Box::new(SshDeviceSession::new(
            device_name,
            os,
            config,
            Arc::clone(&self.grammars),
            self.command_timeout,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TESTBED: &str = r#"
testbed:
  credentials:
    default:
      username: admin
      password: admin
devices:
  R1:
    os: iosxe
    connections:
      cli:
        protocol: ssh
        ip: 10.10.20.48
        port: 8181
  ubuntu:
    os: linux
    credentials:
      default:
        username: ubuntu
        key_file: /nonexistent/id_ed25519
    connections:
      cli:
        ip: 10.10.20.50
  XR1:
    os: iosxr
    connections:
      cli:
        ip: 10.10.20.60
"#;

    fn write_testbed() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), TESTBED).unwrap();
        file
    }

    #[tokio::test]
    async fn test_resolves_ssh_config() {
        let file = write_testbed();
        let sessions = TestbedSessions::new(file.path(), Duration::from_secs(5));

        let (config, os) = sessions.ssh_config_for("R1").await.unwrap();
        assert_eq!(os, Os::Iosxe);
        assert_eq!(config.host, "10.10.20.48");
        assert_eq!(config.port, 8181);
        assert_eq!(config.username, "admin");
        assert_eq!(config.password.as_deref(), Some("admin"));
        assert_eq!(config.enable_password.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_unknown_device() {
        let file = write_testbed();
        let sessions = TestbedSessions::new(file.path(), Duration::from_secs(5));

        let err = sessions.open("R9").await.err().unwrap();
        assert!(matches!(err, NetdevMcpError::DeviceNotFound(ref name) if name == "R9"));
    }

    #[tokio::test]
    async fn test_unsupported_os_rejects_only_that_device() {
        let file = write_testbed();
        let sessions = TestbedSessions::new(file.path(), Duration::from_secs(5));

        let (_, os) = sessions.ssh_config_for("R1").await.unwrap();
        assert_eq!(os, Os::Iosxe);

        let err = sessions.open("XR1").await.err().unwrap();
        assert!(matches!(err, NetdevMcpError::Topology(_)));
        assert!(err.to_string().contains("unsupported os 'iosxr'"));
    }

    #[tokio::test]
    async fn test_missing_key_file() {
        let file = write_testbed();
        let sessions = TestbedSessions::new(file.path(), Duration::from_secs(5));

        let err = sessions.open("ubuntu").await.err().unwrap();
        assert!(matches!(err, NetdevMcpError::SshKey(_)));
    }

    #[tokio::test]
    async fn test_open_returns_unconnected_session() {
        let file = write_testbed();
        let sessions = TestbedSessions::new(file.path(), Duration::from_secs(5));

        let session = sessions.open("R1").await.unwrap();
        assert_eq!(session.name(), "R1");
        assert!(!session.is_connected());
    }
}
