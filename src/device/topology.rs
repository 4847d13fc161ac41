//! Testbed (device topology) file
//!
//! The testbed is YAML in the familiar pyATS layout:
//!
//! ```yaml
//! testbed:
//!   name: lab
//!   credentials:
//!     default:
//!       username: admin
//!       password: "%ENV{LAB_PASSWORD}"
//! devices:
//!   R1:
//!     os: iosxe
//!     type: router
//!     credentials:
//!       enable:
//!         password: cisco
//!     connections:
//!       cli:
//!         protocol: ssh
//!         ip: 10.10.20.1
//!         port: 22
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::debug;

use super::platform::Os;
use crate::error::{NetdevMcpError, Result};

static ENV_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%ENV\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("ENV reference pattern is valid")
});

/// Connection names tried, in order, when no `defaults.via` is given
const PREFERRED_CONNECTIONS: [&str; 3] = ["cli", "ssh", "default"];

/// Parsed testbed file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub testbed: TestbedInfo,

    #[serde(default)]
    pub devices: BTreeMap<String, DeviceSpec>,
}

/// Testbed-wide settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestbedInfo {
    #[serde(default)]
    pub name: Option<String>,

    /// Credentials inherited by every device
    #[serde(default)]
    pub credentials: BTreeMap<String, Credential>,
}

/// One named credential set (`default`, `enable`, ...)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Path to an OpenSSH private key
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

/// One device entry
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSpec {
    /// Filled from the mapping key on load
    #[serde(skip)]
    pub name: String,

    /// Kept as written; checked against the supported platforms only when
    /// the device is actually used
    #[serde(default)]
    pub os: Option<String>,

    #[serde(default, rename = "type")]
    pub device_type: Option<String>,

    #[serde(default)]
    pub credentials: BTreeMap<String, Credential>,

    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionSpec>,
}

/// A connection entry; `defaults` carries only `via`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionSpec {
    #[serde(default)]
    pub protocol: Option<String>,

    #[serde(default)]
    pub ip: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub via: Option<String>,
}

/// Where to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

/// Resolved login material for one device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Login {
    pub username: String,
    pub password: Option<String>,
    pub key_file: Option<PathBuf>,
    pub enable_password: Option<String>,
}

impl Topology {
    /// Parse a testbed from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut topology: Topology = serde_yaml::from_str(text)
            .map_err(|e| NetdevMcpError::topology(format!("invalid testbed YAML: {}", e)))?;

        for (name, device) in topology.devices.iter_mut() {
            device.name = name.clone();
        }

        Ok(topology)
    }

    /// Read and parse a testbed file
    pub async fn load(path: &Path) -> Result<Self> {
        debug!("Loading testbed {}", path.display());
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            NetdevMcpError::topology(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    /// Look up a device by name
    pub fn get_device(&self, name: &str) -> Option<&DeviceSpec> {
        self.devices.get(name)
    }

    /// Resolve credentials for a device, falling back to testbed defaults
    pub fn login_for(&self, device: &DeviceSpec) -> Result<Login> {
        let inherited = self.testbed.credentials.get("default");
        let own = device.credentials.get("default");

        let pick = |field: fn(&Credential) -> Option<&String>| {
            own.and_then(field).or_else(|| inherited.and_then(field))
        };

        let username = pick(|c| c.username.as_ref()).ok_or_else(|| {
            NetdevMcpError::topology(format!("device '{}' has no username", device.name))
        })?;
        let password = pick(|c| c.password.as_ref()).map(|p| expand_env(p)).transpose()?;
        let key_file = own
            .and_then(|c| c.key_file.clone())
            .or_else(|| inherited.and_then(|c| c.key_file.clone()));

        if password.is_none() && key_file.is_none() {
            return Err(NetdevMcpError::topology(format!(
                "device '{}' has neither a password nor a key_file",
                device.name
            )));
        }

        let enable_password = device
            .credentials
            .get("enable")
            .or_else(|| self.testbed.credentials.get("enable"))
            .and_then(|c| c.password.as_deref())
            .map(expand_env)
            .transpose()?
            .or_else(|| password.clone());

        Ok(Login {
            username: expand_env(username)?,
            password,
            key_file,
            enable_password,
        })
    }
}

impl DeviceSpec {
    /// The platform this device is driven as
    pub fn platform(&self) -> Result<Os> {
        let name = self.os.as_deref().ok_or_else(|| {
            NetdevMcpError::topology(format!("device '{}' has no os", self.name))
        })?;
        Os::from_name(name).ok_or_else(|| {
            NetdevMcpError::topology(format!(
                "device '{}' runs unsupported os '{}'",
                self.name, name
            ))
        })
    }

    /// Pick the SSH connection to use
    pub fn endpoint(&self) -> Result<Endpoint> {
        let via = self
            .connections
            .get("defaults")
            .and_then(|d| d.via.as_deref());

        let chosen = match via {
            Some(name) => self.connections.get(name).ok_or_else(|| {
                NetdevMcpError::topology(format!(
                    "device '{}' defaults to connection '{}' which is not defined",
                    self.name, name
                ))
            })?,
            None => PREFERRED_CONNECTIONS
                .iter()
                .find_map(|name| self.connections.get(*name))
                .or_else(|| {
                    self.connections
                        .iter()
                        .find(|(name, c)| *name != "defaults" && c.ip.is_some())
                        .map(|(_, c)| c)
                })
                .ok_or_else(|| {
                    NetdevMcpError::topology(format!("device '{}' has no connections", self.name))
                })?,
        };

        let protocol = chosen.protocol.as_deref().unwrap_or("ssh");
        if !protocol.eq_ignore_ascii_case("ssh") {
            return Err(NetdevMcpError::topology(format!(
                "device '{}' uses unsupported protocol '{}'",
                self.name, protocol
            )));
        }

        let host = chosen.ip.as_deref().ok_or_else(|| {
            NetdevMcpError::topology(format!("device '{}' connection has no ip", self.name))
        })?;

        Ok(Endpoint {
            host: expand_env(host)?,
            port: chosen.port.unwrap_or(22),
        })
    }
}

/// Replace `%ENV{NAME}` references with environment values
pub fn expand_env(value: &str) -> Result<String> {
    let mut missing = None;
    let expanded = ENV_REF.replace_all(value, |caps: &Captures| {
        let name = &caps[1];
        std::env::var(name).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });

    match missing {
        Some(name) => Err(NetdevMcpError::topology(format!(
            "environment variable '{}' is not set",
            name
        ))),
        None => Ok(expanded.into_owned()),
    }
}
