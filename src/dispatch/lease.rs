//! Scoped session acquisition
//!
//! A [`SessionLease`] owns the session for one dispatch. `release` disconnects
//! explicitly; if the lease is dropped instead (early return, panic), the
//! disconnect is scheduled on the current runtime.

use tracing::{debug, warn};

use crate::device::{DeviceSession, SessionProvider};
use crate::error::{NetdevMcpError, Result};

pub struct SessionLease {
    device: String,
    session: Option<Box<dyn DeviceSession>>,
}

impl SessionLease {
    /// Open a session for `device_name`; no connection is made yet
    pub async fn acquire(sessions: &dyn SessionProvider, device_name: &str) -> Result<Self> {
        let session = sessions.open(device_name).await?;
        debug!("Session for {} acquired", device_name);
        Ok(Self {
            device: device_name.to_string(),
            session: Some(session),
        })
    }

    pub fn session(&mut self) -> Result<&mut dyn DeviceSession> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(NetdevMcpError::execution(format!(
                "session for '{}' already released",
                self.device
            ))),
        }
    }

    /// Disconnect and give the session up
    pub async fn release(mut self) {
        if let Some(mut session) = self.session.take() {
            disconnect(session.as_mut(), &self.device).await;
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        let device = std::mem::take(&mut self.device);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("Lease for {} dropped unreleased; disconnecting in background", device);
                runtime.spawn(async move {
                    disconnect(session.as_mut(), &device).await;
                });
            }
            Err(_) => warn!("No runtime to disconnect {}; dropping the session", device),
        }
    }
}

async fn disconnect(session: &mut dyn DeviceSession, device: &str) {
    match session.disconnect().await {
        Ok(()) => debug!("Session for {} released", device),
        Err(e) => warn!("Disconnect error {}: {}", device, e),
    }
}
