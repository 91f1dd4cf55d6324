//! Standalone collaborators.
//!
//! Real deployments plug in the provisioning workflow and the device
//! command channel; these stand-ins let the daemon run end to end on a
//! single host.

use chrono::Utc;
use tracing::info;

use fleet_housekeeping::{BoxFuture, DeviceWriter, Provisioner};
use fleet_state::{ApplianceRecord, DeviceRef, StateStore};

/// Registers a new spare appliance record directly in the state store.
pub struct StandaloneProvisioner {
    state: StateStore,
}

impl StandaloneProvisioner {
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }
}

impl Provisioner for StandaloneProvisioner {
    fn request_new_appliance(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let id = uuid::Uuid::new_v4().to_string();
            let device_name = format!("spare-{}", &id[..8]);
            let record = ApplianceRecord::new(&id, "", device_name, "0.0.0.0", "shared", Utc::now());
            self.state.put_appliance(&record)?;
            info!(%id, "spare appliance registered");
            Ok(())
        })
    }
}

/// Logs each device partition instead of talking to it.
pub struct LoggingDeviceWriter;

impl DeviceWriter for LoggingDeviceWriter {
    fn persist<'a>(&'a self, devices: &'a [DeviceRef]) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            for device in devices {
                info!(
                    %device,
                    id = %device.id,
                    user = %device.credentials.username,
                    "write memory"
                );
            }
            Ok(())
        })
    }
}
