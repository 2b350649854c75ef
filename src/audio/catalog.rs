//! Input device enumeration.

use std::sync::Arc;
use tracing::{debug, warn};

use super::host::{AudioHost, InputDevice};

/// Owns the process-wide audio host handle and answers device queries.
#[derive(Clone)]
pub struct DeviceCatalog {
    host: Arc<dyn AudioHost>,
}

impl DeviceCatalog {
    pub fn new(host: Arc<dyn AudioHost>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> Arc<dyn AudioHost> {
        Arc::clone(&self.host)
    }

    /// Re-initialize the host's device table.
    pub fn refresh(&self) -> anyhow::Result<()> {
        self.host.refresh()
    }

    /// Fresh list of devices that can capture audio.
    ///
    /// Refreshes the host first. Host failures are logged and produce an
    /// empty list.
    pub fn list_input_devices(&self) -> Vec<InputDevice> {
        if let Err(e) = self.refresh() {
            warn!("Failed to refresh audio devices: {:#}", e);
            return Vec::new();
        }

        let devices = match self.host.devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to query audio devices: {:#}", e);
                return Vec::new();
            }
        };

        let inputs: Vec<InputDevice> = devices
            .into_iter()
            .filter(|d| d.max_input_channels > 0)
            .collect();

        debug!("Found {} input devices", inputs.len());
        inputs
    }

    /// Look a device up by display name on a fresh listing.
    pub fn find_by_name(&self, name: &str) -> Option<InputDevice> {
        self.list_input_devices()
            .into_iter()
            .find(|d| d.name == name)
    }
}
