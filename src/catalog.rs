use crate::api::Error;
use crate::model::{Device, DeviceClass};
use crate::session::SessionManager;
use crate::sink::{Sink, WATT};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Output channel created for a discovered inverter.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelHandle {
    pub ident: String,
    pub name: String,
}

impl ChannelHandle {
    fn for_device(device: &Device) -> Self {
        ChannelHandle {
            ident: format!("INV_{}", device.id),
            name: format!("Inverter {}", device.name),
        }
    }
}

/// Device enumeration plus the registry of per-device channels. Channels are only ever
/// added: a device missing from a later listing keeps its channel.
#[derive(Debug, Default)]
pub struct DeviceCatalog {
    channels: Mutex<HashMap<String, ChannelHandle>>,
}

impl DeviceCatalog {
    pub fn new() -> Self {
        Default::default()
    }

    /// All devices of `station_code`. An empty station is not an error.
    pub async fn list_devices(
        &self,
        sessions: &SessionManager,
        station_code: &str,
    ) -> Result<Vec<Device>, Error> {
        let api = sessions.api();
        let devices = sessions
            .authorized(|token| async move { api.devices(&token, station_code).await })
            .await?;

        log::debug!("station {}: {} devices", station_code, devices.len());
        for device in devices.iter() {
            if device.type_id.class() == DeviceClass::Other {
                log::trace!(
                    "device {} ({}) has unsupported type {}",
                    device.id,
                    device.name,
                    device.type_id.code()
                );
            }
        }

        Ok(devices)
    }

    /// Channel of `device`, registering it with `sink` the first time the device is seen.
    pub fn ensure_registered(&self, device: &Device, sink: &dyn Sink) -> ChannelHandle {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);

        channels
            .entry(device.id.clone())
            .or_insert_with(|| {
                let channel = ChannelHandle::for_device(device);
                log::info!("registering channel {} for {}", channel.ident, device.name);
                sink.register_channel(&channel.ident, &channel.name, WATT);
                channel
            })
            .clone()
    }

    /// Channel registered for `device_id`, if any cycle has seen the device.
    pub fn channel(&self, device_id: &str) -> Option<ChannelHandle> {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_id)
            .cloned()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
