use crate::aggregate::{aggregate, Aggregation};
use crate::api::{ApiClient, Error};
use crate::catalog::DeviceCatalog;
use crate::model::{AggregatedTotals, Device, DeviceClass, DeviceReading};
use crate::session::{Session, SessionManager};
use crate::settings::Settings;
use crate::sink::{self, Sink};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Step a poll cycle is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Authenticating,
    ResolvingStation,
    ListingDevices,
    FetchingReadings,
    Aggregating,
    Publishing,
}

/// Device whose reading could not be fetched, even after re-authenticating.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDevice {
    pub device: Device,
    pub error: Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub station: String,
    pub devices: usize,
    pub totals: AggregatedTotals,
    pub skipped: Vec<SkippedDevice>,
}

/// One complete update: session, station, devices, readings, aggregation, publishing.
///
/// Only one cycle runs at a time; a second trigger while a cycle is running is refused
/// with `Error::CycleInProgress`.
pub struct PollCycle {
    sessions: SessionManager,
    catalog: DeviceCatalog,
    sink: Arc<dyn Sink>,
    state: Mutex<CycleState>,
    running: tokio::sync::Mutex<()>,
}

impl PollCycle {
    /// Registers the static channels with `sink`.
    pub fn new(sessions: SessionManager, sink: Arc<dyn Sink>) -> Self {
        sink::register_static_channels(sink.as_ref());

        PollCycle {
            sessions,
            catalog: DeviceCatalog::new(),
            sink,
            state: Mutex::new(CycleState::Idle),
            running: tokio::sync::Mutex::new(()),
        }
    }

    pub fn from_settings(settings: &Settings, sink: Arc<dyn Sink>) -> Result<Self, Error> {
        let api = ApiClient::new(&settings.api_url, settings.timeout())?;
        let sessions = SessionManager::new(api, settings.credentials(), Session::default());
        Ok(PollCycle::new(sessions, sink))
    }

    pub fn state(&self) -> CycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, state: CycleState) {
        log::debug!("poll cycle: {:?}", state);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Run one cycle. Whatever the outcome, the cycle ends `Idle`.
    pub async fn run(&self) -> Result<CycleReport, Error> {
        let _running = self
            .running
            .try_lock()
            .map_err(|_| Error::CycleInProgress)?;

        let result = self.run_steps().await;
        self.enter(CycleState::Idle);
        result
    }

    /// Run one cycle and log its outcome. Failures never leave this function.
    pub async fn tick(&self) -> Option<CycleReport> {
        match self.run().await {
            Ok(report) => {
                log::info!(
                    "station {}: pv {} W, house {} W, grid {} W, battery {} W ({} %), {} devices, {} skipped",
                    report.station,
                    report.totals.pv_total,
                    report.totals.house_consumption,
                    report.totals.grid_power,
                    report.totals.battery_power,
                    report.totals.battery_soc,
                    report.devices,
                    report.skipped.len()
                );
                Some(report)
            }
            Err(Error::CycleInProgress) => {
                log::info!("previous poll cycle still running, skipping this one");
                None
            }
            Err(e) => {
                log::error!("poll cycle failed: {}", e);
                None
            }
        }
    }

    async fn run_steps(&self) -> Result<CycleReport, Error> {
        self.enter(CycleState::Authenticating);
        self.sessions.ensure_token().await?;

        self.enter(CycleState::ResolvingStation);
        let station = self.sessions.ensure_station_id().await?;

        self.enter(CycleState::ListingDevices);
        let devices = self.catalog.list_devices(&self.sessions, &station).await?;

        self.enter(CycleState::FetchingReadings);
        let mut readings = Vec::with_capacity(devices.len());
        let mut skipped = Vec::new();
        for device in devices.iter() {
            match self.fetch_reading(device).await {
                Ok(reading) => readings.push((device, reading)),
                /* the account itself is refused; the other devices would fail the same way */
                Err(e @ Error::LoginError(_)) => return Err(e),
                Err(error) => {
                    log::warn!("skipping device {} ({}): {}", device.id, device.name, error);
                    skipped.push(SkippedDevice {
                        device: device.clone(),
                        error,
                    });
                }
            }
        }

        self.enter(CycleState::Aggregating);
        let aggregation = aggregate(readings.iter().map(|(device, reading)| (*device, reading)));

        self.enter(CycleState::Publishing);
        self.publish(&aggregation, &skipped);

        Ok(CycleReport {
            station,
            devices: devices.len(),
            totals: aggregation.totals,
            skipped,
        })
    }

    async fn fetch_reading(&self, device: &Device) -> Result<DeviceReading, Error> {
        let api = self.sessions.api();
        self.sessions
            .authorized(|token| async move { api.device_real_kpi(&token, device).await })
            .await
    }

    /// Publish totals and inverter powers. Skipped inverters that already own a channel are
    /// reset to 0 so they stay consistent with `TotalPV`.
    fn publish(&self, aggregation: &Aggregation, skipped: &[SkippedDevice]) {
        sink::publish_totals(self.sink.as_ref(), &aggregation.totals);

        for (device, power) in aggregation.inverters.iter() {
            let channel = self.catalog.ensure_registered(device, self.sink.as_ref());
            self.sink.publish(&channel.ident, *power);
        }

        for SkippedDevice { device, .. } in skipped.iter() {
            if device.type_id.class() != DeviceClass::Inverter {
                continue;
            }
            if let Some(channel) = self.catalog.channel(&device.id) {
                self.sink.publish(&channel.ident, 0.0);
            }
        }
    }

    /// Dump devices KPI
    ///
    /// Collect the raw `dataItemMap` of every device of the station, keyed by device id, to
    /// help map device types not supported yet.
    pub async fn dump_devices(&self) -> Result<HashMap<String, Value>, Error> {
        let station = self.sessions.ensure_station_id().await?;
        let devices = self.catalog.list_devices(&self.sessions, &station).await?;
        let api = self.sessions.api();
        let mut dump = HashMap::new();

        for device in devices.iter() {
            let response = self
                .sessions
                .authorized(|token| async move { api.device_real_kpi_raw(&token, device).await })
                .await?;

            match response
                .get("data")
                .and_then(|v| v.get(0))
                .and_then(|v| v.get("dataItemMap"))
            {
                Some(data_item_map) => {
                    dump.insert(
                        format!("{} (devTypeId {})", device.id, device.type_id.code()),
                        data_item_map.to_owned(),
                    );
                }
                None => log::warn!(
                    "No dataItemMap returned for device {}: {}: {}",
                    device.type_id.code(),
                    device.id,
                    response
                ),
            }
        }

        Ok(dump)
    }
}
