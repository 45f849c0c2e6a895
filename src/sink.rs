use crate::model::AggregatedTotals;

pub const TOTAL_PV: &str = "TotalPV";
pub const HOUSE_CONSUMPTION: &str = "HouseConsumption";
pub const GRID_IMPORT: &str = "GridImport";
pub const GRID_EXPORT: &str = "GridExport";
pub const BATTERY_SOC: &str = "BatterySOC";
pub const BATTERY_POWER: &str = "BatteryPower";

pub const WATT: &str = "W";
pub const PERCENT: &str = "%";

/// Channels every poll cycle publishes: (ident, display name, unit).
pub const STATIC_CHANNELS: [(&str, &str, &str); 6] = [
    (TOTAL_PV, "PV total power", WATT),
    (HOUSE_CONSUMPTION, "House consumption", WATT),
    (GRID_IMPORT, "Grid import", WATT),
    (GRID_EXPORT, "Grid export", WATT),
    (BATTERY_SOC, "Battery state of charge", PERCENT),
    (BATTERY_POWER, "Battery power", WATT),
];

/// Consumer of poll results.
pub trait Sink: Send + Sync {
    /// Create output channel `ident`. Called once per channel.
    fn register_channel(&self, ident: &str, name: &str, unit: &str);

    fn publish(&self, ident: &str, value: f64);
}

pub fn register_static_channels(sink: &dyn Sink) {
    for (ident, name, unit) in STATIC_CHANNELS.iter() {
        sink.register_channel(ident, name, unit);
    }
}

pub fn publish_totals(sink: &dyn Sink, totals: &AggregatedTotals) {
    sink.publish(TOTAL_PV, totals.pv_total);
    sink.publish(BATTERY_SOC, totals.battery_soc);
    sink.publish(BATTERY_POWER, totals.battery_power);
    sink.publish(GRID_IMPORT, totals.grid_import());
    sink.publish(GRID_EXPORT, totals.grid_export());
    sink.publish(HOUSE_CONSUMPTION, totals.house_consumption);
}
