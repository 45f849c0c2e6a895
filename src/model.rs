use num_derive::FromPrimitive;
use std::collections::HashMap;

type Watt = f64;
type Percent = f64;

pub type UnsupportedDeviceTypeId = u64;

/// `devTypeId` values this bridge knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum SupportedDeviceTypeId {
    StringInverter = 1,
    ResidentialInverter = 38,
    Battery = 39,
    PowerSensor = 47,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceTypeId {
    UnsupportedDeviceTypeId(UnsupportedDeviceTypeId),
    SupportedDeviceTypeId(SupportedDeviceTypeId),
}

/// Aggregation branch a device falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Inverter,
    Battery,
    Grid,
    Other,
}

impl DeviceTypeId {
    pub fn from_code(code: u64) -> Self {
        match num_traits::FromPrimitive::from_u64(code) {
            Some(type_id) => DeviceTypeId::SupportedDeviceTypeId(type_id),
            None => DeviceTypeId::UnsupportedDeviceTypeId(code),
        }
    }

    pub fn code(&self) -> u64 {
        match *self {
            DeviceTypeId::SupportedDeviceTypeId(type_id) => type_id as u64,
            DeviceTypeId::UnsupportedDeviceTypeId(code) => code,
        }
    }

    pub fn class(&self) -> DeviceClass {
        match self {
            DeviceTypeId::SupportedDeviceTypeId(SupportedDeviceTypeId::StringInverter)
            | DeviceTypeId::SupportedDeviceTypeId(SupportedDeviceTypeId::ResidentialInverter) => {
                DeviceClass::Inverter
            }
            DeviceTypeId::SupportedDeviceTypeId(SupportedDeviceTypeId::Battery) => {
                DeviceClass::Battery
            }
            DeviceTypeId::SupportedDeviceTypeId(SupportedDeviceTypeId::PowerSensor) => {
                DeviceClass::Grid
            }
            DeviceTypeId::UnsupportedDeviceTypeId(_) => DeviceClass::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub type_id: DeviceTypeId,
}

/// One `dataItemMap` snapshot. Only finite numeric values are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceReading {
    pub device_id: String,
    pub fields: HashMap<String, f64>,
}

impl DeviceReading {
    /// Value of `key`, 0.0 when the device did not report it.
    pub fn field(&self, key: &str) -> f64 {
        self.fields
            .get(key)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregatedTotals {
    pub pv_total: Watt,
    /// Positive while importing from the grid, negative while exporting.
    pub grid_power: Watt,
    pub battery_power: Watt,
    pub battery_soc: Percent,
    pub house_consumption: Watt,
}

impl AggregatedTotals {
    pub fn grid_import(&self) -> Watt {
        self.grid_power.max(0.0)
    }

    pub fn grid_export(&self) -> Watt {
        (-self.grid_power).max(0.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn device_type_classes() {
        assert_eq!(DeviceClass::Inverter, DeviceTypeId::from_code(1).class());
        assert_eq!(DeviceClass::Inverter, DeviceTypeId::from_code(38).class());
        assert_eq!(DeviceClass::Battery, DeviceTypeId::from_code(39).class());
        assert_eq!(DeviceClass::Grid, DeviceTypeId::from_code(47).class());
        assert_eq!(DeviceClass::Other, DeviceTypeId::from_code(10).class());
        assert_eq!(10, DeviceTypeId::from_code(10).code());
        assert_eq!(47, DeviceTypeId::from_code(47).code());
    }

    #[test]
    fn grid_import_export_split() {
        for grid_power in &[-350.5, -0.1, 0.0, 0.1, 1200.0] {
            let totals = AggregatedTotals {
                grid_power: *grid_power,
                ..Default::default()
            };
            assert_eq!(grid_power.max(0.0), totals.grid_import());
            assert_eq!((-grid_power).max(0.0), totals.grid_export());
            if *grid_power != 0.0 {
                assert!((totals.grid_import() == 0.0) ^ (totals.grid_export() == 0.0));
            } else {
                assert_eq!(0.0, totals.grid_import());
                assert_eq!(0.0, totals.grid_export());
            }
        }
    }

    #[test]
    fn missing_field_reads_zero() {
        let mut reading = DeviceReading::default();
        reading.fields.insert("soc".to_string(), 55.0);
        reading.fields.insert("bogus".to_string(), f64::NAN);
        assert_eq!(55.0, reading.field("soc"));
        assert_eq!(0.0, reading.field("active_power"));
        assert_eq!(0.0, reading.field("bogus"));
    }
}
