use crate::model::{AggregatedTotals, Device, DeviceClass, DeviceReading};

pub const ACTIVE_POWER: &str = "active_power";
pub const SOC: &str = "soc";
pub const CHARGE_DISCHARGE_POWER: &str = "charge_discharge_power";

/// Result of one cycle's aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub totals: AggregatedTotals,
    /// Active power of every inverter-class device, in reading order.
    pub inverters: Vec<(Device, f64)>,
}

/// Consumption of the house: PV plus grid import and battery term, minus grid export.
///
/// `battery_power` is used as the battery reports it in `charge_discharge_power`: its
/// positive part is subtracted, its negative part added.
pub fn house_consumption(pv_total: f64, grid_power: f64, battery_power: f64) -> f64 {
    pv_total + grid_power.max(0.0) - (-grid_power).max(0.0) - battery_power.max(0.0)
        + (-battery_power).max(0.0)
}

/// Classify each reading by its device type and fold them into signed totals.
///
/// Inverters add up; battery and grid values are taken from the last device of that class.
pub fn aggregate<'a, I>(readings: I) -> Aggregation
where
    I: IntoIterator<Item = (&'a Device, &'a DeviceReading)>,
{
    let mut aggregation = Aggregation::default();
    let mut batteries = 0;
    let mut meters = 0;

    for (device, reading) in readings {
        match device.type_id.class() {
            DeviceClass::Inverter => {
                let power = reading.field(ACTIVE_POWER);
                aggregation.totals.pv_total += power;
                aggregation.inverters.push((device.clone(), power));
            }
            DeviceClass::Battery => {
                batteries += 1;
                aggregation.totals.battery_soc = reading.field(SOC);
                aggregation.totals.battery_power = reading.field(CHARGE_DISCHARGE_POWER);
            }
            DeviceClass::Grid => {
                meters += 1;
                aggregation.totals.grid_power = reading.field(ACTIVE_POWER);
            }
            DeviceClass::Other => {}
        }
    }

    if batteries > 1 {
        log::warn!(
            "{} battery devices reported, using the last one only",
            batteries
        );
    }
    if meters > 1 {
        log::warn!("{} grid meters reported, using the last one only", meters);
    }

    let totals = &mut aggregation.totals;
    totals.house_consumption =
        house_consumption(totals.pv_total, totals.grid_power, totals.battery_power);

    aggregation
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::DeviceTypeId;

    fn device(id: &str, type_code: u64) -> Device {
        Device {
            id: id.to_string(),
            name: id.to_string(),
            type_id: DeviceTypeId::from_code(type_code),
        }
    }

    fn reading(id: &str, fields: &[(&str, f64)]) -> DeviceReading {
        DeviceReading {
            device_id: id.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    fn run(input: &[(Device, DeviceReading)]) -> Aggregation {
        aggregate(input.iter().map(|(d, r)| (d, r)))
    }

    #[test]
    fn house_consumption_identity() {
        let aggregation = run(&[
            (device("inv", 1), reading("inv", &[(ACTIVE_POWER, 1000.0)])),
            (device("meter", 47), reading("meter", &[(ACTIVE_POWER, 200.0)])),
            (
                device("bat", 39),
                reading("bat", &[(SOC, 64.0), (CHARGE_DISCHARGE_POWER, -150.0)]),
            ),
        ]);

        let totals = aggregation.totals;
        assert_eq!(1000.0, totals.pv_total);
        assert_eq!(200.0, totals.grid_import());
        assert_eq!(0.0, totals.grid_export());
        assert_eq!(-150.0, totals.battery_power);
        assert_eq!(64.0, totals.battery_soc);
        assert_eq!(1350.0, totals.house_consumption);
    }

    #[test]
    fn exporting_and_discharging() {
        assert_eq!(500.0, house_consumption(1000.0, -400.0, 100.0));
        assert_eq!(900.0, house_consumption(1000.0, -400.0, -300.0));
        assert_eq!(0.0, house_consumption(0.0, 0.0, 0.0));
        assert_eq!(250.0, house_consumption(0.0, 250.0, 0.0));
    }

    #[test]
    fn inverters_add_up() {
        let aggregation = run(&[
            (device("a", 1), reading("a", &[(ACTIVE_POWER, 1.5)])),
            (device("b", 38), reading("b", &[(ACTIVE_POWER, 2.25)])),
        ]);

        assert_eq!(3.75, aggregation.totals.pv_total);
        assert_eq!(3.75, aggregation.totals.house_consumption);
        assert_eq!(2, aggregation.inverters.len());
        assert_eq!(2.25, aggregation.inverters[1].1);
    }

    #[test]
    fn missing_active_power_counts_as_zero() {
        let aggregation = run(&[
            (device("a", 1), reading("a", &[("temperature", 40.0)])),
            (device("b", 1), reading("b", &[(ACTIVE_POWER, 5.0)])),
        ]);

        assert_eq!(5.0, aggregation.totals.pv_total);
        assert_eq!(0.0, aggregation.inverters[0].1);
    }

    #[test]
    fn unknown_devices_are_ignored() {
        let aggregation = run(&[(
            device("dongle", 62),
            reading("dongle", &[(ACTIVE_POWER, 999.0), (SOC, 50.0)]),
        )]);

        assert_eq!(Aggregation::default(), aggregation);
    }

    #[test]
    fn last_battery_wins() {
        let aggregation = run(&[
            (
                device("bat1", 39),
                reading("bat1", &[(SOC, 10.0), (CHARGE_DISCHARGE_POWER, 100.0)]),
            ),
            (
                device("bat2", 39),
                reading("bat2", &[(SOC, 90.0), (CHARGE_DISCHARGE_POWER, -20.0)]),
            ),
        ]);

        assert_eq!(90.0, aggregation.totals.battery_soc);
        assert_eq!(-20.0, aggregation.totals.battery_power);
    }

    #[test]
    fn no_readings_yield_zero_totals() {
        let aggregation = run(&[]);
        assert_eq!(AggregatedTotals::default(), aggregation.totals);
        assert!(aggregation.inverters.is_empty());
    }
}
