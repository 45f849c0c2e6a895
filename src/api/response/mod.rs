mod device_type;
pub mod get_device_list;
pub mod get_device_real_kpi;
pub mod get_stations_list;

use num_derive::FromPrimitive;
use serde::Deserialize;
use serde_json::Value;

/// `failCode` values with a dedicated meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum FailCode {
    /* {"data":"USER_MUST_RELOGIN","failCode":305,"params":null,"success":false} */
    UserMustRelogin = 305,
    /* {"data":"ACCESS_FREQUENCY_IS_TOO_HIGH","failCode":407,"params":null,"success":false} */
    AccessFrequencyIsTooHigh = 407,
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Numeric KPI value. The API reports numbers, numeric strings or `null` depending on the
/// device firmware.
pub fn as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.to_owned()),
        _ => None,
    }
}

/// Device ids are numeric in most responses but strings in some.
fn deserialize_id<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Value::deserialize(d)?;
    id_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid device id: {}", value)))
}

fn deserialize_opt_id<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Value::deserialize(d).map(|value| id_from_value(&value))
}
