use crate::model::DeviceTypeId;
use serde::Deserialize;
use serde_json::Value;

impl<'de> serde::Deserialize<'de> for DeviceTypeId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;

        super::as_u64(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid devTypeId: {}", value)))
            .map(DeviceTypeId::from_code)
    }
}
