use crate::model::DeviceReading;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    #[serde(default, deserialize_with = "super::deserialize_opt_id")]
    pub dev_id: Option<String>,
    #[serde(default)]
    pub data_item_map: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub struct GetDeviceRealKpi {
    #[serde(default)]
    pub data: Option<Vec<Data>>,
}

impl GetDeviceRealKpi {
    /// Pick the entry belonging to `device_id` (or the first one, the API only echoes the
    /// requested device) and keep its numeric `dataItemMap` values.
    pub fn into_reading(self, device_id: &str) -> DeviceReading {
        let mut data = self.data.unwrap_or_default();
        let position = data
            .iter()
            .position(|d| d.dev_id.as_deref() == Some(device_id))
            .unwrap_or(0);

        let fields = if position < data.len() {
            data.swap_remove(position)
                .data_item_map
                .unwrap_or_default()
                .into_iter()
                .filter_map(|(key, value)| super::as_f64(&value).map(|v| (key, v)))
                .collect()
        } else {
            Default::default()
        };

        DeviceReading {
            device_id: device_id.to_owned(),
            fields,
        }
    }
}
