use crate::model::DeviceTypeId;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    #[serde(default)]
    pub dev_name: Option<String>,
    #[serde(deserialize_with = "super::deserialize_id")]
    pub id: String,
    pub dev_type_id: DeviceTypeId,
}

#[derive(Deserialize)]
pub struct GetDevicesList {
    #[serde(default)]
    pub data: Option<Vec<Data>>,
}
