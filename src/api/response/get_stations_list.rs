use serde::Deserialize;

#[derive(Deserialize)]
pub struct Data {
    /* newer northbound API versions call it `plantCode` */
    #[serde(rename = "stationCode", alias = "plantCode")]
    pub station_code: Option<String>,
    #[serde(rename = "stationName", alias = "plantName", default)]
    pub station_name: Option<String>,
}

#[derive(Deserialize)]
pub struct GetStationsList {
    #[serde(default)]
    pub data: Option<Vec<Data>>,
}
