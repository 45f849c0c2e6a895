pub type Endpoint = str;

pub const LOGIN: &Endpoint = "/thirdData/login";
pub const STATIONS: &Endpoint = "/thirdData/getStationList";
pub const DEVICES: &Endpoint = "/thirdData/getDevList";
pub const DEVICE_REAL_KPI: &Endpoint = "/thirdData/getDevRealKpi";
