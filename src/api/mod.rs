pub mod endpoint;
pub mod error;
pub mod response;

use crate::model;
pub use error::Error;
use reqwest::Response;
use response::get_device_list::GetDevicesList;
use response::get_device_real_kpi::GetDeviceRealKpi;
use response::get_stations_list::GetStationsList;
use serde_json::{json, Value};
use std::time::Duration;

const XSRF_TOKEN: &str = "XSRF-TOKEN";

/// Executes single calls against the FusionSolar northbound API.
///
/// The client does not hold a session: every authenticated call takes the token to send.
/// It never retries; an expired session is reported as [`Error::AuthExpired`] and left to
/// the caller.
#[derive(Debug, Clone)]
pub struct ApiClient {
    api_url: String,
    client: reqwest::Client,
}

fn extract_xsrf_token(response: &Response) -> Option<String> {
    response
        .cookies()
        .find(|cookie| cookie.name().eq_ignore_ascii_case(XSRF_TOKEN))
        .map(|cookie| String::from(cookie.value()))
        .filter(|token| !token.is_empty())
}

/// Map failed request or non-2xx API response to Error
fn map_api_err(error: reqwest::Error) -> Error {
    match error.status() {
        Some(http::StatusCode::TOO_MANY_REQUESTS) => Error::RateExceeded(error.to_string()),
        Some(http::StatusCode::UNAUTHORIZED) => Error::LoginError(error.to_string()),
        Some(_) => Error::ApiError(error.to_string()),
        None => Error::TransportError(error.to_string()),
    }
}

/// Process value of valid HTTP response (2xx) to identify API-level errors signalled with
/// `failCode` or a false `success`. A session expiry is returned as `Error::AuthExpired`, any
/// other failure as specific or generic error; successful responses are carried forward.
fn map_response_status(value: Value) -> Result<Value, Error> {
    let fail_code = value.get("failCode").and_then(Value::as_u64).unwrap_or(0);
    let success = value.get("success").and_then(Value::as_bool);

    let known_failure: Option<response::FailCode> = num::FromPrimitive::from_u64(fail_code);
    match known_failure {
        Some(response::FailCode::UserMustRelogin) => Err(Error::AuthExpired),
        Some(response::FailCode::AccessFrequencyIsTooHigh) => {
            Err(Error::RateExceeded(value.to_string()))
        }
        None if fail_code != 0 || success == Some(false) => Err(Error::ApiError(value.to_string())),
        None => Ok(value),
    }
}

/// Any refused login is an authentication failure; transport problems and throttling keep
/// their own kind.
fn login_error(error: Error) -> Error {
    match error {
        Error::TransportError(_) | Error::RateExceeded(_) | Error::LoginError(_) => error,
        error => Error::LoginError(error.to_string()),
    }
}

impl ApiClient {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::ClientBuilder::new()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .or(Err(Error::InternalError))?;

        Ok(ApiClient {
            api_url: api_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    async fn send(
        &self,
        endpoint: &endpoint::Endpoint,
        token: Option<&str>,
        payload: &Value,
    ) -> Result<Response, Error> {
        let url = format!("{}{}", self.api_url, endpoint);

        let request = match token {
            Some(token) => self.client.post(url).header(XSRF_TOKEN, token),
            None => self.client.post(url),
        }
        .json(payload);

        request
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(map_api_err)
    }

    async fn parse(endpoint: &endpoint::Endpoint, response: Response) -> Result<Value, Error> {
        let text = response
            .text()
            .await
            .map_err(|e| Error::TransportError(format!("Error reading API response: {}", e)))?;

        log::trace!("endpoint: {}, response_text: {}", endpoint, text);

        serde_json::from_str::<Value>(&text)
            .map_err(|e| Error::InvalidResponse(text, e.to_string()))
            .and_then(map_response_status)
    }

    /// Perform one authenticated call and return the decoded response body.
    pub async fn call(
        &self,
        endpoint: &endpoint::Endpoint,
        token: &str,
        payload: &Value,
    ) -> Result<Value, Error> {
        log::trace!("endpoint: {}, data: {}", endpoint, payload);

        let response = self.send(endpoint, Some(token), payload).await?;
        Self::parse(endpoint, response).await
    }

    /// Log in and return the session token.
    ///
    /// The token is read from the response `data`; when the API leaves it empty the
    /// `XSRF-TOKEN` cookie set by the login response is used instead.
    pub async fn login(&self, credentials: &model::Credentials) -> Result<String, Error> {
        let request_body = json!({
            "userName": credentials.username,
            "systemCode": credentials.password,
        });

        let response = self
            .send(endpoint::LOGIN, None, &request_body)
            .await
            .map_err(login_error)?;
        let cookie_token = extract_xsrf_token(&response);

        let value = Self::parse(endpoint::LOGIN, response)
            .await
            .map_err(login_error)?;

        value
            .get("data")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(String::from)
            .or(cookie_token)
            .ok_or_else(|| Error::LoginError(format!("No token received: {}", value)))
    }

    pub async fn stations(&self, token: &str) -> Result<Vec<model::Station>, Error> {
        self.call(endpoint::STATIONS, token, &json!({}))
            .await
            .map(serde_json::from_value::<GetStationsList>)?
            .or(Err(Error::UnexpectedApiResponse))
            .map(|response| {
                response
                    .data
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|sta_resp| {
                        let name = sta_resp.station_name.unwrap_or_default();
                        sta_resp
                            .station_code
                            .filter(|code| !code.is_empty())
                            .map(|code| model::Station { code, name })
                    })
                    .collect()
            })
    }

    /// List all devices of station `station_code`
    pub async fn devices(
        &self,
        token: &str,
        station_code: &str,
    ) -> Result<Vec<model::Device>, Error> {
        let request_body = json!({ "stationCodes": [station_code] });

        self.call(endpoint::DEVICES, token, &request_body)
            .await
            .map(serde_json::from_value::<GetDevicesList>)?
            .or(Err(Error::UnexpectedApiResponse))
            .map(|response| {
                response
                    .data
                    .unwrap_or_default()
                    .into_iter()
                    .map(|resp| {
                        let id = resp.id;
                        model::Device {
                            name: resp.dev_name.unwrap_or_else(|| id.clone()),
                            id,
                            type_id: resp.dev_type_id,
                        }
                    })
                    .collect()
            })
    }

    /// Raw `getDevRealKpi` response body for `device`.
    pub async fn device_real_kpi_raw(
        &self,
        token: &str,
        device: &model::Device,
    ) -> Result<Value, Error> {
        let request_body = json!({
            "devIds": [device.id],
            "devTypeId": device.type_id.code(),
        });

        self.call(endpoint::DEVICE_REAL_KPI, token, &request_body)
            .await
    }

    /// Read the current KPI of `device`.
    pub async fn device_real_kpi(
        &self,
        token: &str,
        device: &model::Device,
    ) -> Result<model::DeviceReading, Error> {
        self.device_real_kpi_raw(token, device)
            .await
            .map(serde_json::from_value::<GetDeviceRealKpi>)?
            .or(Err(Error::UnexpectedApiResponse))
            .map(|response| response.into_reading(&device.id))
    }
}
