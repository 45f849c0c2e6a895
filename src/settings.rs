use crate::api::Error;
use crate::model::Credentials;
use config::Config;
use std::time::Duration;

pub const API_URL: &str = "https://eu5.fusionsolar.huawei.com";
const DEFAULT_INTERVAL: i64 = 300;
const DEFAULT_TIMEOUT: i64 = 30;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Settings {
    pub api_url: String,
    pub username: String,
    /// Sent as the API's `systemCode`.
    pub password: String,
    /// Seconds between poll cycles, 0 disables the timer.
    pub interval: u64,
    /// Per-request timeout in seconds.
    pub timeout: u64,
}

impl Settings {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.to_owned(),
            password: self.password.to_owned(),
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        match self.interval {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }
}

fn config_err(e: config::ConfigError) -> Error {
    Error::ConfigError(e.to_string())
}

/// Read settings from `FS_*` environment variables.
pub fn read_settings() -> Result<Settings, Error> {
    let mut settings = Config::default();
    settings
        .merge(config::Environment::with_prefix("FS"))
        .map_err(config_err)?;

    settings_from(settings)
}

/// Apply defaults to `settings` and validate the result.
pub fn settings_from(mut settings: Config) -> Result<Settings, Error> {
    settings
        .set_default("api_url", API_URL)
        .map_err(config_err)?
        .set_default("interval", DEFAULT_INTERVAL)
        .map_err(config_err)?
        .set_default("timeout", DEFAULT_TIMEOUT)
        .map_err(config_err)?;

    let settings: Settings = settings.try_into().map_err(config_err)?;

    if settings.username.is_empty() || settings.password.is_empty() {
        return Err(Error::ConfigError(
            "username and password must be set".to_string(),
        ));
    }

    Ok(settings)
}
