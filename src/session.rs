use crate::api::{ApiClient, Error};
use crate::model::{Credentials, Station};
use std::future::Future;
use tokio::sync::Mutex;

/// Cached login token and resolved station. Both are filled lazily.
#[derive(Debug, Default)]
pub struct Session {
    token: Option<String>,
    station: Option<Station>,
}

#[cfg(test)]
impl Session {
    /// Session resumed from an already issued token.
    pub fn with_token(token: String) -> Self {
        Session {
            token: Some(token),
            station: None,
        }
    }
}

/// Owns the [`Session`] and performs login and station discovery on first use.
///
/// The session lock is held across a login so concurrent callers share a single login.
/// Station discovery is serialised by its own lock, because the lookup itself takes the
/// session lock for the token.
pub struct SessionManager {
    api: ApiClient,
    credentials: Credentials,
    session: Mutex<Session>,
    discovery: Mutex<()>,
}

impl SessionManager {
    pub fn new(api: ApiClient, credentials: Credentials, session: Session) -> Self {
        SessionManager {
            api,
            credentials,
            session: Mutex::new(session),
            discovery: Mutex::new(()),
        }
    }

    async fn login(&self, session: &mut Session) -> Result<String, Error> {
        log::info!("logging in as {}", self.credentials.username);
        let token = self.api.login(&self.credentials).await?;
        session.token = Some(token.clone());
        Ok(token)
    }

    /// Cached token, logging in first when there is none.
    pub async fn ensure_token(&self) -> Result<String, Error> {
        let mut session = self.session.lock().await;
        if let Some(token) = session.token.clone() {
            return Ok(token);
        }
        self.login(&mut session).await
    }

    /// Drop the cached token; the next `ensure_token` logs in again.
    pub async fn invalidate_token(&self) {
        self.session.lock().await.token = None;
    }

    /// Replace `stale` with a fresh token. If another caller already replaced it, the newer
    /// token is returned without logging in again.
    pub async fn refresh_token(&self, stale: &str) -> Result<String, Error> {
        let mut session = self.session.lock().await;
        match session.token.clone() {
            Some(token) if token != stale => Ok(token),
            _ => {
                session.token = None;
                self.login(&mut session).await
            }
        }
    }

    /// Run `call` with the current token. On `Error::AuthExpired` the token is refreshed and
    /// the call repeated exactly once; a second expiry is returned to the caller.
    pub async fn authorized<T, F, Fut>(&self, call: F) -> Result<T, Error>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let token = self.ensure_token().await?;

        match call(token.clone()).await {
            Err(Error::AuthExpired) => {
                log::info!("session expired, logging in again");
                let token = self.refresh_token(&token).await?;
                call(token).await
            }
            result => result,
        }
    }

    /// Station code of the first station of the account, resolved once.
    pub async fn ensure_station_id(&self) -> Result<String, Error> {
        let _discovery = self.discovery.lock().await;
        if let Some(station) = &self.session.lock().await.station {
            return Ok(station.code.clone());
        }

        let api = &self.api;
        let stations = self
            .authorized(|token| async move { api.stations(&token).await })
            .await
            .map_err(|e| match e {
                Error::UnexpectedApiResponse | Error::InvalidResponse(_, _) => {
                    Error::DiscoveryError(e.to_string())
                }
                e => e,
            })?;

        if stations.len() > 1 {
            log::warn!(
                "{} stations found, only the first one is polled",
                stations.len()
            );
        }

        let station = stations
            .into_iter()
            .next()
            .ok_or_else(|| Error::DiscoveryError("No station found".to_string()))?;

        log::info!("using station {} ({})", station.code, station.name);
        let code = station.code.clone();
        self.session.lock().await.station = Some(station);
        Ok(code)
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::endpoint;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use std::time::Duration;

    fn manager(server: &ServerGuard, session: Session) -> SessionManager {
        let api = ApiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let credentials = Credentials {
            username: "user".to_string(),
            password: "system-code".to_string(),
        };
        SessionManager::new(api, credentials, session)
    }

    fn login_body(token: &str) -> String {
        json!({"data": token, "failCode": 0, "success": true}).to_string()
    }

    #[tokio::test]
    async fn token_is_cached() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", endpoint::LOGIN)
            .with_body(login_body("token-1"))
            .expect(1)
            .create_async()
            .await;

        let sessions = manager(&server, Session::default());

        assert_eq!("token-1", sessions.ensure_token().await.unwrap());
        assert_eq!("token-1", sessions.ensure_token().await.unwrap());
        login.assert_async().await;
    }

    #[tokio::test]
    async fn invalidated_token_logs_in_again() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", endpoint::LOGIN)
            .with_body(login_body("token-2"))
            .expect(1)
            .create_async()
            .await;

        let sessions = manager(&server, Session::with_token("token-1".to_string()));

        assert_eq!("token-1", sessions.ensure_token().await.unwrap());
        sessions.invalidate_token().await;
        assert_eq!("token-2", sessions.ensure_token().await.unwrap());
        login.assert_async().await;
    }

    #[tokio::test]
    async fn refresh_is_deduplicated() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", endpoint::LOGIN)
            .with_body(login_body("token-2"))
            .expect(1)
            .create_async()
            .await;

        let sessions = manager(&server, Session::with_token("token-1".to_string()));

        let (first, second) = tokio::join!(
            sessions.refresh_token("token-1"),
            sessions.refresh_token("token-1")
        );

        assert_eq!("token-2", first.unwrap());
        assert_eq!("token-2", second.unwrap());
        login.assert_async().await;
    }

    #[tokio::test]
    async fn station_is_resolved_once() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", endpoint::LOGIN)
            .with_body(login_body("token-1"))
            .expect(1)
            .create_async()
            .await;
        let stations = server
            .mock("POST", endpoint::STATIONS)
            .match_header("XSRF-TOKEN", "token-1")
            .with_body(
                json!({
                    "data": [
                        {"stationCode": "NE=1", "stationName": "Home"},
                        {"stationCode": "NE=2", "stationName": "Barn"}
                    ],
                    "success": true
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let sessions = manager(&server, Session::default());

        assert_eq!("NE=1", sessions.ensure_station_id().await.unwrap());
        assert_eq!("NE=1", sessions.ensure_station_id().await.unwrap());
        login.assert_async().await;
        stations.assert_async().await;
    }

    #[tokio::test]
    async fn concurrent_station_lookups_share_one_call() {
        let mut server = Server::new_async().await;
        let stations = server
            .mock("POST", endpoint::STATIONS)
            .with_body(
                json!({"data": [{"stationCode": "NE=1", "stationName": "Home"}], "success": true})
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let sessions = manager(&server, Session::with_token("token-1".to_string()));

        let (first, second) =
            tokio::join!(sessions.ensure_station_id(), sessions.ensure_station_id());

        assert_eq!("NE=1", first.unwrap());
        assert_eq!("NE=1", second.unwrap());
        stations.assert_async().await;
    }

    #[tokio::test]
    async fn empty_station_list_is_discovery_error() {
        let mut server = Server::new_async().await;
        let _stations = server
            .mock("POST", endpoint::STATIONS)
            .with_body(json!({"data": [], "success": true}).to_string())
            .create_async()
            .await;

        let sessions = manager(&server, Session::with_token("token-1".to_string()));

        assert!(matches!(
            sessions.ensure_station_id().await,
            Err(Error::DiscoveryError(_))
        ));
    }

    #[tokio::test]
    async fn malformed_station_list_is_discovery_error() {
        let mut server = Server::new_async().await;
        let _stations = server
            .mock("POST", endpoint::STATIONS)
            .with_body(json!({"data": "nope", "success": true}).to_string())
            .create_async()
            .await;

        let sessions = manager(&server, Session::with_token("token-1".to_string()));

        assert!(matches!(
            sessions.ensure_station_id().await,
            Err(Error::DiscoveryError(_))
        ));
    }

    #[tokio::test]
    async fn failed_login_is_authentication_error() {
        let mut server = Server::new_async().await;
        let _login = server
            .mock("POST", endpoint::LOGIN)
            .match_body(Matcher::Any)
            .with_body(json!({"failCode": 20001, "success": false}).to_string())
            .create_async()
            .await;

        let sessions = manager(&server, Session::default());

        assert!(matches!(
            sessions.ensure_token().await,
            Err(Error::LoginError(_))
        ));
        assert!(matches!(
            sessions.ensure_station_id().await,
            Err(Error::LoginError(_))
        ));
    }
}
