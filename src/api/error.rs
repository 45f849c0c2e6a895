use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::fmt;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Login did not yield a usable token.
    LoginError(String),
    /// Station list empty or malformed.
    DiscoveryError(String),
    /// API reported that the session token is no longer valid.
    AuthExpired,
    /// Network failure or timeout talking to the API.
    TransportError(String),
    ApiError(String),
    UnexpectedApiResponse,
    InvalidResponse(String, String),
    RateExceeded(String),
    ConfigError(String),
    CycleInProgress,
    InternalError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LoginError(s) => write!(f, "login failed: {}", s),
            Error::DiscoveryError(s) => write!(f, "station discovery failed: {}", s),
            Error::AuthExpired => write!(f, "session expired"),
            Error::TransportError(s) => write!(f, "transport error: {}", s),
            Error::ApiError(s) => write!(f, "API error: {}", s),
            Error::UnexpectedApiResponse => write!(f, "unexpected API response"),
            Error::InvalidResponse(body, reason) => {
                write!(f, "invalid API response ({}): {}", reason, body)
            }
            Error::RateExceeded(s) => write!(f, "API rate exceeded: {}", s),
            Error::ConfigError(s) => write!(f, "configuration error: {}", s),
            Error::CycleInProgress => write!(f, "a poll cycle is already running"),
            Error::InternalError => write!(f, "internal error"),
        }
    }
}

impl std::error::Error for Error {}

fn html_response(status: Status, error: String) -> response::Result<'static> {
    Response::build()
        .status(status)
        .sized_body(error.len(), Cursor::new(error))
        .header(ContentType::new("text", "html"))
        .ok()
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        match self {
            Error::RateExceeded(s) => html_response(
                Status::TooManyRequests,
                format!("<html><body><h3>429 Too Many Requests</h3>Downstream API response: <code>{}</code></body></html>", s),
            ),
            Error::LoginError(s) => html_response(
                Status::Forbidden,
                format!("<html><body><h3>403 Forbidden</h3>Error while authenticating to downstream API: <code>{}</code></body></html>", s),
            ),
            Error::CycleInProgress => html_response(
                Status::Conflict,
                "<html><body><h3>409 Conflict</h3>A poll cycle is already running</body></html>"
                    .to_string(),
            ),
            _ => html_response(
                Status::InternalServerError,
                format!(
                    "<html><body><h3>Unknown exception</h3><code>{}</code></body></html>",
                    self
                ),
            ),
        }
    }
}
