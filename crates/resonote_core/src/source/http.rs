//! Blocking HTTP seam used by source adapters.
//!
//! Adapters talk to `HttpClient`, so tests can script upstream responses
//! without a network.

use log::debug;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const CLIENT_USER_AGENT: &str = concat!("resonote/", env!("CARGO_PKG_VERSION"));

/// Transport or status failure for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// Connection, timeout or body decoding failure.
    Transport(String),
    /// Upstream asked us to slow down (HTTP 429).
    RateLimited { url: String },
    /// Any other non-success status.
    Status { url: String, status: u16 },
    /// Body did not have the expected shape.
    Decode(String),
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "http transport error: {message}"),
            Self::RateLimited { url } => write!(f, "rate limited by {url}"),
            Self::Status { url, status } => write!(f, "{url} answered with status {status}"),
            Self::Decode(message) => write!(f, "unexpected response body: {message}"),
        }
    }
}

impl Error for HttpError {}

impl From<reqwest::Error> for HttpError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

/// Minimal request surface the adapters need.
pub trait HttpClient: Send + Sync {
    /// `GET url?query` with extra headers; returns the response body.
    fn get_text(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<String, HttpError>;

    /// `POST url` with a form body and optional basic auth.
    fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        basic_auth: Option<(&str, &str)>,
        headers: &[(&str, &str)],
    ) -> Result<String, HttpError>;
}

/// `HttpClient` over `reqwest::blocking`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(CLIENT_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get_text(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<String, HttpError> {
        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send()?;
        read_body(url, response)
    }

    fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        basic_auth: Option<(&str, &str)>,
        headers: &[(&str, &str)],
    ) -> Result<String, HttpError> {
        let mut request = self.client.post(url).form(form);
        if let Some((user, password)) = basic_auth {
            request = request.basic_auth(user, Some(password));
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send()?;
        read_body(url, response)
    }
}

fn read_body(url: &str, response: reqwest::blocking::Response) -> Result<String, HttpError> {
    let status = response.status();
    debug!(
        "event=http_response module=source status_code={} url={}",
        status.as_u16(),
        url
    );
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(HttpError::RateLimited {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(HttpError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.text()?)
}
