use std::error::Error;
use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// A failure below the HTTP layer: refused connection, timeout, broken body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkError(pub String);

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for NetworkError {}

pub trait HttpBackend {
    /// Sends one request. `body` is owned so every attempt gets its own copy.
    fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, NetworkError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: Client,
}

impl ReqwestBackend {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl HttpBackend for ReqwestBackend {
    fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, NetworkError> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        let response = request.send().map_err(describe)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(describe)?;
        Ok(HttpResponse { status, body })
    }
}

// reqwest errors embed the full URL, which carries the token.
fn describe(err: reqwest::Error) -> NetworkError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_body() || err.is_decode() {
        "failed to read response body"
    } else {
        "request failed"
    };
    let detail = err
        .source()
        .map(|source| source.to_string())
        .unwrap_or_default();
    if detail.is_empty() {
        NetworkError(kind.to_string())
    } else {
        NetworkError(format!("{kind}: {detail}"))
    }
}
