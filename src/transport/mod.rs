use std::error::Error;
use std::fmt;

use reqwest::{Method, Url};
use serde::Serialize;
use tracing::{debug, warn};

mod backend;
mod retry;

pub use backend::{HttpBackend, HttpResponse, NetworkError, ReqwestBackend, DEFAULT_TIMEOUT};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};

const CONFLICT_MARKER: &str = "already exists";

/// Joplin answers a duplicate create with a 500 whose message says the
/// resource "already exists". There is no structured code to match on.
pub fn is_already_exists(body: &str) -> bool {
    body.contains(CONFLICT_MARKER)
}

/// Authenticated access to the Joplin Data API.
pub struct Transport {
    base_url: String,
    token: String,
    retry: RetryPolicy,
    backend: Box<dyn HttpBackend>,
    sleeper: Box<dyn Sleeper>,
}

impl Transport {
    pub fn new(base_url: &str, token: &str, backend: Box<dyn HttpBackend>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            retry: RetryPolicy::default(),
            backend,
            sleeper: Box::new(ThreadSleeper),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn get(&self, path: &str) -> Result<String, TransportError> {
        self.request(Method::GET, path, None)
    }

    pub fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<String, TransportError> {
        let payload = serde_json::to_vec(body).map_err(TransportError::Encode)?;
        self.request(Method::POST, path, Some(payload))
    }

    /// Sends `method path` with the token attached, retrying only
    /// network-level failures. Conflicts and status errors return at once.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<String, TransportError> {
        let url = self.url_for(path)?;
        let max_attempts = self.retry.max_attempts();
        let mut last_error = NetworkError("no attempt was made".to_string());

        for attempt in 0..max_attempts {
            match self.backend.send(&method, &url, body.clone()) {
                Ok(response) => {
                    debug!(%method, path, status = response.status, "request completed");
                    return classify_response(response);
                }
                Err(err) => {
                    warn!(
                        %method,
                        path,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        "request failed"
                    );
                    last_error = err;
                    if attempt + 1 < max_attempts {
                        self.sleeper.sleep(self.retry.backoff(attempt));
                    }
                }
            }
        }

        Err(TransportError::Exhausted {
            method: method.to_string(),
            path: path.to_string(),
            attempts: max_attempts,
            last_error,
        })
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        let raw = format!("{}{}", self.base_url, path);
        let mut url = Url::parse(&raw).map_err(|err| TransportError::InvalidUrl {
            url: raw.clone(),
            message: err.to_string(),
        })?;
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }
}

fn classify_response(response: HttpResponse) -> Result<String, TransportError> {
    match response.status {
        200 | 201 => Ok(response.body),
        status if is_already_exists(&response.body) => Err(TransportError::Conflict {
            status,
            body: response.body,
        }),
        status => Err(TransportError::Status {
            status,
            body: response.body,
        }),
    }
}

#[derive(Debug)]
pub enum TransportError {
    InvalidUrl {
        url: String,
        message: String,
    },
    Encode(serde_json::Error),
    Exhausted {
        method: String,
        path: String,
        attempts: u32,
        last_error: NetworkError,
    },
    Status {
        status: u16,
        body: String,
    },
    Conflict {
        status: u16,
        body: String,
    },
}

impl TransportError {
    /// The remote state already matches what the request tried to create.
    pub fn is_conflict(&self) -> bool {
        matches!(self, TransportError::Conflict { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } | TransportError::Conflict { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::InvalidUrl { url, message } => {
                write!(f, "invalid request URL '{}': {}", url, message)
            }
            TransportError::Encode(err) => write!(f, "request body encoding error: {}", err),
            TransportError::Exhausted {
                method,
                path,
                attempts,
                last_error,
            } => write!(
                f,
                "{} {} failed after {} attempts: {}",
                method, path, attempts, last_error
            ),
            TransportError::Status { status, body } => {
                write!(f, "API error (status {}): {}", status, body.trim())
            }
            TransportError::Conflict { body, .. } => {
                write!(f, "already exists: {}", body.trim())
            }
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransportError::InvalidUrl { .. } => None,
            TransportError::Encode(err) => Some(err),
            TransportError::Exhausted { last_error, .. } => Some(last_error),
            TransportError::Status { .. } => None,
            TransportError::Conflict { .. } => None,
        }
    }
}
