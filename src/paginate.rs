use std::error::Error;
use std::fmt;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::models::PageEnvelope;
use crate::transport::{Transport, TransportError};

pub const PAGE_SIZE: u32 = 100;

/// Loads every page of `endpoint` in server order. Any failing page fails
/// the whole fetch; callers never see a truncated collection.
pub fn fetch_all<T: DeserializeOwned>(
    transport: &Transport,
    endpoint: &str,
) -> Result<Vec<T>, FetchError> {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    let mut items = Vec::new();
    let mut page = 1u32;

    loop {
        let paged = format!("{endpoint}{separator}limit={PAGE_SIZE}&page={page}");
        let body = transport.get(&paged)?;
        let envelope: PageEnvelope<T> =
            serde_json::from_str(&body).map_err(|source| FetchError::Parse {
                endpoint: paged.clone(),
                source,
            })?;
        debug!(
            endpoint,
            page,
            count = envelope.items.len(),
            has_more = envelope.has_more,
            total_items = envelope.total_items,
            "loaded page"
        );
        items.extend(envelope.items);
        if !envelope.has_more {
            break;
        }
        page += 1;
    }

    info!(endpoint, total = items.len(), pages = page, "loaded collection");
    Ok(items)
}

#[derive(Debug)]
pub enum FetchError {
    Transport(TransportError),
    Parse {
        endpoint: String,
        source: serde_json::Error,
    },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(err) => write!(f, "{}", err),
            FetchError::Parse { endpoint, source } => {
                write!(f, "malformed response from {}: {}", endpoint, source)
            }
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FetchError::Transport(err) => Some(err),
            FetchError::Parse { source, .. } => Some(source),
        }
    }
}

impl From<TransportError> for FetchError {
    fn from(value: TransportError) -> Self {
        FetchError::Transport(value)
    }
}

#[cfg(test)]
#[path = "paginate_tests_ext.rs"]
mod tests_ext;
