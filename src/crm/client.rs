//! HTTP client for the CRM ticket API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{TicketSnapshot, TicketSource};
use crate::error::CrmError;

/// Connection settings for the CRM API.
#[derive(Debug, Clone)]
pub struct CrmConfig {
    /// Base URL, e.g. `http://localhost:3000/api`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub api_token: Option<SecretString>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            api_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// `{ "data": ... }` success envelope.
#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// `{ "error": "..." }` failure body.
#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Ticket source backed by the CRM's REST API.
pub struct CrmClient {
    config: CrmConfig,
    client: reqwest::Client,
}

impl CrmClient {
    pub fn new(config: CrmConfig) -> Result<Self, CrmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CrmError::Request(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// `{base}/tickets/{id}`, with the id percent-encoded as a single segment.
    fn ticket_url(&self, ticket_id: &str) -> Result<reqwest::Url, CrmError> {
        let mut url = reqwest::Url::parse(&self.config.base_url).map_err(|e| {
            CrmError::Request(format!("Invalid CRM base URL {:?}: {e}", self.config.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                CrmError::Request(format!("CRM base URL cannot take a path: {}", self.config.base_url))
            })?
            .pop_if_empty()
            .push("tickets")
            .push(ticket_id);
        Ok(url)
    }
}

#[async_trait]
impl TicketSource for CrmClient {
    async fn get_ticket_snapshot(&self, ticket_id: &str) -> Result<TicketSnapshot, CrmError> {
        let url = self.ticket_url(ticket_id)?;
        debug!(ticket_id, url = %url, "Fetching ticket snapshot");

        let mut request = self.client.get(url);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request
            .send()
            .await
            .map_err(|e| CrmError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let reason = resp
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            warn!(ticket_id, status = status.as_u16(), reason = %reason, "CRM request failed");
            return Err(match status {
                StatusCode::NOT_FOUND => CrmError::NotFound {
                    ticket_id: ticket_id.to_string(),
                },
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CrmError::Unauthorized {
                    ticket_id: ticket_id.to_string(),
                },
                _ => CrmError::Status {
                    status: status.as_u16(),
                    reason,
                },
            });
        }

        let envelope: DataEnvelope<TicketSnapshot> = resp
            .json()
            .await
            .map_err(|e| CrmError::InvalidResponse(e.to_string()))?;
        Ok(envelope.data)
    }
}
