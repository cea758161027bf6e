//! Ticket-data collaborator: the snapshot model and the source abstraction.

pub mod client;

pub use client::{CrmClient, CrmConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CrmError;

/// Who wrote a ticket message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorType {
    #[serde(alias = "CUSTOMER")]
    Customer,
    #[serde(alias = "AGENT")]
    Agent,
    #[serde(alias = "SYSTEM")]
    System,
}

impl std::fmt::Display for AuthorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Agent => write!(f, "agent"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One message in a ticket thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketMessage {
    pub author_type: AuthorType,
    pub author_name: String,
    pub content: String,
}

/// Point-in-time view of a support ticket.
///
/// Never mutated or persisted by the copilot; a redacted copy is derived
/// before anything is sent to the generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSnapshot {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub customer_name: String,
    pub product_area: String,
    #[serde(default)]
    pub messages: Vec<TicketMessage>,
}

impl TicketSnapshot {
    /// The most recent message, if the thread has any.
    pub fn latest_message(&self) -> Option<&TicketMessage> {
        self.messages.last()
    }
}

/// Anything that can produce ticket snapshots by id.
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Fetch the current snapshot of a ticket.
    async fn get_ticket_snapshot(&self, ticket_id: &str) -> Result<TicketSnapshot, CrmError>;
}
