//! Prompt construction for each job kind.
//!
//! Prompts are built from the redacted snapshot only. The wording is not a
//! contract; the JSON shape each prompt asks for is.

use crate::crm::TicketSnapshot;
use crate::jobs::model::JobKind;
use crate::jobs::request::JobRequest;
use crate::jobs::schemas::{self, SchemaIssue};

/// A structured prompt: system instructions plus the user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub kind: JobKind,
    pub system: String,
    pub user: String,
}

const BASE_SYSTEM: &str = "You are a support copilot helping agents resolve customer tickets. \
     Respond with a single JSON object and nothing else.";

/// Render the ticket the way every prompt presents it.
fn render_ticket(ticket: &TicketSnapshot) -> String {
    let mut out = format!(
        "Title: {}\nStatus: {}\nPriority: {}\nCustomer: {}\nProduct Area: {}\nDescription: {}\n",
        ticket.title,
        ticket.status,
        ticket.priority,
        ticket.customer_name,
        ticket.product_area,
        ticket.description,
    );
    if ticket.messages.is_empty() {
        out.push_str("\nMessages: (none)\n");
    } else {
        out.push_str("\nMessages:\n");
        for m in &ticket.messages {
            out.push_str(&format!("{} ({}): {}\n", m.author_name, m.author_type, m.content));
        }
    }
    out
}

fn system_for(kind: JobKind, role: &str) -> String {
    format!(
        "{BASE_SYSTEM} {role}\n\nThe JSON object must match this shape:\n{}",
        schemas::contract_description(kind)
    )
}

/// Build the prompt for a request over an already-redacted snapshot.
pub fn build_prompt(request: &JobRequest, ticket: &TicketSnapshot) -> PromptSpec {
    let kind = request.kind();
    let ticket_text = render_ticket(ticket);

    let (system, user) = match request {
        JobRequest::Analysis { .. } => (
            system_for(
                kind,
                "Analyze the ticket: extract environment signals, error strings and URLs, \
                 rank likely causes with evidence and a confidence between 0 and 1, and list \
                 clarifying questions, next steps, risk flags and escalation conditions.",
            ),
            format!("Analyze this support ticket.\n\n{ticket_text}"),
        ),
        JobRequest::NextSteps { .. } => (
            system_for(kind, "Suggest 3-5 short, actionable next steps for the support agent."),
            format!("Suggest next steps for this support ticket.\n\n{ticket_text}"),
        ),
        JobRequest::DraftReply { tone, .. } => {
            let latest = ticket
                .latest_message()
                .map(|m| m.content.as_str())
                .unwrap_or(ticket.description.as_str());
            (
                system_for(
                    kind,
                    &format!(
                        "Draft a {} reply to the customer. Set \"tone\" to \"{tone}\".",
                        tone.instruction()
                    ),
                ),
                format!(
                    "Draft a reply to the latest customer message.\n\nLatest message: {latest}\n\n{ticket_text}"
                ),
            )
        }
        JobRequest::Chat { message, .. } => (
            system_for(kind, "Answer the agent's question about the ticket concisely."),
            format!("{ticket_text}\nQuestion: {message}"),
        ),
    };

    PromptSpec { kind, system, user }
}

/// Follow-up user turn asking the model to fix an invalid answer.
pub fn repair_instruction(kind: JobKind, issues: &[SchemaIssue]) -> String {
    let listed = issues
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Your previous answer did not match the required {kind} JSON shape.\n\
         Validation errors:\n{listed}\n\n\
         Return a corrected JSON object that satisfies the shape. Output only the JSON object."
    )
}
