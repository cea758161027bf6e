//! Submission contracts: what a caller may ask for.

use serde::{Deserialize, Serialize};

use super::model::JobKind;
use super::schemas::Tone;
use crate::error::RequestError;

/// Maximum length of a chat question.
pub const MAX_CHAT_MESSAGE_CHARS: usize = 1000;

/// Raw submission body as sent by clients.
///
/// Every field is optional here so that missing fields surface as
/// [`RequestError`]s rather than opaque deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A validated request for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    Analysis { ticket_id: String },
    NextSteps { ticket_id: String },
    DraftReply { ticket_id: String, tone: Tone },
    Chat { ticket_id: String, message: String },
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Analysis { .. } => JobKind::Analysis,
            Self::NextSteps { .. } => JobKind::NextSteps,
            Self::DraftReply { .. } => JobKind::DraftReply,
            Self::Chat { .. } => JobKind::Chat,
        }
    }

    pub fn ticket_id(&self) -> &str {
        match self {
            Self::Analysis { ticket_id }
            | Self::NextSteps { ticket_id }
            | Self::DraftReply { ticket_id, .. }
            | Self::Chat { ticket_id, .. } => ticket_id,
        }
    }

    /// Validate a submission body.
    ///
    /// `route_kind` is the kind implied by a per-kind endpoint; when given,
    /// the body may omit `kind` but must not contradict it.
    pub fn from_body(body: SubmissionBody, route_kind: Option<JobKind>) -> Result<Self, RequestError> {
        let body_kind = body
            .kind
            .as_deref()
            .map(|k| k.parse::<JobKind>().map_err(|_| RequestError::UnknownKind(k.to_string())))
            .transpose()?;

        let kind = match (route_kind, body_kind) {
            (Some(expected), Some(actual)) if expected != actual => {
                return Err(RequestError::KindMismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
            (Some(kind), _) | (None, Some(kind)) => kind,
            (None, None) => return Err(RequestError::MissingField("kind")),
        };

        let ticket_id = body.ticket_id.ok_or(RequestError::MissingField("ticketId"))?;
        if !is_valid_ticket_id(&ticket_id) {
            return Err(RequestError::InvalidTicketId(ticket_id));
        }

        Ok(match kind {
            JobKind::Analysis => Self::Analysis { ticket_id },
            JobKind::NextSteps => Self::NextSteps { ticket_id },
            JobKind::DraftReply => {
                let tone = match body.tone {
                    Some(t) => t.parse::<Tone>().map_err(|_| RequestError::InvalidTone(t))?,
                    None => Tone::default(),
                };
                Self::DraftReply { ticket_id, tone }
            }
            JobKind::Chat => {
                let message = body.message.ok_or(RequestError::MissingField("message"))?;
                let len = message.chars().count();
                if message.trim().is_empty() {
                    return Err(RequestError::InvalidMessage("must not be empty".to_string()));
                }
                if len > MAX_CHAT_MESSAGE_CHARS {
                    return Err(RequestError::InvalidMessage(format!(
                        "must be at most {MAX_CHAT_MESSAGE_CHARS} characters, got {len}"
                    )));
                }
                Self::Chat { ticket_id, message }
            }
        })
    }
}

impl From<&JobRequest> for SubmissionBody {
    fn from(request: &JobRequest) -> Self {
        let mut body = SubmissionBody {
            kind: Some(request.kind().to_string()),
            ticket_id: Some(request.ticket_id().to_string()),
            ..Default::default()
        };
        match request {
            JobRequest::DraftReply { tone, .. } => body.tone = Some(tone.to_string()),
            JobRequest::Chat { message, .. } => body.message = Some(message.clone()),
            JobRequest::Analysis { .. } | JobRequest::NextSteps { .. } => {}
        }
        body
    }
}

/// Whether `id` has the CRM's collision-resistant id shape: a leading `c`
/// followed by at least eight ASCII letters or digits.
pub fn is_valid_ticket_id(id: &str) -> bool {
    match id.as_bytes() {
        [b'c' | b'C', rest @ ..] => rest.len() >= 8 && rest.iter().all(u8::is_ascii_alphanumeric),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(kind: Option<&str>, ticket_id: Option<&str>) -> SubmissionBody {
        SubmissionBody {
            kind: kind.map(String::from),
            ticket_id: ticket_id.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn ticket_id_shape() {
        assert!(is_valid_ticket_id("clabcdef1234567890"));
        assert!(is_valid_ticket_id("cm3x9k2lq"));
        assert!(is_valid_ticket_id("CABCDEFGH"));
        assert!(!is_valid_ticket_id("not-a-cuid"));
        assert!(!is_valid_ticket_id("cshort"));
        assert!(!is_valid_ticket_id("cabc defgh"));
        assert!(!is_valid_ticket_id("cabc-defgh"));
        assert!(!is_valid_ticket_id(""));
        assert!(!is_valid_ticket_id("xabcdefghij"));
        assert!(!is_valid_ticket_id("cabcdefgh/../../admin/users?all=1#"));
        assert!(!is_valid_ticket_id("cabcdefgh_12"));
        assert!(!is_valid_ticket_id("cabcdéfghij"));
    }

    #[test]
    fn analysis_request_from_generic_body() {
        let request = JobRequest::from_body(body(Some("analysis"), Some("clabcdef1234")), None).unwrap();
        assert_eq!(
            request,
            JobRequest::Analysis {
                ticket_id: "clabcdef1234".into()
            }
        );
        assert_eq!(request.kind(), JobKind::Analysis);
        assert_eq!(request.ticket_id(), "clabcdef1234");
    }

    #[test]
    fn draft_reply_tone_defaults_to_professional() {
        let request =
            JobRequest::from_body(body(None, Some("clabcdef1234")), Some(JobKind::DraftReply)).unwrap();
        assert_eq!(
            request,
            JobRequest::DraftReply {
                ticket_id: "clabcdef1234".into(),
                tone: Tone::Professional
            }
        );
    }

    #[test]
    fn draft_reply_rejects_unknown_tone() {
        let mut b = body(Some("draft_reply"), Some("clabcdef1234"));
        b.tone = Some("sarcastic".into());
        assert_eq!(
            JobRequest::from_body(b, None),
            Err(RequestError::InvalidTone("sarcastic".into()))
        );
    }

    #[test]
    fn rejects_bad_ticket_ids_and_missing_fields() {
        assert_eq!(
            JobRequest::from_body(body(Some("analysis"), Some("not-a-cuid")), None),
            Err(RequestError::InvalidTicketId("not-a-cuid".into()))
        );
        assert_eq!(
            JobRequest::from_body(body(Some("analysis"), None), None),
            Err(RequestError::MissingField("ticketId"))
        );
        assert_eq!(
            JobRequest::from_body(body(None, Some("clabcdef1234")), None),
            Err(RequestError::MissingField("kind"))
        );
        assert_eq!(
            JobRequest::from_body(body(Some("summary"), Some("clabcdef1234")), None),
            Err(RequestError::UnknownKind("summary".into()))
        );
    }

    #[test]
    fn route_kind_must_agree_with_body_kind() {
        let err = JobRequest::from_body(
            body(Some("chat"), Some("clabcdef1234")),
            Some(JobKind::Analysis),
        )
        .unwrap_err();
        assert!(matches!(err, RequestError::KindMismatch { .. }));
    }

    #[test]
    fn request_converts_back_to_body() {
        let request = JobRequest::DraftReply {
            ticket_id: "clabcdef1234".into(),
            tone: Tone::Concise,
        };
        let body = SubmissionBody::from(&request);
        assert_eq!(body.kind.as_deref(), Some("draft_reply"));
        assert_eq!(body.tone.as_deref(), Some("concise"));
        assert!(body.message.is_none());
        assert_eq!(JobRequest::from_body(body, None).unwrap(), request);
    }

    #[test]
    fn chat_requires_bounded_message() {
        let mut b = body(Some("chat"), Some("clabcdef1234"));
        assert_eq!(
            JobRequest::from_body(b.clone(), None),
            Err(RequestError::MissingField("message"))
        );

        b.message = Some("   ".into());
        assert!(matches!(
            JobRequest::from_body(b.clone(), None),
            Err(RequestError::InvalidMessage(_))
        ));

        b.message = Some("x".repeat(MAX_CHAT_MESSAGE_CHARS + 1));
        assert!(matches!(
            JobRequest::from_body(b.clone(), None),
            Err(RequestError::InvalidMessage(_))
        ));

        b.message = Some("Why does login loop?".into());
        assert_eq!(
            JobRequest::from_body(b, None).unwrap().kind(),
            JobKind::Chat
        );
    }
}
