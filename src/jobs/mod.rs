//! Asynchronous AI jobs: model, contracts, execution, and the HTTP surface.

pub mod executor;
pub mod model;
pub mod request;
pub mod routes;
pub mod schemas;
pub mod service;

pub use executor::JobExecutor;
pub use model::{Job, JobContent, JobKind, JobReceipt, JobState, JobStatusView, JobTransition};
pub use request::{JobRequest, SubmissionBody};
pub use routes::copilot_routes;
pub use schemas::{SchemaIssue, Tone};
pub use service::CopilotService;
