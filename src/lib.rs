//! Ticket copilot: asynchronous AI jobs over support tickets.
//!
//! A caller submits a job, gets a `queued` receipt back immediately, and
//! polls the status endpoint until the job reaches `success` (with
//! schema-valid content) or `error`.

pub mod client;
pub mod config;
pub mod crm;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod safety;
pub mod store;
