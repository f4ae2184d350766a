// perfdesk-api: async client for the perfdesk performance-evaluation REST API

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::{ApiClient, ClientConfig};
pub use error::Error;
pub use models::{Employee, Evaluation, EvaluationSubmission, NewProject, Project, Qualification};
pub use transport::{TlsMode, TransportConfig};
