use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod api;
pub mod classifier;
pub mod config;
pub mod gateway;
pub mod identifier;
pub mod pipeline;
pub mod prompts;
pub mod responder;
pub mod server;
pub mod store;
pub mod telemetry;
pub mod worker;

pub type JobId = Uuid;

/// Work submitted by a client, carried from the dispatcher to a worker.
#[derive(Debug, Clone)]
pub enum JobRequest {
    Chat { message: String },
    IdentifyImage { image: String },
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::Chat { .. } => JobKind::Chat,
            JobRequest::IdentifyImage { .. } => JobKind::IdentifyImage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Chat,
    IdentifyImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Complete,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Pending)
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: Status,
    pub result: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub(crate) fn pending(kind: JobKind) -> Self {
        Job {
            id: Uuid::new_v4(),
            kind,
            status: Status::Pending,
            result: None,
            finished_at: None,
        }
    }
}
