use crate::{Job, JobId, JobKind, Status};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// In-memory job table shared by the HTTP handlers and the workers.
///
/// Each job is written once by the dispatcher (as `Pending`) and once by the
/// worker that owns it (terminal state). Readers may observe `Pending` until
/// that second write lands.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<DashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_job(&self, kind: JobKind) -> JobId {
        let job = Job::pending(kind);
        let id = job.id;
        debug!(message = "Created job", job_id = %id, kind = ?kind);
        self.jobs.insert(id, job);
        id
    }

    pub fn complete_job(&self, id: JobId, response: String) -> bool {
        self.finish(id, Status::Complete, response)
    }

    pub fn fail_job(&self, id: JobId, msg: String) -> bool {
        self.finish(id, Status::Failed, msg)
    }

    /// Moves a pending job to a terminal state. Returns `false` without
    /// touching the job if it is unknown or already terminal.
    fn finish(&self, id: JobId, status: Status, result: String) -> bool {
        let Some(mut job) = self.jobs.get_mut(&id) else {
            warn!(message = "Finishing unknown job", job_id = %id);
            return false;
        };
        if job.status.is_terminal() {
            warn!(message = "Job already finished", job_id = %id, status = ?job.status);
            return false;
        }
        job.status = status;
        job.result = Some(result);
        job.finished_at = Some(Utc::now());
        true
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.get(id).map(|job| job.clone())
    }

    pub(crate) fn remove(&self, id: &JobId) -> Option<Job> {
        self.jobs.remove(id).map(|(_, job)| job)
    }

    /// Drops terminal jobs that finished before `cutoff`. Pending jobs stay.
    pub fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| !matches!(job.finished_at, Some(finished) if finished < cutoff));
        before.saturating_sub(self.jobs.len())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
