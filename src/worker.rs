use crate::pipeline::Pipeline;
use crate::store::JobStore;
use crate::{JobId, JobRequest};
use async_channel::Receiver;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::*;

#[derive(Debug)]
pub struct QueuedJob {
    pub id: JobId,
    pub request: JobRequest,
}

/// Pulls jobs off the queue and runs each one in its own task, so a slow or
/// hung model call never holds up the jobs behind it.
///
/// Returns once the queue is closed and every spawned job has finished, or
/// as soon as `cancel_token` fires. Cancelled jobs are left `Pending`.
pub async fn start(
    cancel_token: CancellationToken,
    recv_from_queue: Receiver<QueuedJob>,
    store: JobStore,
    pipeline: Arc<Pipeline>,
) {
    let tracker = TaskTracker::new();
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Worker Cancelled");
                break;
            },
            job = recv_from_queue.recv() => {
                match job {
                    Err(_) => {
                        debug!("Job queue closed, exiting");
                        break;
                    },
                    Ok(job) => {
                        tracker.spawn(run(
                            cancel_token.clone(),
                            store.clone(),
                            pipeline.clone(),
                            job,
                        ));
                    }
                }
            }
        }
    }
    tracker.close();
    tracker.wait().await;
    info!("Worker stopped.");
}

async fn run(
    cancel_token: CancellationToken,
    store: JobStore,
    pipeline: Arc<Pipeline>,
    job: QueuedJob,
) {
    let job_id = job.id;
    tokio::select! {
        _ = cancel_token.cancelled() => {
            warn!(message = "Job abandoned on shutdown", job_id = %job_id);
        },
        _ = process(&store, &pipeline, job) => {},
    }
}

#[instrument(skip_all, fields(job_id = %job.id))]
async fn process(store: &JobStore, pipeline: &Pipeline, job: QueuedJob) {
    debug!(message = "Starting job", kind = ?job.request.kind());
    match pipeline.run(&job.request).await {
        Ok(response) => {
            store.complete_job(job.id, response);
            info!("Job finished successfully");
        }
        Err(err) => {
            error!(message = "Job failed", error = %err);
            store.fail_job(job.id, err.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedGateway;
    use crate::gateway::{ChatMessage, InferenceError, ModelGateway};
    use crate::pipeline::ModelSet;
    use crate::{JobKind, Status};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn models() -> ModelSet {
        ModelSet {
            classification: "classifier".into(),
            chat: "chat".into(),
            image: "vision".into(),
        }
    }

    fn pipeline(gateway: impl ModelGateway + 'static) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(Arc::new(gateway), models()))
    }

    /// Classifier and image model answer at once; the chat model never does.
    struct HungChat;

    #[async_trait]
    impl ModelGateway for HungChat {
        async fn invoke(
            &self,
            model: &str,
            _messages: &[ChatMessage],
        ) -> Result<String, InferenceError> {
            match model {
                "chat" => std::future::pending().await,
                "classifier" => Ok("YES".into()),
                _ => Ok("Shiitake_Edible".into()),
            }
        }
    }

    fn chat_job(store: &JobStore) -> QueuedJob {
        QueuedJob {
            id: store.create_job(JobKind::Chat),
            request: JobRequest::Chat {
                message: "Is Amanita muscaria poisonous?".into(),
            },
        }
    }

    fn image_job(store: &JobStore) -> QueuedJob {
        QueuedJob {
            id: store.create_job(JobKind::IdentifyImage),
            request: JobRequest::IdentifyImage {
                image: "aW1n".into(),
            },
        }
    }

    #[tokio::test]
    async fn drains_queue_and_stops_when_closed() {
        let store = JobStore::new();
        let (send, recv) = async_channel::unbounded();
        let ok = store.create_job(JobKind::IdentifyImage);
        let bad = store.create_job(JobKind::IdentifyImage);
        send.send(QueuedJob {
            id: ok,
            request: JobRequest::IdentifyImage {
                image: "aW1n".into(),
            },
        })
        .await
        .unwrap();
        send.send(QueuedJob {
            id: bad,
            request: JobRequest::IdentifyImage {
                image: "%%%".into(),
            },
        })
        .await
        .unwrap();
        send.close();

        let gateway = ScriptedGateway::replying(vec![Ok("Shiitake_Edible".into())]);
        start(CancellationToken::new(), recv, store.clone(), pipeline(gateway)).await;

        let ok = store.get(&ok).unwrap();
        assert_eq!(ok.status, Status::Complete);
        assert_eq!(ok.result.as_deref(), Some("Shiitake_Edible"));
        let bad = store.get(&bad).unwrap();
        assert_eq!(bad.status, Status::Failed);
        assert!(bad.result.unwrap().contains("invalid base64"));
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let (_send, recv) = async_channel::unbounded();
        let token = CancellationToken::new();
        token.cancel();

        start(token, recv, JobStore::new(), pipeline(ScriptedGateway::default())).await;
    }

    #[tokio::test]
    async fn hung_model_calls_do_not_block_later_jobs() {
        let store = JobStore::new();
        let (send, recv) = async_channel::unbounded();
        let token = CancellationToken::new();
        let handle = tokio::spawn(start(token.clone(), recv, store.clone(), pipeline(HungChat)));

        let hung: Vec<JobId> = (0..32)
            .map(|_| {
                let job = chat_job(&store);
                let id = job.id;
                send.try_send(job).unwrap();
                id
            })
            .collect();
        let image = image_job(&store);
        let image_id = image.id;
        send.try_send(image).unwrap();

        timeout(Duration::from_secs(2), async {
            while store.get(&image_id).unwrap().status == Status::Pending {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("image job stuck behind hung chat jobs");

        let job = store.get(&image_id).unwrap();
        assert_eq!(job.status, Status::Complete);
        assert_eq!(job.result.as_deref(), Some("Shiitake_Edible"));
        for id in &hung {
            assert_eq!(store.get(id).unwrap().status, Status::Pending);
        }

        token.cancel();
        timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop on cancel")
            .unwrap();
        for id in &hung {
            assert_eq!(store.get(id).unwrap().status, Status::Pending);
        }
    }
}
