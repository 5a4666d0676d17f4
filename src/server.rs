use crate::config::ConfigContext;
use crate::gateway::ModelGateway;
use crate::pipeline::Pipeline;
use crate::store::JobStore;
use crate::worker::{self, QueuedJob};
use crate::{api, JobId, JobRequest};
use anyhow::Error;
use async_channel::Sender;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::*;

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("job queue is closed")]
    QueueClosed,
}

/// Entry point for new work: records a pending job and hands it to the
/// worker without waiting for it to run.
#[derive(Clone)]
pub struct Dispatcher {
    store: JobStore,
    send_to_queue: Sender<QueuedJob>,
}

impl Dispatcher {
    pub fn new(store: JobStore, send_to_queue: Sender<QueuedJob>) -> Self {
        Dispatcher {
            store,
            send_to_queue,
        }
    }

    pub fn submit(&self, request: JobRequest) -> Result<JobId, DispatchError> {
        let id = self.store.create_job(request.kind());
        // Unbounded queue: only fails once it has been closed for shutdown.
        if self.send_to_queue.try_send(QueuedJob { id, request }).is_err() {
            self.store.remove(&id);
            return Err(DispatchError::QueueClosed);
        }
        Ok(id)
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }
}

/// The dispatch loop together with the dispatcher feeding it.
pub struct JobRunner {
    pub dispatcher: Dispatcher,
    send_to_queue: Sender<QueuedJob>,
    worker: JoinHandle<()>,
}

impl JobRunner {
    pub fn start(
        cancel_token: CancellationToken,
        pipeline: Arc<Pipeline>,
        store: JobStore,
    ) -> Self {
        let (send_to_queue, recv_from_queue) = async_channel::unbounded::<QueuedJob>();

        let worker = tokio::spawn(
            worker::start(cancel_token, recv_from_queue, store.clone(), pipeline)
                .instrument(info_span!("worker")),
        );

        JobRunner {
            dispatcher: Dispatcher::new(store, send_to_queue.clone()),
            send_to_queue,
            worker,
        }
    }

    /// Stops accepting jobs and waits for the queued and running ones.
    pub async fn shutdown(self) -> Result<(), Error> {
        self.send_to_queue.close();
        self.worker.await?;
        Ok(())
    }
}

/// Periodically forgets finished jobs older than `ttl`.
pub async fn sweep(cancel_token: CancellationToken, store: JobStore, ttl: Duration) {
    let ttl = match chrono::Duration::from_std(ttl) {
        Ok(ttl) => ttl,
        Err(err) => {
            error!(message = "Job TTL out of range, eviction disabled", error = %err);
            return;
        }
    };
    let period = (ttl / 4)
        .to_std()
        .unwrap_or(Duration::from_secs(60))
        .clamp(Duration::from_secs(1), Duration::from_secs(60));
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Sweeper Cancelled");
                break;
            },
            _ = interval.tick() => {
                // A TTL reaching past the start of the calendar evicts nothing.
                let Some(cutoff) = Utc::now().checked_sub_signed(ttl) else {
                    continue;
                };
                let evicted = store.evict_finished_before(cutoff);
                if evicted > 0 {
                    debug!(message = "Evicted finished jobs", evicted, remaining = store.len());
                }
            }
        }
    }
}

pub fn build_pipeline(config: &ConfigContext, gateway: Arc<dyn ModelGateway>) -> Pipeline {
    let pipeline = Pipeline::new(gateway, config.models());
    match &config.out_of_scope_response {
        Some(response) => pipeline.with_out_of_scope_response(response.as_str()),
        None => pipeline,
    }
}

pub async fn serve(
    cancel_token: CancellationToken,
    config: ConfigContext,
    gateway: Arc<dyn ModelGateway>,
) -> Result<(), Error> {
    let store = JobStore::new();
    let pipeline = Arc::new(build_pipeline(&config, gateway));
    let runner = JobRunner::start(cancel_token.clone(), pipeline, store.clone());

    let sweeper = config.job_ttl().map(|ttl| {
        tokio::spawn(
            sweep(cancel_token.clone(), store.clone(), ttl).instrument(info_span!("sweeper")),
        )
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(message = "Listening", addr = %listener.local_addr()?);

    let app = api::router(runner.dispatcher.clone());
    let shutdown = {
        let cancel_token = cancel_token.clone();
        async move { cancel_token.cancelled().await }
    };
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    // Make sure the job loop and sweeper stop even if the listener failed on its own.
    cancel_token.cancel();
    runner.shutdown().await?;
    if let Some(sweeper) = sweeper {
        sweeper.await?;
    }
    served?;

    info!("Server stopped.");

    Ok(())
}
