//! Downstream dispatch service
//!
//! Starts downstream pipelines without waiting for them. Each trigger is
//! spawned as a tokio task on the runtime handed to the dispatcher; the
//! calling stage returns as soon as the task exists. Whether the trigger
//! succeeds is only logged and never reaches the run's status.

use slipway_core::dto::trigger::TriggerPipeline;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::repository::PipelineRepository;

/// Fire-and-forget trigger dispatcher
pub struct Dispatcher {
    runtime: Handle,
    repository: Arc<dyn PipelineRepository>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Creates a dispatcher
    ///
    /// # Arguments
    /// * `runtime` - Runtime the trigger tasks are spawned on
    /// * `repository` - Where trigger requests are sent
    pub fn new(runtime: Handle, repository: Arc<dyn PipelineRepository>) -> Self {
        Self {
            runtime,
            repository,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the trigger request and returns immediately
    pub fn dispatch(&self, req: TriggerPipeline) {
        let repository = Arc::clone(&self.repository);
        let pipeline = req.pipeline.clone();

        debug!("Dispatching trigger for pipeline '{}'", pipeline);

        let handle = self.runtime.spawn(async move {
            match repository.trigger(req).await {
                Ok(accepted) => info!(
                    "Downstream pipeline '{}' queued as run {}",
                    accepted.pipeline, accepted.run_id
                ),
                Err(e) => warn!(
                    "Downstream pipeline '{}' could not be triggered: {:#}",
                    pipeline, e
                ),
            }
        });

        self.lock().push(handle);
    }

    /// Number of dispatched triggers still in flight
    pub fn pending(&self) -> usize {
        self.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Gives in-flight triggers up to `grace` to be handed off
    ///
    /// Called by the process before it exits; it has no bearing on any run's
    /// status. Returns how many triggers were still in flight at the deadline.
    pub async fn settle(&self, grace: Duration) -> usize {
        let handles = std::mem::take(&mut *self.lock());
        let deadline = tokio::time::Instant::now() + grace;
        let mut unfinished = 0;

        for mut handle in handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Trigger task failed: {}", e),
                Err(_) => unfinished += 1,
            }
        }

        if unfinished > 0 {
            warn!("{} downstream trigger(s) still in flight", unfinished);
        }
        unfinished
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingRepository, TriggerBehavior};
    use std::collections::BTreeMap;

    fn request() -> TriggerPipeline {
        TriggerPipeline {
            pipeline: "integration-tests".to_string(),
            parameters: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_returns_before_trigger_completes() {
        let repository = Arc::new(RecordingRepository::new(TriggerBehavior::Hang));
        let dispatcher = Dispatcher::new(Handle::current(), repository.clone());

        dispatcher.dispatch(request());
        assert_eq!(dispatcher.pending(), 1);

        let unfinished = dispatcher.settle(Duration::from_millis(20)).await;
        assert_eq!(unfinished, 1);
        assert_eq!(repository.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_trigger_is_only_logged() {
        let repository = Arc::new(RecordingRepository::new(TriggerBehavior::Fail));
        let dispatcher = Dispatcher::new(Handle::current(), repository.clone());

        dispatcher.dispatch(request());
        let unfinished = dispatcher.settle(Duration::from_secs(5)).await;

        assert_eq!(unfinished, 0);
        assert_eq!(dispatcher.pending(), 0);
        assert_eq!(repository.calls()[0].pipeline, "integration-tests");
    }

    #[tokio::test]
    async fn test_settle_without_dispatches() {
        let repository = Arc::new(RecordingRepository::new(TriggerBehavior::Accept));
        let dispatcher = Dispatcher::new(Handle::current(), repository);
        assert_eq!(dispatcher.settle(Duration::from_millis(1)).await, 0);
    }
}
