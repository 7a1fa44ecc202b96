//! Background lane for long-running commands
//!
//! A single worker runs jobs one after another, off the link's receive path.
//! Shutdown aborts the worker without draining; a job still in flight may
//! find the link gone when it replies, and that reply is dropped.

use super::dispatcher::{invoke, Dispatcher};
use crate::connection::Outbox;
use reverse_link_shared::{DisplayId, Reply, RequestId};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A command handed to the lane
pub struct LaneJob {
    pub id: Option<RequestId>,
    pub method: String,
    pub params: Map<String, Value>,
    pub dispatcher: Arc<dyn Dispatcher>,
}

/// Sequential executor for long-running commands
pub struct AsyncLane {
    queue: mpsc::UnboundedSender<LaneJob>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncLane {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn new(outbox: Outbox) -> Self {
        let (queue, jobs) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(jobs, outbox));
        Self {
            queue,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue a job and return immediately
    pub fn submit(&self, job: LaneJob) {
        let method = job.method.clone();
        let id = job.id.clone();
        if self.queue.send(job).is_err() {
            warn!(
                "Async lane stopped, dropping {} (id={})",
                method,
                DisplayId(id.as_ref())
            );
            return;
        }
        debug!("Queued {} (id={}) on async lane", method, DisplayId(id.as_ref()));
    }

    /// Stop the worker immediately; queued jobs are discarded
    pub fn shutdown(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.abort();
            info!("Async lane stopped");
        }
    }
}

impl Drop for AsyncLane {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_worker(mut jobs: mpsc::UnboundedReceiver<LaneJob>, outbox: Outbox) {
    while let Some(job) = jobs.recv().await {
        run_job(job, &outbox).await;
    }
}

async fn run_job(job: LaneJob, outbox: &Outbox) {
    let LaneJob {
        id,
        method,
        params,
        dispatcher,
    } = job;

    let outcome = match invoke(dispatcher.as_ref(), &method, &params, id.as_ref()).await {
        Ok(value) => outbox
            .send_reply(&Reply::success(id.clone(), value))
            .map_err(|e| e.to_string()),
        Err(message) => Err(message),
    };

    match outcome {
        Ok(()) => debug!("{} (id={}) finished", method, DisplayId(id.as_ref())),
        Err(message) => {
            error!("{} task failed: {}", method, message);
            if let Err(e) = outbox.send_reply(&Reply::failure(id, message)) {
                error!("Error responding with an error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::dispatcher::Origin;
    use crate::transport::OutboundFrame;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps for `params.ms` then echoes the method, or fails on "bad"
    struct Slow;

    #[async_trait]
    impl Dispatcher for Slow {
        async fn dispatch(
            &self,
            method: &str,
            params: &Map<String, Value>,
            _origin: Origin,
            _request_id: Option<&RequestId>,
        ) -> Result<Value> {
            let ms = params.get("ms").and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            if method == "bad" {
                return Err(anyhow!("Install failed"));
            }
            Ok(json!({ "method": method, "ms": ms }))
        }
    }

    /// Counts dispatches before delegating to [`Slow`]
    struct Counted(Arc<AtomicUsize>);

    #[async_trait]
    impl Dispatcher for Counted {
        async fn dispatch(
            &self,
            method: &str,
            params: &Map<String, Value>,
            origin: Origin,
            request_id: Option<&RequestId>,
        ) -> Result<Value> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Slow.dispatch(method, params, origin, request_id).await
        }
    }

    fn job(id: RequestId, method: &str, ms: u64) -> LaneJob {
        let mut params = Map::new();
        params.insert("ms".into(), json!(ms));
        LaneJob {
            id: Some(id),
            method: method.into(),
            params,
            dispatcher: Arc::new(Slow),
        }
    }

    fn attached_outbox() -> (Outbox, mpsc::UnboundedReceiver<OutboundFrame>) {
        let outbox = Outbox::new();
        let (tx, rx) = mpsc::unbounded_channel();
        outbox.attach(tx);
        (outbox, rx)
    }

    fn next_reply(rx: &mut mpsc::UnboundedReceiver<OutboundFrame>) -> Value {
        match rx.try_recv().expect("no reply sent") {
            OutboundFrame::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_run_in_submission_order() {
        let (outbox, mut rx) = attached_outbox();
        let lane = AsyncLane::new(outbox);

        lane.submit(job(RequestId::from(1), "install", 500));
        lane.submit(job(RequestId::from("b"), "install", 10));

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(next_reply(&mut rx)["id"], json!(1));
        assert_eq!(next_reply(&mut rx)["id"], json!("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_replies_with_same_id() {
        let (outbox, mut rx) = attached_outbox();
        let lane = AsyncLane::new(outbox);

        lane.submit(job(RequestId::from("abc"), "bad", 0));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            next_reply(&mut rx),
            json!({ "id": "abc", "error": { "message": "Install failed" } })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_pending_work() {
        let (outbox, mut rx) = attached_outbox();
        let lane = AsyncLane::new(outbox);

        lane.submit(job(RequestId::from(1), "install", 1000));
        tokio::task::yield_now().await;
        lane.shutdown();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());

        // Submissions after shutdown are dropped quietly
        lane.submit(job(RequestId::from(2), "install", 0));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_after_link_gone_is_dropped() {
        let (outbox, rx) = attached_outbox();
        let lane = AsyncLane::new(outbox.clone());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut lost = job(RequestId::from(9), "install", 100);
        lost.dispatcher = Arc::new(Counted(runs.clone()));
        lane.submit(lost);
        outbox.detach();
        drop(rx);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!outbox.is_attached());

        // The worker survives and serves the next link
        let (tx, mut rx) = mpsc::unbounded_channel();
        outbox.attach(tx);
        lane.submit(job(RequestId::from(10), "install", 0));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(next_reply(&mut rx)["id"], json!(10));
    }
}
