use anyhow::{Context, Result};
use tensorcodec_core::CodecError;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{InferenceRequest, InferenceResponse, Timings, WorkerModel};

/// Owns the model and serves requests one at a time.
///
/// Model calls are synchronous and may take a while, so the worker drains its
/// inbox on the blocking pool and never holds an executor thread.
pub struct Worker {
    pub id: u32,
    pub inbox: mpsc::Receiver<InferenceRequest>,
    pub model: Box<dyn WorkerModel>,
}

impl Worker {
    /// Runs until every sender has been dropped.
    pub async fn run(self) -> Result<()> {
        let id = self.id;
        tokio::task::spawn_blocking(move || self.serve())
            .await
            .with_context(|| format!("worker {id} panicked"))
    }

    fn serve(mut self) {
        info!(worker_id = self.id, "worker started");
        while let Some(req) = self.inbox.blocking_recv() {
            self.handle(req);
        }
        info!(worker_id = self.id, "worker stopped");
    }

    fn handle(&mut self, req: InferenceRequest) {
        let queued_us = req.enqueued_at.elapsed().as_micros() as u64;

        // Timed out or cancelled while queued; nobody is waiting for this one.
        if req.resp_tx.is_closed() {
            debug!(worker_id = self.id, request = req.id, queued_us, "skipping abandoned request");
            return;
        }

        let t0 = std::time::Instant::now();
        let result = self.model.infer(req.input).map_err(CodecError::inference);
        let backend_us = t0.elapsed().as_micros() as u64;

        debug!(
            worker_id = self.id,
            request = req.id,
            queued_us,
            backend_us,
            ok = result.is_ok(),
            "inference finished"
        );

        let response = InferenceResponse {
            result,
            timings: Timings {
                queued_us,
                backend_us,
            },
        };
        if req.resp_tx.send(response).is_err() {
            debug!(request = req.id, "caller went away before completion");
        }
    }
}
