use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::DynamicImage;
use tensorcodec_core::{
    postprocess, postprocess_top_k, preprocess, CodecError, LabelTable, Prediction, Tensor,
    TensorSpec,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{InferencePolicy, InferenceRequest, InferenceResponse, Worker, WorkerModel};

const QUEUE_DEPTH: usize = 64;

/// Preprocess, infer, postprocess.
///
/// Owns the tensor specs, the label table and the only route to the model.
/// Cloning is cheap and every clone talks to the same worker.
#[derive(Clone)]
pub struct Classifier {
    input: TensorSpec,
    output: TensorSpec,
    labels: Arc<LabelTable>,
    policy: InferencePolicy,
    worker_tx: mpsc::Sender<InferenceRequest>,
    next_id: Arc<AtomicU64>,
}

impl Classifier {
    /// Builds a classifier that sends requests to an already running worker.
    ///
    /// # Errors
    ///
    /// * [`CodecError::EmptyLabels`] if `labels` is empty.
    /// * [`CodecError::UnsupportedSpec`] if `input` cannot be produced from an
    ///   image or `output` has more elements than fit in memory.
    /// * [`CodecError::ShapeMismatch`] if `output` does not hold one score per
    ///   label.
    pub fn new(
        input: TensorSpec,
        output: TensorSpec,
        labels: LabelTable,
        policy: InferencePolicy,
        worker_tx: mpsc::Sender<InferenceRequest>,
    ) -> Result<Self, CodecError> {
        if labels.is_empty() {
            return Err(CodecError::EmptyLabels);
        }
        input.image_dims()?;
        let scores = output.numel()?;
        if scores != labels.len() {
            return Err(CodecError::ShapeMismatch {
                message: format!(
                    "output shape {} holds {scores} scores but there are {} labels",
                    output.shape,
                    labels.len()
                ),
            });
        }

        Ok(Self {
            input,
            output,
            labels: Arc::new(labels),
            policy: InferencePolicy::new(policy.timeout, policy.retries),
            worker_tx,
            next_id: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Starts a [`Worker`] owning `model` on the current tokio runtime and
    /// returns a classifier wired to it.
    ///
    /// The worker stops once every clone of the classifier is dropped.
    pub fn spawn(
        model: Box<dyn WorkerModel>,
        input: TensorSpec,
        output: TensorSpec,
        labels: LabelTable,
        policy: InferencePolicy,
    ) -> Result<(Self, JoinHandle<()>), CodecError> {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let classifier = Self::new(input, output, labels, policy, tx)?;

        let worker = Worker {
            id: 0,
            inbox: rx,
            model,
        };
        let handle = tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                tracing::error!(error = ?e, "worker exited");
            }
        });

        Ok((classifier, handle))
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn input_spec(&self) -> &TensorSpec {
        &self.input
    }

    pub fn output_spec(&self) -> &TensorSpec {
        &self.output
    }

    pub fn policy(&self) -> InferencePolicy {
        self.policy
    }

    /// Classifies one image and returns its top class.
    pub async fn classify(&self, image: &DynamicImage) -> Result<Prediction, CodecError> {
        let output = self.run(image).await?;
        postprocess(&output, &self.labels)
    }

    /// Classifies one image and returns up to `k` classes, best first.
    pub async fn classify_top_k(
        &self,
        image: &DynamicImage,
        k: usize,
    ) -> Result<Vec<Prediction>, CodecError> {
        let output = self.run(image).await?;
        postprocess_top_k(&output, &self.labels, k)
    }

    async fn run(&self, image: &DynamicImage) -> Result<Tensor, CodecError> {
        let input = preprocess(image, &self.input)?;
        let output = self.infer(input).await?;
        self.output.check_tensor(&output)?;
        Ok(output)
    }

    /// Sends a prepared tensor to the model, applying the timeout and retry
    /// policy.
    ///
    /// A retry after a timeout queues behind the attempt that timed out, since
    /// the single worker cannot abandon a model call midway. Its timeout window
    /// starts when it is sent, so the stale call has that long to finish.
    /// Requests whose caller stopped waiting before the worker reached them are
    /// skipped.
    pub async fn infer(&self, input: Tensor) -> Result<Tensor, CodecError> {
        let attempts = self.policy.attempts();
        let mut attempt = 1;
        loop {
            match self.infer_once(input.clone()).await {
                Ok(output) => return Ok(output),
                Err(Attempt::Retryable(err)) if attempt < attempts => {
                    warn!(attempt, error = %err, "inference failed, retrying");
                    attempt += 1;
                }
                Err(Attempt::Retryable(err)) | Err(Attempt::Fatal(err)) => return Err(err),
            }
        }
    }

    async fn infer_once(&self, input: Tensor) -> Result<Tensor, Attempt> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (resp_tx, resp_rx) = oneshot::channel();
        let request = InferenceRequest {
            id,
            input,
            enqueued_at: std::time::Instant::now(),
            resp_tx,
        };

        self.worker_tx
            .send(request)
            .await
            .map_err(|_| Attempt::Fatal(CodecError::inference("inference worker is not running")))?;

        let response = match self.policy.timeout {
            None => resp_rx.await,
            Some(limit) => match tokio::time::timeout(limit, resp_rx).await {
                Ok(response) => response,
                Err(_) => {
                    return Err(Attempt::Retryable(CodecError::inference(format!(
                        "no result after {limit:?}"
                    ))))
                }
            },
        };
        let InferenceResponse { result, timings } = response.map_err(|_| {
            Attempt::Fatal(CodecError::inference(
                "inference worker dropped the request",
            ))
        })?;

        debug!(
            request = id,
            queued_us = timings.queued_us,
            backend_us = timings.backend_us,
            "inference completed"
        );
        result.map_err(|err| {
            if err.is_transient() {
                Attempt::Retryable(err)
            } else {
                Attempt::Fatal(err)
            }
        })
    }
}

enum Attempt {
    Retryable(CodecError),
    Fatal(CodecError),
}
