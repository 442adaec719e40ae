use tensorcodec_core::{CodecError, Tensor};
use tokio::sync::oneshot;

#[derive(Debug)]
pub struct InferenceRequest {
    pub id: u64,
    pub input: Tensor,
    pub enqueued_at: std::time::Instant,
    pub resp_tx: oneshot::Sender<InferenceResponse>,
}

/// Completion of one [`InferenceRequest`]; sent exactly once.
#[derive(Debug)]
pub struct InferenceResponse {
    pub result: Result<Tensor, CodecError>,
    pub timings: Timings,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Timings {
    pub queued_us: u64,
    pub backend_us: u64,
}
