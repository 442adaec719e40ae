use std::time::Duration;

/// How long to wait for an inference and whether to try again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InferencePolicy {
    /// Give up waiting after this long. `None` waits for the worker.
    pub timeout: Option<Duration>,
    /// Extra attempts after a failed or timed out call. At most 1.
    pub retries: u32,
}

impl InferencePolicy {
    pub const MAX_RETRIES: u32 = 1;

    pub fn new(timeout: Option<Duration>, retries: u32) -> Self {
        Self {
            timeout,
            retries: retries.min(Self::MAX_RETRIES),
        }
    }

    pub fn attempts(&self) -> u32 {
        1 + self.retries.min(Self::MAX_RETRIES)
    }
}
