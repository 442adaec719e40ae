use anyhow::Result;

use crate::{Device, ModelArtifact, ModelSpec, Tensor};

/// Loads models for one inference engine.
pub trait Backend: Send + Sync + 'static {
    type Model: BackendModel;

    fn name(&self) -> &'static str;
    fn load(&self, artifact: &ModelArtifact, device: Device) -> Result<Self::Model>;
}

/// A loaded model. The pipeline only ever sees tensors going in and out.
pub trait BackendModel: Send + 'static {
    fn spec(&self) -> &ModelSpec;

    /// One tensor per model input, in declaration order.
    fn infer(&mut self, inputs: Vec<Tensor>) -> Result<Vec<Tensor>>;
}
