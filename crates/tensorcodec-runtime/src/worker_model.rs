use anyhow::{ensure, Result};
use tensorcodec_core::{BackendModel, Tensor};

/// Object-safe, single tensor in, single tensor out model interface.
/// Synchronous; the worker task calls it directly.
pub trait WorkerModel: Send {
    fn infer(&mut self, input: Tensor) -> Result<Tensor>;
}

impl<T: BackendModel> WorkerModel for T {
    fn infer(&mut self, input: Tensor) -> Result<Tensor> {
        let mut outputs = BackendModel::infer(self, vec![input])?;
        ensure!(
            outputs.len() == 1,
            "expected exactly one model output, got {}",
            outputs.len()
        );
        Ok(outputs.remove(0))
    }
}
