//! Tensor specs and the pre/post-processing halves of an image
//! classification pipeline.
//!
//! [`preprocess()`] packs an image into the tensor a model expects and
//! [`postprocess()`] reduces the model's score vector to a labelled
//! [`Prediction`]. Running the model itself happens behind [`BackendModel`].

pub mod artifact;
pub mod backend;
pub mod error;
pub mod labels;
pub mod postprocess;
pub mod preprocess;
pub mod spec;
pub mod tensor;

pub use artifact::*;
pub use backend::*;
pub use error::*;
pub use labels::*;
pub use postprocess::*;
pub use preprocess::*;
pub use spec::*;
pub use tensor::*;
