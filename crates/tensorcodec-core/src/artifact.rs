use std::path::PathBuf;

/// Where a backend loads a model from.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum ModelArtifact {
    OnnxPath(PathBuf),
}
