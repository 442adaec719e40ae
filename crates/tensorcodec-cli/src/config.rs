//! Model config files.
//!
//! A config names the model, its label file and the tensor specs on both
//! sides of the model:
//!
//! ```toml
//! model = "mobilenet_v1_1.0_224_quant.onnx"
//! labels = "labels.txt"
//!
//! [input]
//! shape = [1, 224, 224, 3]
//! dtype = "u8"
//!
//! [output]
//! shape = [1, 1001]
//! dtype = "u8"
//!
//! [inference]
//! timeout_ms = 5000
//! retries = 1
//! ```
//!
//! Relative paths are resolved against the config file's directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tensorcodec_core::{CodecError, TensorSpec};
use tensorcodec_runtime::InferencePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InferenceSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retries: u32,
}

impl InferenceSection {
    pub fn policy(&self) -> InferencePolicy {
        InferencePolicy::new(self.timeout_ms.map(Duration::from_millis), self.retries)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub model: PathBuf,
    pub labels: PathBuf,
    pub input: TensorSpec,
    pub output: TensorSpec,
    #[serde(default)]
    pub inference: InferenceSection,
}

impl ModelConfig {
    /// Loads a config, picking the format from the file extension.
    pub fn load(path: &Path) -> Result<Self, CodecError> {
        let format = ConfigFormat::from_extension(path).ok_or_else(|| CodecError::Config {
            message: format!(
                "unsupported config file extension for {} (expected .toml or .json)",
                path.display()
            ),
        })?;
        let content = std::fs::read_to_string(path).map_err(|e| CodecError::Config {
            message: format!("failed to read config file {}: {e}", path.display()),
        })?;

        let mut config = Self::parse(&content, format)?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, CodecError> {
        match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| CodecError::Config {
                message: format!("failed to parse TOML config: {e}"),
            }),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| CodecError::Config {
                message: format!("failed to parse JSON config: {e}"),
            }),
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.model.is_relative() {
            self.model = base.join(&self.model);
        }
        if self.labels.is_relative() {
            self.labels = base.join(&self.labels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tensorcodec_core::{DType, Layout, Normalization};

    const QUANT_TOML: &str = r#"
model = "mobilenet_v1_1.0_224_quant.onnx"
labels = "labels.txt"

[input]
name = "input"
shape = [1, 224, 224, 3]
dtype = "uint8"

[output]
shape = [1, 1001]
dtype = "u8"
"#;

    #[test]
    fn parses_quantized_toml() {
        let config = ModelConfig::parse(QUANT_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(config.input.dtype, DType::U8);
        assert_eq!(config.input.shape.dims(), &[1, 224, 224, 3]);
        assert_eq!(config.input.layout, Layout::Nhwc);
        assert_eq!(config.input.name.as_ref().unwrap().0, "input");
        assert_eq!(config.output.numel().unwrap(), 1001);
        assert_eq!(config.inference.policy(), InferencePolicy::default());
    }

    #[test]
    fn parses_float_json() {
        let json = r#"{
            "model": "/models/float.onnx",
            "labels": "/models/labels.txt",
            "input": {
                "shape": [1, 3, 224, 224],
                "dtype": "float32",
                "layout": "nchw",
                "normalization": { "offset": 127.0, "scale": 255.0 }
            },
            "output": { "shape": [1, 1000], "dtype": "f32" },
            "inference": { "timeout_ms": 2500, "retries": 1 }
        }"#;
        let config = ModelConfig::parse(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.input.layout, Layout::Nchw);
        assert_eq!(config.input.normalization, Some(Normalization::CENTERED));
        let policy = config.inference.policy();
        assert_eq!(policy.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(policy.retries, 1);
    }

    #[test]
    fn rejects_unknown_keys() {
        let bad = QUANT_TOML.replace("labels =", "label_file =");
        assert!(matches!(
            ModelConfig::parse(&bad, ConfigFormat::Toml),
            Err(CodecError::Config { .. })
        ));
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(QUANT_TOML.as_bytes()).unwrap();

        let config = ModelConfig::load(&path).unwrap();
        assert_eq!(config.labels, dir.path().join("labels.txt"));
        assert_eq!(
            config.model,
            dir.path().join("mobilenet_v1_1.0_224_quant.onnx")
        );
    }

    #[test]
    fn unknown_extension() {
        assert!(matches!(
            ModelConfig::load(Path::new("model.yaml")),
            Err(CodecError::Config { .. })
        ));
    }
}
