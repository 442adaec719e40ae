mod cli;
mod config;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use config::ModelConfig;
use tensorcodec_backend_ort::OrtBackend;
use tensorcodec_core::{load_image, Backend, BackendModel, Device, LabelTable, ModelArtifact};
use tensorcodec_runtime::Classifier;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log)?;
    let device = parse_device(&cli.device)?;

    match cli.command {
        Command::Classify {
            config,
            image,
            top_k,
        } => classify(&config, &image, top_k, device).await,
        Command::Inspect { model } => inspect(&model, device),
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).with_context(|| format!("invalid log filter {level:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn classify(
    config_path: &Path,
    image_path: &Path,
    top_k: u32,
    device: Device,
) -> Result<()> {
    let config = ModelConfig::load(config_path)?;
    let labels = LabelTable::from_path(&config.labels)?;
    tracing::info!(labels = labels.len(), path = %config.labels.display(), "label table ready");

    let backend = OrtBackend::new();
    let model = backend
        .load(&ModelArtifact::OnnxPath(config.model.clone()), device)
        .with_context(|| format!("{} backend could not load the model", backend.name()))?;

    // Fail before any inference if the declared specs disagree with the model.
    let (model_input, model_output) = model.spec().single_io()?;
    config.input.check_compatible(model_input)?;
    config.output.check_compatible(model_output)?;

    let (classifier, worker) = Classifier::spawn(
        Box::new(model),
        config.input,
        config.output,
        labels,
        config.inference.policy(),
    )?;

    let image = load_image(image_path)?;
    let predictions = classifier.classify_top_k(&image, top_k as usize).await?;
    for p in &predictions {
        println!("{}\t{}\t{:.4}", p.index, p.label, p.probability());
    }

    drop(classifier);
    worker.await.context("inference worker panicked")?;
    Ok(())
}

fn inspect(model_path: &Path, device: Device) -> Result<()> {
    let backend = OrtBackend::new();
    let model = backend.load(&ModelArtifact::OnnxPath(model_path.to_path_buf()), device)?;
    let spec = model.spec();

    for (kind, ios) in [("input", &spec.inputs), ("output", &spec.outputs)] {
        for io in ios.iter() {
            let dims: Vec<String> = io
                .dims
                .iter()
                .map(|d| d.map_or_else(|| "?".to_string(), |d| d.to_string()))
                .collect();
            println!("{kind}\t{}\t{}\t[{}]", io.name, io.dtype, dims.join(", "));
        }
    }
    Ok(())
}

fn parse_device(raw: &str) -> Result<Device> {
    if raw.eq_ignore_ascii_case("cpu") {
        return Ok(Device::Cpu);
    }

    if let Some(rest) = raw.strip_prefix("cuda:") {
        let device_id: u32 = rest.parse().context("invalid cuda device id")?;
        return Ok(Device::Cuda { device_id });
    }

    anyhow::bail!("unsupported device: {raw} (expected cpu or cuda:N)");
}
