use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tensorcodec", version, about = "Image classification with on-disk models")]
pub struct Cli {
    /// Log level (RUST_LOG syntax)
    #[arg(long, global = true, default_value = "info")]
    pub log: String,

    /// Device for inference (cpu or cuda:N)
    #[arg(long, global = true, default_value = "cpu")]
    pub device: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify one image and print the top label(s)
    Classify {
        /// Model config file (.toml or .json)
        #[arg(long)]
        config: PathBuf,

        /// Image to classify
        #[arg(long)]
        image: PathBuf,

        /// Print this many labels instead of only the best one
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        top_k: u32,
    },
    /// Print the inputs and outputs an ONNX model declares
    Inspect {
        /// Path to ONNX model file
        #[arg(long)]
        model: PathBuf,
    },
}
