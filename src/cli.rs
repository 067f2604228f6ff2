// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the pull and purge subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use fledged_imagemanager::output::OutputMode;
use fledged_imagemanager::types::{ImageCacheRef, NodeTarget};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fledged-imagemanager")]
#[command(about = "Pull and purge container images on Kubernetes nodes with helper Jobs")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to fledged.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output mode
    #[arg(short, long, global = true, value_enum, default_value_t = OutputMode::Normal)]
    pub output: OutputMode,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull an image onto a node
    Pull(ImageTarget),

    /// Remove an image from a node
    Purge(ImageTarget),
}

#[derive(Args)]
pub struct ImageTarget {
    /// Owning image cache as NAMESPACE/NAME, optionally with @UID
    #[arg(long)]
    pub cache: ImageCacheRef,

    /// Image reference, e.g. docker.io/library/redis:7
    #[arg(long)]
    pub image: String,

    /// Node name
    #[arg(long)]
    pub node: String,

    /// Container runtime version as reported by the node, e.g. containerd://1.7.2
    #[arg(long)]
    pub runtime: Option<String>,
}

impl ImageTarget {
    pub fn node_target(&self) -> NodeTarget {
        let target = NodeTarget::new(&self.image, &self.node);
        match &self.runtime {
            Some(runtime) => target.with_runtime_version(runtime),
            None => target,
        }
    }
}
