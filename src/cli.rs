use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "ai-bridge")]
#[command(version = "1.2.0")]
#[command(about = "A terminal control panel for relaying messages between two Claude agents")]
pub struct Args {
    /// Base URL of the bridge backend (default http://localhost:8000)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Path to a TOML config file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Session objective, overriding the stored one
    #[arg(long)]
    pub objective: Option<String>,

    /// Interaction mode (default specialized)
    #[arg(long)]
    pub mode: Option<String>,

    /// Role assigned to Claude-A (default controller)
    #[arg(long)]
    pub role_a: Option<String>,

    /// Role assigned to Claude-B (default executor)
    #[arg(long)]
    pub role_b: Option<String>,

    /// Maximum iterations recorded for the session (default 10)
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Delay between messages, in seconds (default 3)
    #[arg(long)]
    pub message_delay: Option<u64>,

    /// Message poll interval, in seconds (default 3)
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Metrics poll interval, in seconds (default 2)
    #[arg(long)]
    pub metrics_interval: Option<u64>,

    /// Directory exports are written into (default .)
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Path of the persisted objective store
    #[arg(long)]
    pub store: Option<PathBuf>,
}
