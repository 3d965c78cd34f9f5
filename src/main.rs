use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use deployfacts::config_loader;
use deployfacts::orchestrator::{self, OutputFormat, RunOptions};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;

/// Assign cluster node addresses and generate deployment fact documents
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the inventory configuration YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory for the fact documents
    #[arg(short, long, default_value = "deployment_facts")]
    output: PathBuf,

    /// JSON file holding committed assignments, reused across runs
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Only handle this cluster
    #[arg(long)]
    cluster: Option<u64>,

    /// Fact document format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    let config = config_loader::load_config(&args.config)?;

    // RUST_LOG wins over the configured level, which wins over "info"
    let default_filter = config.general.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Configuration file: {:?}", args.config);
    info!("Output directory: {:?}", args.output);

    let options = RunOptions {
        output_dir: args.output,
        state_path: args.state,
        cluster: args.cluster,
        format: args.format,
    };
    let report = orchestrator::run(&config, &options)?;

    for (cluster, path) in &report.written {
        println!("Cluster {}: {}", cluster, path.display());
    }
    for (cluster, e) in &report.failed {
        error!("Cluster {}: {}", cluster, e);
    }

    if !report.is_success() {
        return Err(eyre!(
            "{} of {} clusters failed",
            report.failed.len(),
            report.failed.len() + report.written.len()
        ));
    }

    info!("Deployment facts generated successfully");
    Ok(())
}
