//! Pub/Sub load generator CLI.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use pubsub_load_gen::logging::init_tracing;
use pubsub_load_gen::{
    ConfigOverrides, GcpConnector, LoadGenConfig, LoadGenResult, LoadRunner, OutputFormat,
    ScenarioFile, SummaryReport,
};

#[derive(Parser, Debug)]
#[command(name = "pubsub-load-gen")]
#[command(about = "Publish a fixed payload to a Pub/Sub topic at a fixed rate", long_about = None)]
struct Args {
    /// Message payload
    #[arg(long, env = "LOADGEN_PAYLOAD", conflicts_with = "payload_file")]
    payload: Option<String>,

    /// Read the message payload from a file
    #[arg(long, env = "LOADGEN_PAYLOAD_FILE")]
    payload_file: Option<PathBuf>,

    /// Message count [default: 300]
    #[arg(long, env = "LOADGEN_COUNT")]
    count: Option<u64>,

    /// Delay between messages, e.g. 1s, 250ms [default: 1s]
    #[arg(long, env = "LOADGEN_DELAY", value_parser = humantime::parse_duration)]
    delay: Option<Duration>,

    /// Pub/Sub topic name [default: impression_event]
    #[arg(long, env = "LOADGEN_TOPIC")]
    topic: Option<String>,

    /// Subscription name to create, empty to skip [default: impression_event_testing]
    #[arg(long, env = "LOADGEN_SUBSCRIPTION")]
    subscription: Option<String>,

    /// GCP project id
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    project: Option<String>,

    /// Pub/Sub emulator address (host:port)
    #[arg(long, env = "PUBSUB_EMULATOR_HOST")]
    emulator_host: Option<String>,

    /// Scenario YAML file; command line values take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Summary output format: table (default), json, none
    #[arg(short, long, default_value = "table")]
    output: OutputFormat,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            payload: self.payload.clone(),
            payload_file: self.payload_file.clone(),
            count: self.count,
            delay: self.delay,
            topic: self.topic.clone(),
            subscription: self.subscription.clone(),
            project: self.project.clone(),
            emulator_host: self.emulator_host.clone(),
        }
    }
}

async fn run(args: &Args) -> LoadGenResult<()> {
    let scenario = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading scenario");
            Some(ScenarioFile::from_file(path)?)
        }
        None => None,
    };

    let config = LoadGenConfig::resolve(scenario, args.overrides())?;
    let connector = GcpConnector::new(config.emulator_host.clone());
    let runner = LoadRunner::new(config);

    let summary = runner.run(&connector).await?;

    if let Some(out) = SummaryReport::render(&summary, args.output)? {
        println!("{out}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json)?;

    match run(&args).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
