//! Counts impression events per grouping key over fixed windows.
//!
//! Reads the subscription created by `pubsub-load-gen` and prints one JSON
//! line per key and window firing on stdout.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use pubsub_load_gen::aggregator::DEFAULT_TICK;
use pubsub_load_gen::config::DEFAULT_SUBSCRIPTION;
use pubsub_load_gen::logging::init_tracing;
use pubsub_load_gen::{AggregationRunner, AggregatorConfig, GcpConnector, LoadGenResult};

#[derive(Parser, Debug)]
#[command(name = "impression-aggregator")]
#[command(about = "Count Pub/Sub events per key over fixed windows", long_about = None)]
struct Args {
    /// Subscription to read from (short name or projects/*/subscriptions/*)
    #[arg(long, env = "AGGREGATOR_SUBSCRIPTION", default_value = DEFAULT_SUBSCRIPTION)]
    subscription: String,

    /// Grouping keys. You can specify more than one
    #[arg(long, required = true, num_args = 1..)]
    grouping_keys: Vec<String>,

    /// Fixed window duration
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    window_duration: Duration,

    /// Allowed data lateness
    #[arg(long, value_parser = humantime::parse_duration, default_value = "120s")]
    allowed_lateness: Duration,

    /// Delay before late data for an already fired window is emitted
    #[arg(long, value_parser = humantime::parse_duration, default_value = "20s")]
    late_firing_delay: Duration,

    /// Maximum messages per pull
    #[arg(long, default_value = "1000")]
    max_messages: i32,

    /// GCP project id
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT", default_value = "")]
    project: String,

    /// Pub/Sub emulator address (host:port)
    #[arg(long, env = "PUBSUB_EMULATOR_HOST")]
    emulator_host: Option<String>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

async fn run(args: Args) -> LoadGenResult<()> {
    let config = AggregatorConfig {
        grouping_keys: args.grouping_keys,
        window: args.window_duration,
        allowed_lateness: args.allowed_lateness,
        late_firing_delay: args.late_firing_delay,
        tick: DEFAULT_TICK,
    };
    config.validate()?;

    let connector = GcpConnector::new(args.emulator_host.filter(|h| !h.is_empty()));
    info!(subscription = %args.subscription, "connecting to subscription");
    let source = connector
        .subscriber(&args.project, &args.subscription)
        .await?;

    let runner = AggregationRunner::new(config, args.max_messages);
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupt received, stopping");
    };

    runner
        .run(
            Arc::new(source),
            |pane| match serde_json::to_string(&pane) {
                Ok(line) => println!("{line}"),
                Err(e) => error!(error = %e, "failed to encode window pane"),
            },
            shutdown,
        )
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json)?;

    match run(args).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
