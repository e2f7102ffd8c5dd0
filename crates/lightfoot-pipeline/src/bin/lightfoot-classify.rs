use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lightfoot_pipeline::{
    parse_pubkey_list, Event, EventDispatcher, FeatureCollection, FeatureFilter, PipelineConfig,
    ProcessorRegistry,
};

#[derive(Debug, Parser)]
#[command(name = "lightfoot-classify")]
#[command(about = "Classify Nostr events into a GeoJSON FeatureCollection")]
struct Args {
    /// JSON array or newline-delimited events; reads stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,
    /// Fixed number of execution units (0 classifies in-process)
    #[arg(long)]
    workers: Option<usize>,
    /// Per-event deadline in seconds (0 disables)
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Verified operator pubkey, repeatable
    #[arg(long)]
    verified: Vec<String>,
    /// Include features from unverified operators
    #[arg(long)]
    allow_unverified: bool,
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut config = PipelineConfig::from_env()?;
    if !args.verified.is_empty() {
        let extra = parse_pubkey_list(&args.verified.join(","));
        config.verified_pubkeys.extend(extra);
    }
    if let Some(workers) = args.workers {
        config.dispatch.workers = Some(workers);
    }
    if let Some(secs) = args.timeout_secs {
        config.dispatch.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }

    let raw = match &args.input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let events = Event::parse_many(&raw)?;

    let registry = ProcessorRegistry::with_defaults(config.verifier());
    let dispatcher = EventDispatcher::new(registry, &config.dispatch);
    info!(
        events = events.len(),
        units = dispatcher.pool_size(),
        verified = config.verified_pubkeys.len(),
        "Classifying events"
    );

    let filter = FeatureFilter {
        verified_only: !args.allow_unverified,
    };
    let results = dispatcher.process_many(events).await;
    let mut rejected = 0usize;
    let collection: FeatureCollection = results
        .into_iter()
        .filter_map(|result| match result {
            Ok(feature) => feature,
            Err(err) => {
                rejected += 1;
                warn!(
                    event_id = err.event_id().unwrap_or("<unknown>"),
                    error = %err,
                    "Event rejected"
                );
                None
            }
        })
        .filter(|feature| filter.accepts(feature))
        .collect();

    info!(features = collection.len(), rejected, "Classification finished");
    dispatcher.shutdown();

    let output = if args.pretty {
        serde_json::to_string_pretty(&collection)?
    } else {
        serde_json::to_string(&collection)?
    };
    println!("{output}");

    Ok(())
}
