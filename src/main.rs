//! kycgate CLI
//!
//! Usage:
//!   kycgate                                  # HTTP API server
//!   kycgate --addr 0.0.0.0:8000              # Custom bind address
//!   kycgate --compare live.json doc.json     # Distance between two embeddings
//!   kycgate --compare a.json b.json --json   # JSON output

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;

use kycgate::core::similarity;
use kycgate::core::{run_server, AppState, Collaborators};
use kycgate::logging::{init_logging, LogFormat};
use kycgate::types::Embedding;
use kycgate::{KycConfig, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "kycgate",
    version = VERSION,
    about = "KYC session pipeline - liveness challenges, face match and social cross-check",
    long_about = "kycgate runs identity-verification sessions over HTTP.\n\n\
                  A session draws a challenge sequence, scores live frames,\n\
                  ingests an identity document and decides pass/fail:\n  \
                  best liveness > 0.8\n  \
                  face distance < 0.33\n  \
                  every challenge completed\n\n\
                  Model backends are reference stand-ins unless replaced."
)]
struct Args {
    /// Server address
    #[arg(long, env = "KYC_ADDR", default_value = "127.0.0.1:8000")]
    addr: String,

    /// Require this X-API-Key on /kyc routes
    #[arg(long, env = "KYC_API_KEY")]
    api_key: Option<String>,

    /// Log level (RUST_LOG overrides)
    #[arg(long, env = "KYC_LOG", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "human")]
    log_format: LogFormat,

    /// Challenges drawn per session
    #[arg(long, default_value_t = kycgate::DEFAULT_CHALLENGE_COUNT)]
    challenges: usize,

    /// Score returned by the reference liveness classifier
    #[arg(long, default_value_t = 0.9)]
    liveness_score: f64,

    /// Social fetch timeout in seconds
    #[arg(long, default_value_t = kycgate::FETCH_TIMEOUT_SECS)]
    fetch_timeout_secs: u64,

    /// Largest accepted request body in bytes
    #[arg(long, env = "KYC_MAX_BODY_BYTES", default_value_t = kycgate::MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Compare two JSON embedding files and exit
    #[arg(long, num_args = 2, value_names = ["A", "B"])]
    compare: Option<Vec<String>>,

    /// Output as JSON (compare mode)
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct CompareOutput {
    distance: f64,
    is_match: bool,
    threshold: f64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.log_format, &args.log_level) {
        eprintln!("Logging setup failed: {}", e);
    }

    let result = match args.compare.as_deref() {
        Some([a, b]) => run_compare(a, b, args.json),
        _ => run_serve(&args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Run the HTTP API server
async fn run_serve(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = KycConfig {
        challenge_count: args.challenges,
        fetch_timeout: Duration::from_secs(args.fetch_timeout_secs),
        max_body_bytes: args.max_body_bytes,
        ..KycConfig::default()
    }
    .with_api_key(args.api_key.clone());

    tracing::info!(
        version = VERSION,
        challenges = config.challenge_count,
        api_key = config.api_key.is_some(),
        "starting kycgate"
    );

    let collaborators = Collaborators::reference(&config, args.liveness_score)?;
    let state = Arc::new(AppState::new(config, collaborators));
    run_server(&args.addr, state).await
}

/// Print the distance between two stored embeddings
fn run_compare(a: &str, b: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let left = read_embedding(Path::new(a))?;
    let right = read_embedding(Path::new(b))?;
    let distance = similarity::distance(&left, &right)?;
    let output = CompareOutput {
        distance,
        is_match: similarity::is_match(distance, kycgate::MATCH_THRESHOLD),
        threshold: kycgate::MATCH_THRESHOLD,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "distance={:.4} | threshold={:.2} | match={}",
            output.distance, output.threshold, output.is_match
        );
    }
    Ok(())
}

fn read_embedding(path: &Path) -> Result<Embedding, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let embedding: Embedding = serde_json::from_str(&raw)
        .map_err(|e| format!("{} is not a JSON number array: {}", path.display(), e))?;
    Ok(embedding)
}
