use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use conflict_journal::ConflictJournal;
use decision_engine::DecisionEngine;
use llm_client::ChatCompletionsClient;
use signal_core::{ConflictEvent, ConflictSink};

mod config;
mod input;

use config::AgentConfig;

const USAGE: &str = "usage: decision-agent [PATH]\n\n\
Reads an analyses document from PATH (or stdin) and prints the fused decision as JSON.";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // Logs go to stderr so stdout stays valid JSON
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let path = std::env::args().nth(1);
    if matches!(path.as_deref(), Some("-h") | Some("--help")) {
        println!("{}", USAGE);
        return Ok(());
    }

    // 2. Load configuration
    let config = AgentConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Confidence threshold: {:.0}%", config.engine.confidence_threshold);
    tracing::info!("  High-confidence threshold: {:.0}%", config.engine.high_confidence_threshold);
    tracing::info!("  Conflict state: {}", if config.engine.allow_conflict_state { "enabled" } else { "disabled" });

    // 3. Read the request
    let raw = match path.as_deref() {
        Some(p) if p != "-" => std::fs::read_to_string(p).with_context(|| format!("failed to read {}", p))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    let request = input::parse_request(&raw)?;

    // 4. Wire the engine
    let mut engine = DecisionEngine::new(config.engine.clone());
    match config.llm.clone() {
        Some(llm_config) => {
            let client = ChatCompletionsClient::new(llm_config).context("failed to build LLM client")?;
            tracing::info!("LLM fallback enabled ({})", client.model());
            engine = engine.with_llm(Arc::new(client));
        }
        None => tracing::info!("LLM fallback disabled (set LLM_API_URL to enable)"),
    }
    let journal = ConflictJournal::from_config(&config.journal).await;

    // 5. Decide
    let decision = engine
        .decide_value(request.symbol.as_deref(), request.interval.as_deref(), &request.analyses)
        .await;

    // One-shot process: record the conflict before exiting rather than in a detached task
    if decision.has_conflict {
        journal.record(&ConflictEvent::from_decision(&decision)).await?;
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&decision).context("failed to serialize decision")?
    );

    Ok(())
}
