use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use assist_lsp::backend::{BackendRegistry, CompletionRequest, Deadline};
use assist_lsp::config::Config;
use assist_lsp::log;
use assist_lsp::lsp::server::run_server;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("assist-lsp: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<ExitCode> {
    let _guard = log::init(&config.log_path())?;

    info!(
        handler = config.handler.name(),
        trigger_characters = ?config.trigger_characters(),
        "Starting assist-lsp"
    );

    let registry = BackendRegistry::from_config(&config).context("Failed to set up backend")?;

    if let Some(query) = config.debug_query.clone() {
        debug_query(&config, &registry, &query).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let end = run_server(config, registry).await?;
    Ok(ExitCode::from(end.exit_code()))
}

/// Sends one completion request to the selected backend and prints the result
async fn debug_query(config: &Config, registry: &BackendRegistry, query: &str) -> anyhow::Result<()> {
    info!(query, "Debug mode: testing backend");

    println!("Query: {}", query);
    println!("Backend: {}", config.handler.name());
    println!("Num suggestions: {}", config.num_suggestions);
    println!("{}", "-".repeat(80));
    println!("Sending request...");

    let request = CompletionRequest {
        content_before: query.to_string(),
        content_after: String::new(),
        deadline: Some(Deadline::after(config.completion_timeout())),
    };
    let results = registry
        .completion(&request, "debug.js", "javascript", config.num_suggestions)
        .await
        .context("Completion failed")?;

    info!(count = results.len(), "Debug completion finished");
    println!("\nReceived {} completion(s):\n", results.len());
    for (i, result) in results.iter().enumerate() {
        println!("--- Suggestion {} ---", i + 1);
        println!("{}\n", result);
    }

    Ok(())
}
