// Ludo voice-assistant engine
// Main entry point for the ludo binary

use anyhow::Context as _;
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use ludo_engine::cli::{Cli, Command};
use ludo_engine::config::Config;
use ludo_engine::coordinator::context::{ExecutionContext, Speaker};
use ludo_engine::coordinator::Coordinator;
use ludo_engine::correlation::CorrelationTable;
use ludo_engine::batch::BatchTracker;
use ludo_engine::device::ws::WsDeviceLink;
use ludo_engine::errors::RunError;
use ludo_engine::oracle::openai::OpenAiOracle;
use ludo_engine::search::SearchExecutor;
use ludo_engine::strategy::ResponseBrief;
use ludo_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize basic telemetry first (before config is loaded)
    init_telemetry();

    tracing::info!("Ludo Engine v{}", env!("CARGO_PKG_VERSION"));

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path).context("failed to load configuration")?
    } else {
        Config::load_or_create().context("failed to load configuration")?
    };

    // Re-initialize telemetry with CLI/config-driven log level
    // (only takes effect if RUST_LOG env var is not set)
    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    let table = CorrelationTable::new();
    let tracker = BatchTracker::new();
    let link = Arc::new(WsDeviceLink::start(
        config.device.clone(),
        table.clone(),
        tracker.clone(),
    ));
    let oracle = Arc::new(OpenAiOracle::new(config.oracle.clone()));
    let executor = SearchExecutor::new(
        table,
        tracker.clone(),
        link.clone(),
        config.search.clone(),
    );
    let coordinator = Arc::new(Coordinator::new(oracle, executor, link, tracker));

    // Ctrl-C cancels the outstanding run, not the process.
    let cancel_target = Arc::clone(&coordinator);
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            tracing::info!("cancellation requested");
            cancel_target.cancel();
        }
    });

    match cli.command {
        Command::Ask { utterance } => {
            let ctx = ExecutionContext::new(&utterance, config.context.history_window);
            run_once(&coordinator, &ctx, cli.json).await;
            Ok(())
        }

        Command::Serve => {
            let mut ctx: Option<ExecutionContext> = None;
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
                let utterance = line.trim();
                if utterance.is_empty() {
                    continue;
                }

                let mut run_ctx = match &ctx {
                    Some(previous) => previous.carry_forward(utterance),
                    None => ExecutionContext::new(utterance, config.context.history_window),
                };
                run_ctx.push_turn(Speaker::User, utterance);

                if let Some(report) = run_once(&coordinator, &run_ctx, cli.json).await {
                    ctx = Some(
                        run_ctx.carry_forward("").with_previous(
                            Some(report.resolved_target),
                            report.resolved_system,
                        ),
                    );
                } else {
                    ctx = Some(run_ctx);
                }
            }
            Ok(())
        }
    }
}

/// Drive one run and print its report. Returns `None` when the run was
/// cancelled or failed.
async fn run_once(
    coordinator: &Coordinator,
    ctx: &ExecutionContext,
    json: bool,
) -> Option<ludo_engine::coordinator::RunReport> {
    match coordinator.run_request(ctx).await {
        Ok(report) => {
            print_brief(&report.brief, json);
            Some(report)
        }
        Err(RunError::Cancelled) => {
            println!("Stopped.");
            None
        }
        Err(e) => {
            tracing::error!("run failed: {}", e);
            eprintln!("Error: {e}");
            None
        }
    }
}

fn print_brief(brief: &ResponseBrief, json: bool) {
    if json {
        match serde_json::to_string_pretty(brief) {
            Ok(body) => println!("{body}"),
            Err(e) => eprintln!("Error: {e}"),
        }
        return;
    }

    match brief {
        ResponseBrief::Launched {
            name,
            alternative,
            reason,
        } => {
            if *alternative {
                println!("Launching alternative: {name}");
            } else {
                println!("Launching: {name}");
            }
            if let Some(reason) = reason {
                println!("  ({reason})");
            }
        }
        ResponseBrief::NotFound {
            searched_for,
            suggestions,
        } => {
            println!("Nothing found for {searched_for:?}.");
            if !suggestions.is_empty() {
                println!("  Close matches: {}", suggestions.join(", "));
            }
        }
        ResponseBrief::ChooseFrom {
            options,
            searched_for,
            ..
        } => {
            println!("Several matches for {searched_for:?}:");
            for (i, option) in options.iter().enumerate() {
                println!("  {}. {option}", i + 1);
            }
        }
    }
}
