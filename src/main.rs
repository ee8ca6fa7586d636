//! CLI entry point: `compile` validates and compiles a rule source and
//! prints its stats; `eval` loads a rule source, evaluates one event, and
//! prints the match result; `serve` starts the Model Manager's watcher
//! loop plus an interactive dot-command REPL for ad hoc evaluation.

use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rule_engine::cache::build_cache;
use rule_engine::config::{CacheConfig, EngineConfig};
use rule_engine::{compile_model, encode_event, evaluate_event, logging, ModelManager};

#[derive(Parser)]
#[command(name = "rule-engine", about = "A high-throughput rule evaluation engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and compile a rule source, printing build statistics.
    Compile {
        source: PathBuf,
        #[arg(long)]
        stats_json: bool,
    },
    /// Evaluate a single event (from a file, or stdin if omitted) against a rule source.
    Eval {
        model_source: PathBuf,
        event_file: Option<PathBuf>,
    },
    /// Start the background watcher and an interactive evaluation REPL.
    Serve {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Compile { source, stats_json } => run_compile(&source, stats_json),
        Command::Eval { model_source, event_file } => run_eval(&model_source, event_file.as_deref()).await,
        Command::Serve { config } => run_serve(config.as_deref()).await,
    }
}

fn run_compile(source: &PathBuf, stats_json: bool) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(source)?;
    match compile_model(&contents) {
        Ok((model, warnings)) => {
            if stats_json {
                println!("{}", serde_json::json!({
                    "logical_rules": model.stats.logical_rules,
                    "total_expanded_combinations": model.stats.total_expanded_combinations,
                    "unique_combinations": model.stats.unique_combinations,
                    "deduplication_rate": model.stats.deduplication_rate,
                    "num_predicates": model.stats.num_predicates,
                    "avg_selectivity": model.stats.avg_selectivity,
                    "compile_nanos": model.stats.compile_nanos,
                }));
            } else {
                println!("compiled {} logical rules into {} unique combinations ({:.1}% deduplicated)",
                    model.stats.logical_rules, model.stats.unique_combinations, model.stats.deduplication_rate * 100.0);
            }
            for warning in warnings {
                eprintln!("warning: {} ({})", warning.message, warning.rule_code);
            }
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                eprintln!("error: {error}");
            }
            anyhow::bail!("compile failed with {} error(s)", errors.len());
        }
    }
}

async fn run_eval(model_source: &PathBuf, event_file: Option<&std::path::Path>) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(model_source)?;
    let (model, _warnings) = compile_model(&contents).map_err(|errors| anyhow::anyhow!("compile failed: {:?}", errors))?;

    let event_json = match event_file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let event = encode_event("cli-event", &event_json)?;
    let cache = build_cache(&CacheConfig::default());
    let result = evaluate_event(&model, &cache, &Default::default(), &event).await;

    println!("matched {} rule(s) in {}ns:", result.matched_rules.len(), result.nanos);
    for rule in &result.matched_rules {
        println!("  {} (priority {})", rule.code, rule.priority);
    }
    Ok(())
}

async fn run_serve(config_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::load().unwrap_or_default(),
    };
    logging::init(&config.logging);

    let manager = Arc::new(ModelManager::bootstrap(&config.model, &config.cache)?);
    let watch_interval = std::time::Duration::from_secs(config.model.watch_interval_seconds.max(1));
    let _watcher = ModelManager::spawn_watcher(manager.clone(), watch_interval);

    println!("rule-engine serving from {}", manager.rule_source_path().display());
    println!("type a JSON event and press enter; Ctrl-D to exit");

    let mut editor = rustyline::DefaultEditor::new()?;
    loop {
        match editor.readline("> ") {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                match encode_event("repl-event", &line) {
                    Ok(event) => {
                        let guard = manager.model();
                        let result = evaluate_event(&guard.0, &guard.1, &Default::default(), &event).await;
                        println!("matched {} rule(s) in {}ns", result.matched_rules.len(), result.nanos);
                        for rule in &result.matched_rules {
                            println!("  {} (priority {})", rule.code, rule.priority);
                        }
                    }
                    Err(e) => eprintln!("invalid event JSON: {e}"),
                }
            }
            Err(_) => break,
        }
    }

    Ok(())
}
