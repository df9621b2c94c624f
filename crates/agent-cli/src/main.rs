//! Command-line interface for the financial analysis orchestrator

use agent_finance::{Analysis, AnalysisEngine, FinanceConfig, FinanceError, OutputFormat};
use agent_utils::{LogFormat, init_tracing_with};
use anyhow::Context as _;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Queries shorter than this are rejected in the interactive loop
const MIN_QUERY_CHARS: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "agent-cli")]
#[command(about = "Analyse Korean financial markets and write a report", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report format: markdown or pdf
    #[arg(short, long, default_value = "markdown")]
    format: OutputFormat,

    /// Directory reports are written to
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log output: text or json
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    /// Query to analyse; starts the interactive loop when omitted
    query: Vec<String>,
}

fn load_config(args: &Args) -> anyhow::Result<FinanceConfig> {
    let config = match &args.config {
        Some(path) => FinanceConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => FinanceConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(output) = &args.output {
        config.output_dir.clone_from(output);
    }
    config.validate()?;
    Ok(config)
}

fn is_exit(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "q" | "quit" | "exit")
}

fn check_query(line: &str) -> Result<&str, String> {
    let query = line.trim();
    if query.chars().count() < MIN_QUERY_CHARS {
        return Err(format!(
            "Query is too short; please use at least {MIN_QUERY_CHARS} characters."
        ));
    }
    Ok(query)
}

fn print_summary(analysis: &Analysis) {
    println!("\n{}", analysis.report.title);
    for outcome in analysis.bundle.outcomes() {
        let status = if outcome.result.is_success() {
            "completed"
        } else {
            "unavailable"
        };
        println!("  - {}: {status}", outcome.intent.title());
    }
}

/// Run one query; errors the user can act on are printed, not returned
async fn run_query(engine: &AnalysisEngine, query: &str, format: OutputFormat) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let run = engine.analyze(query, &cancel);
    tokio::pin!(run);
    let analysis = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling analysis");
            cancel.cancel();
            run.await
        }
    };

    let analysis = match analysis {
        Ok(analysis) => analysis,
        Err(e) if e.is_classification() => {
            println!(
                "Could not tell what to analyse. Mention a market trend, a sector \
                 (banking, securities, insurance), a company, or a policy topic."
            );
            return Ok(());
        }
        Err(FinanceError::Core(e @ agent_core::Error::PlanAborted { .. })) => {
            println!("No analysis could be completed: {e}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    print_summary(&analysis);
    let path = engine.write_report(&analysis.report, format).await?;
    println!("Report written to {}", path.display());
    Ok(())
}

async fn interactive(engine: &AnalysisEngine, format: OutputFormat) -> anyhow::Result<()> {
    println!("Financial market analysis. Enter a question, or q to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        if is_exit(&line) {
            break;
        }
        match check_query(&line) {
            Ok(query) => {
                if let Err(e) = run_query(engine, query, format).await {
                    println!("Analysis failed: {e:#}");
                }
            }
            Err(message) => println!("{message}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing_with(args.log_format);

    let config = load_config(&args)?;
    info!(
        output_dir = %config.output_dir.display(),
        format = %args.format,
        "Starting agent-cli"
    );
    let engine = AnalysisEngine::new(config).await?;

    let result = if args.query.is_empty() {
        interactive(&engine, args.format).await
    } else {
        run_query(&engine, &args.query.join(" "), args.format).await
    };

    engine.shutdown().await?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_words() {
        assert!(is_exit("q"));
        assert!(is_exit(" QUIT "));
        assert!(is_exit("exit"));
        assert!(!is_exit("quite a question"));
    }

    #[test]
    fn test_short_query_rejected() {
        assert!(check_query("  은행  ").is_err());
        assert_eq!(check_query(" 은행 업종 전망 ").unwrap(), "은행 업종 전망");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "agent-cli",
            "--format",
            "pdf",
            "--log-format",
            "json",
            "은행",
            "업종",
            "전망",
        ])
        .unwrap();
        assert_eq!(args.format, OutputFormat::Pdf);
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(args.query.join(" "), "은행 업종 전망");
    }
}
