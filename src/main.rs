//! gatewarden - quality gates for Rust source trees
//!
//! Command-line front end over [`gatewarden::GateEngine`].

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use gatewarden::config::{Preset, QualityGateConfig};
use gatewarden::history::{ExecutionHistoryStore, TrendReport};
use gatewarden::quality::{EngineReport, GateEngine, GateResult, GateStatus, QuickSummary};
use gatewarden::GateError;

#[derive(Parser)]
#[command(name = "gatewarden")]
#[command(version)]
#[command(about = "Quality gate orchestration and static analysis for Rust projects", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Threshold preset: strict, balanced or lenient
    #[arg(long, global = true, value_name = "PRESET")]
    preset: Option<Preset>,

    /// Explicit configuration file (.toml or .json)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, env = "GATEWARDEN_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every gate eligible for a context
    Run {
        /// commit, merge, release, quick, refactor, performance_test, monitoring or all
        #[arg(default_value = "commit")]
        context: String,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fast check: code quality and security only, not recorded in history
    Quick {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show score trends from recorded runs
    Trends {
        /// Window size in days
        #[arg(short, long, default_value = "7")]
        days: u32,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            let code = e
                .downcast_ref::<GateError>()
                .map_or(1, GateError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "gatewarden=debug,info"
    } else {
        "gatewarden=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let project = cli.project.canonicalize().unwrap_or_else(|_| cli.project.clone());
    if !project.is_dir() {
        anyhow::bail!("Project directory does not exist: {}", project.display());
    }

    let config = resolve_config(&project, cli.config.as_deref(), cli.preset)?;

    if let Commands::Config = cli.command {
        print!(
            "{}",
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?
        );
        return Ok(ExitCode::SUCCESS);
    }

    let history = ExecutionHistoryStore::open_or_in_memory(QualityGateConfig::history_path(&project));
    let engine = GateEngine::new(&project, config)?.with_history(Arc::new(history));

    match cli.command {
        Commands::Run { context, json } => {
            let report = engine.run(&context).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report.to_map())?);
            } else {
                print_report(&report);
            }
            Ok(exit_for(report.overall.status))
        }
        Commands::Quick { json } => {
            let summary = engine.run_quick().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_quick(&summary);
            }
            Ok(exit_for(summary.status))
        }
        Commands::Trends { days, json } => {
            let report = engine.get_trends(days);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_trends(&report);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => Ok(ExitCode::SUCCESS),
    }
}

/// `--config` wins, then `--preset`, then the project's own files.
fn resolve_config(
    project: &Path,
    file: Option<&Path>,
    preset: Option<Preset>,
) -> anyhow::Result<QualityGateConfig> {
    let config = match (file, preset) {
        (Some(path), _) => QualityGateConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        (None, Some(preset)) => QualityGateConfig::from_preset(preset),
        (None, None) => QualityGateConfig::load(project)?,
    };
    config.validate()?;
    Ok(config)
}

fn exit_for(status: GateStatus) -> ExitCode {
    if status.is_failing() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn status_label(status: GateStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        GateStatus::Passed => label.green().bold(),
        GateStatus::Warning => label.yellow().bold(),
        GateStatus::Failed | GateStatus::Blocked => label.red().bold(),
        GateStatus::Skipped => label.dimmed(),
    }
}

fn print_gate(result: &GateResult) {
    println!(
        "{:<14} {:<8} {:>5.1}  {}",
        result.gate_name.bold(),
        status_label(result.status),
        result.score,
        result.message
    );
    for violation in result.violations.iter().take(10) {
        println!("    {}", violation.format());
    }
    if result.violations.len() > 10 {
        println!("    ... and {} more", result.violations.len() - 10);
    }
}

fn print_report(report: &EngineReport) {
    println!(
        "\n{} {}\n",
        "Quality gates:".cyan().bold(),
        report.context.to_string().bold()
    );
    for result in &report.gates {
        print_gate(result);
    }

    println!();
    print_gate(&report.overall);

    if !report.overall.suggestions.is_empty() {
        println!("\n{}", "Suggestions:".cyan().bold());
        for suggestion in &report.overall.suggestions {
            println!("   → {suggestion}");
        }
    }
    println!("\nCompleted in {}ms", report.execution_time_ms);
}

fn print_quick(summary: &QuickSummary) {
    println!(
        "{} {} (score {:.1}) - {}",
        "Quick check:".cyan().bold(),
        status_label(summary.status),
        summary.score,
        summary.message
    );
}

fn print_trends(report: &TrendReport) {
    print!("{}", report.format());
}
