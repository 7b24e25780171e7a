mod build;
mod config;
mod discovery;
mod execute;
mod fix;
mod generate;
mod invoker;
mod pipeline;
mod process;
mod prompt;
mod refine;
mod report;
mod types;
mod workdir;

#[cfg(test)]
mod testutil;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use invoker::{ModelInvoker, OllamaInvoker, ProbeError};
use prompt::{Template, TemplateStore};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "testforge",
    version,
    about = "Generate, refine and repair C++ unit tests with a local LLM"
)]
struct Cli {
    /// Model name passed to the model tool (default: llama3.1)
    model: Option<String>,

    /// Config file path
    #[arg(long, default_value = "testforge.toml", global = true)]
    config: PathBuf,

    /// Project root containing the sources, tests and prompts directories
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Seconds before a single model call is abandoned
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show the resolved configuration
    Info {
        /// Model name to resolve against
        model: Option<String>,
    },

    /// Check the model tool, build tools and project layout
    Check {
        /// Model name to probe for
        model: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("testforge=info".parse()?),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => {
            let cfg = config::build_config(&cli.config, cli.model, cli.root, cli.timeout)?;
            let exit_code = cmd_run(&cfg).await;
            std::process::exit(exit_code);
        }

        Some(Command::Info { model }) => {
            let cfg = config::build_config(&cli.config, model, cli.root, cli.timeout)?;
            cmd_info(&cfg);
        }

        Some(Command::Check { model }) => {
            let cfg = config::build_config(&cli.config, model, cli.root, cli.timeout)?;
            let exit_code = cmd_check(&cfg).await;
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn cmd_run(cfg: &config::PipelineConfig) -> i32 {
    println!("Using model: {}", cfg.model);
    let invoker = OllamaInvoker::from_config(cfg);

    match pipeline::run(cfg, &invoker).await {
        Ok(summary) => {
            println!("\n{}", "🎉 Test generation completed successfully!".green().bold());
            if summary.outcome(types::Stage::Test) != Some(types::StageOutcome::Success) {
                println!(
                    "{}",
                    "Generated tests did not build or pass; see the output above.".yellow()
                );
            }
            println!("📋 Check the following files:");
            println!("  - {} for generated tests", cfg.tests_dir.display());
            println!("  - {} for statistics", cfg.report_file.display());
            0
        }
        Err(e) => {
            if let Some(probe) = e.downcast_ref::<ProbeError>() {
                print_probe_failure(probe, cfg);
            } else {
                eprintln!("{} {e:#}", "✗".red());
            }
            eprintln!("\n{}", "❌ Test generation failed. Check the output above.".red());
            1
        }
    }
}

fn print_probe_failure(err: &ProbeError, cfg: &config::PipelineConfig) {
    eprintln!("{} {err}", "✗".red());
    if let ProbeError::ModelMissing { available, .. } = err {
        eprintln!("Available models:\n{available}");
    }
    let tool = cfg.model_command.join(" ");
    eprintln!("Please install the model tool and pull the required model first:");
    eprintln!("  {tool} pull {}", cfg.model);
}

fn cmd_info(cfg: &config::PipelineConfig) {
    println!("testforge v{}", env!("CARGO_PKG_VERSION"));
    println!("  Model: {} via `{}`", cfg.model, cfg.model_command.join(" "));
    println!("  Timeout: {}s per call", cfg.model_timeout_secs);
    println!("  Root: {}", cfg.project_root.display());
    println!(
        "  Sources: {} ({})",
        cfg.source_path().display(),
        cfg.source_extensions.join(", ")
    );
    println!(
        "  Tests: {} (test_*.{})",
        cfg.tests_path().display(),
        cfg.test_extension
    );
    println!("  Prompts: {}", cfg.prompts_path().display());
    println!("  Configure: {}", cfg.configure_command.join(" "));
    println!("  Build: {}", cfg.build_command.join(" "));
    println!("  Test binary: {}", cfg.test_binary_path().display());
    println!("  Report: {}", cfg.report_path().display());
}

// ===========================================================================
// testforge check
// ===========================================================================

async fn cmd_check(cfg: &config::PipelineConfig) -> i32 {
    let mut errors: u32 = 0;

    println!("\n{}\n", "testforge environment check".bold());

    // ---- 1. Model tool ----
    println!("{}", "1. Model tool".bold());
    let invoker = OllamaInvoker::from_config(cfg);
    match invoker.probe().await {
        Ok(()) => println!("  {}   {} ({})", "OK".green(), cfg.model, cfg.model_command.join(" ")),
        Err(e) => {
            println!("  {} {e}", "MISS".red());
            errors += 1;
        }
    }

    // ---- 2. Build tools ----
    println!("\n{}", "2. Build tools".bold());
    let mut tools: Vec<&str> = Vec::new();
    for argv in [&cfg.configure_command, &cfg.build_command] {
        if let Some(program) = argv.first() {
            if !tools.contains(&program.as_str()) {
                tools.push(program);
            }
        }
    }
    for tool in tools {
        if command_exists(tool) {
            println!("  {}   {} ({})", "OK".green(), tool, get_command_version(tool));
        } else {
            println!("  {} {tool} not found", "MISS".red());
            errors += 1;
        }
    }

    // ---- 3. Project layout ----
    println!("\n{}", "3. Project layout".bold());
    let sources = cfg.source_path();
    if sources.is_dir() {
        let count = discovery::find_sources(&sources, &cfg.source_extensions).len();
        println!("  {}   {} ({count} source files)", "OK".green(), sources.display());
    } else {
        println!("  {} {} missing", "MISS".red(), sources.display());
        errors += 1;
    }

    let store = TemplateStore::new(cfg.prompts_path());
    for template in [Template::InitialTestGen, Template::RefineTests, Template::FixBuild] {
        let path = store.path_of(template);
        if path.is_file() {
            println!("  {}   {}", "OK".green(), path.display());
        } else {
            println!(
                "  {}  {} missing (prompts will use framing only)",
                "REC".yellow(),
                path.display()
            );
        }
    }

    // ---- Summary ----
    println!();
    if errors == 0 {
        println!("{}\n", "Ready to generate tests.".green().bold());
        0
    } else {
        println!(
            "{}\n",
            format!("Check found {errors} issue(s). Fix them and re-run.")
                .red()
                .bold()
        );
        1
    }
}

// ===========================================================================
// Helpers
// ===========================================================================

/// Check if a command exists on PATH.
fn command_exists(cmd: &str) -> bool {
    std::process::Command::new("which")
        .arg(cmd)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Get a human-readable version string from a command.
fn get_command_version(cmd: &str) -> String {
    std::process::Command::new(cmd)
        .arg("--version")
        .output()
        .ok()
        .and_then(|o| {
            String::from_utf8(o.stdout)
                .ok()
                .and_then(|s| s.lines().next().map(|l| l.to_string()))
        })
        .unwrap_or_else(|| "unknown".to_string())
}
