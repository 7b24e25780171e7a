//! Fix stage: blind repair of every generated test from a failed build log.
//!
//! The build log is not parsed; every generated file receives the full log.
//! The stage reports `Success` whatever the model returns, and the build is
//! not re-run afterwards.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::discovery;
use crate::invoker::ModelInvoker;
use crate::prompt::{self, PromptRequest, Template, TemplateStore};
use crate::types::{RunStats, StageOutcome};

/// Ask the model to fix every generated test file given `build_log`.
pub async fn fix_build_errors<M: ModelInvoker>(
    config: &PipelineConfig,
    invoker: &M,
    build_log: &str,
    stats: &mut RunStats,
) -> StageOutcome {
    println!("🔄 Fixing build errors...");

    let instructions = TemplateStore::new(config.prompts_path()).load(Template::FixBuild);
    let test_files =
        match discovery::find_generated_tests(&config.tests_path(), &config.test_extension) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("cannot list generated tests: {e:#}");
                Vec::new()
            }
        };

    for test_file in &test_files {
        match fix_file(invoker, &instructions, build_log, test_file, stats).await {
            Ok(true) => {
                println!("  {} Fixed {}", "✓".green(), discovery::display_name(test_file));
                stats.build_fixes_applied += 1;
            }
            Ok(false) => {
                tracing::debug!("no fix produced for {}", test_file.display());
            }
            Err(e) => println!(
                "  {} Error fixing {}: {e:#}",
                "✗".red(),
                discovery::display_name(test_file)
            ),
        }
    }

    // Convergence is never checked.
    StageOutcome::Success
}

async fn fix_file<M: ModelInvoker>(
    invoker: &M,
    instructions: &str,
    build_log: &str,
    test_file: &Path,
    stats: &mut RunStats,
) -> Result<bool> {
    let content = std::fs::read_to_string(test_file)
        .with_context(|| format!("reading {}", test_file.display()))?;

    let request = PromptRequest::new(
        Template::FixBuild,
        instructions,
        prompt::fix_task(build_log, test_file, &content),
    );
    let fixed = invoker.invoke(&request, stats).await;
    if fixed.is_empty() {
        return Ok(false);
    }

    std::fs::write(test_file, fixed).with_context(|| format!("writing {}", test_file.display()))?;
    Ok(true)
}
