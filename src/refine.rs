//! Refinement stage: re-prompt the model with each generated test and overwrite it.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::discovery;
use crate::invoker::ModelInvoker;
use crate::prompt::{self, PromptRequest, Template, TemplateStore};
use crate::types::{RunStats, StageOutcome};

/// Refine every generated test file in place.
///
/// `Skipped` when there is nothing to refine, `Failed` when the tests
/// directory cannot be listed. Per-file errors are logged and skipped.
pub async fn refine_all<M: ModelInvoker>(
    config: &PipelineConfig,
    invoker: &M,
    stats: &mut RunStats,
) -> StageOutcome {
    println!("🔄 Refining generated tests...");

    let test_files =
        match discovery::find_generated_tests(&config.tests_path(), &config.test_extension) {
            Ok(files) => files,
            Err(e) => {
                println!("  {} Cannot list generated tests: {e:#}", "✗".red());
                return StageOutcome::Failed;
            }
        };

    if test_files.is_empty() {
        println!("No test files found to refine");
        return StageOutcome::Skipped;
    }

    let instructions = TemplateStore::new(config.prompts_path()).load(Template::RefineTests);

    for test_file in &test_files {
        match refine_file(invoker, &instructions, test_file, stats).await {
            Ok(StageOutcome::Success) => {
                println!("  {} Refined {}", "✓".green(), discovery::display_name(test_file));
                stats.tests_refined += 1;
            }
            Ok(_) => println!("  {} Failed to refine {}", "✗".red(), discovery::display_name(test_file)),
            Err(e) => println!(
                "  {} Error refining {}: {e:#}",
                "✗".red(),
                discovery::display_name(test_file)
            ),
        }
    }

    StageOutcome::Success
}

async fn refine_file<M: ModelInvoker>(
    invoker: &M,
    instructions: &str,
    test_file: &Path,
    stats: &mut RunStats,
) -> Result<StageOutcome> {
    let content = std::fs::read_to_string(test_file)
        .with_context(|| format!("reading {}", test_file.display()))?;

    let request = PromptRequest::new(
        Template::RefineTests,
        instructions,
        prompt::refinement_task(test_file, &content),
    );
    let refined = invoker.invoke(&request, stats).await;
    if refined.is_empty() {
        return Ok(StageOutcome::Failed);
    }

    std::fs::write(test_file, refined)
        .with_context(|| format!("writing {}", test_file.display()))?;
    Ok(StageOutcome::Success)
}
