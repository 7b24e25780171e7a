//! Generation stage: one model call per source file, written to `test_<stem>.<ext>`.

use colored::Colorize;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::discovery;
use crate::invoker::ModelInvoker;
use crate::prompt::{self, PromptRequest, Template, TemplateStore};
use crate::types::{RunStats, StageOutcome};

/// Generate the initial test file for one source file.
///
/// `Failed` when the source cannot be read, the model returns nothing, or the
/// output cannot be written. Nothing is written in the first two cases.
pub async fn generate_for_file<M: ModelInvoker>(
    config: &PipelineConfig,
    invoker: &M,
    source: &Path,
    stats: &mut RunStats,
) -> StageOutcome {
    let name = discovery::display_name(source);
    println!("🔄 Generating initial tests for {name}...");

    let content = match std::fs::read_to_string(source) {
        Ok(c) => c,
        Err(e) => {
            println!("  {} Error reading {}: {e}", "✗".red(), source.display());
            return StageOutcome::Failed;
        }
    };

    let instructions = TemplateStore::new(config.prompts_path()).load(Template::InitialTestGen);
    let request = PromptRequest::new(
        Template::InitialTestGen,
        instructions,
        prompt::generation_task(source, &content),
    );

    let test_code = invoker.invoke(&request, stats).await;
    if test_code.is_empty() {
        println!("  {} Failed to generate tests for {name}", "✗".red());
        return StageOutcome::Failed;
    }

    let file_name = discovery::test_file_name(source, &config.test_extension);
    let target = config.tests_path().join(&file_name);
    if let Err(e) = std::fs::write(&target, test_code) {
        println!("  {} Error writing {}: {e}", "✗".red(), target.display());
        return StageOutcome::Failed;
    }

    println!("  {} Generated {file_name}", "✓".green());
    stats.tests_generated += 1;
    StageOutcome::Success
}

/// Generate tests for every discovered source. Failures never abort the loop.
///
/// `Skipped` for an empty source list, `Success` when at least one file was
/// generated, `Failed` otherwise.
pub async fn generate_all<M: ModelInvoker>(
    config: &PipelineConfig,
    invoker: &M,
    sources: &[impl AsRef<Path>],
    stats: &mut RunStats,
) -> StageOutcome {
    if sources.is_empty() {
        println!("No source files to generate tests for");
        return StageOutcome::Skipped;
    }

    let mut generated = 0usize;
    for source in sources {
        if generate_for_file(config, invoker, source.as_ref(), stats)
            .await
            .is_success()
        {
            generated += 1;
        }
    }

    println!(
        "\n{} Generated tests for {generated}/{} files",
        "✓".green(),
        sources.len()
    );

    if generated > 0 {
        StageOutcome::Success
    } else {
        StageOutcome::Failed
    }
}
