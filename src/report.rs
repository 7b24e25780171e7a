//! Statistics report: markdown summary plus a JSON snapshot of the counters.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::types::RunStats;

#[derive(Serialize)]
struct StatsSnapshot<'a> {
    #[serde(flatten)]
    stats: &'a RunStats,
    elapsed_secs: f64,
    files: Vec<String>,
}

/// Render the markdown report. `sources` are listed relative to `root`;
/// `tool` names the local model runner.
pub fn render_report(
    stats: &RunStats,
    tool: &str,
    elapsed_secs: f64,
    sources: &[PathBuf],
    root: &Path,
) -> String {
    let avg = elapsed_secs / f64::from(stats.model_calls.max(1));

    let mut report = format!(
        "\n# LLM Test Generation Statistics Report\n\
         \n\
         ## Summary\n\
         - **Total Files Processed**: {files}\n\
         - **Tests Generated**: {generated}\n\
         - **Tests Refined**: {refined}\n\
         - **Build Fixes Applied**: {fixes}\n\
         - **Model Used**: {model}\n\
         - **Total Model Calls**: {calls}\n\
         - **Estimated Coverage**: {coverage:.1}%\n\
         - **Total Processing Time**: {elapsed_secs:.2} seconds\n\
         \n\
         ## LLM Integration Details\n\
         - **Model**: {model}\n\
         - **Local LLM**: Yes ({tool})\n\
         - **API Calls Made**: {calls}\n\
         - **Average Response Time**: {avg:.2} seconds per call\n\
         \n\
         ## Test Generation Workflow\n\
         1. ✓ Analyzed C++ project structure\n\
         2. ✓ Generated initial tests using LLM\n\
         3. ✓ Refined tests for deduplication and quality\n\
         4. ✓ Attempted automated build and error fixing\n\
         5. ✓ Generated coverage estimates\n\
         \n\
         ## Files Processed\n",
        files = stats.total_files_processed,
        generated = stats.tests_generated,
        refined = stats.tests_refined,
        fixes = stats.build_fixes_applied,
        model = stats.model,
        calls = stats.model_calls,
        coverage = stats.coverage_percentage,
    );

    for source in sources {
        let shown = source.strip_prefix(root).unwrap_or(source);
        let _ = writeln!(report, "- {}", shown.display());
    }

    report
}

/// Write the markdown report, overwriting any previous one.
pub fn write_report(config: &PipelineConfig, stats: &RunStats, sources: &[PathBuf]) -> Result<PathBuf> {
    let path = config.report_path();
    let report = render_report(
        stats,
        config.model_tool(),
        stats.elapsed_secs(),
        sources,
        &config.project_root,
    );
    std::fs::write(&path, report).with_context(|| format!("writing report {}", path.display()))?;
    Ok(path)
}

/// Write the counters as JSON next to the report.
pub fn write_stats_json(config: &PipelineConfig, stats: &RunStats, sources: &[PathBuf]) -> Result<PathBuf> {
    let path = config.stats_json_path();
    let snapshot = StatsSnapshot {
        stats,
        elapsed_secs: stats.elapsed_secs(),
        files: sources
            .iter()
            .map(|s| {
                s.strip_prefix(&config.project_root)
                    .unwrap_or(s)
                    .display()
                    .to_string()
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
