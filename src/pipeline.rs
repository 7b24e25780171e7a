//! Pipeline orchestrator: probe, discover, then run each stage in order.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::build;
use crate::config::PipelineConfig;
use crate::discovery;
use crate::execute;
use crate::generate;
use crate::invoker::ModelInvoker;
use crate::refine;
use crate::report;
use crate::types::*;

/// Run the full workflow.
///
/// Only an unavailable model tool (or a fatal filesystem error) aborts the
/// run; every stage failure is recorded in the summary and the pipeline
/// moves on. The report is always written once probing succeeded.
pub async fn run<M: ModelInvoker>(config: &PipelineConfig, invoker: &M) -> Result<RunSummary> {
    let config = config.clone().with_absolute_root()?;

    println!(
        "{} — AI-powered C++ unit test generation",
        "testforge".bold().cyan()
    );
    println!("{}", "=".repeat(60));

    invoker.probe().await?;
    println!("{} Model tool available with model: {}", "✓".green(), invoker.model());

    for dir in [config.tests_path(), config.prompts_path()] {
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let mut stats = RunStats::new(invoker.model());
    let mut stages = Vec::new();

    let source_dir = config.source_path();
    let sources = discovery::find_sources(&source_dir, &config.source_extensions);
    stats.total_files_processed = u32::try_from(sources.len()).unwrap_or(u32::MAX);

    if sources.is_empty() {
        // Leftovers from an earlier run in the tests directory are not touched.
        println!("No C++ files found in {}", source_dir.display());
        for stage in [Stage::Generate, Stage::Refine, Stage::Build, Stage::Test] {
            stages.push((stage, StageOutcome::Skipped));
        }
    } else {
        println!("Found {} C++ files to process", sources.len());

        stage_header(Stage::Generate);
        let outcome = generate::generate_all(&config, invoker, &sources, &mut stats).await;
        stages.push((Stage::Generate, outcome));

        stage_header(Stage::Refine);
        let outcome = refine::refine_all(&config, invoker, &mut stats).await;
        stages.push((Stage::Refine, outcome));

        stage_header(Stage::Build);
        let outcome = build::build_tests(&config, invoker, &mut stats).await;
        stages.push((Stage::Build, outcome));

        stage_header(Stage::Test);
        let outcome = execute::run_tests(&config, &mut stats).await;
        stages.push((Stage::Test, outcome));
    }

    stage_header(Stage::Report);
    let report_path = report::write_report(&config, &stats, &sources)?;
    let json_path = report::write_stats_json(&config, &stats, &sources)?;
    println!("📊 Statistics report generated: {}", report_path.display());
    tracing::debug!("stats snapshot written to {}", json_path.display());
    stages.push((Stage::Report, StageOutcome::Success));

    let summary = RunSummary { stats, stages };
    print_summary(&summary);
    Ok(summary)
}

fn stage_header(stage: Stage) {
    println!();
    println!("{}", format!("========== {stage} ==========").bold());
}

fn print_stage_result(stage: Stage, outcome: StageOutcome) {
    let status = match outcome {
        StageOutcome::Success => "OK".green().bold(),
        StageOutcome::Skipped => "SKIP".yellow().bold(),
        StageOutcome::Failed => "FAIL".red().bold(),
    };
    println!("  [{status}] {stage}");
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "🎉 Test generation workflow completed!".green().bold());
    for (stage, outcome) in &summary.stages {
        print_stage_result(*stage, *outcome);
    }
    let s = &summary.stats;
    println!(
        "  Generated: {} | Refined: {} | Fixes: {} | Model calls: {}",
        s.tests_generated, s.tests_refined, s.build_fixes_applied, s.model_calls
    );
    println!("  Elapsed: {:.1}s", s.elapsed_secs());
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::invoker::ProbeError;
    use crate::testutil::{argv, project, StubInvoker};
    use crate::workdir::lock_cwd;
    use std::fs;

    fn quiet_build(config: &mut PipelineConfig) {
        config.configure_command = argv(&["sh", "-c", "exit 0"]);
        config.build_command = argv(&["sh", "-c", "exit 0"]);
    }

    #[tokio::test]
    async fn test_generate_then_refine_end_to_end() {
        let _lock = lock_cwd();
        let (_tmp, mut config) = project();
        quiet_build(&mut config);
        fs::write(config.source_path().join("Foo.cc"), "int foo();").unwrap();

        let stub = StubInvoker::new("TEST_BODY", "REFINED_BODY", "FIXED_BODY");
        let summary = run(&config, &stub).await.unwrap();

        assert_eq!(
            fs::read_to_string(config.tests_path().join("test_Foo.cpp")).unwrap(),
            "REFINED_BODY"
        );
        assert_eq!(summary.stats.total_files_processed, 1);
        assert_eq!(summary.stats.tests_generated, 1);
        assert_eq!(summary.stats.tests_refined, 1);
        assert_eq!(summary.stats.build_fixes_applied, 0);
        assert_eq!(summary.stats.model_calls, 2);
        assert_eq!(summary.outcome(Stage::Generate), Some(StageOutcome::Success));
        assert_eq!(summary.outcome(Stage::Build), Some(StageOutcome::Success));
        // no test binary was built
        assert_eq!(summary.outcome(Stage::Test), Some(StageOutcome::Failed));

        let report = fs::read_to_string(config.report_path()).unwrap();
        assert!(report.contains("- orgChartApi/Foo.cc\n"));
    }

    #[tokio::test]
    async fn test_zero_sources_still_writes_report() {
        let _lock = lock_cwd();
        let (_tmp, mut config) = project();
        quiet_build(&mut config);

        let stub = StubInvoker::new("TEST_BODY", "REFINED_BODY", "FIXED_BODY");
        let summary = run(&config, &stub).await.unwrap();

        assert_eq!(summary.stats.tests_generated, 0);
        for stage in [Stage::Generate, Stage::Refine, Stage::Build, Stage::Test] {
            assert_eq!(summary.outcome(stage), Some(StageOutcome::Skipped));
        }
        assert_eq!(summary.outcome(Stage::Report), Some(StageOutcome::Success));
        assert_eq!(stub.calls(), 0);

        let report = fs::read_to_string(config.report_path()).unwrap();
        assert!(report.contains("- **Total Files Processed**: 0\n"));
        assert!(report.contains("- **Tests Generated**: 0\n"));
        assert!(report.contains("- **Tests Refined**: 0\n"));
        assert!(report.contains("- **Build Fixes Applied**: 0\n"));
        assert!(report.contains("- **Total Model Calls**: 0\n"));
        assert!(report.contains("- **Estimated Coverage**: 0.0%\n"));
        assert!(config.stats_json_path().exists());
    }

    #[tokio::test]
    async fn test_zero_sources_leaves_previous_run_untouched() {
        let _lock = lock_cwd();
        let (_tmp, mut config) = project();
        config.build_command = argv(&["sh", "-c", "echo 'stale build' >&2; exit 1"]);
        let old_test = config.tests_path().join("test_Old.cpp");
        fs::write(&old_test, "old").unwrap();
        crate::testutil::link_binary("/bin/true", &config.test_binary_path());

        let stub = StubInvoker::new("TEST_BODY", "REFINED_BODY", "FIXED_BODY");
        let summary = run(&config, &stub).await.unwrap();

        assert_eq!(fs::read_to_string(&old_test).unwrap(), "old");
        assert_eq!(stub.calls(), 0);
        assert_eq!(summary.stats.tests_refined, 0);
        assert_eq!(summary.stats.build_fixes_applied, 0);
        assert_eq!(summary.stats.model_calls, 0);
        assert_eq!(summary.stats.coverage_percentage, 0.0);
        assert_eq!(summary.outcome(Stage::Refine), Some(StageOutcome::Skipped));
        assert_eq!(summary.outcome(Stage::Test), Some(StageOutcome::Skipped));

        let report = fs::read_to_string(config.report_path()).unwrap();
        assert!(report.contains("- **Tests Refined**: 0\n"));
        assert!(report.contains("- **Estimated Coverage**: 0.0%\n"));
    }

    #[tokio::test]
    async fn test_build_failure_runs_fix_and_passing_binary_sets_coverage() {
        let _lock = lock_cwd();
        let (_tmp, mut config) = project();
        config.configure_command = argv(&["sh", "-c", "exit 0"]);
        config.build_command = argv(&["sh", "-c", "echo 'undefined reference' >&2; exit 1"]);
        crate::testutil::link_binary("/bin/true", &config.test_binary_path());
        fs::write(config.source_path().join("Jwt.cc"), "Jwt::Jwt() {}").unwrap();

        let before = std::env::current_dir().unwrap();
        let stub = StubInvoker::new("TEST_BODY", "REFINED_BODY", "FIXED_BODY");
        let summary = run(&config, &stub).await.unwrap();

        assert_eq!(std::env::current_dir().unwrap(), before);
        assert_eq!(
            fs::read_to_string(config.tests_path().join("test_Jwt.cpp")).unwrap(),
            "FIXED_BODY"
        );
        assert_eq!(summary.stats.build_fixes_applied, 1);
        assert_eq!(summary.outcome(Stage::Build), Some(StageOutcome::Success));
        assert_eq!(summary.outcome(Stage::Test), Some(StageOutcome::Success));
        assert_eq!(summary.stats.coverage_percentage, execute::COVERAGE_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_unavailable_model_halts_before_processing() {
        let (_tmp, config) = project();
        fs::write(config.source_path().join("Foo.cc"), "int foo();").unwrap();

        let stub = StubInvoker::unavailable();
        let err = run(&config, &stub).await.unwrap_err();

        assert!(err.downcast_ref::<ProbeError>().is_some());
        assert_eq!(stub.calls(), 0);
        assert!(!config.report_path().exists());
        assert!(!config.tests_path().join("test_Foo.cpp").exists());
    }
}
