//! Build stage: configure + build inside the tests directory, fix on failure.

use anyhow::Result;
use colored::Colorize;

use crate::config::PipelineConfig;
use crate::fix;
use crate::invoker::ModelInvoker;
use crate::process;
use crate::types::{RunStats, StageOutcome};
use crate::workdir::WorkdirGuard;

#[derive(Debug, PartialEq, Eq)]
enum BuildAttempt {
    Built,
    /// A step exited non-zero; carries its stderr.
    Broken(String),
}

/// Configure and build the generated tests.
///
/// On a non-zero exit from either command the captured stderr goes to the fix
/// stage, whose outcome becomes this stage's outcome. The build is not
/// retried after fixing.
pub async fn build_tests<M: ModelInvoker>(
    config: &PipelineConfig,
    invoker: &M,
    stats: &mut RunStats,
) -> StageOutcome {
    println!("🔄 Building tests...");

    match attempt_build(config).await {
        Ok(BuildAttempt::Built) => {
            println!("{} Tests built successfully", "✓".green());
            StageOutcome::Success
        }
        Ok(BuildAttempt::Broken(log)) => fix::fix_build_errors(config, invoker, &log, stats).await,
        Err(e) => {
            println!("{} Build error: {e:#}", "✗".red());
            StageOutcome::Failed
        }
    }
}

async fn attempt_build(config: &PipelineConfig) -> Result<BuildAttempt> {
    let _cwd = WorkdirGuard::enter(&config.tests_path())?;

    let steps = [
        ("CMake configuration", &config.configure_command),
        ("Build", &config.build_command),
    ];
    for (label, argv) in steps {
        tracing::debug!("{label}: {}", argv.join(" "));
        let cmd = process::command_from(argv)?;
        let out = process::run_with_timeout(cmd, None).await?;
        if !out.success() {
            let stderr = out.stderr_text();
            println!("{label} failed:");
            println!("{stderr}");
            return Ok(BuildAttempt::Broken(stderr));
        }
    }

    Ok(BuildAttempt::Built)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::prompt::Template;
    use crate::testutil::{argv, project, StubInvoker};
    use crate::workdir::lock_cwd;
    use std::fs;

    #[tokio::test]
    async fn test_successful_build_restores_cwd() {
        let _lock = lock_cwd();
        let (_tmp, mut config) = project();
        config.configure_command = argv(&["sh", "-c", "touch configured"]);
        config.build_command = argv(&["sh", "-c", "test -f configured"]);

        let before = std::env::current_dir().unwrap();
        let stub = StubInvoker::new("", "", "FIXED_BODY");
        let mut stats = RunStats::new("stub");
        let outcome = build_tests(&config, &stub, &mut stats).await;

        assert_eq!(outcome, StageOutcome::Success);
        assert_eq!(std::env::current_dir().unwrap(), before);
        // configure ran inside the tests directory
        assert!(config.tests_path().join("configured").exists());
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_configure_failure_forwards_stderr_to_fix() {
        let _lock = lock_cwd();
        let (_tmp, mut config) = project();
        config.configure_command = argv(&["sh", "-c", "echo 'CMake Error: no CMakeLists' >&2; exit 1"]);
        config.build_command = argv(&["sh", "-c", "touch built"]);
        fs::write(config.tests_path().join("test_A.cpp"), "broken").unwrap();

        let before = std::env::current_dir().unwrap();
        let stub = StubInvoker::new("", "", "FIXED_BODY");
        let mut stats = RunStats::new("stub");
        let outcome = build_tests(&config, &stub, &mut stats).await;

        assert_eq!(outcome, StageOutcome::Success);
        assert_eq!(std::env::current_dir().unwrap(), before);
        assert!(!config.tests_path().join("built").exists());
        assert_eq!(
            fs::read_to_string(config.tests_path().join("test_A.cpp")).unwrap(),
            "FIXED_BODY"
        );
        let fixes = stub.requests_for(Template::FixBuild);
        assert_eq!(fixes.len(), 1);
        assert!(fixes[0].task.contains("CMake Error: no CMakeLists"));
    }

    #[tokio::test]
    async fn test_build_failure_triggers_fix() {
        let _lock = lock_cwd();
        let (_tmp, mut config) = project();
        config.configure_command = argv(&["sh", "-c", "exit 0"]);
        config.build_command = argv(&["sh", "-c", "echo 'test_A.cpp:1: error' >&2; exit 2"]);
        fs::write(config.tests_path().join("test_A.cpp"), "broken").unwrap();

        let stub = StubInvoker::new("", "", "");
        let mut stats = RunStats::new("stub");
        let outcome = build_tests(&config, &stub, &mut stats).await;

        // fix reports success even though nothing was fixed
        assert_eq!(outcome, StageOutcome::Success);
        assert_eq!(stats.build_fixes_applied, 0);
        assert_eq!(stub.requests_for(Template::FixBuild).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_build_tool_fails_and_restores_cwd() {
        let _lock = lock_cwd();
        let (_tmp, mut config) = project();
        config.configure_command = argv(&["testforge-no-such-cmake", "."]);

        let before = std::env::current_dir().unwrap();
        let stub = StubInvoker::new("", "", "FIXED_BODY");
        let mut stats = RunStats::new("stub");
        let outcome = build_tests(&config, &stub, &mut stats).await;

        assert_eq!(outcome, StageOutcome::Failed);
        assert_eq!(std::env::current_dir().unwrap(), before);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_tests_dir_fails_without_moving() {
        let _lock = lock_cwd();
        let (_tmp, mut config) = project();
        config.tests_dir = "absent".into();

        let before = std::env::current_dir().unwrap();
        let stub = StubInvoker::new("", "", "");
        let mut stats = RunStats::new("stub");
        assert_eq!(build_tests(&config, &stub, &mut stats).await, StageOutcome::Failed);
        assert_eq!(std::env::current_dir().unwrap(), before);
    }
}
