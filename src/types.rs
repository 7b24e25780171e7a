use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single stage, or of one item within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    Success,
    Skipped,
    Failed,
}

impl StageOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, StageOutcome::Success)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageOutcome::Success => "success",
            StageOutcome::Skipped => "skipped",
            StageOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage names, in execution order.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Generate,
    Refine,
    Build,
    Test,
    Report,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Generate => "generate",
            Stage::Refine => "refine",
            Stage::Build => "build",
            Stage::Test => "test",
            Stage::Report => "report",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counters accumulated over one run and serialized into the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub total_files_processed: u32,
    pub tests_generated: u32,
    pub tests_refined: u32,
    pub build_fixes_applied: u32,
    pub model_calls: u32,
    pub model: String,
    pub coverage_percentage: f64,
    pub started: DateTime<Utc>,
}

impl RunStats {
    pub fn new(model: &str) -> Self {
        Self {
            total_files_processed: 0,
            tests_generated: 0,
            tests_refined: 0,
            build_fixes_applied: 0,
            model_calls: 0,
            model: model.to_string(),
            coverage_percentage: 0.0,
            started: Utc::now(),
        }
    }

    /// Wall-clock seconds since the run started.
    pub fn elapsed_secs(&self) -> f64 {
        let elapsed = Utc::now() - self.started;
        elapsed.num_milliseconds().max(0) as f64 / 1000.0
    }
}

/// Captured result of an external command.
#[derive(Debug)]
pub struct CommandOutcome {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    pub timed_out: bool,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Result of a full pipeline run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stats: RunStats,
    pub stages: Vec<(Stage, StageOutcome)>,
}

impl RunSummary {
    pub fn outcome(&self, stage: Stage) -> Option<StageOutcome> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, o)| *o)
    }
}
