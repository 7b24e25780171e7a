use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Full pipeline configuration, merged from file + env + CLI.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model: String,
    /// Program plus leading arguments; `run`/`list` are appended.
    pub model_command: Vec<String>,
    pub model_timeout_secs: u64,

    // Paths (relative ones resolve against `project_root`)
    pub project_root: PathBuf,
    pub source_dir: PathBuf,
    pub tests_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub report_file: PathBuf,
    pub stats_json_file: PathBuf,

    pub source_extensions: Vec<String>,
    pub test_extension: String,

    // Build, run inside tests_dir
    pub configure_command: Vec<String>,
    pub build_command: Vec<String>,
    pub test_binary: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "llama3.1".to_string(),
            model_command: vec!["ollama".to_string()],
            model_timeout_secs: 120,
            project_root: PathBuf::from("."),
            source_dir: PathBuf::from("orgChartApi"),
            tests_dir: PathBuf::from("tests"),
            prompts_dir: PathBuf::from("yaml-prompts"),
            report_file: PathBuf::from("LLM_STATS_REPORT.md"),
            stats_json_file: PathBuf::from("llm_stats.json"),
            source_extensions: vec!["cc".to_string(), "cpp".to_string(), "h".to_string()],
            test_extension: "cpp".to_string(),
            configure_command: vec![
                "cmake".to_string(),
                ".".to_string(),
                "-B".to_string(),
                "build".to_string(),
            ],
            build_command: vec![
                "cmake".to_string(),
                "--build".to_string(),
                "build".to_string(),
            ],
            test_binary: PathBuf::from("build/runTests"),
        }
    }
}

impl PipelineConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    /// Program name of the model tool, without its directory.
    pub fn model_tool(&self) -> &str {
        self.model_command
            .first()
            .map(|p| p.rsplit('/').next().unwrap_or(p.as_str()))
            .unwrap_or("")
    }

    /// Anchor a relative project root at the current directory, so paths stay
    /// valid while a stage has the working directory changed.
    pub fn with_absolute_root(mut self) -> Result<Self> {
        if self.project_root.is_relative() {
            let cwd = std::env::current_dir().context("reading current directory")?;
            self.project_root = cwd.join(&self.project_root);
        }
        Ok(self)
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.project_root.join(p)
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.resolve(&self.source_dir)
    }

    pub fn tests_path(&self) -> PathBuf {
        self.resolve(&self.tests_dir)
    }

    pub fn prompts_path(&self) -> PathBuf {
        self.resolve(&self.prompts_dir)
    }

    pub fn report_path(&self) -> PathBuf {
        self.resolve(&self.report_file)
    }

    pub fn stats_json_path(&self) -> PathBuf {
        self.resolve(&self.stats_json_file)
    }

    /// Test binary path; relative values are taken from the tests directory.
    pub fn test_binary_path(&self) -> PathBuf {
        if self.test_binary.is_absolute() {
            self.test_binary.clone()
        } else {
            self.tests_path().join(&self.test_binary)
        }
    }
}

// ---------------------------------------------------------------------------
// TOML config structures (deserialized from testforge.toml)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    model: Option<TomlModel>,
    paths: Option<TomlPaths>,
    build: Option<TomlBuild>,
    report: Option<TomlReport>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlModel {
    name: Option<String>,
    command: Option<Vec<String>>,
    timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlPaths {
    root: Option<String>,
    sources: Option<String>,
    tests: Option<String>,
    prompts: Option<String>,
    extensions: Option<Vec<String>>,
    test_extension: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlBuild {
    configure: Option<Vec<String>>,
    build: Option<Vec<String>>,
    test_binary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlReport {
    file: Option<String>,
    json: Option<String>,
}

// ---------------------------------------------------------------------------
// TOML loader
// ---------------------------------------------------------------------------

/// Load configuration from testforge.toml on top of the compiled defaults.
pub fn load_toml_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    parse_toml_config(&content).with_context(|| format!("parsing {}", path.display()))
}

fn parse_toml_config(content: &str) -> Result<PipelineConfig> {
    let toml_cfg: TomlConfig = toml::from_str(content)?;
    let defaults = PipelineConfig::default();

    let model = toml_cfg.model.unwrap_or_default();
    let paths = toml_cfg.paths.unwrap_or_default();
    let build = toml_cfg.build.unwrap_or_default();
    let report = toml_cfg.report.unwrap_or_default();

    Ok(PipelineConfig {
        model: model.name.unwrap_or(defaults.model),
        model_command: model
            .command
            .filter(|c| !c.is_empty())
            .unwrap_or(defaults.model_command),
        model_timeout_secs: model.timeout.unwrap_or(defaults.model_timeout_secs),
        project_root: paths
            .root
            .map(PathBuf::from)
            .unwrap_or(defaults.project_root),
        source_dir: paths
            .sources
            .map(PathBuf::from)
            .unwrap_or(defaults.source_dir),
        tests_dir: paths.tests.map(PathBuf::from).unwrap_or(defaults.tests_dir),
        prompts_dir: paths
            .prompts
            .map(PathBuf::from)
            .unwrap_or(defaults.prompts_dir),
        report_file: report
            .file
            .map(PathBuf::from)
            .unwrap_or(defaults.report_file),
        stats_json_file: report
            .json
            .map(PathBuf::from)
            .unwrap_or(defaults.stats_json_file),
        source_extensions: paths
            .extensions
            .map(|exts| {
                exts.into_iter()
                    .map(|e| e.trim_start_matches('.').to_string())
                    .collect()
            })
            .unwrap_or(defaults.source_extensions),
        test_extension: paths
            .test_extension
            .map(|e| e.trim_start_matches('.').to_string())
            .unwrap_or(defaults.test_extension),
        configure_command: build
            .configure
            .filter(|c| !c.is_empty())
            .unwrap_or(defaults.configure_command),
        build_command: build
            .build
            .filter(|c| !c.is_empty())
            .unwrap_or(defaults.build_command),
        test_binary: build
            .test_binary
            .map(PathBuf::from)
            .unwrap_or(defaults.test_binary),
    })
}

// ---------------------------------------------------------------------------
// Env var overlay (applied on top of any config source)
// ---------------------------------------------------------------------------

/// Apply environment variable overrides. Env vars always win over file-based config.
fn apply_env_overrides(cfg: &mut PipelineConfig) {
    if let Ok(v) = std::env::var("TESTFORGE_MODEL") {
        if !v.trim().is_empty() {
            cfg.model = v;
        }
    }
    if let Ok(v) = std::env::var("TESTFORGE_MODEL_COMMAND") {
        let parts: Vec<String> = v.split_whitespace().map(str::to_string).collect();
        if !parts.is_empty() {
            cfg.model_command = parts;
        }
    }
    if let Ok(v) = std::env::var("TESTFORGE_TIMEOUT") {
        if let Ok(n) = v.parse::<u64>() {
            cfg.model_timeout_secs = n;
        }
    }
    if let Ok(v) = std::env::var("TESTFORGE_ROOT") {
        cfg.project_root = PathBuf::from(v);
    }
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Build a PipelineConfig with the following precedence (highest wins):
///   1. CLI flags
///   2. Environment variables
///   3. testforge.toml (if present)
///   4. Compiled defaults
pub fn build_config(
    config_path: &Path,
    cli_model: Option<String>,
    cli_root: Option<PathBuf>,
    cli_timeout: Option<u64>,
) -> Result<PipelineConfig> {
    let mut cfg = if config_path.exists() {
        tracing::info!("Loading config from {}", config_path.display());
        load_toml_config(config_path)?
    } else {
        tracing::debug!("No config file at {}, using defaults", config_path.display());
        PipelineConfig::default()
    };

    apply_env_overrides(&mut cfg);

    if let Some(model) = cli_model {
        cfg.model = model;
    }
    if let Some(root) = cli_root {
        cfg.project_root = root;
    }
    if let Some(timeout) = cli_timeout {
        cfg.model_timeout_secs = timeout;
    }

    Ok(cfg)
}
