//! External model invoker: shells out to a local model CLI (`ollama` by default).
//!
//! `<tool> list` probes availability; `<tool> run <model> <prompt>` performs
//! one generation. Every failure of a generation call collapses to an empty
//! string so stages can skip the item and carry on.

use colored::Colorize;
use std::time::Duration;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::process;
use crate::prompt::PromptRequest;
use crate::types::RunStats;

/// Why the model tool cannot be used. Any of these halts the run.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{tool} is not installed or not on PATH")]
    ToolMissing { tool: String },

    #[error("{tool} is not available or not running: {detail}")]
    ToolUnavailable { tool: String, detail: String },

    #[error("model {model} not found")]
    ModelMissing { model: String, available: String },
}

/// Seam between the pipeline stages and the model backend.
pub trait ModelInvoker {
    /// Check that the tool runs and the selected model is present.
    async fn probe(&self) -> Result<(), ProbeError>;

    /// Run one prompt. Returns trimmed output, or an empty string on any
    /// failure. Increments `stats.model_calls` only for successful calls.
    async fn invoke(&self, request: &PromptRequest, stats: &mut RunStats) -> String;

    fn model(&self) -> &str;
}

/// Invoker backed by an Ollama-compatible command-line tool.
#[derive(Debug, Clone)]
pub struct OllamaInvoker {
    command: Vec<String>,
    model: String,
    timeout: Duration,
}

impl OllamaInvoker {
    pub fn new(command: Vec<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command,
            model: model.into(),
            timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.model_command.clone(),
            config.model.clone(),
            config.model_timeout(),
        )
    }

    fn tool_name(&self) -> String {
        self.command.first().cloned().unwrap_or_default()
    }

    fn argv(&self, extra: &[&str]) -> Vec<String> {
        let mut argv = self.command.clone();
        argv.extend(extra.iter().map(|s| s.to_string()));
        argv
    }
}

impl ModelInvoker for OllamaInvoker {
    async fn probe(&self) -> Result<(), ProbeError> {
        let tool = self.tool_name();
        let cmd = process::command_from(&self.argv(&["list"]))
            .map_err(|_| ProbeError::ToolMissing { tool: tool.clone() })?;

        let out = match process::run_with_timeout(cmd, Some(self.timeout)).await {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!("probe spawn failed: {e:#}");
                return Err(ProbeError::ToolMissing { tool });
            }
        };

        if !out.success() {
            let detail = if out.timed_out {
                "timed out".to_string()
            } else {
                out.stderr_text().trim().to_string()
            };
            return Err(ProbeError::ToolUnavailable { tool, detail });
        }

        let listing = out.stdout_text();
        if model_listed(&listing, &self.model) {
            Ok(())
        } else {
            Err(ProbeError::ModelMissing {
                model: self.model.clone(),
                available: listing,
            })
        }
    }

    async fn invoke(&self, request: &PromptRequest, stats: &mut RunStats) -> String {
        let prompt = request.render();
        let argv = self.argv(&["run", self.model.as_str(), prompt.as_str()]);

        let cmd = match process::command_from(&argv) {
            Ok(cmd) => cmd,
            Err(e) => {
                println!("  {} Error calling model: {e}", "✗".red());
                return String::new();
            }
        };

        tracing::debug!(
            "invoking {} ({}, {} prompt bytes)",
            self.model,
            request.template,
            prompt.len()
        );

        match process::run_with_timeout(cmd, Some(self.timeout)).await {
            Ok(out) if out.timed_out => {
                println!("  {} Model call timed out", "✗".red());
                String::new()
            }
            Ok(out) if out.exit_code == 0 => {
                stats.model_calls += 1;
                out.stdout_text().trim().to_string()
            }
            Ok(out) => {
                println!(
                    "  {} Error calling model (exit {}): {}",
                    "✗".red(),
                    out.exit_code,
                    out.stderr_text().trim()
                );
                String::new()
            }
            Err(e) => {
                println!("  {} Error calling model: {e:#}", "✗".red());
                String::new()
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// True when `model` appears in a `list` listing, either exactly or as the
/// untagged name of an entry (`llama3.1` matches `llama3.1:latest`).
pub fn model_listed(listing: &str, model: &str) -> bool {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| *name != "NAME")
        .any(|name| name == model || name.split(':').next() == Some(model))
}
