//! Shared fixtures for unit tests.

use std::cell::RefCell;
use std::path::Path;

use tempfile::TempDir;

use crate::config::PipelineConfig;
use crate::invoker::{ModelInvoker, ProbeError};
use crate::prompt::{PromptRequest, Template};
use crate::types::RunStats;

/// Scratch project with empty source, tests and prompts directories.
pub fn project() -> (TempDir, PipelineConfig) {
    let tmp = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        project_root: tmp.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    std::fs::create_dir_all(config.source_path()).unwrap();
    std::fs::create_dir_all(config.tests_path()).unwrap();
    std::fs::create_dir_all(config.prompts_path()).unwrap();
    (tmp, config)
}

pub fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Model stand-in answering each template with a fixed body.
pub struct StubInvoker {
    generate: String,
    refine: String,
    fix: String,
    probe_ok: bool,
    requests: RefCell<Vec<PromptRequest>>,
}

impl StubInvoker {
    pub fn new(generate: &str, refine: &str, fix: &str) -> Self {
        Self {
            generate: generate.to_string(),
            refine: refine.to_string(),
            fix: fix.to_string(),
            probe_ok: true,
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            probe_ok: false,
            ..Self::new("", "", "")
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn last_request(&self) -> Option<PromptRequest> {
        self.requests.borrow().last().cloned()
    }

    pub fn requests_for(&self, template: Template) -> Vec<PromptRequest> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.template == template)
            .cloned()
            .collect()
    }
}

impl ModelInvoker for StubInvoker {
    async fn probe(&self) -> Result<(), ProbeError> {
        if self.probe_ok {
            Ok(())
        } else {
            Err(ProbeError::ToolMissing {
                tool: "stub".to_string(),
            })
        }
    }

    async fn invoke(&self, request: &PromptRequest, stats: &mut RunStats) -> String {
        self.requests.borrow_mut().push(request.clone());
        let body = match request.template {
            Template::InitialTestGen => &self.generate,
            Template::RefineTests => &self.refine,
            Template::FixBuild => &self.fix,
        };
        if !body.is_empty() {
            stats.model_calls += 1;
        }
        body.clone()
    }

    fn model(&self) -> &str {
        "stub"
    }
}

/// Symlink to a system binary, used as a fake test executable.
#[cfg(unix)]
pub fn link_binary(target: &str, link: &Path) {
    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::os::unix::fs::symlink(target, link).unwrap();
}
