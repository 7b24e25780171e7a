//! Instruction templates and prompt framing.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::discovery::display_name;

/// The instruction template each stage prefixes to its prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    InitialTestGen,
    RefineTests,
    FixBuild,
}

impl Template {
    pub fn as_str(&self) -> &'static str {
        match self {
            Template::InitialTestGen => "initial_test_gen",
            Template::RefineTests => "refine_tests",
            Template::FixBuild => "fix_build",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.yaml", self.as_str())
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Loads instruction templates from a directory.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_of(&self, template: Template) -> PathBuf {
        self.dir.join(template.file_name())
    }

    /// Raw template text. A missing or unreadable template yields an empty
    /// string so the stage still runs with the framing alone.
    pub fn load(&self, template: Template) -> String {
        let path = self.path_of(template);
        match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("template {} unavailable ({e}), continuing without it", path.display());
                String::new()
            }
        }
    }
}

/// One model request: which stage asked, its instructions, and the task text.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub template: Template,
    pub instructions: String,
    pub task: String,
}

impl PromptRequest {
    pub fn new(template: Template, instructions: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            template,
            instructions: instructions.into(),
            task: task.into(),
        }
    }

    /// Full prompt text sent to the model.
    pub fn render(&self) -> String {
        format!(
            "You are a C++ unit test generator. Follow these YAML instructions strictly:\n\n\
             {}\n\n\
             {}\n\n\
             Generate ONLY the C++ test code, no explanations or additional text.",
            self.instructions, self.task
        )
    }
}

/// Task text for the generation stage.
pub fn generation_task(source: &Path, content: &str) -> String {
    format!(
        "\nC++ FILE: {}\n```cpp\n{}\n```\n\nGenerate comprehensive unit tests for this C++ file.\n",
        display_name(source),
        content
    )
}

/// Task text for the refinement stage.
pub fn refinement_task(test_file: &Path, content: &str) -> String {
    format!(
        "\nTEST FILE: {}\n```cpp\n{}\n```\n\n\
         Refine this test file by removing duplicates, adding missing includes, and improving the code.\n",
        display_name(test_file),
        content
    )
}

/// Task text for the fix stage; embeds the whole build log.
pub fn fix_task(build_log: &str, test_file: &Path, content: &str) -> String {
    format!(
        "\nBUILD LOG:\n{}\n\nTEST FILE: {}\n```cpp\n{}\n```\n\n\
         Fix the compilation errors in this test file based on the build log.\n",
        build_log,
        display_name(test_file),
        content
    )
}
