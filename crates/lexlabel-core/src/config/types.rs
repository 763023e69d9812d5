use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use lexlabel_llm::{GenerationParams, LinearBackoff, RetryPolicy};
use serde::{Deserialize, Serialize};

use crate::pipeline::{FailureMode, OutputFormat, RunOptions, Task, TaskKind};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub generation: GenerationOverrides,
}

fn default_base_url() -> String {
    "https://api.deepseek.com".into()
}

fn default_model() -> String {
    "deepseek-chat".into()
}

fn default_timeout_secs() -> u64 {
    120
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Added to the delay for each further attempt; 0 keeps it fixed.
    #[serde(default)]
    pub increment_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            increment_ms: 0,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy<LinearBackoff> {
        RetryPolicy::new(
            self.max_attempts,
            LinearBackoff::new(
                Duration::from_millis(self.base_delay_ms),
                Duration::from_millis(self.increment_ms),
            ),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureModeKind {
    Skip,
    Fallback,
}

fn default_task() -> TaskKind {
    TaskKind::Decompose
}

fn default_input() -> PathBuf {
    PathBuf::from("law_documents.txt")
}

fn default_output() -> PathBuf {
    PathBuf::from("pseudo_law.jsonl")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_task")]
    pub task: TaskKind,
    #[serde(default = "default_input")]
    pub input: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Output format; inferred from the output extension, then the task, when unset.
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub checkpoint_every: usize,
    #[serde(default)]
    pub pace_ms: u64,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub failure_mode: Option<FailureModeKind>,
    /// Substitute text for failed items (decompose: the instruction fallback).
    #[serde(default)]
    pub fallback_text: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            task: default_task(),
            input: default_input(),
            output: default_output(),
            format: None,
            checkpoint_every: 0,
            pace_ms: 0,
            limit: None,
            failure_mode: None,
            fallback_text: None,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        self.format
            .or_else(|| OutputFormat::detect(&self.output))
            .unwrap_or_else(|| self.task.default_output_format())
    }

    #[must_use]
    pub fn failure_mode(&self) -> FailureMode {
        let fallback = || self.fallback_text.clone().unwrap_or_default();
        match (self.task, self.failure_mode) {
            (TaskKind::Decompose, _) | (_, Some(FailureModeKind::Skip)) => FailureMode::Skip,
            (_, Some(FailureModeKind::Fallback)) => FailureMode::Fallback(fallback()),
            (kind, None) => match kind.default_failure_mode() {
                FailureMode::Fallback(_) if self.fallback_text.is_some() => {
                    FailureMode::Fallback(fallback())
                }
                mode => mode,
            },
        }
    }

    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            checkpoint_every: self.checkpoint_every,
            pace: Duration::from_millis(self.pace_ms),
            limit: self.limit,
            failure_mode: self.failure_mode(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenerationOverrides {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl GenerationOverrides {
    #[must_use]
    pub fn apply(&self, mut params: GenerationParams) -> GenerationParams {
        if let Some(t) = self.temperature {
            params = params.with_temperature(t);
        }
        if let Some(n) = self.max_tokens {
            params = params.with_max_tokens(n);
        }
        params
    }
}

impl Config {
    /// The configured task with generation overrides applied to its primary request.
    #[must_use]
    pub fn task(&self) -> Task {
        let kind = self.pipeline.task;
        let mut task = Task::new(kind).with_params(self.generation.apply(kind.default_params()));
        if kind == TaskKind::Decompose
            && let Some(text) = &self.pipeline.fallback_text
        {
            task = task.with_instruction_fallback(text.clone());
        }
        task
    }
}
