mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use crate::pipeline::TaskKind;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!("config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings that would make every request fail or the run meaningless.
    ///
    /// The API key is not checked here; a dry run does not need it.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.base_url.trim().is_empty() {
            bail!("llm.base_url must not be empty");
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if self.llm.timeout_secs == 0 {
            bail!("llm.timeout_secs must be greater than zero");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if let Some(t) = self.generation.temperature
            && !(0.0..=2.0).contains(&t)
        {
            bail!("generation.temperature must be within 0.0..=2.0, got {t}");
        }
        if self.generation.max_tokens == Some(0) {
            bail!("generation.max_tokens must be greater than zero");
        }
        if self.pipeline.input.as_os_str().is_empty() {
            bail!("pipeline.input must not be empty");
        }
        if self.pipeline.output.as_os_str().is_empty() {
            bail!("pipeline.output must not be empty");
        }
        if self.pipeline.task == TaskKind::Decompose
            && self.pipeline.failure_mode == Some(FailureModeKind::Fallback)
        {
            bail!(
                "pipeline.failure_mode = \"fallback\" is not supported for decompose; \
                 use pipeline.fallback_text to set the instruction fallback"
            );
        }
        Ok(())
    }

    /// The API key, required before contacting the service.
    ///
    /// # Errors
    ///
    /// Returns an error if no key was configured.
    pub fn api_key(&self) -> anyhow::Result<&str> {
        self.llm
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .context("no API key configured: set LEXLABEL_API_KEY or [llm] api_key")
    }
}
