use std::path::PathBuf;

use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_pipeline();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("LEXLABEL_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("LEXLABEL_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LEXLABEL_API_KEY") {
            self.llm.api_key = Some(v);
        } else if self.llm.api_key.is_none()
            && let Ok(v) = std::env::var("OPENAI_API_KEY")
        {
            self.llm.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("LEXLABEL_LLM_TIMEOUT") {
            if let Ok(secs) = v.parse::<u64>() {
                self.llm.timeout_secs = secs;
            } else {
                tracing::warn!("ignoring invalid LEXLABEL_LLM_TIMEOUT value: {v}");
            }
        }
        if let Ok(v) = std::env::var("LEXLABEL_RETRY_MAX_ATTEMPTS") {
            if let Ok(n) = v.parse::<u32>() {
                self.retry.max_attempts = n;
            } else {
                tracing::warn!("ignoring invalid LEXLABEL_RETRY_MAX_ATTEMPTS value: {v}");
            }
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Ok(v) = std::env::var("LEXLABEL_PIPELINE_TASK") {
            match v.parse() {
                Ok(kind) => self.pipeline.task = kind,
                Err(e) => tracing::warn!("ignoring LEXLABEL_PIPELINE_TASK: {e}"),
            }
        }
        if let Ok(v) = std::env::var("LEXLABEL_PIPELINE_INPUT") {
            self.pipeline.input = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LEXLABEL_PIPELINE_OUTPUT") {
            self.pipeline.output = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LEXLABEL_PIPELINE_CHECKPOINT_EVERY") {
            if let Ok(n) = v.parse::<usize>() {
                self.pipeline.checkpoint_every = n;
            } else {
                tracing::warn!("ignoring invalid LEXLABEL_PIPELINE_CHECKPOINT_EVERY value: {v}");
            }
        }
        if let Ok(v) = std::env::var("LEXLABEL_PIPELINE_PACE_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.pipeline.pace_ms = ms;
            } else {
                tracing::warn!("ignoring invalid LEXLABEL_PIPELINE_PACE_MS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("LEXLABEL_PIPELINE_LIMIT") {
            if let Ok(n) = v.parse::<usize>() {
                self.pipeline.limit = Some(n);
            } else {
                tracing::warn!("ignoring invalid LEXLABEL_PIPELINE_LIMIT value: {v}");
            }
        }
    }
}
