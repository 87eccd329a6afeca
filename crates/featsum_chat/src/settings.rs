//! Settings for the report pipeline.
//!
//! Loaded from an optional YAML file; every field has a default, so an
//! empty or missing file yields the reference behaviour.
//!
//! ```yaml
//! limits:
//!   max_rows_per_request: 500
//!   max_projects_per_request: 20
//!   chunk_concurrency: 1
//! retry:
//!   max_retries: 2
//!   base_delay_ms: 1000
//! llm:
//!   provider: openai
//!   model: gpt-5.2
//!   temperature: 0.7
//!   max_tokens: 4000
//! display:
//!   max_message_chars: 4000
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChatError, ChatResult};
use crate::llm::{LlmProvider, RetryPolicy};
use crate::report::ReportLimits;

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub limits: ReportLimits,
    pub retry: RetryPolicy,
    pub llm: LlmSettings,
    pub display: DisplaySettings,
}

/// Backend selection and request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Explicit provider; `None` picks the first API key found.
    pub provider: Option<LlmProvider>,
    /// Model override; `None` uses the provider default.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            temperature: 0.7,
            max_tokens: 4000,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub max_message_chars: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            max_message_chars: 4000,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file.
    pub fn load(path: &Path) -> ChatResult<Self> {
        debug!("Loading settings from {:?}", path);
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| ChatError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load settings if the file exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> ChatResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.yaml");
        fs::write(
            &path,
            "limits:\n  max_rows_per_request: 200\nllm:\n  provider: anthropic\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.limits.max_rows_per_request, 200);
        assert_eq!(settings.limits.max_projects_per_request, 20);
        assert_eq!(settings.llm.provider, Some(LlmProvider::Anthropic));
        assert_eq!(settings.retry, RetryPolicy::default());
        assert_eq!(settings.display.max_message_chars, 4000);
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("none.yaml");
        assert_eq!(Settings::load_or_default(&missing).unwrap(), Settings::default());

        let invalid = temp.path().join("bad.yaml");
        fs::write(&invalid, "limits: [1, 2").unwrap();
        assert!(matches!(
            Settings::load(&invalid),
            Err(ChatError::Settings { .. })
        ));
    }
}
