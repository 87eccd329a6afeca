//! Prompt template loading.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::error::{PromptError, PromptResult};

pub const FEATURE_SUMMARY: &str = "feature_summary_prompt";
pub const REPAIR: &str = "repair_prompt";
pub const AGGREGATION: &str = "aggregation_prompt";
pub const ANALYST_SYSTEM: &str = "analyst_system";
pub const AGGREGATOR_SYSTEM: &str = "aggregator_system";
pub const REPAIR_SYSTEM: &str = "repair_system";

const BUILTIN: &[(&str, &str)] = &[
    (FEATURE_SUMMARY, include_str!("../prompts/feature_summary_prompt.md")),
    (REPAIR, include_str!("../prompts/repair_prompt.md")),
    (AGGREGATION, include_str!("../prompts/aggregation_prompt.md")),
    (ANALYST_SYSTEM, include_str!("../prompts/analyst_system.md")),
    (AGGREGATOR_SYSTEM, include_str!("../prompts/aggregator_system.md")),
    (REPAIR_SYSTEM, include_str!("../prompts/repair_system.md")),
];

/// Prompt template loader.
#[derive(Debug, Clone)]
pub struct PromptLoader {
    templates_path: Option<PathBuf>,
    use_builtin: bool,
}

impl Default for PromptLoader {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptLoader {
    /// Loader that only knows the templates shipped with the crate.
    pub fn builtin() -> Self {
        Self {
            templates_path: None,
            use_builtin: true,
        }
    }

    /// Loader that reads `<dir>/<name>.md` and falls back to the built-ins.
    pub fn with_overrides(templates_path: impl Into<PathBuf>) -> Self {
        Self {
            templates_path: Some(templates_path.into()),
            use_builtin: true,
        }
    }

    /// Loader restricted to a directory, without built-in fallback.
    pub fn from_dir(templates_path: impl Into<PathBuf>) -> PromptResult<Self> {
        let templates_path = templates_path.into();
        if !templates_path.is_dir() {
            return Err(PromptError::MissingDirectory(templates_path));
        }
        Ok(Self {
            templates_path: Some(templates_path),
            use_builtin: false,
        })
    }

    /// Override directory, if any.
    pub fn templates_path(&self) -> Option<&Path> {
        self.templates_path.as_deref()
    }

    /// Load a template by name (without the `.md` extension).
    pub fn load(&self, name: &str) -> PromptResult<String> {
        if let Some(dir) = &self.templates_path {
            let path = dir.join(format!("{}.md", name));
            if path.is_file() {
                debug!(template = name, path = %path.display(), "Loading prompt template");
                return Ok(fs::read_to_string(&path)?);
            }
        }

        if self.use_builtin {
            if let Some((_, content)) = BUILTIN.iter().find(|(n, _)| *n == name) {
                return Ok((*content).to_string());
            }
        }

        error!(template = name, "Failed to load prompt template");
        Err(PromptError::NotFound(name.to_string()))
    }

    /// Names of every template this loader can resolve, sorted.
    pub fn available(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = BTreeSet::new();

        if self.use_builtin {
            names.extend(BUILTIN.iter().map(|(n, _)| n.to_string()));
        }

        if let Some(dir) = &self.templates_path {
            if !dir.exists() {
                warn!("Prompt directory does not exist: {:?}", dir);
            }
            for entry in WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("md") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.insert(stem.to_string());
                    }
                }
            }
        }

        names.into_iter().collect()
    }
}
