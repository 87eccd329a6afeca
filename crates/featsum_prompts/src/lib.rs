//! # featsum_prompts
//!
//! Prompt templates for featsum.
//!
//! Templates are Markdown files named `<name>.md`. A [`PromptLoader`] looks
//! them up in an optional override directory first and falls back to the
//! templates compiled into this crate.
//!
//! Placeholders are literal `{name}` tokens. [`substitute`] replaces the first
//! occurrence of each token in a single pass; substituted text is never
//! scanned again, so data that happens to contain `{topic}` stays untouched.
//!
//! ## Example
//!
//! ```rust
//! use featsum_prompts::{substitute, PromptLoader, FEATURE_SUMMARY};
//!
//! let loader = PromptLoader::builtin();
//! let template = loader.load(FEATURE_SUMMARY).unwrap();
//! let prompt = substitute(&template, &[("topic", "Wellbeing"), ("data", "...")]);
//! assert!(prompt.contains("Wellbeing"));
//! ```

pub mod error;
pub mod loader;
pub mod renderer;

pub use error::{PromptError, PromptResult};
pub use loader::{
    PromptLoader, AGGREGATION, AGGREGATOR_SYSTEM, ANALYST_SYSTEM, FEATURE_SUMMARY, REPAIR,
    REPAIR_SYSTEM,
};
pub use renderer::substitute;
