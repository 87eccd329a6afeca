//! # featsum_chat - Report Generation and Dialogue for featsum
//!
//! This crate turns a topic and a category selection into an analytical
//! report written by a language model:
//!
//! - **Completion Client**: one LLM call with bounded retries on network
//!   failures and linear backoff
//! - **Report Pipeline**: single-request or chunked generation, aggregation,
//!   structural validation and repair
//! - **Session Store**: per-user dialogue progress, in memory
//! - **Dialogue Controller**: transport-agnostic topic → categories → report
//!   flow producing plain [`Reply`] values
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ Dialogue Controller │────▶│ Report Pipeline │────▶│ Completion Client│
//! └─────────┬───────────┘     └────────┬────────┘     └────────┬─────────┘
//!           │                          │                       │
//!           ▼                          ▼                       ▼
//! ┌─────────────────┐        ┌─────────────────┐     ┌──────────────────┐
//! │  Session Store  │        │  featsum_data   │     │ OpenAI/Anthropic │
//! └─────────────────┘        │ featsum_prompts │     └──────────────────┘
//!                            └─────────────────┘
//! ```

pub mod dialogue;
pub mod display;
pub mod error;
pub mod llm;
pub mod mock;
pub mod report;
pub mod session;
pub mod settings;

pub use dialogue::*;
pub use display::*;
pub use error::*;
pub use llm::*;
pub use report::*;
pub use session::*;
pub use settings::*;
