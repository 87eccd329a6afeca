//! Report pipeline.
//!
//! A generation request moves through
//! `FILTER → SINGLE | CHUNKED → VALIDATE → REPAIR? → DONE`:
//!
//! 1. rows are narrowed to the category selection; nothing left is
//!    [`ReportError::NoData`]
//! 2. datasets over the row or project ceiling take the chunked path
//! 3. the single path serializes everything into one prompt; the chunked path
//!    summarizes project-aligned chunks and merges the summaries in one more
//!    call
//! 4. the candidate report is checked for bullet and row-level structure and
//!    repaired by a further call when the check fails
//!
//! Once a candidate exists the pipeline does not fail: a failed repair
//! returns the candidate with [`REPAIR_CAVEAT`] appended.

use std::sync::OnceLock;

use featsum_data::{partition_by_project, serialize_rows, Chunk, FilteredDataset, Row};
use featsum_prompts::{
    substitute, PromptLoader, AGGREGATION, AGGREGATOR_SYSTEM, ANALYST_SYSTEM, FEATURE_SUMMARY,
    REPAIR, REPAIR_SYSTEM,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::ReportError;
use crate::llm::{new_request_id, CompletionClient};

/// Appended to a report whose structure could not be repaired.
pub const REPAIR_CAVEAT: &str =
    "\n\n[Примечание: формат ответа может не полностью соответствовать требуемой структуре]";

/// Size ceilings that decide between one request and chunked aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportLimits {
    pub max_rows_per_request: usize,
    pub max_projects_per_request: usize,
    /// Chunk summaries in flight at once; 1 processes chunks sequentially.
    pub chunk_concurrency: usize,
}

impl Default for ReportLimits {
    fn default() -> Self {
        Self {
            max_rows_per_request: 500,
            max_projects_per_request: 20,
            chunk_concurrency: 1,
        }
    }
}

impl ReportLimits {
    /// Whether a dataset of this size needs the chunked path.
    pub fn needs_chunking(&self, dataset: &FilteredDataset) -> bool {
        dataset.total_rows > self.max_rows_per_request
            || dataset.projects.len() > self.max_projects_per_request
    }
}

/// Input to one report generation.
#[derive(Debug, Clone, Copy)]
pub struct ReportRequest<'a> {
    pub topic: &'a str,
    pub selected_categories: &'a [String],
    pub rows: &'a [Row],
}

/// A generated report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResult {
    pub request_id: String,
    pub content: String,
    pub used_chunking: bool,
    /// Number of chunk summaries merged; 0 on the single path.
    pub chunk_count: usize,
    /// Whether the structure check failed and a repair was attempted.
    pub repair_attempted: bool,
}

/// Outcome of the structural heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructureCheck {
    pub has_bullets: bool,
    pub has_structure: bool,
}

impl StructureCheck {
    /// Check for a bullet marker (`•`, or a line starting with `-`/`*`) and
    /// for one of the row-level labels `Год:` / `Проект:`.
    pub fn of(text: &str) -> Self {
        static BULLET_LINE: OnceLock<Regex> = OnceLock::new();
        let bullet_line =
            BULLET_LINE.get_or_init(|| Regex::new(r"(?m)^\s*[-*]\s").expect("valid bullet regex"));

        Self {
            has_bullets: text.contains('•') || bullet_line.is_match(text),
            has_structure: text.contains("Год:") || text.contains("Проект:"),
        }
    }

    pub fn passes(&self) -> bool {
        self.has_bullets && self.has_structure
    }
}

struct Candidate {
    content: String,
    /// What the repair prompt shows as `{data}`.
    repair_data: String,
    chunk_count: usize,
}

/// Drives completion calls to turn rows into a report.
pub struct ReportGenerator {
    client: CompletionClient,
    prompts: PromptLoader,
    limits: ReportLimits,
}

impl ReportGenerator {
    pub fn new(client: CompletionClient, prompts: PromptLoader) -> Self {
        Self {
            client,
            prompts,
            limits: ReportLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ReportLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &ReportLimits {
        &self.limits
    }

    /// Generate a report for the selection.
    ///
    /// Fails with [`ReportError::NoData`] before any completion call when no
    /// row matches, and with [`ReportError::Completion`] when the backend
    /// gives up on a summary or aggregation call.
    pub async fn generate_report(
        &self,
        request: ReportRequest<'_>,
    ) -> Result<ReportResult, ReportError> {
        let request_id = new_request_id();

        info!(
            request_id = %request_id,
            topic = request.topic,
            categories = request.selected_categories.len(),
            total_rows = request.rows.len(),
            "Starting report generation"
        );

        let dataset = FilteredDataset::prepare(request.rows, request.selected_categories);
        if dataset.is_empty() {
            warn!(request_id = %request_id, "No data found for selected categories");
            return Err(ReportError::NoData(request.selected_categories.to_vec()));
        }

        let categories = request.selected_categories.join(", ");
        let used_chunking = self.limits.needs_chunking(&dataset);

        let candidate = if used_chunking {
            info!(
                request_id = %request_id,
                rows = dataset.total_rows,
                projects = dataset.projects.len(),
                "Chunking required"
            );
            self.generate_chunked(request.topic, &categories, &dataset, &request_id)
                .await?
        } else {
            self.generate_single(request.topic, &categories, &dataset, &request_id)
                .await?
        };

        let check = StructureCheck::of(&candidate.content);
        let repair_attempted = !check.passes();
        let content = if repair_attempted {
            warn!(
                request_id = %request_id,
                has_bullets = check.has_bullets,
                has_structure = check.has_structure,
                "Response structure validation failed, attempting repair"
            );
            self.repair(candidate.content, &candidate.repair_data, &request_id)
                .await
        } else {
            candidate.content
        };

        info!(
            request_id = %request_id,
            used_chunking,
            chunks = candidate.chunk_count,
            repair_attempted,
            "Report generated"
        );

        Ok(ReportResult {
            request_id,
            content,
            used_chunking,
            chunk_count: candidate.chunk_count,
            repair_attempted,
        })
    }

    async fn generate_single(
        &self,
        topic: &str,
        categories: &str,
        dataset: &FilteredDataset,
        request_id: &str,
    ) -> Result<Candidate, ReportError> {
        let data = serialize_rows(&dataset.rows);
        let content = self
            .summarize(topic, categories, &data, request_id)
            .await?;

        Ok(Candidate {
            content,
            repair_data: data,
            chunk_count: 0,
        })
    }

    async fn generate_chunked(
        &self,
        topic: &str,
        categories: &str,
        dataset: &FilteredDataset,
        request_id: &str,
    ) -> Result<Candidate, ReportError> {
        let chunks = partition_by_project(&dataset.rows, self.limits.max_rows_per_request);
        info!(
            request_id = %request_id,
            chunks = chunks.len(),
            total_rows = dataset.total_rows,
            "Data chunked"
        );

        // Ordered fan-out; the aggregation below joins on every summary.
        let pending: Vec<_> = chunks
            .iter()
            .map(|chunk| self.summarize_chunk(topic, categories, chunk, request_id))
            .collect();
        let summaries: Vec<String> = stream::iter(pending)
            .buffered(self.limits.chunk_concurrency.max(1))
            .try_collect()
            .await?;

        let merged = summaries
            .iter()
            .enumerate()
            .map(|(i, summary)| format!("\n=== Чанк {} ===\n{}", i + 1, summary))
            .collect::<Vec<_>>()
            .join("\n\n");

        let template = self.prompts.load(AGGREGATION)?;
        let system = self.prompts.load(AGGREGATOR_SYSTEM)?;
        let prompt = substitute(
            &template,
            &[
                ("topic", topic),
                ("selected_categories", categories),
                ("chunk_summaries", &merged),
            ],
        );

        let content = self
            .client
            .generate_completion(&system, &prompt, Some(&format!("{}_final", request_id)))
            .await?;

        Ok(Candidate {
            content,
            repair_data: merged,
            chunk_count: chunks.len(),
        })
    }

    async fn summarize_chunk(
        &self,
        topic: &str,
        categories: &str,
        chunk: &Chunk,
        request_id: &str,
    ) -> Result<String, ReportError> {
        let data = serialize_rows(&chunk.rows);
        let chunk_id = format!("{}_chunk_{}", request_id, chunk.index);
        self.summarize(topic, categories, &data, &chunk_id).await
    }

    async fn summarize(
        &self,
        topic: &str,
        categories: &str,
        data: &str,
        request_id: &str,
    ) -> Result<String, ReportError> {
        let template = self.prompts.load(FEATURE_SUMMARY)?;
        let system = self.prompts.load(ANALYST_SYSTEM)?;
        let prompt = substitute(
            &template,
            &[
                ("topic", topic),
                ("selected_categories", categories),
                ("data", data),
            ],
        );

        Ok(self
            .client
            .generate_completion(&system, &prompt, Some(request_id))
            .await?)
    }

    /// Ask the model to reformat `original`. Never fails: on any error the
    /// original comes back with the caveat appended.
    async fn repair(&self, original: String, data: &str, request_id: &str) -> String {
        match self.try_repair(&original, data, request_id).await {
            Ok(repaired) => {
                info!(request_id = %request_id, "Response repaired");
                repaired
            }
            Err(e) => {
                error!(
                    request_id = %request_id,
                    error = %e,
                    "Repair failed, returning original response"
                );
                original + REPAIR_CAVEAT
            }
        }
    }

    async fn try_repair(
        &self,
        original: &str,
        data: &str,
        request_id: &str,
    ) -> Result<String, ReportError> {
        let template = self.prompts.load(REPAIR)?;
        let system = self.prompts.load(REPAIR_SYSTEM)?;
        let prompt = substitute(&template, &[("original_response", original), ("data", data)]);

        Ok(self
            .client
            .generate_completion(&system, &prompt, Some(&format!("{}_repair", request_id)))
            .await?)
    }
}
