//! Core orchestration types
//!
//! Entities shared across the decomposer, router, executor, and merger.
//! Everything here is created fresh per run and never mutated after
//! creation; the only cross-run state is the `Session`, which lives in the
//! session module.

use crate::adapters::WorkerPayload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two fixed worker specializations.
///
/// Deliberately a closed variant: the decomposer must emit one of these two
/// tags per subtask and routing is a total mapping over them, never an
/// open-ended dispatch table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CapabilityClass {
    /// Checklists, workflows, structured templates
    #[serde(rename = "structured-operations")]
    StructuredOps,

    /// Emails, summaries, announcements
    #[serde(rename = "natural-language")]
    NaturalLanguage,
}

impl CapabilityClass {
    pub fn as_str(&self) -> &str {
        match self {
            CapabilityClass::StructuredOps => "structured-operations",
            CapabilityClass::NaturalLanguage => "natural-language",
        }
    }

    /// Parse a capability tag as emitted by the decomposition contract
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "structured-operations" | "structured_operations" => {
                Some(CapabilityClass::StructuredOps)
            }
            "natural-language" | "natural_language" => Some(CapabilityClass::NaturalLanguage),
            _ => None,
        }
    }
}

impl std::fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One free-form user instruction, the input to a single orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    /// Raw instruction text
    pub text: String,

    /// Session this instruction belongs to
    pub session_id: String,

    /// Arrival timestamp
    pub received_at: DateTime<Utc>,
}

impl Instruction {
    pub fn new(text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: session_id.into(),
            received_at: Utc::now(),
        }
    }
}

/// One unit of work produced by decomposition
///
/// Ids are sequence positions assigned by the decomposer (1-based); they
/// are unique within a run and define the deliverable's assembly order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subtask {
    pub id: u32,
    pub capability: CapabilityClass,
    pub description: String,
    #[serde(default)]
    pub depends_on: Vec<u32>,
}

/// One routed subtask: its assigned capability plus the execution wave
/// derived from the dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedDispatch {
    pub subtask_id: u32,
    pub capability: CapabilityClass,
    pub wave: u32,
}

/// The routing output: every subtask assigned to an adapter and a wave.
///
/// Entries are ordered by (wave, subtask id) so identical input always
/// produces an identical plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DispatchPlan {
    pub entries: Vec<PlannedDispatch>,
}

impl DispatchPlan {
    /// Number of waves in the plan (0 for an empty plan)
    pub fn wave_count(&self) -> u32 {
        self.entries.iter().map(|e| e.wave + 1).max().unwrap_or(0)
    }

    /// Entries belonging to the given wave, in sequence-id order
    pub fn wave(&self, wave: u32) -> impl Iterator<Item = &PlannedDispatch> {
        self.entries.iter().filter(move |e| e.wave == wave)
    }
}

/// Terminal outcome of one dispatched subtask
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
}

impl Outcome {
    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
        }
    }
}

/// Result of executing one subtask, recorded by the executor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerResult {
    pub subtask_id: u32,
    pub outcome: Outcome,

    /// Present only on success
    pub payload: Option<WorkerPayload>,

    /// Error detail retained for the merger's note and the event stream
    pub error: Option<String>,

    pub latency_ms: u64,
}

impl WorkerResult {
    pub fn success(subtask_id: u32, payload: WorkerPayload, latency_ms: u64) -> Self {
        Self {
            subtask_id,
            outcome: Outcome::Success,
            payload: Some(payload),
            error: None,
            latency_ms,
        }
    }

    pub fn failure(subtask_id: u32, error: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            subtask_id,
            outcome: Outcome::Failure,
            payload: None,
            error: Some(error.into()),
            latency_ms,
        }
    }

    pub fn timeout(subtask_id: u32, latency_ms: u64) -> Self {
        Self {
            subtask_id,
            outcome: Outcome::Timeout,
            payload: None,
            error: Some("deadline exceeded after one retry".to_string()),
            latency_ms,
        }
    }
}

/// Completion status of a merged deliverable
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliverableStatus {
    Complete,
    Partial,
    Failed,
}

impl DeliverableStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DeliverableStatus::Complete => "complete",
            DeliverableStatus::Partial => "partial",
            DeliverableStatus::Failed => "failed",
        }
    }
}

/// One successful payload inside a deliverable, tagged with its origin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliverableEntry {
    pub subtask_id: u32,
    pub capability: CapabilityClass,
    pub payload: WorkerPayload,
}

/// The final merged result returned to the caller for one instruction.
///
/// `payloads` preserves subtask sequence order regardless of completion
/// order. `note` is present whenever status is not `Complete` and names the
/// subtask ids that did not complete, so a caller can retry only the
/// missing pieces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deliverable {
    pub status: DeliverableStatus,
    pub payloads: Vec<DeliverableEntry>,
    pub note: Option<String>,
}

impl Deliverable {
    /// Group payload references by capability class, classes in fixed
    /// order, entries within a class in sequence order. Presentation
    /// convenience; the canonical order remains `payloads`.
    pub fn payloads_by_class(&self) -> Vec<(CapabilityClass, Vec<&DeliverableEntry>)> {
        [CapabilityClass::StructuredOps, CapabilityClass::NaturalLanguage]
            .into_iter()
            .map(|class| {
                let entries: Vec<&DeliverableEntry> = self
                    .payloads
                    .iter()
                    .filter(|e| e.capability == class)
                    .collect();
                (class, entries)
            })
            .filter(|(_, entries)| !entries.is_empty())
            .collect()
    }
}
