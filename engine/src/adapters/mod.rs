//! Capability Adapters
//!
//! The two worker specializations sit behind a uniform interface so the
//! dispatch executor never knows which generative collaborator is on the
//! other side. An adapter receives a subtask description, the payloads of
//! the subtasks it depends on, and the session's tone preference, and
//! returns a typed `WorkerPayload` or an `AdapterError`.
//!
//! Payload shapes are capability-specific: structured-operations produces
//! checklists, workflows, and templates; natural-language produces emails,
//! summaries, and announcements.

use crate::generative::GenerativeError;
use crate::orchestrator::types::CapabilityClass;
use crate::session::ToneProfile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod language;
pub mod structured;

pub use language::NaturalLanguageAdapter;
pub use structured::StructuredOpsAdapter;

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Errors raised by a capability adapter for a single subtask.
///
/// These never abort a run; the executor records them as a `failure`
/// outcome and carries the detail into the deliverable note.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Generative(#[from] GenerativeError),

    #[error("Malformed worker response: {0}")]
    Malformed(String),

    #[error("Worker returned an empty payload")]
    Empty,
}

/// A named checklist with ordered items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checklist {
    pub title: String,
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

/// A named process with ordered steps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    pub name: String,
    pub steps: Vec<String>,
    /// Free-form step dependency notes, shape left to the worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<serde_json::Value>,
}

/// A reusable structured template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Output of the structured-operations capability
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StructuredPayload {
    #[serde(default)]
    pub checklists: Vec<Checklist>,
    #[serde(default)]
    pub workflows: Vec<Workflow>,
    #[serde(default)]
    pub templates: Vec<Template>,
}

impl StructuredPayload {
    pub fn is_empty(&self) -> bool {
        self.checklists.is_empty() && self.workflows.is_empty() && self.templates.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.checklists.len() + self.workflows.len() + self.templates.len()
    }
}

/// A drafted email
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Email {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(alias = "content")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
}

/// A prose summary with optional key takeaways
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    #[serde(alias = "body")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default)]
    pub key_takeaways: Vec<String>,
}

/// A team announcement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Announcement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(alias = "body", alias = "key_message")]
    pub content: String,
    #[serde(default)]
    pub action_items: Vec<String>,
}

/// Output of the natural-language capability
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CommunicationPayload {
    #[serde(default)]
    pub emails: Vec<Email>,
    #[serde(default)]
    pub summaries: Vec<Summary>,
    #[serde(default)]
    pub announcements: Vec<Announcement>,
}

impl CommunicationPayload {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.summaries.is_empty() && self.announcements.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.emails.len() + self.summaries.len() + self.announcements.len()
    }
}

/// Typed payload produced by a worker, tagged by capability
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerPayload {
    StructuredOps(StructuredPayload),
    NaturalLanguage(CommunicationPayload),
}

impl WorkerPayload {
    pub fn capability(&self) -> CapabilityClass {
        match self {
            WorkerPayload::StructuredOps(_) => CapabilityClass::StructuredOps,
            WorkerPayload::NaturalLanguage(_) => CapabilityClass::NaturalLanguage,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            WorkerPayload::StructuredOps(p) => p.is_empty(),
            WorkerPayload::NaturalLanguage(p) => p.is_empty(),
        }
    }

    pub fn item_count(&self) -> usize {
        match self {
            WorkerPayload::StructuredOps(p) => p.item_count(),
            WorkerPayload::NaturalLanguage(p) => p.item_count(),
        }
    }
}

/// Uniform interface the dispatch executor calls for every subtask.
///
/// Implementations wrap the external generative collaborator; they must be
/// safe to call concurrently within a wave.
#[async_trait]
pub trait CapabilityAdapter: Send + Sync {
    /// The capability class this adapter serves
    fn capability(&self) -> CapabilityClass;

    /// Run one subtask.
    ///
    /// `prior_context` carries the serialized payloads of the subtasks this
    /// one explicitly depends on (empty for wave-0 subtasks). `tone` is the
    /// session's resolved tone preference.
    async fn invoke(
        &self,
        description: &str,
        prior_context: Option<&str>,
        tone: Option<ToneProfile>,
    ) -> Result<WorkerPayload>;
}
