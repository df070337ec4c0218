//! Intent Decomposer
//!
//! Turns one instruction plus session context into an ordered sequence of
//! typed subtasks by asking the generative collaborator for a JSON plan.
//! The collaborator's output is untrusted: every structural rule (non-empty
//! descriptions, known capability tags, resolvable dependencies) is
//! validated here, and a violation fails the run with a
//! `DecompositionError` before anything is dispatched.

use crate::generative::{extract_json_array, GenerativeClient, GenerativeError, GenerativeRequest};
use crate::orchestrator::types::{CapabilityClass, Instruction, Subtask};
use crate::session::Session;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const DECOMPOSER_INSTRUCTIONS: &str = "You are the intent decomposer for a task \
orchestration engine. Break the user's instruction into discrete subtasks.\n\
Output ONLY a JSON array of subtask objects. Each object must have:\n\
- \"capability\": either \"structured-operations\" (checklists, workflows, \
structured templates) or \"natural-language\" (emails, summaries, announcements)\n\
- \"description\": what the worker should produce\n\
- \"depends_on\": array of subtask positions (1-based) that must complete first; \
use [] unless the instruction requires an ordering\n\
A subtask serves exactly one capability; an instruction needing both forms must \
be split into separate subtasks. Subtasks are numbered by their position in the \
array, starting at 1.\n\
Example output:\n\
[{\"capability\":\"structured-operations\",\"description\":\"3-item onboarding \
checklist\",\"depends_on\":[]},\
{\"capability\":\"natural-language\",\"description\":\"welcome email referencing \
the checklist\",\"depends_on\":[1]}]\n\
Output ONLY the JSON array, no markdown, no explanation.";

/// Errors that fail decomposition (and therefore the whole run)
#[derive(Debug, thiserror::Error)]
pub enum DecompositionError {
    #[error(transparent)]
    Generative(#[from] GenerativeError),

    #[error("Instruction yielded no actionable subtasks")]
    Empty,

    #[error("Failed to parse decomposition output: {0}")]
    Parse(String),

    #[error("Subtask {0} has an empty description")]
    EmptyDescription(u32),

    #[error("Subtask {id} has unrecognized capability tag '{tag}'")]
    UnknownCapability { id: u32, tag: String },

    #[error("Subtask {0} depends on itself")]
    SelfDependency(u32),

    #[error("Subtask {id} depends on unknown subtask {reference}")]
    DanglingDependency { id: u32, reference: u32 },
}

/// Intermediate deserialization type for collaborator JSON output
#[derive(Debug, Deserialize)]
struct RawSubtask {
    capability: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    depends_on: Vec<u32>,
}

pub struct IntentDecomposer {
    client: Arc<dyn GenerativeClient>,
}

impl IntentDecomposer {
    pub fn new(client: Arc<dyn GenerativeClient>) -> Self {
        Self { client }
    }

    /// Decompose one instruction into an ordered, validated subtask batch.
    ///
    /// Invokes the collaborator exactly once; session context (tone, recent
    /// activity) is folded into the prompt so repeated instructions within
    /// a session decompose consistently.
    pub async fn decompose(
        &self,
        instruction: &Instruction,
        session: &Session,
    ) -> Result<Vec<Subtask>, DecompositionError> {
        let prompt = build_prompt(instruction, session);
        let request = GenerativeRequest::with_system(DECOMPOSER_INSTRUCTIONS, prompt);

        let content = self.client.generate(&request).await?;
        debug!("Decomposer raw output: {} bytes", content.len());

        parse_subtasks(&content)
    }
}

fn build_prompt(instruction: &Instruction, session: &Session) -> String {
    let mut prompt = format!("INSTRUCTION: {}", instruction.text);

    if let Some(tone) = session.tone {
        prompt.push_str(&format!("\nSESSION TONE PREFERENCE: {}", tone));
    }

    if !session.history.is_empty() {
        prompt.push_str("\nRECENT SESSION ACTIVITY:");
        for summary in session.history.iter().rev().take(3) {
            prompt.push_str(&format!(
                "\n- \"{}\" ({})",
                summary.instruction,
                summary.status.as_str()
            ));
        }
    }

    prompt
}

/// Parse and validate collaborator output into a subtask batch.
///
/// Ids are assigned from array position (1-based); `depends_on` references
/// those positions.
fn parse_subtasks(content: &str) -> Result<Vec<Subtask>, DecompositionError> {
    let json = extract_json_array(content)
        .ok_or_else(|| DecompositionError::Parse("no JSON array found".to_string()))?;

    let raw: Vec<RawSubtask> =
        serde_json::from_str(json).map_err(|e| DecompositionError::Parse(e.to_string()))?;

    if raw.is_empty() {
        return Err(DecompositionError::Empty);
    }

    let count = raw.len() as u32;
    let mut subtasks = Vec::with_capacity(raw.len());

    for (index, raw_subtask) in raw.into_iter().enumerate() {
        let id = index as u32 + 1;

        if raw_subtask.description.trim().is_empty() {
            return Err(DecompositionError::EmptyDescription(id));
        }

        let capability = CapabilityClass::parse(&raw_subtask.capability).ok_or_else(|| {
            DecompositionError::UnknownCapability {
                id,
                tag: raw_subtask.capability.clone(),
            }
        })?;

        let mut depends_on = raw_subtask.depends_on;
        depends_on.sort_unstable();
        depends_on.dedup();

        for &reference in &depends_on {
            if reference == id {
                return Err(DecompositionError::SelfDependency(id));
            }
            if reference == 0 || reference > count {
                return Err(DecompositionError::DanglingDependency { id, reference });
            }
        }

        subtasks.push(Subtask {
            id,
            capability,
            description: raw_subtask.description.trim().to_string(),
            depends_on,
        });
    }

    Ok(subtasks)
}
