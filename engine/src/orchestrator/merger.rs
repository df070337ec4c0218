//! Result Merger
//!
//! Combines worker results into one deliverable. Payloads are ordered by
//! original subtask sequence id regardless of completion order, and the
//! merge is a pure function of its inputs: re-merging the same
//! `(subtasks, results)` pair yields an identical deliverable, which lets
//! the observability replay path call it repeatedly on partial result sets.

use crate::orchestrator::types::{
    Deliverable, DeliverableEntry, DeliverableStatus, Outcome, Subtask, WorkerResult,
};
use std::collections::HashMap;

/// Merge results into a deliverable.
///
/// Status: `Complete` when every subtask succeeded, `Partial` when at least
/// one succeeded and at least one did not, `Failed` when none succeeded.
/// For anything but `Complete`, the note enumerates the subtask ids that
/// did not complete and why, so a caller can retry just the missing pieces.
pub fn merge(subtasks: &[Subtask], results: &[WorkerResult]) -> Deliverable {
    let by_id: HashMap<u32, &WorkerResult> =
        results.iter().map(|r| (r.subtask_id, r)).collect();

    let mut payloads = Vec::new();
    let mut incomplete: Vec<String> = Vec::new();

    for subtask in subtasks {
        match by_id.get(&subtask.id) {
            Some(result) if result.outcome == Outcome::Success => {
                if let Some(payload) = &result.payload {
                    payloads.push(DeliverableEntry {
                        subtask_id: subtask.id,
                        capability: subtask.capability,
                        payload: payload.clone(),
                    });
                } else {
                    // A success without a payload is an executor bug; treat
                    // it as incomplete rather than fabricating content.
                    incomplete.push(format!("subtask {} (missing payload)", subtask.id));
                }
            }
            Some(result) => {
                let reason = result
                    .error
                    .as_deref()
                    .unwrap_or_else(|| result.outcome.as_str());
                incomplete.push(format!(
                    "subtask {} ({}: {})",
                    subtask.id,
                    result.outcome.as_str(),
                    reason
                ));
            }
            None => {
                incomplete.push(format!("subtask {} (not dispatched)", subtask.id));
            }
        }
    }

    let status = if incomplete.is_empty() {
        DeliverableStatus::Complete
    } else if payloads.is_empty() {
        DeliverableStatus::Failed
    } else {
        DeliverableStatus::Partial
    };

    let note = if incomplete.is_empty() {
        None
    } else {
        Some(format!("Did not complete: {}", incomplete.join("; ")))
    };

    Deliverable {
        status,
        payloads,
        note,
    }
}
