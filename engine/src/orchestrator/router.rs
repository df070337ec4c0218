//! Router
//!
//! Assigns every subtask to its capability adapter and computes execution
//! waves from the dependency graph. Routing is a pure, deterministic
//! function of the subtask list: identical input always produces an
//! identical plan, which is what makes a failed run replayable against the
//! event stream.

use crate::orchestrator::types::{DispatchPlan, PlannedDispatch, Subtask};
use std::collections::HashMap;

/// Errors that fail routing (and therefore the whole run)
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("Dependency cycle detected among subtasks {0:?}")]
    Cycle(Vec<u32>),
}

/// Compute the dispatch plan for a validated subtask batch.
///
/// Wave assignment is a topological pass: a subtask with no dependencies
/// lands in wave 0; otherwise its wave is one more than the maximum wave of
/// its dependencies. Any subtask left unresolved when no pass makes
/// progress is part of a cycle. Entries are ordered by (wave, sequence id),
/// so same-wave subtasks keep their original order.
pub fn route(subtasks: &[Subtask]) -> Result<DispatchPlan, RoutingError> {
    let mut waves: HashMap<u32, u32> = HashMap::with_capacity(subtasks.len());

    while waves.len() < subtasks.len() {
        let mut progressed = false;

        for subtask in subtasks {
            if waves.contains_key(&subtask.id) {
                continue;
            }

            let resolved: Option<u32> = subtask
                .depends_on
                .iter()
                .map(|dep| waves.get(dep).copied())
                .try_fold(0u32, |max_wave, dep_wave| {
                    dep_wave.map(|w| max_wave.max(w + 1))
                });

            if let Some(wave) = resolved {
                waves.insert(subtask.id, wave);
                progressed = true;
            }
        }

        if !progressed {
            let mut unresolved: Vec<u32> = subtasks
                .iter()
                .map(|s| s.id)
                .filter(|id| !waves.contains_key(id))
                .collect();
            unresolved.sort_unstable();
            return Err(RoutingError::Cycle(unresolved));
        }
    }

    let mut entries: Vec<PlannedDispatch> = subtasks
        .iter()
        .map(|subtask| PlannedDispatch {
            subtask_id: subtask.id,
            capability: subtask.capability,
            wave: waves[&subtask.id],
        })
        .collect();
    entries.sort_by_key(|e| (e.wave, e.subtask_id));

    Ok(DispatchPlan { entries })
}
