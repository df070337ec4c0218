//! Orchestration core
//!
//! One `run` takes an instruction through the full pipeline: load session
//! context, decompose into typed subtasks, route into waves, dispatch the
//! waves concurrently, merge the results, and persist the session, with a
//! structured event emitted at every step.
//!
//! Per-subtask faults are absorbed into the deliverable's status; only
//! decomposition, routing, and session-load faults terminate a run early.
//! A failed session save still returns the computed deliverable, flagged
//! unsaved.

pub mod decomposer;
pub mod executor;
pub mod merger;
pub mod router;
pub mod types;

pub use decomposer::{DecompositionError, IntentDecomposer};
pub use executor::DispatchExecutor;
pub use merger::merge;
pub use router::{route, RoutingError};
pub use types::{
    CapabilityClass, Deliverable, DeliverableStatus, DispatchPlan, Instruction, Outcome,
    Subtask, WorkerResult,
};

use crate::events::{Event, EventBus};
use crate::session::{SessionCorruptionError, SessionStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// External cancellation signal for a run.
///
/// Cancelling stops the executor from dispatching further waves and
/// suppresses the session save, leaving session state untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Faults that terminate a run before a deliverable exists
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Decomposition(#[from] DecompositionError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    SessionCorruption(#[from] SessionCorruptionError),
}

/// Outcome of one orchestration run
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub deliverable: Deliverable,

    /// Number of subtasks the instruction decomposed into
    pub subtask_count: usize,

    /// False when the run was cancelled or the session save failed
    pub saved: bool,

    /// Save failure detail, present only when a save was attempted and
    /// failed; the deliverable itself is still valid
    pub save_error: Option<String>,

    pub duration_ms: i64,
}

/// The orchestration engine: wires the decomposer, router, executor,
/// merger, and session store into one pipeline.
pub struct Orchestrator {
    decomposer: IntentDecomposer,
    executor: DispatchExecutor,
    sessions: Arc<SessionStore>,
    events: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(
        decomposer: IntentDecomposer,
        executor: DispatchExecutor,
        sessions: Arc<SessionStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            decomposer,
            executor,
            sessions,
            events,
        }
    }

    /// Process one instruction end to end.
    pub async fn run(
        &self,
        instruction: Instruction,
        cancel: &CancelSignal,
    ) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        info!("Run {} started for session {}", run_id, instruction.session_id);
        self.events
            .publish(Event::RunStarted {
                run_id: run_id.clone(),
                session_id: instruction.session_id.clone(),
                instruction: instruction.text.clone(),
            })
            .await;

        // Session context is loaded once and passed by value through the
        // run; the store is only touched again for the final save.
        let session = self.sessions.load(&instruction.session_id).await?;
        let tone = session.resolve_tone(&instruction.text);

        let subtasks = self.decomposer.decompose(&instruction, &session).await?;
        self.events
            .publish(Event::Decomposed {
                run_id: run_id.clone(),
                subtask_count: subtasks.len(),
            })
            .await;

        let plan = router::route(&subtasks)?;
        for entry in &plan.entries {
            self.events
                .publish(Event::SubtaskRouted {
                    run_id: run_id.clone(),
                    subtask_id: entry.subtask_id,
                    capability: entry.capability,
                    wave: entry.wave,
                })
                .await;
        }

        let results = self
            .executor
            .execute(&run_id, &plan, &subtasks, Some(tone), cancel)
            .await;

        let deliverable = merger::merge(&subtasks, &results);
        self.events
            .publish(Event::Merged {
                run_id: run_id.clone(),
                status: deliverable.status,
                payload_count: deliverable.payloads.len(),
            })
            .await;

        let (saved, save_error) = if cancel.is_cancelled() {
            warn!("Run {} cancelled; session state left unchanged", run_id);
            self.events
                .publish(Event::RunCancelled {
                    run_id: run_id.clone(),
                })
                .await;
            (false, None)
        } else {
            match self
                .sessions
                .save(&instruction.session_id, &instruction.text, &deliverable)
                .await
            {
                Ok(()) => {
                    self.events
                        .publish(Event::SessionSaved {
                            run_id: run_id.clone(),
                            session_id: instruction.session_id.clone(),
                            turn_count_delta: 1,
                        })
                        .await;
                    (true, None)
                }
                Err(e) => {
                    // The deliverable is still handed back; the caller is
                    // told it was not persisted.
                    error!("Run {} session save failed: {}", run_id, e);
                    (false, Some(e.to_string()))
                }
            }
        };

        let duration_ms = start.elapsed().as_millis() as i64;
        info!(
            "Run {} finished: status={} saved={} in {}ms",
            run_id,
            deliverable.status.as_str(),
            saved,
            duration_ms
        );

        Ok(RunReport {
            run_id,
            deliverable,
            subtask_count: subtasks.len(),
            saved,
            save_error,
            duration_ms,
        })
    }
}
