//! Dispatch Executor
//!
//! Runs a dispatch plan wave by wave. Every subtask in a wave is dispatched
//! to its adapter concurrently; the executor waits for the whole wave to
//! settle before starting the next one, because later waves may consume
//! earlier payloads as context. A subtask only ever sees the completed
//! payloads of the subtasks it explicitly depends on, never a sibling's
//! in-flight state.
//!
//! Per-subtask outcomes:
//! - adapter success → `Success` with the typed payload
//! - adapter error → `Failure` (never retried, never aborts siblings)
//! - deadline exceeded → one retry, then `Timeout`

use crate::adapters::CapabilityAdapter;
use crate::events::{Event, EventBus};
use crate::orchestrator::types::{
    CapabilityClass, DispatchPlan, Subtask, WorkerResult,
};
use crate::orchestrator::CancelSignal;
use crate::session::ToneProfile;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub struct DispatchExecutor {
    structured: Arc<dyn CapabilityAdapter>,
    language: Arc<dyn CapabilityAdapter>,
    subtask_timeout: Duration,
    events: Arc<EventBus>,
}

impl DispatchExecutor {
    pub fn new(
        structured: Arc<dyn CapabilityAdapter>,
        language: Arc<dyn CapabilityAdapter>,
        subtask_timeout: Duration,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            structured,
            language,
            subtask_timeout,
            events,
        }
    }

    /// Total mapping from capability tag to adapter instance
    fn adapter_for(&self, capability: CapabilityClass) -> &Arc<dyn CapabilityAdapter> {
        match capability {
            CapabilityClass::StructuredOps => &self.structured,
            CapabilityClass::NaturalLanguage => &self.language,
        }
    }

    /// Execute a plan against its subtask batch.
    ///
    /// Returns the results of every dispatched subtask in sequence-id
    /// order. Subtasks in waves after a cancellation are never dispatched
    /// and have no result.
    pub async fn execute(
        &self,
        run_id: &str,
        plan: &DispatchPlan,
        subtasks: &[Subtask],
        tone: Option<ToneProfile>,
        cancel: &CancelSignal,
    ) -> Vec<WorkerResult> {
        let by_id: HashMap<u32, &Subtask> = subtasks.iter().map(|s| (s.id, s)).collect();
        let mut completed: HashMap<u32, WorkerResult> = HashMap::with_capacity(subtasks.len());

        for wave in 0..plan.wave_count() {
            if cancel.is_cancelled() {
                warn!("Run {} cancelled before wave {}, stopping dispatch", run_id, wave);
                break;
            }

            let wave_subtasks: Vec<&Subtask> = plan
                .wave(wave)
                .filter_map(|entry| by_id.get(&entry.subtask_id).copied())
                .collect();

            debug!(
                "Run {} dispatching wave {} ({} subtasks)",
                run_id,
                wave,
                wave_subtasks.len()
            );

            // Contexts are snapshotted from strictly earlier waves before
            // any sibling starts; the wave itself shares nothing mutable.
            let dispatches = wave_subtasks.iter().map(|subtask| {
                let context = dependency_context(subtask, &completed);
                self.dispatch_one(run_id, subtask, context, tone)
            });

            for result in futures::future::join_all(dispatches).await {
                completed.insert(result.subtask_id, result);
            }
        }

        subtasks
            .iter()
            .filter_map(|s| completed.remove(&s.id))
            .collect()
    }

    /// Dispatch a single subtask with timeout enforcement and the
    /// single-retry policy for timeouts.
    async fn dispatch_one(
        &self,
        run_id: &str,
        subtask: &Subtask,
        context: Option<String>,
        tone: Option<ToneProfile>,
    ) -> WorkerResult {
        let adapter = self.adapter_for(subtask.capability);
        let start = Instant::now();

        let mut attempt = timeout(
            self.subtask_timeout,
            adapter.invoke(&subtask.description, context.as_deref(), tone),
        )
        .await;

        if attempt.is_err() {
            warn!(
                "Subtask {} exceeded {}s deadline, retrying once",
                subtask.id,
                self.subtask_timeout.as_secs()
            );
            attempt = timeout(
                self.subtask_timeout,
                adapter.invoke(&subtask.description, context.as_deref(), tone),
            )
            .await;
        }

        let latency_ms = start.elapsed().as_millis() as u64;
        let result = match attempt {
            Ok(Ok(payload)) => {
                info!(
                    "Subtask {} ({}) completed in {}ms",
                    subtask.id, subtask.capability, latency_ms
                );
                WorkerResult::success(subtask.id, payload, latency_ms)
            }
            Ok(Err(e)) => {
                warn!("Subtask {} failed: {}", subtask.id, e);
                WorkerResult::failure(subtask.id, e.to_string(), latency_ms)
            }
            Err(_) => {
                warn!("Subtask {} timed out after retry", subtask.id);
                WorkerResult::timeout(subtask.id, latency_ms)
            }
        };

        self.events
            .publish(Event::SubtaskSettled {
                run_id: run_id.to_string(),
                subtask_id: result.subtask_id,
                outcome: result.outcome,
                latency_ms: result.latency_ms,
                error: result.error.clone(),
            })
            .await;

        result
    }
}

/// Serialize the successful payloads of a subtask's explicit dependencies.
///
/// Only the declared dependencies are included, not every earlier success,
/// to keep context size bounded.
fn dependency_context(
    subtask: &Subtask,
    completed: &HashMap<u32, WorkerResult>,
) -> Option<String> {
    if subtask.depends_on.is_empty() {
        return None;
    }

    let mut sections = Vec::new();
    for dep in &subtask.depends_on {
        if let Some(result) = completed.get(dep) {
            if let Some(payload) = &result.payload {
                let body = serde_json::to_string(payload).unwrap_or_default();
                sections.push(format!(
                    "subtask {} ({}): {}",
                    dep,
                    payload.capability(),
                    body
                ));
            }
        }
    }

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n"))
    }
}
