//! Observability event stream
//!
//! The engine emits one structured event per decomposition, routing
//! decision, subtask completion, and merge, each carrying the run id for
//! correlation. Delivery is best-effort over bounded channels: a slow or
//! absent subscriber never blocks the orchestration critical path.

use crate::orchestrator::types::{CapabilityClass, DeliverableStatus, Outcome};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Channel buffer size for bounded subscriber channels
const CHANNEL_BUFFER_SIZE: usize = 100;

/// Event types that can be published on the bus
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum EventKind {
    /// An orchestration run has started
    RunStarted,
    /// An instruction was decomposed into subtasks
    Decomposed,
    /// A subtask was assigned an adapter and a wave
    SubtaskRouted,
    /// A dispatched subtask settled (success, failure, or timeout)
    SubtaskSettled,
    /// Results were merged into a deliverable
    Merged,
    /// Session state was persisted
    SessionSaved,
    /// A run was cancelled before completion
    RunCancelled,
    /// Subscribe to all event kinds
    All,
}

/// Events emitted by the orchestration engine
#[derive(Debug, Clone)]
pub enum Event {
    RunStarted {
        run_id: String,
        session_id: String,
        instruction: String,
    },
    Decomposed {
        run_id: String,
        subtask_count: usize,
    },
    SubtaskRouted {
        run_id: String,
        subtask_id: u32,
        capability: CapabilityClass,
        wave: u32,
    },
    SubtaskSettled {
        run_id: String,
        subtask_id: u32,
        outcome: Outcome,
        latency_ms: u64,
        error: Option<String>,
    },
    Merged {
        run_id: String,
        status: DeliverableStatus,
        payload_count: usize,
    },
    SessionSaved {
        run_id: String,
        session_id: String,
        turn_count_delta: u64,
    },
    RunCancelled {
        run_id: String,
    },
}

impl Event {
    /// Get the event kind for this event
    pub fn kind(&self) -> EventKind {
        match self {
            Event::RunStarted { .. } => EventKind::RunStarted,
            Event::Decomposed { .. } => EventKind::Decomposed,
            Event::SubtaskRouted { .. } => EventKind::SubtaskRouted,
            Event::SubtaskSettled { .. } => EventKind::SubtaskSettled,
            Event::Merged { .. } => EventKind::Merged,
            Event::SessionSaved { .. } => EventKind::SessionSaved,
            Event::RunCancelled { .. } => EventKind::RunCancelled,
        }
    }
}

/// Append-only, best-effort event bus.
///
/// Subscribers get bounded channels; `publish` uses `try_send` so a full
/// or dropped channel silently loses the event instead of stalling a run.
pub struct EventBus {
    channels: Arc<Mutex<HashMap<EventKind, Vec<mpsc::Sender<Event>>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to a specific event kind, or `EventKind::All` for everything
    pub async fn subscribe(&self, kind: EventKind) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let mut channels = self.channels.lock().await;
        channels.entry(kind).or_default().push(tx);
        rx
    }

    /// Publish an event to all matching subscribers, best-effort
    pub async fn publish(&self, event: Event) {
        let channels = self.channels.lock().await;
        let kind = event.kind();

        if let Some(subscribers) = channels.get(&kind) {
            for tx in subscribers {
                let _ = tx.try_send(event.clone());
            }
        }

        if let Some(subscribers) = channels.get(&EventKind::All) {
            for tx in subscribers {
                let _ = tx.try_send(event.clone());
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
