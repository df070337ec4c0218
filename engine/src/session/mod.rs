//! Session state management
//!
//! A `Session` carries the per-conversation context that survives across
//! orchestration runs: tone preference, a bounded list of prior deliverable
//! summaries, and a turn counter. The `SessionStore` owns all session
//! mutation and enforces the per-session exclusive section: two runs for
//! the same session id cannot interleave their save operations, while runs
//! for different session ids never contend.
//!
//! Persistence is a narrow get/put boundary (`SessionBackend`) with sqlite
//! and in-memory implementations.

use crate::orchestrator::types::{Deliverable, DeliverableStatus};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod sqlite;

pub use sqlite::{SessionDatabase, SqliteSessionBackend};

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionCorruptionError>;

/// Raised only when the persistence mechanism itself is unreadable or
/// unwritable. A missing session is not an error; it becomes a fresh one.
#[derive(Debug, thiserror::Error)]
pub enum SessionCorruptionError {
    #[error("Session store unreadable: {0}")]
    Unreadable(String),

    #[error("Session store unwritable: {0}")]
    Unwritable(String),

    #[error("Session record corrupted: {0}")]
    Corrupted(String),
}

/// Tone preference applied to natural-language output
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToneProfile {
    #[default]
    Professional,
    Friendly,
    Executive,
    Technical,
}

impl ToneProfile {
    pub fn as_str(&self) -> &str {
        match self {
            ToneProfile::Professional => "professional",
            ToneProfile::Friendly => "friendly",
            ToneProfile::Executive => "executive",
            ToneProfile::Technical => "technical",
        }
    }

    /// One-line style guidance handed to the natural-language worker
    pub fn style_guide(&self) -> &str {
        match self {
            ToneProfile::Professional => "Clear, concise, business-appropriate language",
            ToneProfile::Friendly => "Warm, approachable, collaborative tone",
            ToneProfile::Executive => "High-level, strategic, decision-focused",
            ToneProfile::Technical => "Precise, detailed, domain-specific",
        }
    }

    /// Infer a tone from instruction text when the session has no explicit
    /// preference.
    pub fn infer(text: &str) -> Self {
        let lower = text.to_lowercase();

        if ["executive", "leadership", "ceo", "board"]
            .iter()
            .any(|w| lower.contains(w))
        {
            ToneProfile::Executive
        } else if ["team", "colleagues", "internal"]
            .iter()
            .any(|w| lower.contains(w))
        {
            ToneProfile::Friendly
        } else if ["technical", "engineering", "development", "engineers"]
            .iter()
            .any(|w| lower.contains(w))
        {
            ToneProfile::Technical
        } else {
            ToneProfile::Professional
        }
    }
}

impl std::str::FromStr for ToneProfile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "professional" => Ok(ToneProfile::Professional),
            "friendly" => Ok(ToneProfile::Friendly),
            "executive" => Ok(ToneProfile::Executive),
            "technical" => Ok(ToneProfile::Technical),
            other => Err(format!(
                "unknown tone '{}' (expected professional, friendly, executive, technical)",
                other
            )),
        }
    }
}

impl std::fmt::Display for ToneProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compact record of one past deliverable, retained in session history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliverableSummary {
    pub instruction: String,
    pub status: DeliverableStatus,
    pub payload_count: usize,
    pub completed_at: i64,
}

impl DeliverableSummary {
    pub fn of(instruction: &str, deliverable: &Deliverable) -> Self {
        Self {
            instruction: instruction.to_string(),
            status: deliverable.status,
            payload_count: deliverable.payloads.len(),
            completed_at: Utc::now().timestamp(),
        }
    }
}

/// Per-session context spanning multiple instructions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,

    /// Explicit tone preference; `None` until the user sets one
    pub tone: Option<ToneProfile>,

    /// Most-recent-N deliverable summaries, oldest first
    pub history: Vec<DeliverableSummary>,

    pub turn_count: u64,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tone: None,
            history: Vec::new(),
            turn_count: 0,
        }
    }

    /// The tone to use for a run: explicit preference wins, otherwise
    /// inferred from the instruction text.
    pub fn resolve_tone(&self, instruction_text: &str) -> ToneProfile {
        self.tone.unwrap_or_else(|| ToneProfile::infer(instruction_text))
    }

    /// Append a summary, discarding the oldest entries beyond `limit`
    pub fn push_summary(&mut self, summary: DeliverableSummary, limit: usize) {
        self.history.push(summary);
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }
}

/// Narrow persistence boundary keyed by session id
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Fetch a session if one exists
    async fn fetch(&self, session_id: &str) -> Result<Option<Session>>;

    /// Store a session, replacing any prior record
    async fn store(&self, session: &Session) -> Result<()>;
}

/// In-memory backend for tests and ephemeral use
#[derive(Default)]
pub struct InMemoryBackend {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBackend for InMemoryBackend {
    async fn fetch(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.lock().await.get(session_id).cloned())
    }

    async fn store(&self, session: &Session) -> Result<()> {
        self.sessions
            .lock()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }
}

/// Exclusive owner of session mutation.
///
/// Every write goes through a per-session async mutex so that concurrent
/// runs for the same session serialize their read-modify-write, and session
/// state is only ever mutated as one atomic save at the end of a run.
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    history_limit: usize,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>, history_limit: usize) -> Self {
        Self {
            backend,
            locks: Mutex::new(HashMap::new()),
            history_limit,
        }
    }

    async fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Load a session, creating an empty one with defaults if absent.
    ///
    /// Only fails when the backend itself is unreadable.
    pub async fn load(&self, session_id: &str) -> Result<Session> {
        Ok(self
            .backend
            .fetch(session_id)
            .await?
            .unwrap_or_else(|| Session::new(session_id)))
    }

    /// Record a completed run: append the deliverable summary and increment
    /// the turn counter, atomically with respect to other runs on the same
    /// session id.
    pub async fn save(
        &self,
        session_id: &str,
        instruction_text: &str,
        deliverable: &Deliverable,
    ) -> Result<()> {
        let lock = self.lock_for(session_id).await;
        let _guard = lock.lock().await;

        let mut session = self
            .backend
            .fetch(session_id)
            .await?
            .unwrap_or_else(|| Session::new(session_id));

        session.push_summary(
            DeliverableSummary::of(instruction_text, deliverable),
            self.history_limit,
        );
        session.turn_count += 1;

        self.backend.store(&session).await
    }

    /// Set the explicit tone preference for a session
    pub async fn set_tone(&self, session_id: &str, tone: ToneProfile) -> Result<()> {
        let lock = self.lock_for(session_id).await;
        let _guard = lock.lock().await;

        let mut session = self
            .backend
            .fetch(session_id)
            .await?
            .unwrap_or_else(|| Session::new(session_id));

        session.tone = Some(tone);
        self.backend.store(&session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::types::Deliverable;

    fn empty_deliverable(status: DeliverableStatus) -> Deliverable {
        Deliverable {
            status,
            payloads: vec![],
            note: None,
        }
    }

    #[test]
    fn test_tone_inference() {
        assert_eq!(
            ToneProfile::infer("prepare an executive briefing"),
            ToneProfile::Executive
        );
        assert_eq!(
            ToneProfile::infer("email summary to the sales team"),
            ToneProfile::Friendly
        );
        assert_eq!(
            ToneProfile::infer("onboarding for new software engineers"),
            ToneProfile::Technical
        );
        assert_eq!(
            ToneProfile::infer("create a quarterly report"),
            ToneProfile::Professional
        );
    }

    #[test]
    fn test_explicit_tone_wins_over_inference() {
        let mut session = Session::new("s1");
        session.tone = Some(ToneProfile::Friendly);
        assert_eq!(
            session.resolve_tone("prepare an executive briefing"),
            ToneProfile::Friendly
        );
    }

    #[test]
    fn test_tone_parse() {
        assert_eq!(
            " Executive ".parse::<ToneProfile>().unwrap(),
            ToneProfile::Executive
        );
        assert!("shouty".parse::<ToneProfile>().is_err());
    }

    #[test]
    fn test_history_bound() {
        let mut session = Session::new("s1");
        for i in 0..10 {
            let deliverable = empty_deliverable(DeliverableStatus::Complete);
            session.push_summary(
                DeliverableSummary::of(&format!("instruction {}", i), &deliverable),
                3,
            );
        }
        assert_eq!(session.history.len(), 3);
        // Most recent retained
        assert_eq!(session.history[2].instruction, "instruction 9");
        assert_eq!(session.history[0].instruction, "instruction 7");
    }

    #[tokio::test]
    async fn test_load_creates_default_session() {
        let store = SessionStore::new(Arc::new(InMemoryBackend::new()), 20);
        let session = store.load("fresh").await.unwrap();
        assert_eq!(session.id, "fresh");
        assert_eq!(session.turn_count, 0);
        assert!(session.tone.is_none());
        assert!(session.history.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let store = SessionStore::new(Arc::new(InMemoryBackend::new()), 20);
        let deliverable = empty_deliverable(DeliverableStatus::Complete);

        store.save("s1", "make a checklist", &deliverable).await.unwrap();

        let session = store.load("s1").await.unwrap();
        assert_eq!(session.turn_count, 1);
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].instruction, "make a checklist");
        assert_eq!(session.history[0].status, DeliverableStatus::Complete);
    }

    #[tokio::test]
    async fn test_concurrent_saves_serialize() {
        let store = Arc::new(SessionStore::new(Arc::new(InMemoryBackend::new()), 20));
        let deliverable = empty_deliverable(DeliverableStatus::Complete);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let deliverable = deliverable.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save("shared", &format!("turn {}", i), &deliverable)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // No lost updates: every save landed
        let session = store.load("shared").await.unwrap();
        assert_eq!(session.turn_count, 8);
        assert_eq!(session.history.len(), 8);
    }

    #[tokio::test]
    async fn test_set_tone_persists() {
        let store = SessionStore::new(Arc::new(InMemoryBackend::new()), 20);
        store.set_tone("s1", ToneProfile::Technical).await.unwrap();

        let session = store.load("s1").await.unwrap();
        assert_eq!(session.tone, Some(ToneProfile::Technical));
    }
}
