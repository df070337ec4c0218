//! Structured-operations adapter
//!
//! Wraps the generative collaborator for checklist, workflow, and template
//! work. The collaborator is asked for a JSON object; when it answers in
//! prose anyway, a line-based salvage pass recovers bullet lists as
//! checklists before the subtask is declared failed.

use super::{AdapterError, CapabilityAdapter, Checklist, StructuredPayload, WorkerPayload};
use crate::generative::{extract_json_object, GenerativeClient, GenerativeRequest};
use crate::orchestrator::types::CapabilityClass;
use crate::session::ToneProfile;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const STRUCTURED_INSTRUCTIONS: &str = "You are the structured-operations worker. \
Handle structured, operational tasks: checklists, SOPs, workflows, data templates.\n\
Output ONLY a JSON object with zero or more of these keys:\n\
- \"checklists\": array of {\"title\": string, \"items\": [string], \"categories\": [string]}\n\
- \"workflows\": array of {\"name\": string, \"steps\": [string], \"dependencies\": object}\n\
- \"templates\": array of {\"name\": string, \"fields\": [string], \"format\": string}\n\
Produce at least one entry. Output ONLY the JSON object, no markdown, no explanation.";

pub struct StructuredOpsAdapter {
    client: Arc<dyn GenerativeClient>,
}

impl StructuredOpsAdapter {
    pub fn new(client: Arc<dyn GenerativeClient>) -> Self {
        Self { client }
    }

    /// Parse the collaborator's reply into a payload.
    ///
    /// JSON first; if no parseable object is found, fall back to extracting
    /// markdown bullet lists as checklists.
    fn parse_response(&self, content: &str) -> super::Result<StructuredPayload> {
        if let Some(json) = extract_json_object(content) {
            match serde_json::from_str::<StructuredPayload>(json) {
                Ok(payload) => return Ok(payload),
                Err(e) => debug!("Structured payload JSON rejected: {}", e),
            }
        }

        let checklists = salvage_checklists(content);
        if checklists.is_empty() {
            return Err(AdapterError::Malformed(
                "no structured output found in worker response".to_string(),
            ));
        }

        Ok(StructuredPayload {
            checklists,
            ..Default::default()
        })
    }
}

#[async_trait]
impl CapabilityAdapter for StructuredOpsAdapter {
    fn capability(&self) -> CapabilityClass {
        CapabilityClass::StructuredOps
    }

    async fn invoke(
        &self,
        description: &str,
        prior_context: Option<&str>,
        _tone: Option<ToneProfile>,
    ) -> super::Result<WorkerPayload> {
        let mut prompt = format!("TASK: {}", description);
        if let Some(context) = prior_context {
            prompt.push_str("\n\nRESULTS FROM EARLIER SUBTASKS:\n");
            prompt.push_str(context);
        }

        let request = GenerativeRequest::with_system(STRUCTURED_INSTRUCTIONS, prompt);
        let content = self.client.generate(&request).await?;

        let payload = self.parse_response(&content)?;
        if payload.is_empty() {
            return Err(AdapterError::Empty);
        }

        Ok(WorkerPayload::StructuredOps(payload))
    }
}

/// Recover checklists from a prose reply.
///
/// A short non-heading line opens a checklist; subsequent bullet lines
/// become its items. Checklists without items are discarded.
fn salvage_checklists(text: &str) -> Vec<Checklist> {
    const MAX_TITLE_LEN: usize = 100;

    let mut checklists = Vec::new();
    let mut current: Option<Checklist> = None;

    for line in text.lines() {
        let line = line.trim();
        if is_bullet(line) {
            if let Some(checklist) = current.as_mut() {
                checklist.items.push(strip_bullet(line).to_string());
            }
        } else if !line.is_empty() && !line.starts_with('#') && line.len() < MAX_TITLE_LEN {
            if let Some(checklist) = current.take() {
                if !checklist.items.is_empty() {
                    checklists.push(checklist);
                }
            }
            current = Some(Checklist {
                title: line.trim_end_matches(':').to_string(),
                items: Vec::new(),
                categories: Vec::new(),
            });
        }
    }

    if let Some(checklist) = current {
        if !checklist.items.is_empty() {
            checklists.push(checklist);
        }
    }

    checklists
}

fn is_bullet(line: &str) -> bool {
    line.starts_with("- [ ]")
        || line.starts_with("- [x]")
        || line.starts_with("- ")
        || line.starts_with("* ")
        || line.starts_with("• ")
}

fn strip_bullet(line: &str) -> &str {
    line.trim_start_matches("- [ ]")
        .trim_start_matches("- [x]")
        .trim_start_matches("- ")
        .trim_start_matches("* ")
        .trim_start_matches("• ")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generative::GenerativeError;

    struct FixedClient {
        response: String,
    }

    #[async_trait]
    impl GenerativeClient for FixedClient {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(
            &self,
            _request: &GenerativeRequest,
        ) -> std::result::Result<String, GenerativeError> {
            Ok(self.response.clone())
        }
    }

    fn adapter_with(response: &str) -> StructuredOpsAdapter {
        StructuredOpsAdapter::new(Arc::new(FixedClient {
            response: response.to_string(),
        }))
    }

    #[tokio::test]
    async fn test_invoke_parses_json_payload() {
        let adapter = adapter_with(
            r#"{"checklists": [{"title": "Day one", "items": ["Badge", "Laptop", "Accounts"]}]}"#,
        );

        let payload = adapter.invoke("onboarding checklist", None, None).await.unwrap();
        match payload {
            WorkerPayload::StructuredOps(p) => {
                assert_eq!(p.checklists.len(), 1);
                assert_eq!(p.checklists[0].items.len(), 3);
            }
            _ => panic!("wrong payload kind"),
        }
    }

    #[tokio::test]
    async fn test_invoke_parses_fenced_json() {
        let adapter = adapter_with(
            "Here you go:\n```json\n{\"workflows\": [{\"name\": \"Deploy\", \"steps\": [\"build\", \"ship\"]}]}\n```",
        );

        let payload = adapter.invoke("deployment workflow", None, None).await.unwrap();
        match payload {
            WorkerPayload::StructuredOps(p) => assert_eq!(p.workflows[0].steps.len(), 2),
            _ => panic!("wrong payload kind"),
        }
    }

    #[tokio::test]
    async fn test_invoke_salvages_bullet_lists() {
        let adapter = adapter_with(
            "Onboarding checklist\n- [ ] Collect badge\n- [ ] Set up laptop\n- [ ] Meet the team",
        );

        let payload = adapter.invoke("onboarding checklist", None, None).await.unwrap();
        match payload {
            WorkerPayload::StructuredOps(p) => {
                assert_eq!(p.checklists[0].title, "Onboarding checklist");
                assert_eq!(p.checklists[0].items[0], "Collect badge");
            }
            _ => panic!("wrong payload kind"),
        }
    }

    #[tokio::test]
    async fn test_invoke_rejects_prose_without_structure() {
        let adapter = adapter_with("I am unable to help with that request.");
        let err = adapter.invoke("checklist", None, None).await.unwrap_err();
        assert!(matches!(err, AdapterError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_invoke_rejects_empty_json_payload() {
        let adapter = adapter_with(r#"{"checklists": []}"#);
        let err = adapter.invoke("checklist", None, None).await.unwrap_err();
        assert!(matches!(err, AdapterError::Empty));
    }

    #[test]
    fn test_salvage_discards_titles_without_items() {
        let lists = salvage_checklists("Intro line\nAnother line\n- only item");
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].title, "Another line");
        assert_eq!(lists[0].items, vec!["only item"]);
    }
}
