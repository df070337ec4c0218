//! Natural-language adapter
//!
//! Wraps the generative collaborator for human-facing content: emails,
//! summaries, announcements. The session's tone preference shapes the
//! instruction framing. A `Subject:`-header salvage pass recovers an email
//! from prose replies that ignored the JSON contract.

use super::{AdapterError, CapabilityAdapter, CommunicationPayload, Email, WorkerPayload};
use crate::generative::{extract_json_object, GenerativeClient, GenerativeRequest};
use crate::orchestrator::types::CapabilityClass;
use crate::session::ToneProfile;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const LANGUAGE_INSTRUCTIONS: &str = "You are the natural-language worker. \
Create clear, polished human-facing content.\n\
Output ONLY a JSON object with zero or more of these keys:\n\
- \"emails\": array of {\"recipient\": string, \"subject\": string, \"body\": string}\n\
- \"summaries\": array of {\"content\": string, \"audience\": string, \"key_takeaways\": [string]}\n\
- \"announcements\": array of {\"topic\": string, \"content\": string, \"action_items\": [string]}\n\
Produce at least one entry. Output ONLY the JSON object, no markdown, no explanation.";

pub struct NaturalLanguageAdapter {
    client: Arc<dyn GenerativeClient>,
}

impl NaturalLanguageAdapter {
    pub fn new(client: Arc<dyn GenerativeClient>) -> Self {
        Self { client }
    }

    fn parse_response(&self, content: &str) -> super::Result<CommunicationPayload> {
        if let Some(json) = extract_json_object(content) {
            match serde_json::from_str::<CommunicationPayload>(json) {
                Ok(payload) => return Ok(payload),
                Err(e) => debug!("Communication payload JSON rejected: {}", e),
            }
        }

        match salvage_email(content) {
            Some(email) => Ok(CommunicationPayload {
                emails: vec![email],
                ..Default::default()
            }),
            None => Err(AdapterError::Malformed(
                "no communication output found in worker response".to_string(),
            )),
        }
    }
}

#[async_trait]
impl CapabilityAdapter for NaturalLanguageAdapter {
    fn capability(&self) -> CapabilityClass {
        CapabilityClass::NaturalLanguage
    }

    async fn invoke(
        &self,
        description: &str,
        prior_context: Option<&str>,
        tone: Option<ToneProfile>,
    ) -> super::Result<WorkerPayload> {
        let tone = tone.unwrap_or_default();
        let mut system = String::from(LANGUAGE_INSTRUCTIONS);
        system.push_str(&format!(
            "\nTONE: {}\nSTYLE: {}",
            tone.as_str(),
            tone.style_guide()
        ));

        let mut prompt = format!("TASK: {}", description);
        if let Some(context) = prior_context {
            prompt.push_str("\n\nRESULTS FROM EARLIER SUBTASKS:\n");
            prompt.push_str(context);
        }

        let request = GenerativeRequest::with_system(system, prompt);
        let content = self.client.generate(&request).await?;

        let payload = self.parse_response(&content)?;
        if payload.is_empty() {
            return Err(AdapterError::Empty);
        }

        Ok(WorkerPayload::NaturalLanguage(payload))
    }
}

/// Recover an email from a prose reply carrying a `Subject:` header.
///
/// The body is everything after the subject line. Returns `None` when the
/// reply has no subject or no body text; an empty salvage is still a
/// failure.
fn salvage_email(text: &str) -> Option<Email> {
    let mut lines = text.lines();
    let mut subject = None;

    for line in lines.by_ref() {
        let trimmed = line.trim();
        if let Some(rest) = strip_prefix_ignore_case(trimmed, "subject:") {
            subject = Some(rest.trim().to_string());
            break;
        }
    }

    let subject = subject?;
    let body: String = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    if body.is_empty() {
        return None;
    }

    Some(Email {
        recipient: None,
        subject,
        body,
        tone: None,
    })
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generative::GenerativeError;
    use tokio::sync::Mutex;

    struct RecordingClient {
        response: String,
        last_request: Mutex<Option<GenerativeRequest>>,
    }

    impl RecordingClient {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl GenerativeClient for RecordingClient {
        fn name(&self) -> &str {
            "recording"
        }

        async fn generate(
            &self,
            request: &GenerativeRequest,
        ) -> std::result::Result<String, GenerativeError> {
            *self.last_request.lock().await = Some(request.clone());
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn test_invoke_parses_json_payload() {
        let client = Arc::new(RecordingClient::new(
            r#"{"emails": [{"subject": "Welcome aboard", "body": "We are excited to have you."}]}"#,
        ));
        let adapter = NaturalLanguageAdapter::new(Arc::clone(&client) as Arc<dyn GenerativeClient>);

        let payload = adapter.invoke("welcome email", None, None).await.unwrap();
        match payload {
            WorkerPayload::NaturalLanguage(p) => {
                assert_eq!(p.emails[0].subject, "Welcome aboard");
            }
            _ => panic!("wrong payload kind"),
        }
    }

    #[tokio::test]
    async fn test_tone_shapes_instructions() {
        let client = Arc::new(RecordingClient::new(
            r#"{"summaries": [{"content": "Numbers are up."}]}"#,
        ));
        let adapter = NaturalLanguageAdapter::new(Arc::clone(&client) as Arc<dyn GenerativeClient>);

        adapter
            .invoke("quarterly summary", None, Some(ToneProfile::Executive))
            .await
            .unwrap();

        let request = client.last_request.lock().await.clone().unwrap();
        let system = request.system.unwrap();
        assert!(system.contains("TONE: executive"));
        assert!(system.contains("decision-focused"));
    }

    #[tokio::test]
    async fn test_prior_context_included_in_prompt() {
        let client = Arc::new(RecordingClient::new(
            r#"{"summaries": [{"content": "Summary of the checklist."}]}"#,
        ));
        let adapter = NaturalLanguageAdapter::new(Arc::clone(&client) as Arc<dyn GenerativeClient>);

        adapter
            .invoke("summarize the checklist", Some("subtask 1: {...}"), None)
            .await
            .unwrap();

        let request = client.last_request.lock().await.clone().unwrap();
        assert!(request.prompt.contains("RESULTS FROM EARLIER SUBTASKS"));
        assert!(request.prompt.contains("subtask 1"));
    }

    #[tokio::test]
    async fn test_invoke_salvages_subject_header() {
        let client = Arc::new(RecordingClient::new(
            "Subject: Team offsite\n\nDear team,\n\nWe meet on Friday.\n\nBest,\nOps",
        ));
        let adapter = NaturalLanguageAdapter::new(client as Arc<dyn GenerativeClient>);

        let payload = adapter.invoke("offsite email", None, None).await.unwrap();
        match payload {
            WorkerPayload::NaturalLanguage(p) => {
                assert_eq!(p.emails[0].subject, "Team offsite");
                assert!(p.emails[0].body.contains("We meet on Friday."));
            }
            _ => panic!("wrong payload kind"),
        }
    }

    #[tokio::test]
    async fn test_invoke_rejects_unusable_prose() {
        let client = Arc::new(RecordingClient::new("No structured reply here."));
        let adapter = NaturalLanguageAdapter::new(client as Arc<dyn GenerativeClient>);
        let err = adapter.invoke("email", None, None).await.unwrap_err();
        assert!(matches!(err, AdapterError::Malformed(_)));
    }

    #[test]
    fn test_salvage_email_requires_body() {
        assert!(salvage_email("Subject: Empty mail").is_none());
        assert!(salvage_email("no subject line at all").is_none());
    }
}
