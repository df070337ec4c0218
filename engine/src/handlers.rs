//! Command handlers
//!
//! Bridges the CLI commands to the engine: runs instructions, renders
//! deliverables for terminal or JSON output, and serves the history and
//! session views.

use crate::adapters::WorkerPayload;
use crate::orchestrator::types::Deliverable;
use crate::orchestrator::{CancelSignal, Instruction, Orchestrator};
use crate::session::sqlite::RunRepository;
use crate::session::{SessionStore, ToneProfile};
use anyhow::Result;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Process one instruction and print the deliverable.
///
/// The completed run is recorded in history; a failed session save is
/// reported but does not discard the deliverable.
pub async fn handle_run(
    orchestrator: &Orchestrator,
    runs: &RunRepository,
    instruction: Instruction,
    format: OutputFormat,
) -> Result<()> {
    let session_id = instruction.session_id.clone();
    let text = instruction.text.clone();

    let report = orchestrator.run(instruction, &CancelSignal::new()).await?;

    runs.record(
        &report.run_id,
        &session_id,
        &text,
        report.deliverable.status.as_str(),
        report.subtask_count,
        report.duration_ms,
    )
    .await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report.deliverable)?);
        }
        OutputFormat::Text => {
            print!("{}", render_deliverable(&report.deliverable));
            println!(
                "\n{} subtask(s) in {}ms (run {})",
                report.subtask_count, report.duration_ms, report.run_id
            );
        }
    }

    if !report.saved {
        if let Some(save_error) = &report.save_error {
            eprintln!("warning: deliverable was not saved to the session: {}", save_error);
        }
    }

    Ok(())
}

/// Render a deliverable as terminal text, grouped by capability class
pub fn render_deliverable(deliverable: &Deliverable) -> String {
    let mut out = format!("Status: {}\n", deliverable.status.as_str());

    for (class, entries) in deliverable.payloads_by_class() {
        out.push_str(&format!("\n== {} ==\n", class));
        for entry in entries {
            match &entry.payload {
                WorkerPayload::StructuredOps(p) => {
                    for checklist in &p.checklists {
                        out.push_str(&format!(
                            "[{}] checklist \"{}\" ({} items)\n",
                            entry.subtask_id,
                            checklist.title,
                            checklist.items.len()
                        ));
                        for item in checklist.items.iter().take(3) {
                            out.push_str(&format!("    - {}\n", item));
                        }
                    }
                    for workflow in &p.workflows {
                        out.push_str(&format!(
                            "[{}] workflow \"{}\" ({} steps)\n",
                            entry.subtask_id,
                            workflow.name,
                            workflow.steps.len()
                        ));
                    }
                    for template in &p.templates {
                        out.push_str(&format!(
                            "[{}] template \"{}\" ({} fields)\n",
                            entry.subtask_id,
                            template.name,
                            template.fields.len()
                        ));
                    }
                }
                WorkerPayload::NaturalLanguage(p) => {
                    for email in &p.emails {
                        out.push_str(&format!(
                            "[{}] email \"{}\"\n    {}\n",
                            entry.subtask_id,
                            email.subject,
                            preview(&email.body)
                        ));
                    }
                    for summary in &p.summaries {
                        out.push_str(&format!(
                            "[{}] summary\n    {}\n",
                            entry.subtask_id,
                            preview(&summary.content)
                        ));
                    }
                    for announcement in &p.announcements {
                        out.push_str(&format!(
                            "[{}] announcement\n    {}\n",
                            entry.subtask_id,
                            preview(&announcement.content)
                        ));
                    }
                }
            }
        }
    }

    if let Some(note) = &deliverable.note {
        out.push_str(&format!("\nNote: {}\n", note));
    }

    out
}

fn preview(text: &str) -> String {
    const PREVIEW_LEN: usize = 100;
    let flat = text.replace('\n', " ");
    if flat.len() > PREVIEW_LEN {
        let cut = flat
            .char_indices()
            .take_while(|(i, _)| *i < PREVIEW_LEN)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(flat.len());
        format!("{}...", &flat[..cut])
    } else {
        flat
    }
}

/// Show recent run history
pub async fn handle_history(
    runs: &RunRepository,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let records = runs.recent(limit).await?;

    if records.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    for record in records {
        match format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({
                    "id": record.id,
                    "session_id": record.session_id,
                    "instruction": record.instruction,
                    "status": record.status,
                    "subtask_count": record.subtask_count,
                    "duration_ms": record.duration_ms,
                    "created_at": record.created_at,
                })
            ),
            OutputFormat::Text => println!(
                "{}  [{}] {} ({} subtasks, {}ms): {}",
                record.id,
                record.session_id,
                record.status,
                record.subtask_count,
                record.duration_ms,
                preview(&record.instruction)
            ),
        }
    }

    Ok(())
}

/// Show a session's state
pub async fn handle_session_show(store: &SessionStore, id: &str) -> Result<()> {
    let session = store.load(id).await?;

    println!("Session: {}", session.id);
    println!(
        "Tone: {}",
        session
            .tone
            .map(|t| t.to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!("Turns: {}", session.turn_count);

    if session.history.is_empty() {
        println!("No deliverables yet.");
    } else {
        println!("Recent deliverables:");
        for summary in session.history.iter().rev() {
            println!(
                "  [{}] {} payload(s): {}",
                summary.status.as_str(),
                summary.payload_count,
                preview(&summary.instruction)
            );
        }
    }

    Ok(())
}

/// Set a session's tone preference
pub async fn handle_session_tone(store: &SessionStore, id: &str, tone: &str) -> Result<()> {
    let tone: ToneProfile = tone.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    store.set_tone(id, tone).await?;
    println!("Session {} tone set to {}.", id, tone);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Checklist, Email, CommunicationPayload, StructuredPayload};
    use crate::orchestrator::types::{
        CapabilityClass, DeliverableEntry, DeliverableStatus,
    };

    fn sample_deliverable() -> Deliverable {
        Deliverable {
            status: DeliverableStatus::Partial,
            payloads: vec![
                DeliverableEntry {
                    subtask_id: 1,
                    capability: CapabilityClass::StructuredOps,
                    payload: WorkerPayload::StructuredOps(StructuredPayload {
                        checklists: vec![Checklist {
                            title: "Onboarding".to_string(),
                            items: vec![
                                "Badge".to_string(),
                                "Laptop".to_string(),
                                "Accounts".to_string(),
                                "Buddy".to_string(),
                            ],
                            categories: vec![],
                        }],
                        ..Default::default()
                    }),
                },
                DeliverableEntry {
                    subtask_id: 2,
                    capability: CapabilityClass::NaturalLanguage,
                    payload: WorkerPayload::NaturalLanguage(CommunicationPayload {
                        emails: vec![Email {
                            recipient: None,
                            subject: "Welcome".to_string(),
                            body: "Hello and welcome to the team.".to_string(),
                            tone: None,
                        }],
                        ..Default::default()
                    }),
                },
            ],
            note: Some("Did not complete: subtask 3 (timeout: deadline exceeded)".to_string()),
        }
    }

    #[test]
    fn test_render_deliverable() {
        let rendered = render_deliverable(&sample_deliverable());
        assert!(rendered.contains("Status: partial"));
        assert!(rendered.contains("== structured-operations =="));
        assert!(rendered.contains("checklist \"Onboarding\" (4 items)"));
        assert!(rendered.contains("== natural-language =="));
        assert!(rendered.contains("email \"Welcome\""));
        assert!(rendered.contains("Note: Did not complete: subtask 3"));
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(300);
        let shown = preview(&long);
        assert!(shown.len() <= 104);
        assert!(shown.ends_with("..."));

        assert_eq!(preview("short"), "short");
        assert_eq!(preview("two\nlines"), "two lines");
    }
}
