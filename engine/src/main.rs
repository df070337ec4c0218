// Flowr Orchestration Engine
// Main entry point for the flowr binary

use clap::Parser;
use flowr_engine::adapters::{NaturalLanguageAdapter, StructuredOpsAdapter};
use flowr_engine::cli::{Cli, Command, ConfigAction, SessionAction};
use flowr_engine::config::Config;
use flowr_engine::events::EventBus;
use flowr_engine::generative::gemini::GeminiClient;
use flowr_engine::generative::GenerativeClient;
use flowr_engine::handlers::{
    handle_history, handle_run, handle_session_show, handle_session_tone, OutputFormat,
};
use flowr_engine::orchestrator::{
    DispatchExecutor, Instruction, IntentDecomposer, Orchestrator,
};
use flowr_engine::session::{SessionDatabase, SessionStore};
use flowr_engine::telemetry::{init_telemetry, init_telemetry_with_level};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Basic telemetry first, before config is available
    init_telemetry();

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Re-initialize with the configured (or flag-overridden) level; only
    // takes effect when RUST_LOG is not set
    let log_level = cli.log.clone().unwrap_or_else(|| config.core.log_level.clone());
    init_telemetry_with_level(&log_level);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Run {
            instruction,
            session,
        } => {
            let db = SessionDatabase::new(&config.database_path()?).await?;
            let runs = db.runs();

            let store = Arc::new(SessionStore::new(
                Arc::new(db.sessions()),
                config.orchestrator.history_limit,
            ));

            let client: Arc<dyn GenerativeClient> =
                Arc::new(GeminiClient::new(config.generative.clone()));

            let events = Arc::new(EventBus::new());
            let executor = DispatchExecutor::new(
                Arc::new(StructuredOpsAdapter::new(Arc::clone(&client))),
                Arc::new(NaturalLanguageAdapter::new(Arc::clone(&client))),
                Duration::from_secs(config.orchestrator.subtask_timeout_secs),
                Arc::clone(&events),
            );

            let orchestrator = Orchestrator::new(
                IntentDecomposer::new(client),
                executor,
                store,
                events,
            );

            handle_run(
                &orchestrator,
                &runs,
                Instruction::new(instruction, session),
                format,
            )
            .await
        }

        Command::History { limit } => {
            let db = SessionDatabase::new(&config.database_path()?).await?;
            handle_history(&db.runs(), limit, format).await
        }

        Command::Session { action } => {
            let db = SessionDatabase::new(&config.database_path()?).await?;
            let store = SessionStore::new(
                Arc::new(db.sessions()),
                config.orchestrator.history_limit,
            );

            match action {
                SessionAction::Show { id } => handle_session_show(&store, &id).await,
                SessionAction::Tone { id, tone } => {
                    handle_session_tone(&store, &id, &tone).await
                }
            }
        }

        Command::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Init => {
                let path = Config::default_path()?;
                Config::default().save_to_path(&path)?;
                println!("Wrote default configuration to {}", path.display());
                Ok(())
            }
        },
    }
}
