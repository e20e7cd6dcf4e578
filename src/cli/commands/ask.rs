//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use console::style;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    session: Option<String>,
    model: Option<String>,
    mut settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Query) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    if let Some(model) = model {
        settings.llm.model = model;
    }

    let orchestrator = Orchestrator::new(settings)?;
    let rag = orchestrator.rag_system()?;

    let spinner = Output::spinner("Searching course materials...");

    match rag.query(question, session.as_deref()).await {
        Ok(response) => {
            spinner.finish_and_clear();

            println!("\n{}", response.answer);
            Output::sources(&response.sources);
            println!("\n{}", style(format!("session: {}", response.session_id)).dim());
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
