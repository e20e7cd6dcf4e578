//! Outline command: runs the outline tool directly, without the LLM.

use crate::agent::{CourseOutlineTool, Tool};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the outline command.
pub async fn run_outline(course: &str, settings: Settings) -> Result<()> {
    // Fuzzy resolution embeds the course name
    if let Err(e) = preflight::check(Operation::Query) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let mut tool = CourseOutlineTool::new(orchestrator.course_store());

    let outline = tool
        .execute(&serde_json::json!({ "course_title": course }))
        .await;
    println!("\n{}", outline);
    Output::sources(&tool.take_sources());

    Ok(())
}
