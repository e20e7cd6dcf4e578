//! Courses command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// List indexed courses.
pub async fn run_courses(settings: Settings) -> Result<()> {
    preflight::check(Operation::Browse)?;

    let orchestrator = Orchestrator::new(settings)?;
    let titles = orchestrator.course_store().get_existing_course_titles().await?;

    if titles.is_empty() {
        Output::info("No courses indexed yet. Use 'lektor index <path>' to add some.");
        return Ok(());
    }

    Output::header(&format!("Courses ({})", titles.len()));
    for title in &titles {
        Output::list_item(title);
    }

    Ok(())
}
