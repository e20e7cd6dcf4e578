//! Index command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::path::Path;

/// Run the index command.
pub async fn run_index(path: &str, force: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Index) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let path = Settings::expand_path(path);

    let spinner = Output::spinner(&format!("Indexing {}...", path.display()));
    let result = orchestrator.index_path(Path::new(&path), force).await;
    spinner.finish_and_clear();

    let results = match result {
        Ok(results) => results,
        Err(e) => {
            Output::error(&format!("Indexing failed: {}", e));
            return Err(e.into());
        }
    };

    if results.is_empty() {
        Output::warning("No course files found.");
        return Ok(());
    }

    let mut added = 0;
    for r in &results {
        if r.skipped {
            Output::list_item(&format!("{} (already indexed, skipped)", r.title));
        } else {
            added += 1;
            Output::list_item(&format!(
                "{} ({} lessons, {} chunks)",
                r.title, r.lessons, r.chunks_indexed
            ));
        }
    }

    let total = orchestrator.course_store().course_count().await?;
    Output::success(&format!("Indexed {} course(s); {} in catalog.", added, total));

    Ok(())
}
