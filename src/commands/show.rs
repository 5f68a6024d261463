use std::path::Path;
#[cfg(feature = "cli")]
use owo_colors::OwoColorize;
use crate::error::Result;
use crate::migration::{ArtifactRef, DependencyGraph, MigrationGraph};

#[derive(Debug, Default)]
pub struct ShowResult {
    /// Apps sorted by label, each with its artifacts in apply order
    pub apps: Vec<(String, Vec<ArtifactRef>)>,
    /// Newest artifacts per app; more than one means the history has branched
    pub leaves: Vec<ArtifactRef>,
}

/// List the migration artifacts under `root`, optionally for one app
pub fn execute_show_migrations(root: &Path, app_label: Option<&str>) -> Result<ShowResult> {
    let graph = MigrationGraph::load(root)?;
    let ordered = graph.ordered(app_label)?;

    let mut result = ShowResult::default();
    for label in graph.app_labels() {
        if app_label.is_some_and(|app| app != label) {
            continue;
        }
        let artifacts: Vec<ArtifactRef> = ordered
            .iter()
            .filter(|artifact| artifact.app_label == label)
            .cloned()
            .collect();
        result.leaves.extend(graph.leaf_artifacts(&label));
        result.apps.push((label, artifacts));
    }

    Ok(result)
}

#[cfg(feature = "cli")]
pub fn print_show_summary(result: &ShowResult) {
    if result.apps.is_empty() {
        println!("{}", "No migrations found".dimmed());
        return;
    }

    for (app_label, artifacts) in &result.apps {
        println!("{}", app_label.bold());
        for artifact in artifacts {
            let marker = if result.leaves.contains(artifact) { "*" } else { " " };
            println!("  {} {}", marker.green(), artifact.name.cyan());
        }
    }
}
