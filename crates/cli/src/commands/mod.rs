//! CLI command implementations

pub mod config;
pub mod preflight;
pub mod run;
pub mod scenarios;

use std::path::Path;

use anyhow::{Context, Result};
use authprobe_e2e::ScenarioSpec;

/// Scenarios from `dir` (or the built-in set), narrowed by name and tag
pub fn select_scenarios(
    dir: Option<&Path>,
    name: Option<&str>,
    tag: Option<&str>,
) -> Result<Vec<ScenarioSpec>> {
    let specs = match dir {
        Some(dir) => ScenarioSpec::load_all(dir)
            .with_context(|| format!("loading scenarios from {}", dir.display()))?,
        None => ScenarioSpec::builtin(),
    };
    Ok(specs
        .into_iter()
        .filter(|s| name.map_or(true, |n| s.name == n))
        .filter(|s| tag.map_or(true, |t| s.tags.iter().any(|x| x == t)))
        .collect())
}
