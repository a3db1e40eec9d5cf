//! List scenarios and the state each is expected to end in

use std::path::PathBuf;

use anyhow::Result;
use authprobe_e2e::ScenarioSpec;
use clap::Args;
use serde::Serialize;

use super::select_scenarios;
use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Directory of YAML scenarios (built-in scenarios when omitted)
    #[arg(short, long)]
    pub scenarios: Option<PathBuf>,

    /// Only scenarios with this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpecRow {
    name: String,
    description: String,
    steps: Vec<String>,
    expected_end: String,
    tags: Vec<String>,
}

impl SpecRow {
    fn new(spec: &ScenarioSpec) -> Result<Self> {
        Ok(Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            steps: spec.steps.iter().map(|s| s.action().to_string()).collect(),
            expected_end: spec.validate()?.to_string(),
            tags: spec.tags.clone(),
        })
    }
}

impl TableDisplay for SpecRow {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Steps", "Expected End", "Tags", "Description"]
    }

    fn row(&self) -> Vec<String> {
        let steps = if self.steps.is_empty() {
            "(open only)".to_string()
        } else {
            self.steps.join(" → ")
        };
        vec![
            self.name.clone(),
            steps,
            self.expected_end.clone(),
            self.tags.join(", "),
            self.description.clone(),
        ]
    }
}

pub fn execute(args: ListArgs, format: OutputFormat) -> Result<()> {
    let specs = select_scenarios(args.scenarios.as_deref(), None, args.tag.as_deref())?;
    let rows = specs.iter().map(SpecRow::new).collect::<Result<Vec<_>>>()?;
    output::print_list(&rows, format);
    Ok(())
}
