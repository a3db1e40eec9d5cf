//! Run scenarios against the target through Playwright

use std::path::PathBuf;

use anyhow::Result;
use authprobe_e2e::playwright::Browser;
use authprobe_e2e::report::TracingReporter;
use authprobe_e2e::{PlaywrightFactory, ProbeConfig, ScenarioResult, ScenarioRunner};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use super::select_scenarios;
use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Run only the scenario with this name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Run only scenarios with this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Directory of YAML scenarios (built-in scenarios when omitted)
    #[arg(short, long)]
    pub scenarios: Option<PathBuf>,

    /// Anonymous landing URL
    #[arg(long, env = "AUTHPROBE_LANDING_URL")]
    pub landing_url: Option<String>,

    /// Protected resource URL
    #[arg(long, env = "AUTHPROBE_PROTECTED_URL")]
    pub protected_url: Option<String>,

    /// Timeout for every bounded wait, in milliseconds
    #[arg(long, env = "AUTHPROBE_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    pub browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Output directory for results
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not write test-results.json
    #[arg(long)]
    pub no_write: bool,
}

impl RunArgs {
    /// Command-line values win over the configuration file
    fn apply(&self, config: &mut ProbeConfig) {
        if let Some(url) = &self.landing_url {
            config.site.landing_url = url.clone();
        }
        if let Some(url) = &self.protected_url {
            config.site.protected_url = url.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.wait.timeout_ms = ms;
        }
        if let Some(browser) = self.browser {
            config.browser.kind = browser;
        }
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
    }
}

/// One line of the results table
#[derive(Debug, Serialize)]
struct ScenarioRow {
    name: String,
    outcome: String,
    final_state: String,
    assertions: usize,
    failed: usize,
    duration_ms: u64,
    first_failure: String,
}

impl From<&ScenarioResult> for ScenarioRow {
    fn from(result: &ScenarioResult) -> Self {
        Self {
            name: result.name().to_string(),
            outcome: if result.passed() { "passed" } else { "failed" }.to_string(),
            final_state: result.final_state().to_string(),
            assertions: result.assertions().len(),
            failed: result.failures().count(),
            duration_ms: result.duration_ms(),
            first_failure: result
                .first_failure()
                .map(|a| format!("{} ({})", a.description, a.detail))
                .unwrap_or_default(),
        }
    }
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Outcome", "Final State", "Checks", "Failed", "Duration", "First Failure"]
    }

    fn row(&self) -> Vec<String> {
        let outcome = if self.outcome == "passed" {
            "✓ passed".green().to_string()
        } else {
            "✗ failed".red().to_string()
        };
        vec![
            self.name.clone(),
            outcome,
            self.final_state.clone(),
            self.assertions.to_string(),
            self.failed.to_string(),
            format!("{} ms", self.duration_ms),
            self.first_failure.clone(),
        ]
    }
}

/// Returns whether every selected scenario passed
pub async fn execute(args: RunArgs, mut config: ProbeConfig, format: OutputFormat) -> Result<bool> {
    args.apply(&mut config);

    let specs = select_scenarios(args.scenarios.as_deref(), args.name.as_deref(), args.tag.as_deref())?;
    if specs.is_empty() {
        output::print_warning("No scenarios matched the selection");
        return Ok(true);
    }
    debug!("Selected {} scenario(s)", specs.len());

    let factory = PlaywrightFactory::new(config.playwright());
    let runner = ScenarioRunner::new(config, factory)?;
    let suite = runner.run_all(&specs, &mut TracingReporter).await?;

    match format {
        OutputFormat::Json | OutputFormat::Yaml => output::print_value(&suite, format),
        _ => {
            let rows: Vec<ScenarioRow> = suite.results.iter().map(ScenarioRow::from).collect();
            output::print_list(&rows, format);
        }
    }

    if !args.no_write {
        let path = runner.write_results(&suite)?;
        output::print_info(&format!("Results written to {}", path.display()));
    }

    let summary = format!(
        "{} passed, {} failed ({} ms)",
        suite.passed, suite.failed, suite.duration_ms
    );
    if suite.all_passed() {
        output::print_success(&summary);
    } else {
        output::print_error(&summary);
    }
    Ok(suite.all_passed())
}
