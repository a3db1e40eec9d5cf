//! Scenario results and reporting

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ProbeResult;
use crate::machine::AuthState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionCategory {
    /// Visible UI condition
    Ui,
    /// Location or auth state condition
    State,
    /// Authorization artifact or access-control condition
    Security,
    /// Scenario aborted by an error
    Fatal,
}

impl std::fmt::Display for AssertionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssertionCategory::Ui => write!(f, "ui"),
            AssertionCategory::State => write!(f, "state"),
            AssertionCategory::Security => write!(f, "security"),
            AssertionCategory::Fatal => write!(f, "fatal"),
        }
    }
}

/// One checked condition, with the auth state at the time it was made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub description: String,
    pub passed: bool,
    pub detail: String,
    pub category: AssertionCategory,
    pub state: AuthState,
}

impl Assertion {
    pub fn new(
        description: impl Into<String>,
        passed: bool,
        detail: impl Into<String>,
        category: AssertionCategory,
        state: AuthState,
    ) -> Self {
        Self {
            description: description.into(),
            passed,
            detail: detail.into(),
            category,
            state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Passed,
    Failed,
}

/// Result of one scenario run. Built by the runner, read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    run_id: Uuid,
    name: String,
    outcome: ScenarioOutcome,
    final_state: AuthState,
    assertions: Vec<Assertion>,
    started_at: DateTime<Utc>,
    duration_ms: u64,
}

impl ScenarioResult {
    pub(crate) fn new(
        name: String,
        final_state: AuthState,
        assertions: Vec<Assertion>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        let outcome = if !assertions.is_empty() && assertions.iter().all(|a| a.passed) {
            ScenarioOutcome::Passed
        } else {
            ScenarioOutcome::Failed
        };
        Self {
            run_id: Uuid::new_v4(),
            name,
            outcome,
            final_state,
            assertions,
            started_at,
            duration_ms,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn outcome(&self) -> ScenarioOutcome {
        self.outcome
    }

    pub fn passed(&self) -> bool {
        self.outcome == ScenarioOutcome::Passed
    }

    pub fn final_state(&self) -> AuthState {
        self.final_state
    }

    /// Assertions in the order they were made
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn first_failure(&self) -> Option<&Assertion> {
        self.assertions.iter().find(|a| !a.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Assertion> {
        self.assertions.iter().filter(|a| !a.passed)
    }
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn from_results(results: Vec<ScenarioResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Sink for scenario outcomes; transport is up to the implementation
pub trait Reporter {
    fn report_scenario(&mut self, result: &ScenarioResult) -> ProbeResult<()>;

    fn report_suite(&mut self, _suite: &SuiteResult) -> ProbeResult<()> {
        Ok(())
    }
}

/// Logs outcomes through `tracing`
#[derive(Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report_scenario(&mut self, result: &ScenarioResult) -> ProbeResult<()> {
        if result.passed() {
            info!("✓ {} ({} ms)", result.name(), result.duration_ms());
            return Ok(());
        }
        match result.first_failure() {
            Some(first) => error!(
                "✗ {} - {} [{}] while {}: {}",
                result.name(),
                first.description,
                first.category,
                first.state,
                first.detail
            ),
            None => error!("✗ {} - no assertions recorded", result.name()),
        }
        for failure in result.failures().skip(1) {
            warn!("  also failed: {} ({})", failure.description, failure.detail);
        }
        Ok(())
    }

    fn report_suite(&mut self, suite: &SuiteResult) -> ProbeResult<()> {
        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );
        Ok(())
    }
}

/// Writes the suite as pretty JSON to `<output_dir>/test-results.json`
#[derive(Debug)]
pub struct JsonFileReporter {
    output_dir: PathBuf,
    written: Option<PathBuf>,
}

impl JsonFileReporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            written: None,
        }
    }

    /// Path of the last file written, if any
    pub fn written(&self) -> Option<&PathBuf> {
        self.written.as_ref()
    }
}

impl Reporter for JsonFileReporter {
    fn report_scenario(&mut self, _result: &ScenarioResult) -> ProbeResult<()> {
        Ok(())
    }

    fn report_suite(&mut self, suite: &SuiteResult) -> ProbeResult<()> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(suite)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        self.written = Some(path);
        Ok(())
    }
}
