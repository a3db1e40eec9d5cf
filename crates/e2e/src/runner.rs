//! Scenario runner: composes state-machine actions and leak scans into scenarios

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::ProbeConfig;
use crate::driver::{BrowserDriver, DriverFactory, StorageKind};
use crate::error::{ProbeError, ProbeResult};
use crate::leak::{self, ArtifactSnapshot, LeakFinding, SensitivePattern};
use crate::machine::{AuthMachine, AuthState, MachineContext, Observation};
use crate::report::{
    Assertion, AssertionCategory, JsonFileReporter, Reporter, ScenarioResult, SuiteResult,
};
use crate::scenario::{ScenarioSpec, ScenarioStep};

/// Runs scenarios, each in its own fresh driver session
pub struct ScenarioRunner<F: DriverFactory> {
    factory: F,
    config: ProbeConfig,
    ctx: MachineContext,
    patterns: Vec<SensitivePattern>,
    storage: Vec<StorageKind>,
}

impl<F: DriverFactory> ScenarioRunner<F> {
    /// Validate the configuration and compile everything scenarios share
    pub fn new(config: ProbeConfig, factory: F) -> ProbeResult<Self> {
        config.validate()?;
        Ok(Self {
            ctx: MachineContext::from_config(&config)?,
            patterns: config.sensitive_patterns()?,
            storage: config.leak.storage.clone(),
            factory,
            config,
        })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run scenarios one after another, reporting each as it completes
    pub async fn run_all(
        &self,
        specs: &[ScenarioSpec],
        reporter: &mut dyn Reporter,
    ) -> ProbeResult<SuiteResult> {
        let start = Instant::now();
        let mut results = Vec::with_capacity(specs.len());

        info!("Running {} scenario(s)...", specs.len());

        for spec in specs {
            let result = self.run_scenario(spec).await;
            reporter.report_scenario(&result)?;
            results.push(result);
        }

        let suite = SuiteResult::from_results(results, start.elapsed().as_millis() as u64);
        reporter.report_suite(&suite)?;
        Ok(suite)
    }

    /// Run one scenario to completion. Never fails: every error ends up in the result.
    pub async fn run_scenario(&self, spec: &ScenarioSpec) -> ScenarioResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut log = Vec::new();
        debug!("Running scenario: {}", spec.name);

        let final_state = match spec.validate() {
            Err(e) => {
                log.push(fatal(&e, AuthState::Anonymous));
                AuthState::Anonymous
            }
            Ok(_) => match self.factory.open_session().await {
                Err(e) => {
                    error!("Could not open a browser session for {}: {}", spec.name, e);
                    log.push(fatal(&e, AuthState::Anonymous));
                    AuthState::Anonymous
                }
                Ok(mut driver) => {
                    let state = self.drive(spec, &mut driver, &mut log).await;
                    if let Err(e) = driver.close().await {
                        warn!("Failed to close session for {}: {}", spec.name, e);
                    }
                    state
                }
            },
        };

        ScenarioResult::new(
            spec.name.clone(),
            final_state,
            log,
            started_at,
            start.elapsed().as_millis() as u64,
        )
    }

    /// Write results to `<output_dir>/test-results.json`
    pub fn write_results(&self, suite: &SuiteResult) -> ProbeResult<PathBuf> {
        let mut reporter = JsonFileReporter::new(&self.config.output_dir);
        reporter.report_suite(suite)?;
        Ok(self.config.output_dir.join("test-results.json"))
    }

    /// Fail-soft within the scenario: assertion failures are logged and the
    /// steps continue; an error stops the remaining steps.
    async fn drive(&self, spec: &ScenarioSpec, driver: &mut F::Driver, log: &mut Vec<Assertion>) -> AuthState {
        let mut machine = AuthMachine::new(driver, &self.ctx);

        match machine.open().await {
            Ok(checks) => log.extend(checks),
            Err(e) => {
                error!("{}: could not open the landing resource: {}", spec.name, e);
                log.push(fatal(&e, machine.state()));
                return machine.state();
            }
        }

        for step in &spec.steps {
            if let Err(e) = self.perform(&mut machine, step, log).await {
                error!("{}: {} aborted the scenario: {}", spec.name, step.action(), e);
                log.push(fatal(&e, machine.state()));
                break;
            }
        }
        machine.state()
    }

    async fn perform<D: BrowserDriver + ?Sized>(
        &self,
        machine: &mut AuthMachine<'_, D>,
        step: &ScenarioStep,
        log: &mut Vec<Assertion>,
    ) -> ProbeResult<()> {
        let before = ArtifactSnapshot::capture(machine.driver(), &self.storage).await?;

        let observation: Observation = match step {
            ScenarioStep::SubmitValidCredentials { credential } => {
                let credential = self.config.credential(credential)?;
                machine.submit_valid_credentials(&credential).await?
            }
            ScenarioStep::SubmitInvalidCredentials { credential } => {
                let credential = self.config.credential(credential)?;
                machine.submit_invalid_credentials(&credential).await?
            }
            ScenarioStep::InvokeLogout => machine.invoke_logout().await?,
            ScenarioStep::RequestProtectedResourceDirectly => {
                machine.request_protected_resource_directly().await?
            }
        };

        let Observation { transition, state, checks } = observation;
        log.extend(checks);
        log.push(Assertion::new(
            format!("{} ends {}", transition.action, transition.expected),
            state == transition.expected,
            format!("expected {}, observed {}", transition.expected, state),
            AssertionCategory::State,
            state,
        ));

        let after = ArtifactSnapshot::capture(machine.driver(), &self.storage).await?;
        let findings = leak::scan(&after, &self.patterns);
        if transition.expected.may_reach_protected() {
            if !findings.is_empty() {
                debug!(
                    "{} authorization artifact(s) present after {}, as expected",
                    findings.len(),
                    transition.action
                );
            }
        } else {
            log.push(self.leak_assertion(&findings, &before, &after, state));
        }
        Ok(())
    }

    fn leak_assertion(
        &self,
        findings: &[LeakFinding],
        before: &ArtifactSnapshot,
        after: &ArtifactSnapshot,
        state: AuthState,
    ) -> Assertion {
        let patterns = self
            .patterns
            .iter()
            .map(SensitivePattern::as_str)
            .collect::<Vec<_>>()
            .join("|");

        if findings.is_empty() {
            return Assertion::new(
                "no authorization artifacts present",
                true,
                format!("no cookie or storage name matches /{}/i", patterns),
                AssertionCategory::Security,
                state,
            );
        }

        let listed = findings
            .iter()
            .map(LeakFinding::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let introduced = after
            .introduced_since(before)
            .into_iter()
            .filter(|(kind, name)| findings.iter().any(|f| f.kind == *kind && &f.name == name))
            .map(|(kind, name)| format!("{} '{}'", kind, name))
            .collect::<Vec<_>>();
        let detail = if introduced.is_empty() {
            format!("found {}", listed)
        } else {
            format!("found {}; introduced by this step: {}", listed, introduced.join(", "))
        };
        error!("Artifact leak while {}: {}", state, detail);
        Assertion::new(
            "no authorization artifacts present",
            false,
            detail,
            AssertionCategory::Security,
            state,
        )
    }
}

fn fatal(error: &ProbeError, state: AuthState) -> Assertion {
    Assertion::new(
        format!("scenario aborted ({})", error.kind()),
        false,
        error.to_string(),
        AssertionCategory::Fatal,
        state,
    )
}
