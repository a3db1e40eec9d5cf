//! Declarative YAML scenario definitions

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ProbeError, ProbeResult};
use crate::machine::{Action, AuthState, Transition};

/// A named sequence of state-machine actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Actions to perform in order, after the fresh landing navigation
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

/// A single action in a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Log in with a credential the application should accept
    SubmitValidCredentials {
        #[serde(default = "default_valid_credential")]
        credential: String,
    },

    /// Log in with a credential the application should reject
    SubmitInvalidCredentials {
        #[serde(default = "default_invalid_credential")]
        credential: String,
    },

    /// Log out through the menu
    InvokeLogout,

    /// Navigate straight to the protected resource
    RequestProtectedResourceDirectly,
}

fn default_valid_credential() -> String {
    "valid".to_string()
}

fn default_invalid_credential() -> String {
    "invalid".to_string()
}

impl ScenarioStep {
    pub fn action(&self) -> Action {
        match self {
            ScenarioStep::SubmitValidCredentials { .. } => Action::SubmitValidCredentials,
            ScenarioStep::SubmitInvalidCredentials { .. } => Action::SubmitInvalidCredentials,
            ScenarioStep::InvokeLogout => Action::InvokeLogout,
            ScenarioStep::RequestProtectedResourceDirectly => {
                Action::RequestProtectedResourceDirectly
            }
        }
    }

    /// Credential name the step submits, if any
    pub fn credential(&self) -> Option<&str> {
        match self {
            ScenarioStep::SubmitValidCredentials { credential }
            | ScenarioStep::SubmitInvalidCredentials { credential } => Some(credential),
            _ => None,
        }
    }

    fn valid() -> Self {
        ScenarioStep::SubmitValidCredentials {
            credential: default_valid_credential(),
        }
    }

    fn invalid() -> Self {
        ScenarioStep::SubmitInvalidCredentials {
            credential: default_invalid_credential(),
        }
    }
}

impl ScenarioSpec {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> ProbeResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> ProbeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            ProbeError::Yaml(inner) => {
                ProbeError::ScenarioParse(format!("{}: {}", path.display(), inner))
            }
            other => other,
        })
    }

    /// Load all scenarios from a directory
    pub fn load_all(dir: &Path) -> ProbeResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Replay the steps through the transition table from `Anonymous`.
    ///
    /// Returns the state the scenario is expected to end in. A step with no
    /// defined outcome is an error in the scenario, caught before any browser
    /// work starts.
    pub fn validate(&self) -> ProbeResult<AuthState> {
        if self.name.trim().is_empty() {
            return Err(ProbeError::ScenarioParse("scenario name is empty".to_string()));
        }
        let mut state = AuthState::Anonymous;
        for step in &self.steps {
            let action = step.action();
            state = Transition::lookup(state, action)
                .map_err(|_| ProbeError::UndefinedTransition { action, state })?
                .expected;
        }
        Ok(state)
    }

    /// Scenarios exercising the complete login/logout lifecycle
    pub fn builtin() -> Vec<Self> {
        let spec = |name: &str, description: &str, tags: &[&str], steps: Vec<ScenarioStep>| Self {
            name: name.to_string(),
            description: description.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            steps,
        };
        vec![
            spec(
                "seed-open-landing",
                "Open the landing page and find the login form",
                &["smoke"],
                vec![],
            ),
            spec(
                "happy-login",
                "Valid credentials reach the protected landing",
                &["smoke", "login"],
                vec![ScenarioStep::valid()],
            ),
            spec(
                "invalid-credentials",
                "Invalid credentials show the error banner and leave no auth artifacts",
                &["login", "security"],
                vec![ScenarioStep::invalid()],
            ),
            spec(
                "logout-then-direct-access",
                "Logout returns to the login form and the protected resource stays closed",
                &["logout", "security"],
                vec![
                    ScenarioStep::valid(),
                    ScenarioStep::InvokeLogout,
                    ScenarioStep::RequestProtectedResourceDirectly,
                ],
            ),
            spec(
                "direct-access-anonymous",
                "The protected resource is closed before any login",
                &["security"],
                vec![ScenarioStep::RequestProtectedResourceDirectly],
            ),
        ]
    }
}
