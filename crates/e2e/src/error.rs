//! Error types for authentication-flow verification

use thiserror::Error;

use crate::machine::{Action, AuthState};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Precondition violated: {action} is not permitted while {state}")]
    PreconditionViolation { action: Action, state: AuthState },

    #[error("Undefined transition: {action} has no expected outcome from {state}")]
    UndefinedTransition { action: Action, state: AuthState },

    #[error("Unknown role: no locator registered for '{0}'")]
    UnknownRole(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Playwright not found. Install with: npm i playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl ProbeError {
    /// Short machine-readable kind, used in assertion logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::PreconditionViolation { .. } => "precondition_violation",
            ProbeError::UndefinedTransition { .. } => "undefined_transition",
            ProbeError::UnknownRole(_) => "unknown_role",
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Driver(_) | ProbeError::PlaywrightNotFound => "driver",
            ProbeError::Config(_) | ProbeError::InvalidPattern(_) | ProbeError::Regex(_) => "config",
            ProbeError::ScenarioParse(_) | ProbeError::Yaml(_) => "scenario",
            _ => "internal",
        }
    }
}

pub type ProbeResult<T> = Result<T, ProbeError>;
