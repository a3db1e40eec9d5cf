//! AuthProbe verification core
//!
//! This crate drives a web application's authentication flow through a real
//! browser and checks what the page shows against a small state machine:
//! - Login with valid and invalid credentials
//! - Logout through the application menu
//! - Direct requests for the protected resource
//! - Authorization-bearing cookies and storage left behind after failure or logout
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ScenarioRunner<F: DriverFactory>            │
//! │    ├── run_all(specs, reporter) -> SuiteResult              │
//! │    └── run_scenario(spec) -> ScenarioResult                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  AuthMachine (one per scenario, fresh session)              │
//! │    ├── open()                                               │
//! │    ├── submit_valid_credentials / submit_invalid_credentials│
//! │    ├── invoke_logout                                        │
//! │    └── request_protected_resource_directly                  │
//! │         uses: SelectorRegistry, BannerMatcher, WaitPolicy   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ArtifactSnapshot + leak::scan (names only, never values)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserDriver                                              │
//! │    └── PlaywrightDriver: node bridge, JSON lines over stdio │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod banner;
pub mod config;
pub mod driver;
pub mod error;
pub mod leak;
pub mod machine;
pub mod playwright;
pub mod preflight;
pub mod registry;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod wait;

pub use config::{Credential, ProbeConfig};
pub use driver::{BrowserDriver, DriverFactory, ElementHandle, StorageKind};
pub use error::{ProbeError, ProbeResult};
pub use machine::{Action, AuthMachine, AuthState, MachineContext, Transition};
pub use playwright::{PlaywrightDriver, PlaywrightFactory};
pub use registry::{LocatorQuery, SelectorRegistry};
pub use report::{Assertion, AssertionCategory, Reporter, ScenarioResult, SuiteResult, TracingReporter};
pub use runner::ScenarioRunner;
pub use scenario::{ScenarioSpec, ScenarioStep};
