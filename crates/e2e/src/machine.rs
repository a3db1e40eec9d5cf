//! Authentication state machine
//!
//! Drives login, logout and direct-access checks through the browser driver
//! and derives the resulting [`AuthState`] from what the page shows. The
//! machine reports what it observed; the runner decides whether that matches
//! the expected transition.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::banner::BannerMatcher;
use crate::config::{Credential, ProbeConfig, SiteConfig};
use crate::driver::{BrowserDriver, ElementHandle};
use crate::error::{ProbeError, ProbeResult};
use crate::registry::{roles, SelectorRegistry};
use crate::report::{Assertion, AssertionCategory};
use crate::wait::{bounded_visible, wait_for_location, WaitPolicy};

/// Authentication lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
    AuthFailed,
    LoggedOut,
}

impl AuthState {
    /// Only an authenticated session may reach protected resources
    pub fn may_reach_protected(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Anonymous => write!(f, "anonymous"),
            AuthState::Authenticating => write!(f, "authenticating"),
            AuthState::Authenticated => write!(f, "authenticated"),
            AuthState::AuthFailed => write!(f, "auth_failed"),
            AuthState::LoggedOut => write!(f, "logged_out"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    SubmitValidCredentials,
    SubmitInvalidCredentials,
    InvokeLogout,
    RequestProtectedResourceDirectly,
}

impl Action {
    /// Read-only actions assert on the page but never change state
    pub fn is_read_only(&self) -> bool {
        matches!(self, Action::RequestProtectedResourceDirectly)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SubmitValidCredentials => write!(f, "submit_valid_credentials"),
            Action::SubmitInvalidCredentials => write!(f, "submit_invalid_credentials"),
            Action::InvokeLogout => write!(f, "invoke_logout"),
            Action::RequestProtectedResourceDirectly => {
                write!(f, "request_protected_resource_directly")
            }
        }
    }
}

/// `(from, action) -> expected` for every pair scenarios may exercise
const TRANSITIONS: &[(AuthState, Action, AuthState)] = &[
    (AuthState::Anonymous, Action::SubmitValidCredentials, AuthState::Authenticated),
    (AuthState::LoggedOut, Action::SubmitValidCredentials, AuthState::Authenticated),
    (AuthState::Anonymous, Action::SubmitInvalidCredentials, AuthState::AuthFailed),
    (AuthState::LoggedOut, Action::SubmitInvalidCredentials, AuthState::AuthFailed),
    (AuthState::Authenticated, Action::InvokeLogout, AuthState::LoggedOut),
    (AuthState::Anonymous, Action::RequestProtectedResourceDirectly, AuthState::Anonymous),
    (AuthState::AuthFailed, Action::RequestProtectedResourceDirectly, AuthState::AuthFailed),
    (AuthState::LoggedOut, Action::RequestProtectedResourceDirectly, AuthState::LoggedOut),
];

/// A defined transition and the state it must produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: AuthState,
    pub action: Action,
    pub expected: AuthState,
}

impl Transition {
    /// The expected outcome of `action` from `from`, or `PreconditionViolation`
    pub fn lookup(from: AuthState, action: Action) -> ProbeResult<Self> {
        TRANSITIONS
            .iter()
            .find(|(f, a, _)| *f == from && *a == action)
            .map(|(from, action, expected)| Transition {
                from: *from,
                action: *action,
                expected: *expected,
            })
            .ok_or(ProbeError::PreconditionViolation { action, state: from })
    }

    pub fn all() -> impl Iterator<Item = Transition> {
        TRANSITIONS.iter().map(|(from, action, expected)| Transition {
            from: *from,
            action: *action,
            expected: *expected,
        })
    }
}

/// What the machine saw while performing one action
#[derive(Debug, Clone)]
pub struct Observation {
    pub transition: Transition,
    /// State derived from the page after the action
    pub state: AuthState,
    /// Checks made during the action, in order
    pub checks: Vec<Assertion>,
}

/// Compiled, immutable inputs shared by every machine of a run
#[derive(Debug, Clone)]
pub struct MachineContext {
    pub registry: SelectorRegistry,
    pub site: SiteConfig,
    pub banner: BannerMatcher,
    pub wait: WaitPolicy,
}

impl MachineContext {
    pub fn from_config(config: &ProbeConfig) -> ProbeResult<Self> {
        let registry = config.registry()?;
        registry.ensure_required()?;
        Ok(Self {
            registry,
            site: config.site.clone(),
            banner: config.banner_matcher()?,
            wait: config.wait_policy(),
        })
    }
}

pub struct AuthMachine<'a, D: BrowserDriver + ?Sized> {
    driver: &'a mut D,
    ctx: &'a MachineContext,
    state: AuthState,
}

impl<'a, D: BrowserDriver + ?Sized> AuthMachine<'a, D> {
    pub fn new(driver: &'a mut D, ctx: &'a MachineContext) -> Self {
        Self {
            driver,
            ctx,
            state: AuthState::Anonymous,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Underlying driver, for artifact snapshots between actions
    pub fn driver(&mut self) -> &mut D {
        &mut *self.driver
    }

    /// Navigate to the anonymous landing resource and confirm the login form
    pub async fn open(&mut self) -> ProbeResult<Vec<Assertion>> {
        let ctx = self.ctx;
        self.state = AuthState::Anonymous;
        self.driver.navigate(&ctx.site.landing_url).await?;

        let mut checks = Vec::new();
        let loc = wait_for_location(&mut *self.driver, &ctx.wait, |u| ctx.site.is_landing(u)).await?;
        checks.push(self.check(
            "landing resource reached",
            loc.matched,
            format!("expected {}, observed {}", ctx.site.landing_url, loc.observed),
            AssertionCategory::State,
        ));
        checks.push(self.expect_visible(roles::USERNAME_FIELD, "username field visible").await?);
        checks.push(self.expect_visible(roles::PASSWORD_FIELD, "password field visible").await?);
        checks.push(self.expect_visible(roles::LOGIN_BUTTON, "login button visible").await?);
        Ok(checks)
    }

    pub async fn submit_valid_credentials(&mut self, credential: &Credential) -> ProbeResult<Observation> {
        let ctx = self.ctx;
        let transition = self.require(Action::SubmitValidCredentials)?;
        let mut checks = self.submit(credential).await?;

        let loc = wait_for_location(&mut *self.driver, &ctx.wait, |u| ctx.site.is_protected(u)).await?;
        checks.push(self.check(
            "location is the protected resource",
            loc.matched,
            format!("expected {}, observed {}", ctx.site.protected_url, loc.observed),
            AssertionCategory::State,
        ));

        let marker = self.expect_visible(roles::LANDING_MARKER, "landing marker visible").await?;
        let marker_seen = marker.passed;
        checks.push(marker);
        if ctx.registry.lookup(roles::LANDING_ITEM).is_some() {
            checks.push(self.expect_visible(roles::LANDING_ITEM, "landing item visible").await?);
        }

        self.state = if loc.matched && marker_seen {
            AuthState::Authenticated
        } else {
            warn!(
                "Login as '{}' did not reach the protected landing within {:?}",
                credential.identifier, ctx.wait.timeout
            );
            AuthState::AuthFailed
        };
        Ok(self.observe(transition, checks))
    }

    pub async fn submit_invalid_credentials(&mut self, credential: &Credential) -> ProbeResult<Observation> {
        let ctx = self.ctx;
        let transition = self.require(Action::SubmitInvalidCredentials)?;
        let mut checks = self.submit(credential).await?;

        let banner = self.locate_role(roles::ERROR_BANNER).await?;
        let banner_visible = bounded_visible(&mut *self.driver, &banner, &ctx.wait).await?;
        checks.push(self.check(
            "error banner visible",
            banner_visible,
            format!("{} within {:?}", banner.query, ctx.wait.timeout),
            AssertionCategory::Ui,
        ));

        let text = if banner_visible {
            self.driver.text_content(&banner).await?
        } else {
            None
        };
        checks.push(self.banner_check(text.as_deref()));

        let observed = self.driver.current_url().await?;
        let on_protected = ctx.site.is_protected(&observed);
        checks.push(self.check(
            "location remains outside the protected resource",
            !on_protected,
            format!("observed {}", observed),
            AssertionCategory::Security,
        ));

        let marker_hidden = self.expect_hidden(roles::LANDING_MARKER, "landing marker absent").await?;
        let marker_shown = !marker_hidden.passed;
        checks.push(marker_hidden);

        self.state = if on_protected && marker_shown {
            warn!("Invalid credentials for '{}' were accepted", credential.identifier);
            AuthState::Authenticated
        } else {
            AuthState::AuthFailed
        };
        Ok(self.observe(transition, checks))
    }

    pub async fn invoke_logout(&mut self) -> ProbeResult<Observation> {
        let ctx = self.ctx;
        let transition = self.require(Action::InvokeLogout)?;
        let mut checks = Vec::new();

        let menu = self.locate_role(roles::MENU_TOGGLE).await?;
        let menu_visible = bounded_visible(&mut *self.driver, &menu, &ctx.wait).await?;
        checks.push(self.check(
            "menu toggle visible",
            menu_visible,
            menu.query.to_string(),
            AssertionCategory::Ui,
        ));

        let mut clicked_logout = false;
        if menu_visible {
            self.driver.click(&menu).await?;
            let link = self.locate_role(roles::LOGOUT_LINK).await?;
            let link_visible = bounded_visible(&mut *self.driver, &link, &ctx.wait).await?;
            checks.push(self.check(
                "logout control visible",
                link_visible,
                link.query.to_string(),
                AssertionCategory::Ui,
            ));
            if link_visible {
                self.driver.click(&link).await?;
                clicked_logout = true;
            }
        }

        let loc = wait_for_location(&mut *self.driver, &ctx.wait, |u| ctx.site.is_landing(u)).await?;
        checks.push(self.check(
            "location returned to the landing resource",
            loc.matched,
            format!("expected {}, observed {}", ctx.site.landing_url, loc.observed),
            AssertionCategory::State,
        ));
        let login = self.expect_visible(roles::LOGIN_BUTTON, "login button visible again").await?;
        let user = self.expect_visible(roles::USERNAME_FIELD, "username field visible again").await?;
        let controls_back = login.passed && user.passed;
        checks.push(login);
        checks.push(user);

        if clicked_logout && loc.matched && controls_back {
            self.state = AuthState::LoggedOut;
        } else {
            warn!("Logout did not return to the login form");
        }
        Ok(self.observe(transition, checks))
    }

    /// Navigate straight to the protected resource. Never changes state.
    ///
    /// The protected content must stay hidden. With `site.require_redirect`
    /// the location must also leave the protected URL and the login controls
    /// must show; without it either one of those is enough.
    pub async fn request_protected_resource_directly(&mut self) -> ProbeResult<Observation> {
        let ctx = self.ctx;
        let transition = self.require(Action::RequestProtectedResourceDirectly)?;
        let mut checks = Vec::new();

        self.driver.navigate(&ctx.site.protected_url).await?;
        let loc = wait_for_location(&mut *self.driver, &ctx.wait, |u| !ctx.site.is_protected(u)).await?;
        let login = self.expect_visible(roles::LOGIN_BUTTON, "login controls shown instead").await?;
        if ctx.site.require_redirect {
            checks.push(self.check(
                "redirected away from the protected resource",
                loc.matched,
                format!("observed {}", loc.observed),
                AssertionCategory::Security,
            ));
            checks.push(login);
        } else {
            checks.push(self.check(
                "redirected away or login controls shown",
                loc.matched || login.passed,
                format!("observed {}; {}", loc.observed, login.detail),
                AssertionCategory::Security,
            ));
        }

        let marker_hidden = self.expect_hidden(roles::LANDING_MARKER, "protected content absent").await?;
        if !marker_hidden.passed {
            warn!("Protected content rendered without authentication while {}", self.state);
        }
        checks.push(Assertion {
            category: AssertionCategory::Security,
            ..marker_hidden
        });
        Ok(self.observe(transition, checks))
    }

    fn require(&self, action: Action) -> ProbeResult<Transition> {
        Transition::lookup(self.state, action)
    }

    fn observe(&self, transition: Transition, checks: Vec<Assertion>) -> Observation {
        debug!("{} from {} observed {}", transition.action, transition.from, self.state);
        Observation {
            transition,
            state: self.state,
            checks,
        }
    }

    /// Fill both credential fields and press the login button
    async fn submit(&mut self, credential: &Credential) -> ProbeResult<Vec<Assertion>> {
        let ctx = self.ctx;
        self.state = AuthState::Authenticating;

        let username = self.locate_role(roles::USERNAME_FIELD).await?;
        let visible = bounded_visible(&mut *self.driver, &username, &ctx.wait).await?;
        let checks = vec![self.check(
            "login form ready",
            visible,
            username.query.to_string(),
            AssertionCategory::Ui,
        )];

        let password = self.locate_role(roles::PASSWORD_FIELD).await?;
        let button = self.locate_role(roles::LOGIN_BUTTON).await?;
        self.driver.fill(&username, &credential.identifier).await?;
        self.driver.fill(&password, &credential.secret).await?;
        self.driver.click(&button).await?;
        debug!("Submitted credentials for '{}'", credential.identifier);
        Ok(checks)
    }

    fn banner_check(&self, text: Option<&str>) -> Assertion {
        let expected = self.ctx.banner.disjunction();
        match text {
            Some(text) => match self.ctx.banner.match_text(text) {
                Some(m) => {
                    info!("Error banner matched variant '{}'", m.variant);
                    self.check(
                        "error banner wording recognised",
                        true,
                        format!("matched variant '{}' in \"{}\"", m.variant, text.trim()),
                        AssertionCategory::Ui,
                    )
                }
                None => self.check(
                    "error banner wording recognised",
                    false,
                    format!("\"{}\" matches none of /{}/i", text.trim(), expected),
                    AssertionCategory::Ui,
                ),
            },
            None => self.check(
                "error banner wording recognised",
                false,
                format!("no banner text to match against /{}/i", expected),
                AssertionCategory::Ui,
            ),
        }
    }

    async fn locate_role(&mut self, role: &str) -> ProbeResult<ElementHandle> {
        let ctx = self.ctx;
        let query = ctx.registry.resolve(role)?;
        self.driver.locate(query).await
    }

    async fn expect_visible(&mut self, role: &str, description: &str) -> ProbeResult<Assertion> {
        let ctx = self.ctx;
        let handle = self.locate_role(role).await?;
        let visible = bounded_visible(&mut *self.driver, &handle, &ctx.wait).await?;
        let detail = if visible {
            handle.query.to_string()
        } else {
            format!("{} not visible within {:?}", handle.query, ctx.wait.timeout)
        };
        Ok(self.check(description, visible, detail, AssertionCategory::Ui))
    }

    async fn expect_hidden(&mut self, role: &str, description: &str) -> ProbeResult<Assertion> {
        let handle = self.locate_role(role).await?;
        let visible = self.driver.is_visible(&handle).await?;
        let detail = if visible {
            format!("{} is visible", handle.query)
        } else {
            format!("{} not visible", handle.query)
        };
        Ok(self.check(description, !visible, detail, AssertionCategory::Ui))
    }

    fn check(&self, description: &str, passed: bool, detail: impl Into<String>, category: AssertionCategory) -> Assertion {
        let assertion = Assertion::new(description, passed, detail, category, self.state);
        if !passed {
            warn!("Assertion failed: {} ({})", assertion.description, assertion.detail);
        }
        assertion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_anonymous() {
        assert_eq!(AuthState::default(), AuthState::Anonymous);
        assert_eq!(AuthState::default().to_string(), "anonymous");
    }

    #[test]
    fn test_lookup_defined_transitions() {
        let t = Transition::lookup(AuthState::Anonymous, Action::SubmitValidCredentials).unwrap();
        assert_eq!(t.expected, AuthState::Authenticated);

        let t = Transition::lookup(AuthState::Authenticated, Action::InvokeLogout).unwrap();
        assert_eq!(t.expected, AuthState::LoggedOut);

        let t = Transition::lookup(AuthState::LoggedOut, Action::SubmitValidCredentials).unwrap();
        assert_eq!(t.expected, AuthState::Authenticated);
    }

    #[test]
    fn test_logout_while_anonymous_is_precondition_violation() {
        match Transition::lookup(AuthState::Anonymous, Action::InvokeLogout) {
            Err(ProbeError::PreconditionViolation { action, state }) => {
                assert_eq!(action, Action::InvokeLogout);
                assert_eq!(state, AuthState::Anonymous);
            }
            other => panic!("expected precondition violation, got {:?}", other),
        }
    }

    #[test]
    fn test_read_only_actions_never_change_state() {
        for t in Transition::all().filter(|t| t.action.is_read_only()) {
            assert_eq!(t.from, t.expected);
            assert!(!t.expected.may_reach_protected());
        }
    }

    #[test]
    fn test_only_authenticated_reaches_protected() {
        let reaching: Vec<_> = [
            AuthState::Anonymous,
            AuthState::Authenticating,
            AuthState::Authenticated,
            AuthState::AuthFailed,
            AuthState::LoggedOut,
        ]
        .into_iter()
        .filter(AuthState::may_reach_protected)
        .collect();
        assert_eq!(reaching, vec![AuthState::Authenticated]);
    }

    #[test]
    fn test_no_action_from_authenticating() {
        for action in [
            Action::SubmitValidCredentials,
            Action::SubmitInvalidCredentials,
            Action::InvokeLogout,
            Action::RequestProtectedResourceDirectly,
        ] {
            assert!(Transition::lookup(AuthState::Authenticating, action).is_err());
        }
    }

    #[test]
    fn test_table_has_no_duplicate_pairs() {
        let all: Vec<_> = Transition::all().collect();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert!(!(a.from == b.from && a.action == b.action), "duplicate {:?}", a);
            }
        }
    }
}
