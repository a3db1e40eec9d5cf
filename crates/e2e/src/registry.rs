//! Selector registry: logical UI roles mapped to driver locator queries

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, ProbeResult};

/// Well-known role names used by the auth state machine
pub mod roles {
    pub const USERNAME_FIELD: &str = "username_field";
    pub const PASSWORD_FIELD: &str = "password_field";
    pub const LOGIN_BUTTON: &str = "login_button";
    pub const LANDING_MARKER: &str = "landing_marker";
    /// Optional: a single item inside the landing marker
    pub const LANDING_ITEM: &str = "landing_item";
    pub const ERROR_BANNER: &str = "error_banner";
    pub const MENU_TOGGLE: &str = "menu_toggle";
    pub const LOGOUT_LINK: &str = "logout_link";

    /// Roles every registry must bind before a scenario can run
    pub const REQUIRED: &[&str] = &[
        USERNAME_FIELD,
        PASSWORD_FIELD,
        LOGIN_BUTTON,
        LANDING_MARKER,
        ERROR_BANNER,
        MENU_TOGGLE,
        LOGOUT_LINK,
    ];
}

/// A driver-level element query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum LocatorQuery {
    /// ARIA role with optional accessible-name pattern (case-insensitive regex)
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<u8>,
    },
    /// Form control by associated label text
    Label { text: String },
    /// Input by placeholder text
    Placeholder { text: String },
    /// `data-testid` attribute
    TestId { id: String },
    /// Visible text content
    Text { text: String },
    /// Structural CSS selector
    Css { selector: String },
}

impl LocatorQuery {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css { selector: selector.into() }
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::Placeholder { text: text.into() }
    }

    pub fn role(role: impl Into<String>, name: Option<&str>, level: Option<u8>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.map(String::from),
            level,
        }
    }

    /// Preference order when several queries are bound to one role.
    /// Lower is preferred: semantic queries beat structural ones.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Role { .. } => 0,
            Self::Label { .. } | Self::Placeholder { .. } => 1,
            Self::TestId { .. } => 2,
            Self::Text { .. } => 3,
            Self::Css { .. } => 4,
        }
    }

    /// Whether the query targets role or accessible name rather than structure
    pub fn is_semantic(&self) -> bool {
        self.rank() <= 1
    }
}

impl fmt::Display for LocatorQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role { role, name, level } => {
                write!(f, "role={}", role)?;
                if let Some(level) = level {
                    write!(f, "[level={}]", level)?;
                }
                if let Some(name) = name {
                    write!(f, "[name=/{}/i]", name)?;
                }
                Ok(())
            }
            Self::Label { text } => write!(f, "label={}", text),
            Self::Placeholder { text } => write!(f, "placeholder={}", text),
            Self::TestId { id } => write!(f, "testid={}", id),
            Self::Text { text } => write!(f, "text={}", text),
            Self::Css { selector } => write!(f, "css={}", selector),
        }
    }
}

/// Config form: a role may be bound to a single query or a list of candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleBinding {
    One(LocatorQuery),
    Many(Vec<LocatorQuery>),
}

impl RoleBinding {
    fn into_vec(self) -> Vec<LocatorQuery> {
        match self {
            RoleBinding::One(q) => vec![q],
            RoleBinding::Many(qs) => qs,
        }
    }
}

/// Immutable role -> locator lookup
#[derive(Debug, Clone, Default)]
pub struct SelectorRegistry {
    bindings: BTreeMap<String, Vec<LocatorQuery>>,
}

impl SelectorRegistry {
    /// Build a registry from configured bindings.
    ///
    /// Candidates for each role are ordered by [`LocatorQuery::rank`]; ties keep
    /// their configured order. Roles bound to an empty list are rejected.
    pub fn from_bindings(bindings: &BTreeMap<String, RoleBinding>) -> ProbeResult<Self> {
        let mut out = BTreeMap::new();
        for (role, binding) in bindings {
            let mut candidates = binding.clone().into_vec();
            if candidates.is_empty() {
                return Err(ProbeError::Config(format!(
                    "role '{}' is bound to no locator",
                    role
                )));
            }
            candidates.sort_by_key(LocatorQuery::rank);
            out.insert(role.clone(), candidates);
        }
        Ok(Self { bindings: out })
    }

    /// Replace the accessible-name pattern of every role query bound to `role`
    pub fn with_role_name(mut self, role: &str, name: &str) -> Self {
        if let Some(candidates) = self.bindings.get_mut(role) {
            for query in candidates {
                if let LocatorQuery::Role { name: current, .. } = query {
                    *current = Some(name.to_string());
                }
            }
        }
        self
    }

    /// Resolve a role to its preferred query
    pub fn resolve(&self, role: &str) -> ProbeResult<&LocatorQuery> {
        self.lookup(role)
            .ok_or_else(|| ProbeError::UnknownRole(role.to_string()))
    }

    /// Like [`resolve`](Self::resolve) but for optional roles
    pub fn lookup(&self, role: &str) -> Option<&LocatorQuery> {
        self.bindings.get(role).and_then(|c| c.first())
    }

    /// All candidates for a role, most preferred first
    pub fn candidates(&self, role: &str) -> &[LocatorQuery] {
        self.bindings.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Fail with `UnknownRole` for the first required role that is not bound
    pub fn ensure_required(&self) -> ProbeResult<()> {
        for role in roles::REQUIRED {
            self.resolve(role)?;
        }
        Ok(())
    }
}
