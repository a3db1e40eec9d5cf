//! Probe configuration

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::banner::BannerMatcher;
use crate::driver::StorageKind;
use crate::error::{ProbeError, ProbeResult};
use crate::leak::SensitivePattern;
use crate::playwright::{Browser, PlaywrightConfig};
use crate::registry::{roles, LocatorQuery, RoleBinding, SelectorRegistry};
use crate::wait::WaitPolicy;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Output directory for results
    pub output_dir: PathBuf,

    /// Target application locations
    pub site: SiteConfig,

    /// Bounded wait settings shared by every wait
    pub wait: WaitConfig,

    /// Role name -> locator query (or ordered candidates)
    pub selectors: BTreeMap<String, RoleBinding>,

    /// Acceptable error banner phrasings
    pub banner: BannerConfig,

    /// Artifact leak detection
    pub leak: LeakConfig,

    /// Named credentials referenced by scenarios
    pub credentials: BTreeMap<String, CredentialConfig>,

    /// Browser launched by the Playwright driver
    pub browser: BrowserConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        let banner = BannerConfig::default();
        Self {
            output_dir: PathBuf::from("test-results"),
            site: SiteConfig::default(),
            wait: WaitConfig::default(),
            selectors: default_selectors(&banner.patterns.join("|")),
            banner,
            leak: LeakConfig::default(),
            credentials: default_credentials(),
            browser: BrowserConfig::default(),
        }
    }
}

/// Anonymous landing resource and protected resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub landing_url: String,
    pub protected_url: String,
    /// Direct access must leave the protected URL, not just show the login form there
    pub require_redirect: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            landing_url: "https://www.saucedemo.com/".to_string(),
            protected_url: "https://www.saucedemo.com/inventory.html".to_string(),
            require_redirect: true,
        }
    }
}

impl SiteConfig {
    /// Whether `observed` points at the protected resource
    pub fn is_protected(&self, observed: &str) -> bool {
        same_resource(&self.protected_url, observed)
    }

    /// Whether `observed` points at the anonymous landing resource
    pub fn is_landing(&self, observed: &str) -> bool {
        same_resource(&self.landing_url, observed)
    }
}

/// Scheme, host, port and path equality; query and fragment are ignored
fn same_resource(expected: &str, observed: &str) -> bool {
    match (Url::parse(expected), Url::parse(observed)) {
        (Ok(a), Ok(b)) => {
            a.scheme() == b.scheme()
                && a.host_str() == b.host_str()
                && a.port_or_known_default() == b.port_or_known_default()
                && a.path() == b.path()
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            poll_interval_ms: 50,
        }
    }
}

impl WaitConfig {
    pub fn policy(&self) -> WaitPolicy {
        WaitPolicy {
            timeout: Duration::from_millis(self.timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BannerConfig {
    pub patterns: Vec<String>,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                "Epic sadface".to_string(),
                "Username and password".to_string(),
                "do not match".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeakConfig {
    pub sensitive_patterns: Vec<String>,
    pub storage: Vec<StorageKind>,
}

impl Default for LeakConfig {
    fn default() -> Self {
        Self {
            sensitive_patterns: vec![
                "session".to_string(),
                "auth".to_string(),
                "token".to_string(),
            ],
            storage: vec![StorageKind::Local, StorageKind::Session],
        }
    }
}

/// Credential as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Environment variable holding the secret; wins over `secret`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_env: Option<String>,
}

impl CredentialConfig {
    fn literal(identifier: &str, secret: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            secret: Some(secret.to_string()),
            secret_env: None,
        }
    }

    pub fn resolve(&self) -> ProbeResult<Credential> {
        let secret = match (&self.secret_env, &self.secret) {
            (Some(var), _) => std::env::var(var).map_err(|_| {
                ProbeError::Config(format!(
                    "secret for '{}' expected in environment variable {}",
                    self.identifier, var
                ))
            })?,
            (None, Some(secret)) => secret.clone(),
            (None, None) => {
                return Err(ProbeError::Config(format!(
                    "credential '{}' has neither secret nor secret_env",
                    self.identifier
                )))
            }
        };
        Ok(Credential {
            identifier: self.identifier.clone(),
            secret,
        })
    }
}

/// Opaque identifier/secret pair. Validity is decided by the target application.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub identifier: String,
    pub secret: String,
}

impl Credential {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub kind: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Node.js executable running the Playwright bridge
    pub node_binary: PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_binary: PathBuf::from("node"),
        }
    }
}

fn default_selectors(banner_disjunction: &str) -> BTreeMap<String, RoleBinding> {
    let mut map = BTreeMap::new();
    let mut bind = |role: &str, binding: RoleBinding| {
        map.insert(role.to_string(), binding);
    };
    bind(
        roles::USERNAME_FIELD,
        RoleBinding::Many(vec![
            LocatorQuery::css("#user-name"),
            LocatorQuery::placeholder("Username"),
        ]),
    );
    bind(
        roles::PASSWORD_FIELD,
        RoleBinding::Many(vec![
            LocatorQuery::css("#password"),
            LocatorQuery::placeholder("Password"),
        ]),
    );
    bind(roles::LOGIN_BUTTON, RoleBinding::One(LocatorQuery::css("#login-button")));
    bind(roles::LANDING_MARKER, RoleBinding::One(LocatorQuery::css(".inventory_list")));
    bind(roles::LANDING_ITEM, RoleBinding::One(LocatorQuery::css(".inventory_item")));
    bind(
        roles::ERROR_BANNER,
        RoleBinding::Many(vec![
            LocatorQuery::css("[data-test=\"error\"]"),
            LocatorQuery::role("heading", Some(banner_disjunction), Some(3)),
        ]),
    );
    bind(roles::MENU_TOGGLE, RoleBinding::One(LocatorQuery::css("#react-burger-menu-btn")));
    bind(roles::LOGOUT_LINK, RoleBinding::One(LocatorQuery::css("#logout_sidebar_link")));
    map
}

fn default_credentials() -> BTreeMap<String, CredentialConfig> {
    let mut map = BTreeMap::new();
    map.insert("valid".to_string(), CredentialConfig::literal("standard_user", "secret_sauce"));
    map.insert(
        "invalid".to_string(),
        CredentialConfig::literal("invalid_user", "incorrect_password"),
    );
    map
}

impl ProbeConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> ProbeResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> ProbeResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations that could only produce meaningless verdicts
    pub fn validate(&self) -> ProbeResult<()> {
        Url::parse(&self.site.landing_url)?;
        Url::parse(&self.site.protected_url)?;
        if same_resource(&self.site.landing_url, &self.site.protected_url) {
            return Err(ProbeError::Config(
                "landing_url and protected_url point at the same resource".to_string(),
            ));
        }
        if self.wait.timeout_ms == 0 {
            return Err(ProbeError::Config("wait.timeout_ms must be positive".to_string()));
        }
        if self.leak.sensitive_patterns.is_empty() {
            return Err(ProbeError::Config(
                "leak.sensitive_patterns must not be empty".to_string(),
            ));
        }
        self.banner_matcher()?;
        self.sensitive_patterns()?;
        self.registry()?.ensure_required()?;
        Ok(())
    }

    /// Role registry; the error banner's accessible name follows `banner.patterns`
    pub fn registry(&self) -> ProbeResult<SelectorRegistry> {
        let banner = self.banner_matcher()?;
        Ok(SelectorRegistry::from_bindings(&self.selectors)?
            .with_role_name(roles::ERROR_BANNER, &banner.disjunction()))
    }

    pub fn banner_matcher(&self) -> ProbeResult<BannerMatcher> {
        BannerMatcher::new(&self.banner.patterns)
    }

    pub fn sensitive_patterns(&self) -> ProbeResult<Vec<SensitivePattern>> {
        SensitivePattern::compile_all(&self.leak.sensitive_patterns)
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        self.wait.policy()
    }

    /// Look up and resolve a named credential
    pub fn credential(&self, name: &str) -> ProbeResult<Credential> {
        self.credentials
            .get(name)
            .ok_or_else(|| ProbeError::Config(format!("no credential named '{}'", name)))?
            .resolve()
    }

    pub fn playwright(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            browser: self.browser.kind,
            headless: self.browser.headless,
            viewport_width: self.browser.viewport_width,
            viewport_height: self.browser.viewport_height,
            node_binary: self.browser.node_binary.clone(),
            request_timeout: self.wait_policy().timeout,
        }
    }
}
