//! In-process stand-in for the demo storefront
//!
//! Implements `BrowserDriver` over a tiny model of the login page, the
//! inventory page and the side menu. Faults can be switched on to make the
//! application misbehave in the ways a run must catch.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authprobe_e2e::{
    BrowserDriver, DriverFactory, ElementHandle, LocatorQuery, ProbeConfig, ProbeError,
    ProbeResult, StorageKind,
};
use regex::RegexBuilder;

pub const LANDING: &str = "https://www.saucedemo.com/";
pub const PROTECTED: &str = "https://www.saucedemo.com/inventory.html";

pub const VALID_USER: &str = "standard_user";
pub const VALID_SECRET: &str = "secret_sauce";

pub const DEFAULT_BANNER: &str = "Epic sadface: Username and password do not match any user in this service";
const DIRECT_ACCESS_BANNER: &str = "Epic sadface: You can only access '/inventory.html' when you are logged in.";

/// Ways the simulated application can misbehave
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Failed logins still set an authorization cookie
    pub leak_cookie_on_failure: bool,
    /// Logout leaves an auth token in localStorage
    pub leak_storage_after_logout: bool,
    /// Error banner wording shown on failed login
    pub banner_text: Option<String>,
    /// The inventory list never renders
    pub marker_never_appears: bool,
    /// The protected page is served without a session
    pub direct_access_allowed: bool,
    /// The logout link does nothing
    pub logout_broken: bool,
    /// Direct access shows the login form without leaving the protected URL
    pub login_at_protected_url: bool,
    /// Visibility waits never answer
    pub stall_visibility: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Username,
    Password,
    LoginButton,
    Banner,
    Marker,
    Item,
    Menu,
    LogoutLink,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Page {
    Login { error: Option<String> },
    Inventory { menu_open: bool },
}

pub struct SimulatedApp {
    faults: Faults,
    url: String,
    page: Page,
    user: Option<String>,
    cookies: BTreeMap<String, String>,
    local: BTreeMap<String, String>,
    session: BTreeMap<String, String>,
    fields: BTreeMap<&'static str, String>,
    next_handle: u64,
    closed: Arc<AtomicUsize>,
}

impl SimulatedApp {
    pub fn new(faults: Faults) -> Self {
        Self::with_counter(faults, Arc::new(AtomicUsize::new(0)))
    }

    fn with_counter(faults: Faults, closed: Arc<AtomicUsize>) -> Self {
        Self {
            faults,
            url: "about:blank".to_string(),
            page: Page::Login { error: None },
            user: None,
            cookies: BTreeMap::new(),
            local: BTreeMap::new(),
            session: BTreeMap::new(),
            fields: BTreeMap::new(),
            next_handle: 1,
            closed,
        }
    }

    fn element(query: &LocatorQuery) -> Element {
        match query {
            LocatorQuery::Placeholder { text } if text == "Username" => Element::Username,
            LocatorQuery::Placeholder { text } if text == "Password" => Element::Password,
            LocatorQuery::Role { role, .. } if role == "heading" => Element::Banner,
            LocatorQuery::Css { selector } => match selector.as_str() {
                "#user-name" => Element::Username,
                "#password" => Element::Password,
                "#login-button" => Element::LoginButton,
                "[data-test=\"error\"]" => Element::Banner,
                ".inventory_list" => Element::Marker,
                ".inventory_item" => Element::Item,
                "#react-burger-menu-btn" => Element::Menu,
                "#logout_sidebar_link" => Element::LogoutLink,
                _ => Element::Unknown,
            },
            _ => Element::Unknown,
        }
    }

    fn visible(&self, handle: &ElementHandle) -> bool {
        match (Self::element(&handle.query), &self.page) {
            (Element::Username | Element::Password | Element::LoginButton, Page::Login { .. }) => true,
            (Element::Banner, Page::Login { error: Some(text) }) => match &handle.query {
                LocatorQuery::Role { name: Some(name), .. } => RegexBuilder::new(name)
                    .case_insensitive(true)
                    .build()
                    .map(|re| re.is_match(text))
                    .unwrap_or(false),
                _ => true,
            },
            (Element::Marker | Element::Item, Page::Inventory { .. }) => !self.faults.marker_never_appears,
            (Element::Menu, Page::Inventory { .. }) => true,
            (Element::LogoutLink, Page::Inventory { menu_open }) => *menu_open,
            _ => false,
        }
    }

    fn require_visible(&self, handle: &ElementHandle) -> ProbeResult<Element> {
        if self.visible(handle) {
            Ok(Self::element(&handle.query))
        } else {
            Err(ProbeError::Driver(format!("{} is not visible", handle.query)))
        }
    }

    fn show_login(&mut self, error: Option<String>) {
        self.url = LANDING.to_string();
        self.page = Page::Login { error };
        self.fields.clear();
    }

    fn show_inventory(&mut self) {
        self.url = PROTECTED.to_string();
        self.page = Page::Inventory { menu_open: false };
    }

    fn attempt_login(&mut self) {
        let user = self.fields.get("username").cloned().unwrap_or_default();
        let secret = self.fields.get("password").cloned().unwrap_or_default();
        if user == VALID_USER && secret == VALID_SECRET {
            self.cookies.insert("session-username".to_string(), user.clone());
            self.user = Some(user);
            self.show_inventory();
        } else {
            if self.faults.leak_cookie_on_failure {
                self.cookies.insert("session-token".to_string(), "leaked-value".to_string());
            }
            let text = self
                .faults
                .banner_text
                .clone()
                .unwrap_or_else(|| DEFAULT_BANNER.to_string());
            self.show_login(Some(text));
        }
    }

    fn logout(&mut self) {
        if self.faults.logout_broken {
            return;
        }
        self.cookies.remove("session-username");
        self.user = None;
        if self.faults.leak_storage_after_logout {
            self.local.insert("auth-token".to_string(), "stale".to_string());
        }
        self.show_login(None);
    }
}

#[async_trait]
impl BrowserDriver for SimulatedApp {
    async fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        if url == PROTECTED {
            if self.user.is_some() || self.faults.direct_access_allowed {
                self.show_inventory();
            } else {
                self.show_login(Some(DIRECT_ACCESS_BANNER.to_string()));
                if self.faults.login_at_protected_url {
                    self.url = PROTECTED.to_string();
                }
            }
        } else {
            self.show_login(None);
        }
        Ok(())
    }

    async fn locate(&mut self, query: &LocatorQuery) -> ProbeResult<ElementHandle> {
        let id = self.next_handle;
        self.next_handle += 1;
        Ok(ElementHandle {
            id,
            query: query.clone(),
        })
    }

    async fn fill(&mut self, handle: &ElementHandle, text: &str) -> ProbeResult<()> {
        let key = match self.require_visible(handle)? {
            Element::Username => "username",
            Element::Password => "password",
            other => return Err(ProbeError::Driver(format!("cannot fill {:?}", other))),
        };
        self.fields.insert(key, text.to_string());
        Ok(())
    }

    async fn click(&mut self, handle: &ElementHandle) -> ProbeResult<()> {
        match self.require_visible(handle)? {
            Element::LoginButton => self.attempt_login(),
            Element::Menu => self.page = Page::Inventory { menu_open: true },
            Element::LogoutLink => self.logout(),
            _ => {}
        }
        Ok(())
    }

    async fn wait_visible(&mut self, handle: &ElementHandle, timeout: Duration) -> ProbeResult<bool> {
        if self.faults.stall_visibility {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.visible(handle) {
            return Ok(true);
        }
        tokio::time::sleep(timeout).await;
        Ok(self.visible(handle))
    }

    async fn is_visible(&mut self, handle: &ElementHandle) -> ProbeResult<bool> {
        Ok(self.visible(handle))
    }

    async fn text_content(&mut self, handle: &ElementHandle) -> ProbeResult<Option<String>> {
        Ok(match (Self::element(&handle.query), &self.page) {
            (Element::Banner, Page::Login { error }) => error.clone(),
            _ => None,
        })
    }

    async fn current_url(&mut self) -> ProbeResult<String> {
        Ok(self.url.clone())
    }

    async fn read_cookies(&mut self) -> ProbeResult<Vec<(String, String)>> {
        Ok(self.cookies.clone().into_iter().collect())
    }

    async fn read_storage(&mut self, kind: StorageKind) -> ProbeResult<BTreeMap<String, String>> {
        Ok(match kind {
            StorageKind::Local => self.local.clone(),
            StorageKind::Session => self.session.clone(),
        })
    }

    async fn close(&mut self) -> ProbeResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one fresh simulated session per scenario
#[derive(Clone, Default)]
pub struct SimulatedFactory {
    pub faults: Faults,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl SimulatedFactory {
    pub fn new(faults: Faults) -> Self {
        Self {
            faults,
            ..Default::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverFactory for SimulatedFactory {
    type Driver = SimulatedApp;

    async fn open_session(&self) -> ProbeResult<SimulatedApp> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(SimulatedApp::with_counter(self.faults.clone(), self.closed.clone()))
    }
}

/// Run one scenario with an explicit configuration
pub async fn run_with(
    config: ProbeConfig,
    faults: Faults,
    spec: &authprobe_e2e::ScenarioSpec,
) -> authprobe_e2e::ScenarioResult {
    let runner = authprobe_e2e::ScenarioRunner::new(config, SimulatedFactory::new(faults))
        .expect("valid test configuration");
    runner.run_scenario(spec).await
}

/// Default configuration with waits short enough for tests
pub fn fast_config() -> ProbeConfig {
    let mut config = ProbeConfig::default();
    config.wait.timeout_ms = 150;
    config.wait.poll_interval_ms = 5;
    config
}
