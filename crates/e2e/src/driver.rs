//! Browser driver seam
//!
//! The verification core never talks to a browser directly. Everything it
//! observes or does goes through [`BrowserDriver`], one instance per scenario.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProbeResult;
use crate::registry::LocatorQuery;

/// Browser storage area
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Local,
    Session,
}

impl StorageKind {
    /// Name of the `window` property holding this storage
    pub fn js_name(&self) -> &'static str {
        match self {
            StorageKind::Local => "localStorage",
            StorageKind::Session => "sessionStorage",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.js_name())
    }
}

/// Opaque reference to a located element.
///
/// Locating is lazy: a handle exists even when nothing on the page matches yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub id: u64,
    pub query: LocatorQuery,
}

#[async_trait]
pub trait BrowserDriver: Send {
    async fn navigate(&mut self, url: &str) -> ProbeResult<()>;

    async fn locate(&mut self, query: &LocatorQuery) -> ProbeResult<ElementHandle>;

    async fn fill(&mut self, handle: &ElementHandle, text: &str) -> ProbeResult<()>;

    async fn click(&mut self, handle: &ElementHandle) -> ProbeResult<()>;

    /// Wait up to `timeout` for the element to become visible
    async fn wait_visible(&mut self, handle: &ElementHandle, timeout: Duration) -> ProbeResult<bool>;

    /// Visibility right now, without waiting
    async fn is_visible(&mut self, handle: &ElementHandle) -> ProbeResult<bool>;

    async fn text_content(&mut self, handle: &ElementHandle) -> ProbeResult<Option<String>>;

    async fn current_url(&mut self) -> ProbeResult<String>;

    async fn read_cookies(&mut self) -> ProbeResult<Vec<(String, String)>>;

    async fn read_storage(&mut self, kind: StorageKind) -> ProbeResult<BTreeMap<String, String>>;

    /// Discard the session. Called exactly once when a scenario ends.
    async fn close(&mut self) -> ProbeResult<()>;
}

/// Opens isolated driver sessions, one per scenario
#[async_trait]
pub trait DriverFactory: Send + Sync {
    type Driver: BrowserDriver;

    async fn open_session(&self) -> ProbeResult<Self::Driver>;
}
