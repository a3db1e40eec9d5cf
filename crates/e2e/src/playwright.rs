//! Playwright browser automation
//!
//! Each session runs one Node.js process hosting a small bridge script. The
//! bridge owns a fresh browser, context and page, and answers newline-delimited
//! JSON requests on stdin with JSON responses on stdout.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::driver::{BrowserDriver, DriverFactory, ElementHandle, StorageKind};
use crate::error::{ProbeError, ProbeResult};
use crate::registry::LocatorQuery;

/// Time allowed for the bridge to launch the browser
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Headroom on top of the action timeout before a request counts as lost
const REQUEST_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(ProbeError::Config(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub node_binary: PathBuf,
    /// Default timeout for fill/click/navigation inside the browser
    pub request_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_binary: PathBuf::from("node"),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// One request to the bridge; `id` is added on the wire
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeRequest {
    Navigate { url: String },
    Locate { handle: u64, query: LocatorQuery },
    Fill { handle: u64, text: String },
    Click { handle: u64 },
    WaitVisible { handle: u64, timeout_ms: u64 },
    IsVisible { handle: u64 },
    TextContent { handle: u64 },
    CurrentUrl,
    Cookies,
    Storage { area: String },
    Close,
}

impl BridgeRequest {
    /// Operation name for logs. Never includes filled text.
    fn op(&self) -> &'static str {
        match self {
            BridgeRequest::Navigate { .. } => "navigate",
            BridgeRequest::Locate { .. } => "locate",
            BridgeRequest::Fill { .. } => "fill",
            BridgeRequest::Click { .. } => "click",
            BridgeRequest::WaitVisible { .. } => "wait_visible",
            BridgeRequest::IsVisible { .. } => "is_visible",
            BridgeRequest::TextContent { .. } => "text_content",
            BridgeRequest::CurrentUrl => "current_url",
            BridgeRequest::Cookies => "cookies",
            BridgeRequest::Storage { .. } => "storage",
            BridgeRequest::Close => "close",
        }
    }
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: i64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

/// Check that Node.js can load the `playwright` package
pub fn check_playwright_installed(node_binary: &std::path::Path) -> ProbeResult<()> {
    let status = Command::new(node_binary)
        .args(["-e", "require.resolve('playwright')"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(ProbeError::PlaywrightNotFound),
    }
}

const BRIDGE_TEMPLATE: &str = r#"
const playwright = require('playwright');
const readline = require('readline');

(async () => {
  const browser = await playwright.__BROWSER__.launch({ headless: __HEADLESS__ });
  const context = await browser.newContext({
    viewport: { width: __WIDTH__, height: __HEIGHT__ }
  });
  const page = await context.newPage();
  page.setDefaultTimeout(__TIMEOUT_MS__);
  const handles = new Map();
  const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

  const locatorFor = (q) => {
    switch (q.by) {
      case 'role': {
        const opts = {};
        if (q.name) opts.name = new RegExp(q.name, 'i');
        if (q.level) opts.level = q.level;
        return page.getByRole(q.role, opts);
      }
      case 'label': return page.getByLabel(q.text);
      case 'placeholder': return page.getByPlaceholder(q.text);
      case 'test_id': return page.getByTestId(q.id);
      case 'text': return page.getByText(q.text).first();
      case 'css': return page.locator(q.selector).first();
    }
    throw new Error('unsupported query: ' + q.by);
  };

  const handle = (id) => {
    const locator = handles.get(id);
    if (!locator) throw new Error('unknown handle ' + id);
    return locator;
  };

  const dispatch = async (req) => {
    switch (req.op) {
      case 'navigate': await page.goto(req.url); return null;
      case 'locate': handles.set(req.handle, locatorFor(req.query)); return null;
      case 'fill': await handle(req.handle).fill(req.text); return null;
      case 'click': await handle(req.handle).click(); return null;
      case 'wait_visible':
        try {
          await handle(req.handle).waitFor({ state: 'visible', timeout: req.timeout_ms });
          return true;
        } catch (e) {
          if (e.name === 'TimeoutError') return false;
          throw e;
        }
      case 'is_visible': return await handle(req.handle).isVisible();
      case 'text_content': return await handle(req.handle).textContent();
      case 'current_url': return page.url();
      case 'cookies': return (await context.cookies()).map((c) => [c.name, c.value]);
      case 'storage':
        return await page.evaluate((area) => {
          try { return { ...window[area] }; } catch (e) { return {}; }
        }, req.area);
      case 'close': await browser.close(); return null;
    }
    throw new Error('unknown op ' + req.op);
  };

  reply({ id: 0, ok: true, value: 'ready' });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let req;
    try {
      req = JSON.parse(line);
    } catch (e) {
      reply({ id: -1, ok: false, error: 'malformed request' });
      continue;
    }
    try {
      reply({ id: req.id, ok: true, value: await dispatch(req) });
    } catch (e) {
      reply({ id: req.id, ok: false, error: String((e && e.message) || e) });
    }
    if (req.op === 'close') break;
  }
  process.exit(0);
})().catch((e) => {
  process.stderr.write(String((e && e.stack) || e) + '\n');
  process.exit(1);
});
"#;

/// Render the bridge script for a configuration
pub fn build_bridge_script(config: &PlaywrightConfig) -> String {
    BRIDGE_TEMPLATE
        .replace("__BROWSER__", config.browser.as_str())
        .replace("__HEADLESS__", if config.headless { "true" } else { "false" })
        .replace("__WIDTH__", &config.viewport_width.to_string())
        .replace("__HEIGHT__", &config.viewport_height.to_string())
        .replace("__TIMEOUT_MS__", &config.request_timeout.as_millis().to_string())
}

/// A live browser session behind the Node.js bridge
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: i64,
    next_handle: u64,
    request_timeout: Duration,
    closed: bool,
    // Holds the bridge script until the session ends
    _script_dir: TempDir,
}

impl PlaywrightDriver {
    /// Launch a fresh browser, context and page
    pub async fn launch(config: PlaywrightConfig) -> ProbeResult<Self> {
        check_playwright_installed(&config.node_binary)?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, build_bridge_script(&config))?;

        debug!("Launching Playwright bridge: {}", script_path.display());

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProbeError::Driver(format!(
                    "Failed to spawn {}: {}",
                    config.node_binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProbeError::Driver("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProbeError::Driver("bridge stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[bridge] {}", line);
                }
            });
        }

        let mut driver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            next_handle: 1,
            request_timeout: config.request_timeout,
            closed: false,
            _script_dir: script_dir,
        };

        let ready = driver.read_response(0, LAUNCH_TIMEOUT).await?;
        debug!("Bridge ready: {}", ready);
        info!("Launched {} session", config.browser.as_str());
        Ok(driver)
    }

    async fn request(&mut self, request: BridgeRequest) -> ProbeResult<serde_json::Value> {
        self.request_with_timeout(request, self.request_timeout).await
    }

    async fn request_with_timeout(
        &mut self,
        request: BridgeRequest,
        budget: Duration,
    ) -> ProbeResult<serde_json::Value> {
        if self.closed {
            return Err(ProbeError::Driver("session already closed".to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        let op = request.op();

        let mut wire = serde_json::to_value(&request)?;
        wire["id"] = serde_json::json!(id);
        let mut line = serde_json::to_string(&wire)?;
        line.push('\n');

        debug!("bridge -> {} #{}", op, id);
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        self.read_response(id, budget + REQUEST_GRACE).await
    }

    async fn read_response(&mut self, id: i64, budget: Duration) -> ProbeResult<serde_json::Value> {
        timeout(budget, self.next_response(id))
            .await
            .map_err(|_| ProbeError::Timeout(format!("bridge reply #{} after {:?}", id, budget)))?
    }

    /// Read until the response for `id` arrives; stale replies are skipped
    async fn next_response(&mut self, id: i64) -> ProbeResult<serde_json::Value> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| ProbeError::Driver("Playwright bridge exited".to_string()))?;
            let response: BridgeResponse = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(_) => {
                    debug!("[bridge stdout] {}", line);
                    continue;
                }
            };
            if response.id != id {
                debug!("Discarding stale bridge reply #{}", response.id);
                continue;
            }
            return if response.ok {
                Ok(response.value)
            } else {
                Err(ProbeError::Driver(
                    response.error.unwrap_or_else(|| "unknown bridge error".to_string()),
                ))
            };
        }
    }

    fn handle_for(&mut self, query: &LocatorQuery) -> ElementHandle {
        let id = self.next_handle;
        self.next_handle += 1;
        ElementHandle {
            id,
            query: query.clone(),
        }
    }

    /// Ask the process to exit, escalating to SIGTERM and then kill
    async fn terminate(&mut self) {
        if let Ok(Ok(_)) = timeout(Duration::from_secs(2), self.child.wait()).await {
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && timeout(Duration::from_millis(500), self.child.wait()).await.is_ok()
                {
                    return;
                }
            }
        }

        let _ = self.child.kill().await;
    }
}

fn as_bool(value: serde_json::Value) -> ProbeResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| ProbeError::Driver(format!("expected boolean from bridge, got {}", value)))
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        self.request(BridgeRequest::Navigate { url: url.to_string() }).await?;
        Ok(())
    }

    async fn locate(&mut self, query: &LocatorQuery) -> ProbeResult<ElementHandle> {
        let handle = self.handle_for(query);
        self.request(BridgeRequest::Locate {
            handle: handle.id,
            query: query.clone(),
        })
        .await?;
        Ok(handle)
    }

    async fn fill(&mut self, handle: &ElementHandle, text: &str) -> ProbeResult<()> {
        self.request(BridgeRequest::Fill {
            handle: handle.id,
            text: text.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn click(&mut self, handle: &ElementHandle) -> ProbeResult<()> {
        self.request(BridgeRequest::Click { handle: handle.id }).await?;
        Ok(())
    }

    async fn wait_visible(&mut self, handle: &ElementHandle, wait: Duration) -> ProbeResult<bool> {
        let value = self
            .request_with_timeout(
                BridgeRequest::WaitVisible {
                    handle: handle.id,
                    timeout_ms: wait.as_millis() as u64,
                },
                wait,
            )
            .await?;
        as_bool(value)
    }

    async fn is_visible(&mut self, handle: &ElementHandle) -> ProbeResult<bool> {
        let value = self.request(BridgeRequest::IsVisible { handle: handle.id }).await?;
        as_bool(value)
    }

    async fn text_content(&mut self, handle: &ElementHandle) -> ProbeResult<Option<String>> {
        let value = self.request(BridgeRequest::TextContent { handle: handle.id }).await?;
        Ok(value.as_str().map(String::from))
    }

    async fn current_url(&mut self) -> ProbeResult<String> {
        let value = self.request(BridgeRequest::CurrentUrl).await?;
        value
            .as_str()
            .map(String::from)
            .ok_or_else(|| ProbeError::Driver("bridge returned no URL".to_string()))
    }

    async fn read_cookies(&mut self) -> ProbeResult<Vec<(String, String)>> {
        let value = self.request(BridgeRequest::Cookies).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn read_storage(&mut self, kind: StorageKind) -> ProbeResult<BTreeMap<String, String>> {
        let value = self
            .request(BridgeRequest::Storage {
                area: kind.js_name().to_string(),
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn close(&mut self) -> ProbeResult<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.request(BridgeRequest::Close).await.map(|_| ());
        self.closed = true;
        if let Err(e) = &result {
            warn!("Bridge did not close cleanly: {}", e);
        }
        self.terminate().await;
        result
    }
}

impl Drop for PlaywrightDriver {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.child.start_kill();
        }
    }
}

/// Opens one Playwright session per scenario
#[derive(Debug, Clone, Default)]
pub struct PlaywrightFactory {
    config: PlaywrightConfig,
}

impl PlaywrightFactory {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for PlaywrightFactory {
    type Driver = PlaywrightDriver;

    async fn open_session(&self) -> ProbeResult<PlaywrightDriver> {
        PlaywrightDriver::launch(self.config.clone()).await
    }
}
