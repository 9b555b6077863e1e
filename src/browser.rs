//! Browser session abstraction for driving a live page.
//!
//! This module provides a unified interface over browser automation:
//! - `DriverBrowser` talks to an external driver process over a
//!   newline-delimited JSON protocol (navigation, clicks, screenshots)
//! - `MockBrowser` is a scriptable fake for testing the pipeline without a
//!   real browser
//!
//! The session is an exclusively-owned resource: acquired at run start and
//! closed unconditionally at run end, on every exit path.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Cursor, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use image::{ImageBuffer, RgbImage};

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Errors that can occur while driving a browser session
#[derive(Debug)]
pub enum BrowserError {
    /// The action did not complete within its timeout
    ActionTimeout(String),

    /// The selector did not resolve to an element
    ElementNotFound(String),

    /// Navigation failed (bad URL, connection refused, ...)
    Navigation(String),

    /// Session-level failure (driver died, protocol violation, launch failure)
    Session(String),

    /// I/O error talking to the driver
    Io(std::io::Error),
}

impl BrowserError {
    /// Timeouts, missing elements and navigation errors are retryable within
    /// a step's retry budget; session failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrowserError::ActionTimeout(_)
                | BrowserError::ElementNotFound(_)
                | BrowserError::Navigation(_)
        )
    }
}

impl std::fmt::Display for BrowserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserError::ActionTimeout(msg) => write!(f, "Action timeout: {}", msg),
            BrowserError::ElementNotFound(msg) => write!(f, "Element not found: {}", msg),
            BrowserError::Navigation(msg) => write!(f, "Navigation error: {}", msg),
            BrowserError::Session(msg) => write!(f, "Session error: {}", msg),
            BrowserError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for BrowserError {}

impl From<std::io::Error> for BrowserError {
    fn from(err: std::io::Error) -> Self {
        BrowserError::Io(err)
    }
}

/// Trait for live browser sessions
///
/// Implementations provide the browser-automation primitives the step runner
/// drives; everything above this trait is browser-agnostic.
pub trait BrowserSession {
    /// Load a URL and wait for network idle
    fn navigate(&mut self, url: &str, timeout_ms: u64) -> BrowserResult<()>;

    /// Click the element matching the selector
    fn click(&mut self, selector: &str, timeout_ms: u64) -> BrowserResult<()>;

    /// Fill the element matching the selector with text
    fn fill(&mut self, selector: &str, value: &str, timeout_ms: u64) -> BrowserResult<()>;

    /// Choose an option on the select element matching the selector
    fn select_option(&mut self, selector: &str, value: &str, timeout_ms: u64) -> BrowserResult<()>;

    /// Hover over the element matching the selector
    fn hover(&mut self, selector: &str, timeout_ms: u64) -> BrowserResult<()>;

    /// Scroll the viewport to a vertical pixel offset
    fn scroll_to(&mut self, y: u32) -> BrowserResult<()>;

    /// Scroll the element matching the selector into view
    fn scroll_into_view(&mut self, selector: &str) -> BrowserResult<()>;

    /// Suspend for the given duration
    fn wait(&mut self, ms: u64) -> BrowserResult<()> {
        thread::sleep(Duration::from_millis(ms));
        Ok(())
    }

    /// Capture the current viewport (not full page) as PNG bytes
    fn screenshot(&mut self) -> BrowserResult<Vec<u8>>;

    /// The rendered page content
    fn page_content(&mut self) -> BrowserResult<String>;

    /// Whether the selector resolves to at least one element
    fn element_exists(&mut self, selector: &str) -> BrowserResult<bool>;

    /// Tear the session down. Idempotent; called on every exit path.
    fn close(&mut self);
}

// =============================================================================
// Mock browser for testing
// =============================================================================

/// A scriptable fake browser session
///
/// Provides a full scripting API for pipeline tests:
/// - `page()` - register page content per URL
/// - `element()` - register selectors that resolve
/// - `fail_times()` - make the next N calls of an action time out
/// - `screenshot_color()` - control the rendered screenshot pixels
///
/// Every performed action is appended to `log` for assertions.
#[derive(Debug, Clone)]
pub struct MockBrowser {
    /// Registered page content, keyed by URL
    pages: HashMap<String, String>,
    /// Selectors that resolve to elements
    elements: HashSet<String>,
    /// Remaining scripted failures per action name
    failures: HashMap<String, u32>,
    /// URL of the currently loaded page
    current_url: Option<String>,
    /// Solid fill color of rendered screenshots
    fill: [u8; 3],
    /// Viewport size of rendered screenshots
    viewport: (u32, u32),
    /// Log of performed actions, in order
    pub log: Vec<String>,
    /// Whether `close` has been called
    pub closed: bool,
}

impl MockBrowser {
    /// Create a mock browser with an empty page registry
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            elements: HashSet::new(),
            failures: HashMap::new(),
            current_url: None,
            fill: [32, 32, 32],
            viewport: (320, 200),
            log: Vec::new(),
            closed: false,
        }
    }

    /// Register page content for a URL
    pub fn page(mut self, url: impl Into<String>, content: impl Into<String>) -> Self {
        self.pages.insert(url.into(), content.into());
        self
    }

    /// Register a selector that resolves
    pub fn element(mut self, selector: impl Into<String>) -> Self {
        self.elements.insert(selector.into());
        self
    }

    /// Script the next `times` calls of `action` to fail with a timeout
    pub fn fail_times(mut self, action: &str, times: u32) -> Self {
        self.failures.insert(action.to_string(), times);
        self
    }

    /// Set the solid fill color of rendered screenshots
    pub fn screenshot_color(mut self, color: [u8; 3]) -> Self {
        self.fill = color;
        self
    }

    /// Set the rendered viewport size
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    /// Number of times `action` appears in the log
    pub fn attempts(&self, action: &str) -> usize {
        self.log
            .iter()
            .filter(|entry| entry.starts_with(action))
            .count()
    }

    fn consume_failure(&mut self, action: &str) -> BrowserResult<()> {
        if let Some(remaining) = self.failures.get_mut(action) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BrowserError::ActionTimeout(format!(
                    "scripted failure for '{}'",
                    action
                )));
            }
        }
        Ok(())
    }

    fn require_element(&self, selector: &str) -> BrowserResult<()> {
        if self.elements.contains(selector) {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(selector.to_string()))
        }
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserSession for MockBrowser {
    fn navigate(&mut self, url: &str, _timeout_ms: u64) -> BrowserResult<()> {
        self.log.push(format!("navigate {}", url));
        self.consume_failure("navigate")?;
        self.current_url = Some(url.to_string());
        Ok(())
    }

    fn click(&mut self, selector: &str, _timeout_ms: u64) -> BrowserResult<()> {
        self.log.push(format!("click {}", selector));
        self.consume_failure("click")?;
        self.require_element(selector)
    }

    fn fill(&mut self, selector: &str, value: &str, _timeout_ms: u64) -> BrowserResult<()> {
        self.log.push(format!("fill {} {}", selector, value));
        self.consume_failure("fill")?;
        self.require_element(selector)
    }

    fn select_option(&mut self, selector: &str, value: &str, _timeout_ms: u64) -> BrowserResult<()> {
        self.log.push(format!("select {} {}", selector, value));
        self.consume_failure("select")?;
        self.require_element(selector)
    }

    fn hover(&mut self, selector: &str, _timeout_ms: u64) -> BrowserResult<()> {
        self.log.push(format!("hover {}", selector));
        self.consume_failure("hover")?;
        self.require_element(selector)
    }

    fn scroll_to(&mut self, y: u32) -> BrowserResult<()> {
        self.log.push(format!("scroll_to {}", y));
        Ok(())
    }

    fn scroll_into_view(&mut self, selector: &str) -> BrowserResult<()> {
        self.log.push(format!("scroll_into_view {}", selector));
        Ok(())
    }

    fn wait(&mut self, ms: u64) -> BrowserResult<()> {
        self.log.push(format!("wait {}", ms));
        Ok(())
    }

    fn screenshot(&mut self) -> BrowserResult<Vec<u8>> {
        self.log.push("screenshot".to_string());
        self.consume_failure("screenshot")?;
        let (width, height) = self.viewport;
        let fill = self.fill;
        let img: RgbImage = ImageBuffer::from_fn(width, height, |_, _| image::Rgb(fill));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| BrowserError::Session(format!("Failed to encode PNG: {}", e)))?;
        Ok(bytes)
    }

    fn page_content(&mut self) -> BrowserResult<String> {
        let content = self
            .current_url
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .cloned()
            .unwrap_or_default();
        Ok(content)
    }

    fn element_exists(&mut self, selector: &str) -> BrowserResult<bool> {
        Ok(self.elements.contains(selector))
    }

    fn close(&mut self) {
        self.closed = true;
        self.log.push("close".to_string());
    }
}

// =============================================================================
// External driver session
// =============================================================================

/// Extra headroom over the action timeout when waiting on the driver, so the
/// driver's own timeout fires first and reports the precise error kind.
const DRIVER_GRACE_MS: u64 = 2_000;

/// Browser session backed by an external driver process.
///
/// The driver speaks a newline-delimited JSON protocol on stdin/stdout: one
/// request object per line in, one response object per line out, in order.
/// Requests carry a `cmd` field; responses carry `ok` plus either result
/// fields or `error`/`message`.
pub struct DriverBrowser {
    child: Child,
    stdin: std::process::ChildStdin,
    rx: mpsc::Receiver<std::io::Result<String>>,
    closed: bool,
}

impl DriverBrowser {
    /// Launch the driver command and set the viewport.
    ///
    /// A spawn failure here is a session-setup failure: the caller should
    /// abort the whole run rather than retry.
    pub fn launch(command: &str, viewport_width: u32, viewport_height: u32) -> BrowserResult<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| BrowserError::Session("empty driver command".to_string()))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BrowserError::Session(format!("Failed to launch driver '{}': {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BrowserError::Session("Failed to open driver stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BrowserError::Session("Failed to open driver stdout".to_string()))?;

        // Reader thread forwards response lines
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });

        let mut session = Self {
            child,
            stdin,
            rx,
            closed: false,
        };

        session.request(
            &serde_json::json!({
                "cmd": "launch",
                "width": viewport_width,
                "height": viewport_height,
            }),
            30_000,
        )?;

        Ok(session)
    }

    /// Send one request line and wait for the matching response line
    fn request(
        &mut self,
        payload: &serde_json::Value,
        timeout_ms: u64,
    ) -> BrowserResult<serde_json::Value> {
        let line = serde_json::to_string(payload)
            .map_err(|e| BrowserError::Session(format!("Failed to encode request: {}", e)))?;
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()?;

        let deadline = Duration::from_millis(timeout_ms + DRIVER_GRACE_MS);
        match self.rx.recv_timeout(deadline) {
            Ok(Ok(line)) => {
                let response: serde_json::Value = serde_json::from_str(&line)
                    .map_err(|e| BrowserError::Session(format!("Invalid driver response: {}", e)))?;
                if response["ok"].as_bool() == Some(true) {
                    Ok(response)
                } else {
                    Err(driver_error(&response))
                }
            }
            Ok(Err(e)) => Err(BrowserError::Io(e)),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(BrowserError::ActionTimeout(format!(
                "driver did not respond within {}ms",
                timeout_ms
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(BrowserError::Session("driver process exited".to_string()))
            }
        }
    }
}

/// Map a driver error response onto the matching error kind
fn driver_error(response: &serde_json::Value) -> BrowserError {
    let message = response["message"]
        .as_str()
        .unwrap_or("driver reported an error")
        .to_string();
    match response["error"].as_str() {
        Some("timeout") => BrowserError::ActionTimeout(message),
        Some("not-found") => BrowserError::ElementNotFound(message),
        Some("navigation") => BrowserError::Navigation(message),
        _ => BrowserError::Session(message),
    }
}

impl BrowserSession for DriverBrowser {
    fn navigate(&mut self, url: &str, timeout_ms: u64) -> BrowserResult<()> {
        self.request(
            &serde_json::json!({"cmd": "navigate", "url": url, "timeoutMs": timeout_ms}),
            timeout_ms,
        )?;
        Ok(())
    }

    fn click(&mut self, selector: &str, timeout_ms: u64) -> BrowserResult<()> {
        self.request(
            &serde_json::json!({"cmd": "click", "selector": selector, "timeoutMs": timeout_ms}),
            timeout_ms,
        )?;
        Ok(())
    }

    fn fill(&mut self, selector: &str, value: &str, timeout_ms: u64) -> BrowserResult<()> {
        self.request(
            &serde_json::json!({
                "cmd": "fill", "selector": selector, "value": value, "timeoutMs": timeout_ms
            }),
            timeout_ms,
        )?;
        Ok(())
    }

    fn select_option(&mut self, selector: &str, value: &str, timeout_ms: u64) -> BrowserResult<()> {
        self.request(
            &serde_json::json!({
                "cmd": "select", "selector": selector, "value": value, "timeoutMs": timeout_ms
            }),
            timeout_ms,
        )?;
        Ok(())
    }

    fn hover(&mut self, selector: &str, timeout_ms: u64) -> BrowserResult<()> {
        self.request(
            &serde_json::json!({"cmd": "hover", "selector": selector, "timeoutMs": timeout_ms}),
            timeout_ms,
        )?;
        Ok(())
    }

    fn scroll_to(&mut self, y: u32) -> BrowserResult<()> {
        self.request(&serde_json::json!({"cmd": "scrollTo", "y": y}), 5_000)?;
        Ok(())
    }

    fn scroll_into_view(&mut self, selector: &str) -> BrowserResult<()> {
        self.request(
            &serde_json::json!({"cmd": "scrollIntoView", "selector": selector}),
            5_000,
        )?;
        Ok(())
    }

    fn screenshot(&mut self) -> BrowserResult<Vec<u8>> {
        let response = self.request(&serde_json::json!({"cmd": "screenshot"}), 30_000)?;
        let encoded = response["dataBase64"]
            .as_str()
            .ok_or_else(|| BrowserError::Session("screenshot response missing data".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| BrowserError::Session(format!("Invalid screenshot payload: {}", e)))
    }

    fn page_content(&mut self) -> BrowserResult<String> {
        let response = self.request(&serde_json::json!({"cmd": "content"}), 10_000)?;
        Ok(response["content"].as_str().unwrap_or_default().to_string())
    }

    fn element_exists(&mut self, selector: &str) -> BrowserResult<bool> {
        let response = self.request(
            &serde_json::json!({"cmd": "exists", "selector": selector}),
            5_000,
        )?;
        Ok(response["exists"].as_bool().unwrap_or(false))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.request(&serde_json::json!({"cmd": "close"}), 5_000);
        if self.child.try_wait().ok().flatten().is_none() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

impl Drop for DriverBrowser {
    fn drop(&mut self) {
        self.close();
    }
}
