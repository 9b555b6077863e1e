//! Executes one scripted step against a live browser session.
//!
//! Owns the per-step retry/timeout policy: the action is attempted up to
//! `retries + 1` times, with a fixed backoff between attempts. Retryable
//! failures (timeout, missing element, navigation) consume the budget;
//! session-level failures propagate immediately.

use std::path::PathBuf;
use std::time::Instant;

use crate::artifacts::ArtifactStore;
use crate::browser::{BrowserResult, BrowserSession};
use crate::scenario::{ActionKind, Step, DEFAULT_WAIT_MS};

/// Backoff between retry attempts (milliseconds)
pub const RETRY_BACKOFF_MS: u64 = 1_000;

/// Tunable knobs for action execution
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Wait between retry attempts (milliseconds)
    pub backoff_ms: u64,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            backoff_ms: RETRY_BACKOFF_MS,
        }
    }
}

/// What a successfully executed action produced
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// Screenshot written by an explicit `screenshot` action
    pub screenshot: Option<PathBuf>,

    /// Elapsed time of the successful attempt (milliseconds)
    pub duration_ms: u64,
}

/// Execute a step's action, honoring its retry budget.
///
/// `step_number` is the 1-based position used for default screenshot names.
pub fn execute_action(
    session: &mut dyn BrowserSession,
    step: &Step,
    step_number: usize,
    base_url: &str,
    store: &ArtifactStore,
    opts: &ExecOptions,
) -> BrowserResult<ActionOutcome> {
    let mut remaining = step.retries;

    loop {
        let start = Instant::now();
        match perform(session, step, step_number, base_url, store) {
            Ok(screenshot) => {
                return Ok(ActionOutcome {
                    screenshot,
                    duration_ms: start.elapsed().as_millis() as u64,
                });
            }
            Err(err) if err.is_retryable() && remaining > 0 => {
                remaining -= 1;
                session.wait(opts.backoff_ms)?;
            }
            Err(err) => return Err(err),
        }
    }
}

/// One attempt at the action
fn perform(
    session: &mut dyn BrowserSession,
    step: &Step,
    step_number: usize,
    base_url: &str,
    store: &ArtifactStore,
) -> BrowserResult<Option<PathBuf>> {
    let timeout_ms = step.effective_timeout_ms();

    match step.action {
        ActionKind::Navigate => {
            let url = step.value.as_deref().unwrap_or(base_url);
            session.navigate(url, timeout_ms)?;
        }
        ActionKind::Click => {
            session.click(required_selector(step)?, timeout_ms)?;
        }
        ActionKind::Type => {
            session.fill(required_selector(step)?, required_value(step)?, timeout_ms)?;
        }
        ActionKind::Select => {
            session.select_option(required_selector(step)?, required_value(step)?, timeout_ms)?;
        }
        ActionKind::Hover => {
            session.hover(required_selector(step)?, timeout_ms)?;
        }
        ActionKind::Scroll => {
            // Pixel offset wins over selector; with neither this is a no-op
            if let Some(offset) = step.value.as_deref().and_then(|v| v.parse::<u32>().ok()) {
                session.scroll_to(offset)?;
            } else if let Some(selector) = step.selector.as_deref() {
                session.scroll_into_view(selector)?;
            }
        }
        ActionKind::Screenshot => {
            let name = step
                .name
                .clone()
                .unwrap_or_else(|| format!("step-{}", step_number));
            let bytes = session.screenshot()?;
            let path = store
                .save_screenshot(&name, &bytes)
                .map_err(|e| crate::browser::BrowserError::Session(e.to_string()))?;
            return Ok(Some(path));
        }
        ActionKind::Wait => {
            let ms = step
                .value
                .as_deref()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_WAIT_MS);
            session.wait(ms)?;
        }
    }

    Ok(None)
}

fn required_selector(step: &Step) -> BrowserResult<&str> {
    step.selector
        .as_deref()
        .ok_or_else(|| crate::browser::BrowserError::Session("step is missing a selector".to_string()))
}

fn required_value(step: &Step) -> BrowserResult<&str> {
    step.value
        .as_deref()
        .ok_or_else(|| crate::browser::BrowserError::Session("step is missing a value".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockBrowser;
    use crate::scenario::Step;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.init().unwrap();
        (dir, store)
    }

    fn fast() -> ExecOptions {
        ExecOptions { backoff_ms: 1 }
    }

    #[test]
    fn test_navigate_uses_base_url_without_value() {
        let (_dir, store) = store();
        let mut browser = MockBrowser::new();
        let step = Step::new(ActionKind::Navigate);
        execute_action(&mut browser, &step, 1, "http://app/", &store, &fast()).unwrap();
        assert_eq!(browser.log[0], "navigate http://app/");
    }

    #[test]
    fn test_retry_budget_exhausted_propagates() {
        let (_dir, store) = store();
        let mut browser = MockBrowser::new().element("#go").fail_times("click", 3);
        let step = Step::new(ActionKind::Click).selector("#go").retries(2);
        let result = execute_action(&mut browser, &step, 1, "http://app/", &store, &fast());
        assert!(result.is_err());
        assert_eq!(browser.attempts("click"), 3);
    }

    #[test]
    fn test_retry_succeeds_within_budget() {
        let (_dir, store) = store();
        let mut browser = MockBrowser::new().element("#go").fail_times("click", 2);
        let step = Step::new(ActionKind::Click).selector("#go").retries(2);
        let outcome = execute_action(&mut browser, &step, 1, "http://app/", &store, &fast());
        assert!(outcome.is_ok());
        // 3 attempts, 2 backoff waits
        assert_eq!(browser.attempts("click"), 3);
        assert_eq!(browser.attempts("wait"), 2);
    }

    #[test]
    fn test_screenshot_default_name() {
        let (_dir, store) = store();
        let mut browser = MockBrowser::new();
        let step = Step::new(ActionKind::Screenshot);
        let outcome = execute_action(&mut browser, &step, 4, "http://app/", &store, &fast()).unwrap();
        let path = outcome.screenshot.unwrap();
        assert!(path.ends_with("step-4.png"));
        assert!(path.exists());
    }

    #[test]
    fn test_scroll_prefers_offset() {
        let (_dir, store) = store();
        let mut browser = MockBrowser::new();
        let step = Step::new(ActionKind::Scroll).selector("#footer").value("600");
        execute_action(&mut browser, &step, 1, "http://app/", &store, &fast()).unwrap();
        assert_eq!(browser.log[0], "scroll_to 600");
    }

    #[test]
    fn test_wait_default_duration() {
        let (_dir, store) = store();
        let mut browser = MockBrowser::new();
        let step = Step::new(ActionKind::Wait);
        execute_action(&mut browser, &step, 1, "http://app/", &store, &fast()).unwrap();
        assert_eq!(browser.log[0], "wait 1000");
    }
}
