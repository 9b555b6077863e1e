//! Scenario data model: the scripted list of browser actions and assertions
//! for one end-to-end run.
//!
//! Field names and enum tags are fixed wire strings; existing scenario files
//! deserialize unchanged.

use serde::{Deserialize, Serialize};

/// Default navigation timeout (milliseconds)
pub const DEFAULT_NAVIGATE_TIMEOUT_MS: u64 = 30_000;

/// Default timeout for selector-resolving actions (milliseconds)
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 5_000;

/// Default duration for the `wait` action (milliseconds)
pub const DEFAULT_WAIT_MS: u64 = 1_000;

/// The scripted browser action of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Navigate,
    Click,
    Type,
    Select,
    Hover,
    Scroll,
    Screenshot,
    Wait,
}

impl ActionKind {
    /// Whether this action requires a selector
    pub fn requires_selector(&self) -> bool {
        matches!(
            self,
            ActionKind::Click | ActionKind::Type | ActionKind::Select | ActionKind::Hover
        )
    }

    /// Whether this action requires a value in addition to a selector
    pub fn requires_value(&self) -> bool {
        matches!(self, ActionKind::Type | ActionKind::Select)
    }

    /// Default timeout applied when the step declares none
    pub fn default_timeout_ms(&self) -> u64 {
        match self {
            ActionKind::Navigate => DEFAULT_NAVIGATE_TIMEOUT_MS,
            _ => DEFAULT_ACTION_TIMEOUT_MS,
        }
    }

    /// Wire name of the action, as recorded in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Select => "select",
            ActionKind::Hover => "hover",
            ActionKind::Scroll => "scroll",
            ActionKind::Screenshot => "screenshot",
            ActionKind::Wait => "wait",
        }
    }
}

/// The kind of a declared assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssertionKind {
    /// Page content contains the expected string (inline)
    #[serde(rename = "text")]
    Text,
    /// Selector resolves to at least one element (inline)
    #[serde(rename = "element")]
    Element,
    /// Recognized screenshot text contains the expected string (deferred)
    #[serde(rename = "ocr")]
    Ocr,
    /// Screenshot matches the accepted baseline image (deferred)
    #[serde(rename = "visual-diff")]
    VisualDiff,
    /// Vision model judges the screenshot against a prompt (deferred)
    #[serde(rename = "vlm-eval")]
    VlmEval,
}

impl AssertionKind {
    /// Deferred kinds are judged during the inspection phase, not the live run
    pub fn is_deferred(&self) -> bool {
        matches!(
            self,
            AssertionKind::Ocr | AssertionKind::VisualDiff | AssertionKind::VlmEval
        )
    }

    /// Wire name of the assertion kind, as recorded in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionKind::Text => "text",
            AssertionKind::Element => "element",
            AssertionKind::Ocr => "ocr",
            AssertionKind::VisualDiff => "visual-diff",
            AssertionKind::VlmEval => "vlm-eval",
        }
    }
}

/// One declared assertion attached to a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assertion {
    /// What to check
    pub kind: AssertionKind,

    /// Selector for element checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Expected string for text/OCR checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    /// Evaluation prompt for vision model checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Token the judge reply must contain to pass (default "YES")
    #[serde(rename = "passIf", skip_serializing_if = "Option::is_none")]
    pub pass_if: Option<String>,

    /// Judge model identifier, overriding the configured default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Assertion {
    /// Create a bare assertion of the given kind
    pub fn new(kind: AssertionKind) -> Self {
        Self {
            kind,
            selector: None,
            expected: None,
            prompt: None,
            pass_if: None,
            model: None,
        }
    }

    /// Set the selector
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Set the expected string
    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Set the judge prompt
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set the pass condition token
    pub fn pass_if(mut self, token: impl Into<String>) -> Self {
        self.pass_if = Some(token.into());
        self
    }
}

/// One scripted step of a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// The browser action to perform
    pub action: ActionKind,

    /// CSS selector, where the action needs one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Action value: URL for navigate, text for type, offset for scroll, ...
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Display name, used to name explicit screenshots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Assertions evaluated after the action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertions: Option<Vec<Assertion>>,

    /// Retry budget for the action (default 0)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retries: u32,

    /// Per-step timeout override (milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Step {
    /// Create a step for the given action
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            selector: None,
            value: None,
            name: None,
            assertions: None,
            retries: 0,
            timeout: None,
        }
    }

    /// Set the selector
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Set the value
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach an assertion
    pub fn assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.get_or_insert_with(Vec::new).push(assertion);
        self
    }

    /// Set the retry budget
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the per-step timeout (milliseconds)
    pub fn timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    /// Effective timeout for this step's action
    pub fn effective_timeout_ms(&self) -> u64 {
        self.timeout.unwrap_or_else(|| self.action.default_timeout_ms())
    }

    /// Declared assertions, empty slice if none
    pub fn declared_assertions(&self) -> &[Assertion] {
        self.assertions.as_deref().unwrap_or(&[])
    }
}

/// An ordered sequence of steps against one base URL. Immutable once a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Base URL of the application under test
    #[serde(rename = "baseUrl")]
    pub base_url: String,

    /// The scripted steps, in execution order
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Create a scenario for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Check the selector/value invariants of every step.
    ///
    /// `click`/`type`/`select`/`hover` require a selector; `type`/`select`
    /// additionally require a value.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        for (index, step) in self.steps.iter().enumerate() {
            if step.action.requires_selector() && step.selector.is_none() {
                return Err(ScenarioError::MissingSelector {
                    step: index,
                    action: step.action,
                });
            }
            if step.action.requires_value() && step.value.is_none() {
                return Err(ScenarioError::MissingValue {
                    step: index,
                    action: step.action,
                });
            }
        }
        Ok(())
    }
}

/// Error types for scenario validation
#[derive(Debug)]
pub enum ScenarioError {
    /// A step's action requires a selector but none was given
    MissingSelector { step: usize, action: ActionKind },

    /// A step's action requires a value but none was given
    MissingValue { step: usize, action: ActionKind },
}

impl std::fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioError::MissingSelector { step, action } => {
                write!(f, "step {}: '{}' requires a selector", step, action.as_str())
            }
            ScenarioError::MissingValue { step, action } => {
                write!(f, "step {}: '{}' requires a value", step, action.as_str())
            }
        }
    }
}

impl std::error::Error for ScenarioError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_wire_names() {
        let json = serde_json::to_string(&ActionKind::Navigate).unwrap();
        assert_eq!(json, "\"navigate\"");
        let kind: ActionKind = serde_json::from_str("\"screenshot\"").unwrap();
        assert_eq!(kind, ActionKind::Screenshot);
    }

    #[test]
    fn test_assertion_kind_wire_names() {
        let json = serde_json::to_string(&AssertionKind::VisualDiff).unwrap();
        assert_eq!(json, "\"visual-diff\"");
        let kind: AssertionKind = serde_json::from_str("\"vlm-eval\"").unwrap();
        assert_eq!(kind, AssertionKind::VlmEval);
    }

    #[test]
    fn test_deferred_kinds() {
        assert!(!AssertionKind::Text.is_deferred());
        assert!(!AssertionKind::Element.is_deferred());
        assert!(AssertionKind::Ocr.is_deferred());
        assert!(AssertionKind::VisualDiff.is_deferred());
        assert!(AssertionKind::VlmEval.is_deferred());
    }

    #[test]
    fn test_default_timeouts() {
        assert_eq!(ActionKind::Navigate.default_timeout_ms(), 30_000);
        assert_eq!(ActionKind::Click.default_timeout_ms(), 5_000);
        let step = Step::new(ActionKind::Click).selector("#go").timeout(250);
        assert_eq!(step.effective_timeout_ms(), 250);
    }

    #[test]
    fn test_validate_missing_selector() {
        let scenario = Scenario::new("http://localhost:3000").step(Step::new(ActionKind::Click));
        let err = scenario.validate().unwrap_err();
        assert!(matches!(err, ScenarioError::MissingSelector { step: 0, .. }));
    }

    #[test]
    fn test_validate_missing_value() {
        let scenario = Scenario::new("http://localhost:3000")
            .step(Step::new(ActionKind::Type).selector("#email"));
        let err = scenario.validate().unwrap_err();
        assert!(matches!(err, ScenarioError::MissingValue { step: 0, .. }));
    }

    #[test]
    fn test_validate_ok() {
        let scenario = Scenario::new("http://localhost:3000")
            .step(Step::new(ActionKind::Navigate))
            .step(Step::new(ActionKind::Type).selector("#email").value("a@b.c"))
            .step(Step::new(ActionKind::Screenshot).name("login"));
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_scenario_json_roundtrip() {
        let json = r##"{
            "baseUrl": "http://localhost:3000",
            "steps": [
                {"action": "navigate"},
                {"action": "click", "selector": "#submit", "retries": 2, "timeout": 8000},
                {"action": "screenshot", "name": "after-submit",
                 "assertions": [{"kind": "ocr", "expected": "Welcome"},
                                {"kind": "vlm-eval", "prompt": "Is the dashboard visible?", "passIf": "YES"}]}
            ]
        }"##;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(scenario.steps.len(), 3);
        assert_eq!(scenario.steps[1].retries, 2);
        assert_eq!(scenario.steps[2].declared_assertions().len(), 2);
        assert!(scenario.validate().is_ok());

        let back = serde_json::to_value(&scenario).unwrap();
        assert_eq!(back["steps"][2]["assertions"][1]["passIf"], "YES");
    }
}
