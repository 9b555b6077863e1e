//! Deferred visual inspection over captured screenshots.
//!
//! Runs after the browser session is gone: every check works from the
//! artifacts on disk (screenshots, baseline images, the steps index) plus
//! the external judge services. Three strategies are supported: pixel diff
//! against a baseline, OCR text lookup, and free-form VLM evaluation.
//!
//! Check failures never abort the pass. Unreachable engines, unreadable
//! images and malformed assertions are all folded into failed checks so
//! one bad screenshot cannot hide the rest of the report.

pub mod diff;
pub mod ocr;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactResult, ArtifactStore, INSPECTION_RESULTS_FILE};
use crate::config;
use crate::runner::StepsIndex;
use crate::scenario::{Assertion, AssertionKind};
use crate::vlm::{CurlVlmJudge, VlmConfig, VlmJudge};

use diff::DiffError;
use ocr::{OcrEngine, TesseractOcr};

/// Reply token that makes a VLM evaluation pass when the assertion
/// specifies none
pub const DEFAULT_PASS_IF: &str = "YES";

/// Longest OCR excerpt quoted in failure details
const OCR_EXCERPT_CHARS: usize = 100;

/// Longest VLM reply quoted in check details
const VLM_EXCERPT_CHARS: usize = 200;

/// Outcome of a single check against one screenshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Which strategy produced this result
    #[serde(rename = "type")]
    pub check_type: AssertionKind,

    /// Whether the check passed
    pub passed: bool,

    /// Human-readable explanation of the outcome
    pub details: String,

    /// Strategy-specific confidence (0-100), when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// All checks that ran against one screenshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionResult {
    /// Path of the inspected screenshot
    pub screenshot: PathBuf,

    /// Individual check outcomes
    pub checks: Vec<CheckResult>,

    /// Logical AND of all checks
    pub passed: bool,
}

/// The inspection phase's persisted report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionReport {
    /// Logical AND across all screenshots
    pub success: bool,

    /// How many screenshots were inspected
    pub total_screenshots: usize,

    /// Per-screenshot outcomes
    pub results: Vec<InspectionResult>,

    /// When the inspection finished
    pub timestamp: DateTime<Utc>,
}

/// Configuration for an inspection pass
#[derive(Debug, Clone)]
pub struct InspectConfig {
    /// Where baseline images live; `None` disables baseline comparison
    pub baseline_dir: Option<PathBuf>,

    /// OCR language codes, joined for the engine
    pub ocr_languages: Vec<String>,
}

impl InspectConfig {
    /// Baseline comparison against the store's baseline directory
    pub fn for_store(store: &ArtifactStore) -> Self {
        Self {
            baseline_dir: Some(store.baseline_dir()),
            ocr_languages: vec!["eng".to_string()],
        }
    }

    pub fn ocr_languages(mut self, languages: Vec<String>) -> Self {
        self.ocr_languages = languages;
        self
    }
}

/// The inspection engine.
///
/// Judge backends are injected so tests can run the whole pass with fakes.
pub struct Inspector {
    config: InspectConfig,
    ocr: Box<dyn OcrEngine>,
    judge: Box<dyn VlmJudge>,
}

impl Inspector {
    /// Create an inspector with explicit backends
    pub fn new(config: InspectConfig, ocr: Box<dyn OcrEngine>, judge: Box<dyn VlmJudge>) -> Self {
        Self { config, ocr, judge }
    }

    /// Create an inspector wired to the process-wide judge configuration
    pub fn from_config(config: InspectConfig) -> Self {
        let judge = CurlVlmJudge::new(VlmConfig::from(&config::get().judge));
        Self::new(config, Box::new(TesseractOcr::new()), Box::new(judge))
    }

    /// Inspect every screenshot, running the baseline comparison plus any
    /// deferred assertions the steps index owes it.
    pub fn inspect(&self, screenshots: &[PathBuf], index: &StepsIndex) -> InspectionReport {
        let mut results = Vec::with_capacity(screenshots.len());

        for screenshot in screenshots {
            let mut checks = Vec::new();

            if let Some(baseline_dir) = &self.config.baseline_dir {
                checks.push(self.baseline_check(screenshot, baseline_dir));
            }

            for assertion in index.deferred_for(screenshot) {
                checks.push(self.deferred_check(screenshot, assertion));
            }

            let passed = checks.iter().all(|c| c.passed);
            results.push(InspectionResult {
                screenshot: screenshot.clone(),
                checks,
                passed,
            });
        }

        InspectionReport {
            success: results.iter().all(|r| r.passed),
            total_screenshots: screenshots.len(),
            results,
            timestamp: Utc::now(),
        }
    }

    /// Inspect all screenshots in the store and persist the report
    pub fn inspect_store(&self, store: &ArtifactStore) -> ArtifactResult<InspectionReport> {
        let screenshots = store.list_screenshots()?;
        let index: StepsIndex = store
            .load_json(crate::artifacts::E2E_STEPS_FILE)
            .unwrap_or_default();

        let report = self.inspect(&screenshots, &index);
        store.save_json(INSPECTION_RESULTS_FILE, &report)?;
        Ok(report)
    }

    /// Compare against the baseline image with the same basename,
    /// capturing the baseline on first sight.
    fn baseline_check(&self, screenshot: &Path, baseline_dir: &Path) -> CheckResult {
        let Some(basename) = screenshot.file_name() else {
            return failed_check(
                AssertionKind::VisualDiff,
                "Screenshot path has no file name".to_string(),
            );
        };
        let baseline_path = baseline_dir.join(basename);

        if !baseline_path.exists() {
            if let Err(e) = std::fs::create_dir_all(baseline_dir)
                .and_then(|_| std::fs::copy(screenshot, &baseline_path).map(|_| ()))
            {
                return failed_check(
                    AssertionKind::VisualDiff,
                    format!("Failed to save baseline image: {}", e),
                );
            }
            return CheckResult {
                check_type: AssertionKind::VisualDiff,
                passed: true,
                details: "Baseline image created for future comparisons".to_string(),
                confidence: None,
            };
        }

        match diff::compare_images(&baseline_path, screenshot) {
            Ok(outcome) => CheckResult {
                check_type: AssertionKind::VisualDiff,
                passed: outcome.passes(),
                details: format!("{:.2}% of pixels differ from baseline", outcome.diff_percent),
                confidence: Some(outcome.confidence()),
            },
            Err(e @ DiffError::DimensionMismatch { .. }) => {
                failed_check(AssertionKind::VisualDiff, e.to_string())
            }
            Err(e) => failed_check(
                AssertionKind::VisualDiff,
                format!("Comparison failed: {}", e),
            ),
        }
    }

    fn deferred_check(&self, screenshot: &Path, assertion: &Assertion) -> CheckResult {
        match assertion.kind {
            AssertionKind::Ocr => self.ocr_check(screenshot, assertion),
            AssertionKind::VlmEval => self.vlm_check(screenshot, assertion),
            // Inline kinds and visual-diff were already handled elsewhere
            AssertionKind::Text | AssertionKind::Element | AssertionKind::VisualDiff => {
                CheckResult {
                    check_type: assertion.kind,
                    passed: true,
                    details: "Already checked during E2E run".to_string(),
                    confidence: None,
                }
            }
        }
    }

    fn ocr_check(&self, screenshot: &Path, assertion: &Assertion) -> CheckResult {
        let Some(expected) = assertion.expected.as_deref().filter(|s| !s.is_empty()) else {
            return failed_check(
                AssertionKind::Ocr,
                "No expected text provided for OCR check".to_string(),
            );
        };

        match self.ocr.recognize(screenshot, &self.config.ocr_languages) {
            Ok(outcome) => {
                let found = ocr::contains_text(&outcome.text, expected);
                let details = if found {
                    format!("Text \"{}\" found", expected)
                } else {
                    format!(
                        "Text \"{}\" not found in OCR result: \"{}\"",
                        expected,
                        excerpt(&ocr::normalize(&outcome.text), OCR_EXCERPT_CHARS)
                    )
                };
                CheckResult {
                    check_type: AssertionKind::Ocr,
                    passed: found,
                    details,
                    confidence: outcome.confidence,
                }
            }
            Err(e) => failed_check(AssertionKind::Ocr, e.to_string()),
        }
    }

    fn vlm_check(&self, screenshot: &Path, assertion: &Assertion) -> CheckResult {
        let Some(prompt) = assertion.prompt.as_deref().filter(|s| !s.is_empty()) else {
            return failed_check(
                AssertionKind::VlmEval,
                "No prompt provided for VLM evaluation".to_string(),
            );
        };

        let image_data = match std::fs::read(screenshot) {
            Ok(data) => data,
            Err(e) => {
                return failed_check(
                    AssertionKind::VlmEval,
                    format!("Failed to read screenshot: {}", e),
                )
            }
        };

        let model = assertion
            .model
            .as_deref()
            .unwrap_or_else(|| self.judge.default_model());
        let pass_if = assertion
            .pass_if
            .as_deref()
            .unwrap_or(DEFAULT_PASS_IF)
            .to_uppercase();

        match self.judge.judge(&image_data, prompt, model) {
            Ok(response) => {
                let passed = response.to_uppercase().contains(&pass_if);
                CheckResult {
                    check_type: AssertionKind::VlmEval,
                    passed,
                    details: format!("VLM response: {}", excerpt(&response, VLM_EXCERPT_CHARS)),
                    confidence: None,
                }
            }
            Err(e) => failed_check(AssertionKind::VlmEval, e.to_string()),
        }
    }
}

fn failed_check(check_type: AssertionKind, details: String) -> CheckResult {
    CheckResult {
        check_type,
        passed: false,
        details,
        confidence: None,
    }
}

/// Leading portion of `text`, marked when truncated
fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}
