//! End-to-end pipeline tests: scripted runs against the mock browser,
//! inspection with fake judges, consolidation and HTML output, all on
//! scratch artifact stores.

use std::path::Path;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use web_vision::artifacts::{
    ArtifactStore, CONSOLIDATED_REPORT_FILE, E2E_RESULTS_FILE, E2E_STEPS_FILE,
    INSPECTION_RESULTS_FILE,
};
use web_vision::browser::{BrowserSession, MockBrowser};
use web_vision::consolidate;
use web_vision::executor::ExecOptions;
use web_vision::inspect::ocr::{OcrEngine, OcrOutcome, OcrResult};
use web_vision::inspect::{InspectConfig, Inspector};
use web_vision::runner::{run_scenario, RunReport, StepsIndex};
use web_vision::scenario::{ActionKind, Assertion, AssertionKind, Scenario, Step};
use web_vision::vlm::{VlmJudge, VlmResult};

struct FakeOcr(&'static str);

impl OcrEngine for FakeOcr {
    fn recognize(&self, _path: &Path, _languages: &[String]) -> OcrResult<OcrOutcome> {
        Ok(OcrOutcome {
            text: self.0.to_string(),
            confidence: Some(92.0),
        })
    }
}

struct FakeJudge(&'static str);

impl VlmJudge for FakeJudge {
    fn judge(&self, _image: &[u8], _prompt: &str, _model: &str) -> VlmResult<String> {
        Ok(self.0.to_string())
    }

    fn default_model(&self) -> &str {
        "fake:latest"
    }
}

fn scratch_store() -> (tempfile::TempDir, ArtifactStore) {
    let dir = tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store.init().unwrap();
    (dir, store)
}

fn fast_opts() -> ExecOptions {
    ExecOptions { backoff_ms: 1 }
}

fn inspector(store: &ArtifactStore, ocr_text: &'static str, reply: &'static str) -> Inspector {
    Inspector::new(
        InspectConfig::for_store(store),
        Box::new(FakeOcr(ocr_text)),
        Box::new(FakeJudge(reply)),
    )
}

#[test]
fn test_full_pipeline_green_path() {
    let (_dir, store) = scratch_store();
    let mut browser = MockBrowser::new()
        .page("http://app/", "<h1>Welcome back</h1>")
        .element("#login");

    let scenario = Scenario::new("http://app/")
        .step(Step::new(ActionKind::Navigate))
        .step(
            Step::new(ActionKind::Click)
                .selector("#login")
                .assertion(Assertion::new(AssertionKind::Text).expected("Welcome back"))
                .assertion(Assertion::new(AssertionKind::Ocr).expected("welcome")),
        )
        .step(Step::new(ActionKind::Screenshot).name("final"));

    let (report, index) = run_scenario(&mut browser, &scenario, &store, &fast_opts()).unwrap();
    browser.close();

    assert!(report.success);
    assert_eq!(report.executed_steps, 3);
    // deferred OCR assertion recorded as passed inline
    let inline = report.results[1].assertions.as_ref().unwrap();
    assert!(inline.iter().all(|a| a.passed));

    // first inspection run generates baselines and judges deferred checks
    let inspector = inspector(&store, "Welcome back, Alice", "YES");
    let inspection = inspector.inspect_store(&store).unwrap();
    assert!(inspection.success);

    // second inspection run compares against the fresh baselines
    let inspection = inspector.inspect_store(&store).unwrap();
    assert!(inspection.success);
    for result in &inspection.results {
        assert!(result
            .checks
            .iter()
            .any(|c| c.details.contains("pixels differ")));
    }

    let consolidated = consolidate::consolidate(&store).unwrap();
    assert_eq!(
        consolidated.summary.overall_status,
        consolidate::OverallStatus::Passed
    );

    for file in [
        E2E_RESULTS_FILE,
        E2E_STEPS_FILE,
        INSPECTION_RESULTS_FILE,
        CONSOLIDATED_REPORT_FILE,
    ] {
        assert!(store.document_path(file).exists(), "{} missing", file);
    }
    let _ = index;
}

#[test]
fn test_failed_step_without_assertions_aborts_run() {
    let (_dir, store) = scratch_store();
    let mut browser = MockBrowser::new().page("http://app/", "<p>home</p>");

    let scenario = Scenario::new("http://app/")
        .step(Step::new(ActionKind::Navigate))
        .step(Step::new(ActionKind::Click).selector("#missing"))
        .step(Step::new(ActionKind::Screenshot));

    let (report, _) = run_scenario(&mut browser, &scenario, &store, &fast_opts()).unwrap();

    assert!(!report.success);
    assert_eq!(report.total_steps, 3);
    assert_eq!(report.executed_steps, 2);
    assert!(report.results[1].error.is_some());
}

#[test]
fn test_failed_step_with_assertions_continues_run() {
    let (_dir, store) = scratch_store();
    let mut browser = MockBrowser::new().page("http://app/", "<p>home</p>");

    let scenario = Scenario::new("http://app/")
        .step(Step::new(ActionKind::Navigate))
        .step(
            Step::new(ActionKind::Click)
                .selector("#missing")
                .assertion(Assertion::new(AssertionKind::Element).selector("#missing")),
        )
        .step(Step::new(ActionKind::Screenshot));

    let (report, _) = run_scenario(&mut browser, &scenario, &store, &fast_opts()).unwrap();

    assert!(!report.success);
    assert_eq!(report.executed_steps, 3);
    assert!(report.results[2].success);
}

#[test]
fn test_retry_budget_recovers_flaky_click() {
    let (_dir, store) = scratch_store();
    let mut browser = MockBrowser::new()
        .page("http://app/", "<p>home</p>")
        .element("#flaky")
        .fail_times("click", 2);

    let scenario = Scenario::new("http://app/")
        .step(Step::new(ActionKind::Navigate))
        .step(Step::new(ActionKind::Click).selector("#flaky").retries(3));

    let (report, _) = run_scenario(&mut browser, &scenario, &store, &fast_opts()).unwrap();

    assert!(report.success);
    assert_eq!(browser.attempts("click"), 3);
}

#[test]
fn test_steps_index_links_deferred_assertions_to_screenshots() {
    let (_dir, store) = scratch_store();
    let mut browser = MockBrowser::new().page("http://app/", "<p>dashboard</p>");

    let scenario = Scenario::new("http://app/").step(
        Step::new(ActionKind::Navigate)
            .assertion(Assertion::new(AssertionKind::VlmEval).prompt("Is the dashboard visible?"))
            .assertion(Assertion::new(AssertionKind::Text).expected("dashboard")),
    );

    let (_, index) = run_scenario(&mut browser, &scenario, &store, &fast_opts()).unwrap();

    // only the deferred assertion lands in the index, attached to the
    // auto screenshot of its step
    let persisted: StepsIndex = store.load_json(E2E_STEPS_FILE).unwrap();
    assert_eq!(persisted.steps.len(), 1);
    let screenshot = persisted.steps[0].screenshot.as_ref().unwrap();
    let deferred = persisted.deferred_for(screenshot);
    assert_eq!(deferred.len(), 1);
    assert_eq!(deferred[0].kind, AssertionKind::VlmEval);
    let _ = index;
}

#[test]
fn test_inspection_flags_visual_regression() {
    let (_dir, store) = scratch_store();

    // first run paints a dark screen, second a light one
    let scenario = Scenario::new("http://app/").step(Step::new(ActionKind::Screenshot).name("home"));

    let mut dark = MockBrowser::new()
        .page("http://app/", "")
        .screenshot_color([10, 10, 10]);
    run_scenario(&mut dark, &scenario, &store, &fast_opts()).unwrap();

    let inspector = inspector(&store, "", "YES");
    assert!(inspector.inspect_store(&store).unwrap().success);

    let mut light = MockBrowser::new()
        .page("http://app/", "")
        .screenshot_color([240, 240, 240]);
    run_scenario(&mut light, &scenario, &store, &fast_opts()).unwrap();

    let inspection = inspector.inspect_store(&store).unwrap();
    assert!(!inspection.success);
    let failed = inspection.results.iter().find(|r| !r.passed).unwrap();
    assert!(failed.checks[0].details.contains("pixels differ"));

    let consolidated = consolidate::consolidate(&store).unwrap();
    assert_eq!(
        consolidated.summary.overall_status,
        consolidate::OverallStatus::Partial
    );
}

#[test]
fn test_vlm_reply_must_contain_pass_condition() {
    let (_dir, store) = scratch_store();
    let mut browser = MockBrowser::new().page("http://app/", "");

    let scenario = Scenario::new("http://app/").step(
        Step::new(ActionKind::Screenshot)
            .name("form")
            .assertion(
                Assertion::new(AssertionKind::VlmEval).prompt("Is the form rendered correctly?"),
            ),
    );
    run_scenario(&mut browser, &scenario, &store, &fast_opts()).unwrap();

    let rejecting = inspector(&store, "", "No, the submit button is missing");
    let inspection = rejecting.inspect_store(&store).unwrap();
    assert!(!inspection.success);

    let vlm_check = inspection
        .results
        .iter()
        .flat_map(|r| &r.checks)
        .find(|c| c.check_type == AssertionKind::VlmEval)
        .unwrap();
    assert!(!vlm_check.passed);
    assert!(vlm_check.details.contains("submit button is missing"));
}

#[test]
fn test_inline_text_assertion_failure_flips_step() {
    let (_dir, store) = scratch_store();
    let mut browser = MockBrowser::new().page("http://app/", "<h1>Error 500</h1>");

    let scenario = Scenario::new("http://app/").step(
        Step::new(ActionKind::Navigate)
            .assertion(Assertion::new(AssertionKind::Text).expected("Welcome")),
    );

    let (report, _) = run_scenario(&mut browser, &scenario, &store, &fast_opts()).unwrap();

    assert!(!report.success);
    let result = &report.results[0];
    assert!(!result.success);
    assert!(result.error.is_none());
    assert!(!result.assertions.as_ref().unwrap()[0].passed);
}

#[test]
fn test_run_report_roundtrips_through_store() {
    let (_dir, store) = scratch_store();
    let mut browser = MockBrowser::new().page("http://app/", "<p>ok</p>");

    let scenario = Scenario::new("http://app/")
        .step(Step::new(ActionKind::Navigate))
        .step(Step::new(ActionKind::Wait).value("5"));

    let (report, _) = run_scenario(&mut browser, &scenario, &store, &fast_opts()).unwrap();

    let loaded: RunReport = store.load_json(E2E_RESULTS_FILE).unwrap();
    assert_eq!(loaded.success, report.success);
    assert_eq!(loaded.base_url, "http://app/");
    assert_eq!(loaded.results.len(), report.results.len());
}
