//! Folds the per-phase reports into one consolidated verdict.
//!
//! Reads whatever phase documents exist in the store; missing phases are
//! simply absent from the summary. Unit failures mean the product itself is
//! broken, so they outrank everything; E2E and inspection failures only ever
//! soften the verdict to `partial`, never harden a `failed` back up.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::{
    ArtifactResult, ArtifactStore, CONSOLIDATED_REPORT_FILE, E2E_RESULTS_FILE,
    INSPECTION_RESULTS_FILE, UNIT_RESULTS_FILE,
};
use crate::inspect::InspectionReport;
use crate::runner::RunReport;
use crate::unit::UnitTestReport;

/// Failure excerpts kept per phase
const MAX_FAILURE_EXCERPTS: usize = 10;

/// Final verdict across all phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Passed,
    Failed,
    Partial,
}

/// Unit phase rollup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitPhaseSummary {
    pub success: bool,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// E2E phase rollup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct E2ePhaseSummary {
    pub success: bool,
    pub total_steps: usize,
    pub executed_steps: usize,
    pub failed_steps: usize,
}

/// Inspection phase rollup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualPhaseSummary {
    pub success: bool,
    pub total_screenshots: usize,
    pub failed_screenshots: usize,
}

/// Per-phase rollups plus the folded verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitPhaseSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub e2e: Option<E2ePhaseSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual: Option<VisualPhaseSummary>,

    pub overall_status: OverallStatus,
}

/// Failure excerpts, capped per phase
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedDetails {
    pub unit_failures: Vec<String>,
    pub e2e_failures: Vec<String>,
    pub visual_failures: Vec<String>,
}

/// The persisted consolidated report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedReport {
    /// When consolidation ran
    pub timestamp: DateTime<Utc>,

    /// Per-phase rollups and the folded verdict
    pub summary: ConsolidatedSummary,

    /// Failure excerpts per phase
    pub details: ConsolidatedDetails,

    /// Artifacts referenced by the phases
    pub artifacts: Vec<PathBuf>,
}

/// Build the consolidated report from whatever phase documents exist and
/// persist it.
pub fn consolidate(store: &ArtifactStore) -> ArtifactResult<ConsolidatedReport> {
    let unit: Option<UnitTestReport> = store.load_json(UNIT_RESULTS_FILE);
    let e2e: Option<RunReport> = store.load_json(E2E_RESULTS_FILE);
    let visual: Option<InspectionReport> = store.load_json(INSPECTION_RESULTS_FILE);

    let report = fold(unit.as_ref(), e2e.as_ref(), visual.as_ref(), store);
    store.save_json(CONSOLIDATED_REPORT_FILE, &report)?;
    Ok(report)
}

/// Pure folding over the phase reports
pub fn fold(
    unit: Option<&UnitTestReport>,
    e2e: Option<&RunReport>,
    visual: Option<&InspectionReport>,
    store: &ArtifactStore,
) -> ConsolidatedReport {
    let mut status = OverallStatus::Passed;
    let mut details = ConsolidatedDetails::default();

    let unit_summary = unit.map(|report| {
        if !report.success {
            status = OverallStatus::Failed;
        }
        details.unit_failures = report
            .results
            .iter()
            .filter(|case| case.status == "FAILED")
            .take(MAX_FAILURE_EXCERPTS)
            .map(|case| case.name.clone())
            .collect();
        UnitPhaseSummary {
            success: report.success,
            total: report.summary.total,
            passed: report.summary.passed,
            failed: report.summary.failed,
        }
    });

    let e2e_summary = e2e.map(|report| {
        let failed_steps = report.results.iter().filter(|r| !r.success).count();
        if !report.success && status != OverallStatus::Failed {
            status = OverallStatus::Partial;
        }
        details.e2e_failures = report
            .results
            .iter()
            .filter(|r| !r.success)
            .take(MAX_FAILURE_EXCERPTS)
            .map(|r| {
                format!(
                    "Step {} ({}): {}",
                    r.step,
                    r.action.as_str(),
                    r.error.as_deref().unwrap_or("assertion failed")
                )
            })
            .collect();
        E2ePhaseSummary {
            success: report.success,
            total_steps: report.total_steps,
            executed_steps: report.executed_steps,
            failed_steps,
        }
    });

    let visual_summary = visual.map(|report| {
        let failed_screenshots = report.results.iter().filter(|r| !r.passed).count();
        if !report.success && status != OverallStatus::Failed {
            status = OverallStatus::Partial;
        }
        details.visual_failures = report
            .results
            .iter()
            .filter(|r| !r.passed)
            .take(MAX_FAILURE_EXCERPTS)
            .flat_map(|r| {
                let screenshot = r.screenshot.clone();
                r.checks
                    .iter()
                    .filter(|c| !c.passed)
                    .take(1)
                    .map(move |c| format!("{}: {}", screenshot.display(), c.details))
                    .collect::<Vec<_>>()
            })
            .take(MAX_FAILURE_EXCERPTS)
            .collect();
        VisualPhaseSummary {
            success: report.success,
            total_screenshots: report.total_screenshots,
            failed_screenshots,
        }
    });

    let mut artifacts: Vec<PathBuf> = store.list_screenshots().unwrap_or_default();
    for file in [
        UNIT_RESULTS_FILE,
        E2E_RESULTS_FILE,
        INSPECTION_RESULTS_FILE,
    ] {
        let path = store.document_path(file);
        if path.exists() {
            artifacts.push(path);
        }
    }

    ConsolidatedReport {
        timestamp: Utc::now(),
        summary: ConsolidatedSummary {
            unit: unit_summary,
            e2e: e2e_summary,
            visual: visual_summary,
            overall_status: status,
        },
        details,
        artifacts,
    }
}

/// Plain-text rendering of the consolidated report
pub fn text_summary(report: &ConsolidatedReport) -> String {
    let mut out = String::new();
    out.push_str("=== Test Report Summary ===\n");
    out.push_str(&format!(
        "Overall status: {}\n",
        match report.summary.overall_status {
            OverallStatus::Passed => "PASSED",
            OverallStatus::Failed => "FAILED",
            OverallStatus::Partial => "PARTIAL",
        }
    ));

    if let Some(unit) = &report.summary.unit {
        out.push_str(&format!(
            "Unit tests: {}/{} passed\n",
            unit.passed, unit.total
        ));
    }
    if let Some(e2e) = &report.summary.e2e {
        out.push_str(&format!(
            "E2E steps: {}/{} executed, {} failed\n",
            e2e.executed_steps, e2e.total_steps, e2e.failed_steps
        ));
    }
    if let Some(visual) = &report.summary.visual {
        out.push_str(&format!(
            "Visual inspection: {}/{} screenshots passed\n",
            visual.total_screenshots - visual.failed_screenshots,
            visual.total_screenshots
        ));
    }

    for failure in report
        .details
        .unit_failures
        .iter()
        .chain(&report.details.e2e_failures)
        .chain(&report.details.visual_failures)
    {
        out.push_str(&format!("  - {}\n", failure));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{CheckResult, InspectionResult};
    use crate::runner::StepResult;
    use crate::scenario::{ActionKind, AssertionKind};
    use crate::unit::{UnitCaseResult, UnitSummary};
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.init().unwrap();
        (dir, store)
    }

    fn unit_report(failed: usize) -> UnitTestReport {
        UnitTestReport {
            success: failed == 0,
            summary: UnitSummary {
                total: 5,
                passed: 5 - failed,
                failed,
                ignored: 0,
                duration_ms: 100,
            },
            results: (0..failed)
                .map(|i| UnitCaseResult {
                    name: format!("tests::case_{}", i),
                    status: "FAILED".to_string(),
                })
                .collect(),
            timestamp: Utc::now(),
            coverage: None,
        }
    }

    fn e2e_report(success: bool) -> RunReport {
        RunReport {
            success,
            base_url: "http://app/".to_string(),
            total_steps: 2,
            executed_steps: 2,
            results: vec![
                StepResult {
                    step: 0,
                    action: ActionKind::Navigate,
                    success: true,
                    screenshot: None,
                    assertions: None,
                    error: None,
                    duration_ms: Some(5),
                },
                StepResult {
                    step: 1,
                    action: ActionKind::Click,
                    success,
                    screenshot: None,
                    assertions: None,
                    error: if success {
                        None
                    } else {
                        Some("Timeout waiting for #go".to_string())
                    },
                    duration_ms: Some(5),
                },
            ],
            timestamp: Utc::now(),
        }
    }

    fn visual_report(success: bool) -> InspectionReport {
        InspectionReport {
            success,
            total_screenshots: 1,
            results: vec![InspectionResult {
                screenshot: PathBuf::from("screenshots/step-1.png"),
                checks: vec![CheckResult {
                    check_type: AssertionKind::VisualDiff,
                    passed: success,
                    details: if success {
                        "0.00% of pixels differ from baseline".to_string()
                    } else {
                        "12.00% of pixels differ from baseline".to_string()
                    },
                    confidence: None,
                }],
                passed: success,
            }],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_all_phases_pass() {
        let (_dir, store) = store();
        let report = fold(
            Some(&unit_report(0)),
            Some(&e2e_report(true)),
            Some(&visual_report(true)),
            &store,
        );
        assert_eq!(report.summary.overall_status, OverallStatus::Passed);
        assert!(report.details.e2e_failures.is_empty());
    }

    #[test]
    fn test_unit_failure_outranks_everything() {
        let (_dir, store) = store();
        let report = fold(
            Some(&unit_report(2)),
            Some(&e2e_report(false)),
            Some(&visual_report(false)),
            &store,
        );
        assert_eq!(report.summary.overall_status, OverallStatus::Failed);
        assert_eq!(report.details.unit_failures.len(), 2);
    }

    #[test]
    fn test_e2e_failure_is_partial() {
        let (_dir, store) = store();
        let report = fold(None, Some(&e2e_report(false)), Some(&visual_report(true)), &store);
        assert_eq!(report.summary.overall_status, OverallStatus::Partial);
        assert!(report.details.e2e_failures[0].contains("Timeout waiting for #go"));
    }

    #[test]
    fn test_visual_failure_never_upgrades_failed(){
        let (_dir, store) = store();
        let report = fold(Some(&unit_report(1)), None, Some(&visual_report(false)), &store);
        assert_eq!(report.summary.overall_status, OverallStatus::Failed);
        assert_eq!(report.summary.visual.as_ref().unwrap().failed_screenshots, 1);
    }

    #[test]
    fn test_missing_phases_are_absent() {
        let (_dir, store) = store();
        let report = fold(None, None, None, &store);
        assert_eq!(report.summary.overall_status, OverallStatus::Passed);
        assert!(report.summary.unit.is_none());
        assert!(report.summary.e2e.is_none());
        assert!(report.summary.visual.is_none());
    }

    #[test]
    fn test_consolidate_persists_document() {
        let (_dir, store) = store();
        store.save_json(E2E_RESULTS_FILE, &e2e_report(true)).unwrap();
        let report = consolidate(&store).unwrap();
        assert_eq!(report.summary.overall_status, OverallStatus::Passed);

        let loaded: Option<ConsolidatedReport> = store.load_json(CONSOLIDATED_REPORT_FILE);
        assert!(loaded.is_some());
    }

    #[test]
    fn test_text_summary_mentions_phases() {
        let (_dir, store) = store();
        let report = fold(Some(&unit_report(0)), Some(&e2e_report(false)), None, &store);
        let text = text_summary(&report);
        assert!(text.contains("Overall status: PARTIAL"));
        assert!(text.contains("Unit tests: 5/5 passed"));
        assert!(text.contains("Step 1 (click)"));
    }
}
