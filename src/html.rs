//! Renders the consolidated report as a static, self-contained HTML page.

use std::path::PathBuf;

use crate::artifacts::{ArtifactResult, ArtifactStore, CONSOLIDATED_REPORT_FILE, HTML_REPORT_FILE};
use crate::consolidate::{self, ConsolidatedReport, OverallStatus};

/// Render the consolidated report to `test-report.html`, consolidating
/// first when no report exists yet. Returns the written path.
pub fn generate_html_report(store: &ArtifactStore) -> ArtifactResult<PathBuf> {
    let report: ConsolidatedReport = match store.load_json(CONSOLIDATED_REPORT_FILE) {
        Some(report) => report,
        None => consolidate::consolidate(store)?,
    };

    let html = render(&report);
    let path = store.document_path(HTML_REPORT_FILE);
    std::fs::write(&path, html).map_err(crate::artifacts::ArtifactError::Io)?;
    Ok(path)
}

/// Pure rendering of a consolidated report
pub fn render(report: &ConsolidatedReport) -> String {
    let (status_label, status_color) = match report.summary.overall_status {
        OverallStatus::Passed => ("PASSED", "#2e7d32"),
        OverallStatus::Failed => ("FAILED", "#c62828"),
        OverallStatus::Partial => ("PARTIAL", "#ef6c00"),
    };

    let mut cards = String::new();
    if let Some(unit) = &report.summary.unit {
        cards.push_str(&metric_card(
            "Unit tests",
            &format!("{}/{} passed", unit.passed, unit.total),
            unit.success,
        ));
    }
    if let Some(e2e) = &report.summary.e2e {
        cards.push_str(&metric_card(
            "E2E steps",
            &format!(
                "{}/{} executed, {} failed",
                e2e.executed_steps, e2e.total_steps, e2e.failed_steps
            ),
            e2e.success,
        ));
    }
    if let Some(visual) = &report.summary.visual {
        cards.push_str(&metric_card(
            "Visual inspection",
            &format!(
                "{}/{} screenshots passed",
                visual.total_screenshots - visual.failed_screenshots,
                visual.total_screenshots
            ),
            visual.success,
        ));
    }

    let mut failures = String::new();
    for (title, entries) in [
        ("Unit failures", &report.details.unit_failures),
        ("E2E failures", &report.details.e2e_failures),
        ("Visual failures", &report.details.visual_failures),
    ] {
        if entries.is_empty() {
            continue;
        }
        failures.push_str(&format!("<h2>{}</h2>\n<table>\n", title));
        for entry in entries {
            failures.push_str(&format!("<tr><td>{}</td></tr>\n", escape(entry)));
        }
        failures.push_str("</table>\n");
    }

    let mut gallery = String::new();
    let screenshots: Vec<_> = report
        .artifacts
        .iter()
        .filter(|p| {
            p.extension()
                .map(|e| e == "png" || e == "jpg")
                .unwrap_or(false)
        })
        .collect();
    if !screenshots.is_empty() {
        gallery.push_str("<h2>Screenshots</h2>\n<div class=\"gallery\">\n");
        for path in screenshots {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            gallery.push_str(&format!(
                "<figure><img src=\"{0}\" alt=\"{1}\"><figcaption>{1}</figcaption></figure>\n",
                escape(&path.display().to_string()),
                escape(&name)
            ));
        }
        gallery.push_str("</div>\n");
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Test Report</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; color: #222; }}
.badge {{ display: inline-block; padding: 0.3rem 1rem; border-radius: 4px; color: #fff; font-weight: bold; background: {status_color}; }}
.cards {{ display: flex; gap: 1rem; margin: 1.5rem 0; }}
.card {{ border: 1px solid #ddd; border-radius: 6px; padding: 1rem; min-width: 12rem; }}
.card.fail {{ border-color: #c62828; }}
.card h3 {{ margin-top: 0; }}
table {{ border-collapse: collapse; margin-bottom: 1.5rem; }}
td {{ border: 1px solid #ddd; padding: 0.4rem 0.8rem; }}
.gallery {{ display: flex; flex-wrap: wrap; gap: 1rem; }}
.gallery img {{ max-width: 320px; border: 1px solid #ddd; }}
figcaption {{ font-size: 0.8rem; text-align: center; }}
</style>
</head>
<body>
<h1>Test Report <span class="badge">{status_label}</span></h1>
<p>Generated at {timestamp}</p>
<div class="cards">
{cards}</div>
{failures}{gallery}</body>
</html>
"#,
        status_color = status_color,
        status_label = status_label,
        timestamp = report.timestamp.to_rfc3339(),
        cards = cards,
        failures = failures,
        gallery = gallery,
    )
}

fn metric_card(title: &str, value: &str, success: bool) -> String {
    format!(
        "<div class=\"card{}\"><h3>{}</h3><p>{}</p></div>\n",
        if success { "" } else { " fail" },
        escape(title),
        escape(value)
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidate::fold;
    use crate::runner::RunReport;
    use chrono::Utc;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.init().unwrap();
        (dir, store)
    }

    fn empty_e2e(success: bool) -> RunReport {
        RunReport {
            success,
            base_url: "http://app/".to_string(),
            total_steps: 0,
            executed_steps: 0,
            results: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_render_status_badge() {
        let (_dir, store) = store();
        let report = fold(None, Some(&empty_e2e(true)), None, &store);
        let html = render(&report);
        assert!(html.contains("PASSED"));
        assert!(html.contains("E2E steps"));
    }

    #[test]
    fn test_render_escapes_failure_text() {
        let (_dir, store) = store();
        let mut report = fold(None, Some(&empty_e2e(false)), None, &store);
        report
            .details
            .e2e_failures
            .push("selector <div> & \"quotes\"".to_string());
        let html = render(&report);
        assert!(html.contains("selector &lt;div&gt; &amp; &quot;quotes&quot;"));
        assert!(html.contains("PARTIAL"));
    }

    #[test]
    fn test_generate_writes_file_and_consolidates() {
        let (_dir, store) = store();
        store
            .save_json(crate::artifacts::E2E_RESULTS_FILE, &empty_e2e(true))
            .unwrap();

        let path = generate_html_report(&store).unwrap();
        assert!(path.exists());
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));

        // consolidation ran as a side effect
        assert!(store
            .document_path(CONSOLIDATED_REPORT_FILE)
            .exists());
    }
}
