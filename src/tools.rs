//! Tool surface: named operations behind a JSON request/response boundary.
//!
//! Every tool returns a well-formed JSON value. Failures become
//! `{"success": false, "error": ...}` envelopes instead of propagating, so
//! a caller on the other side of the protocol always gets a response.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::artifacts::{
    self, ArtifactStore, CONSOLIDATED_REPORT_FILE, E2E_STEPS_FILE, HTML_REPORT_FILE,
    INSPECTION_RESULTS_FILE,
};
use crate::browser::{BrowserSession, DriverBrowser};
use crate::config;
use crate::consolidate;
use crate::executor::ExecOptions;
use crate::html;
use crate::inspect::{InspectConfig, Inspector};
use crate::consolidate::ConsolidatedReport;
use crate::runner::{run_scenario, StepsIndex};
use crate::scenario::Scenario;
use crate::unit::{self, TestStrategy};

/// Names of the exposed tools, in dispatch order
pub const TOOL_NAMES: [&str; 6] = [
    "generate_unit_tests",
    "run_unit_tests",
    "run_e2e",
    "inspect_screenshots",
    "consolidate_report",
    "generate_html_report",
];

/// Dispatch a tool call by name.
///
/// Unknown names and all tool failures return an error envelope.
pub fn dispatch(name: &str, args: &Value) -> Value {
    match name {
        "generate_unit_tests" => generate_unit_tests(args),
        "run_unit_tests" => run_unit_tests(args),
        "run_e2e" => run_e2e(args),
        "inspect_screenshots" => inspect_screenshots(args),
        "consolidate_report" => consolidate_report(args),
        "generate_html_report" => generate_html_report(args),
        other => error_envelope(&format!("Unknown tool: {}", other)),
    }
}

fn error_envelope(message: &str) -> Value {
    json!({ "success": false, "error": message })
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| error_envelope(&e.to_string()))
}

fn store() -> ArtifactStore {
    ArtifactStore::from_config()
}

fn generate_unit_tests(args: &Value) -> Value {
    let Some(path) = args["path"].as_str() else {
        return error_envelope("Missing required argument: path");
    };
    let strategy = match args.get("strategy") {
        None | Some(Value::Null) => TestStrategy::default(),
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(strategy) => strategy,
            Err(_) => return error_envelope(&format!("Unknown strategy: {}", value)),
        },
    };

    match unit::generate_unit_tests(Path::new(path), strategy) {
        Ok(files) => json!({
            "success": true,
            "generatedFiles": files,
        }),
        Err(e) => error_envelope(&e.to_string()),
    }
}

fn run_unit_tests(args: &Value) -> Value {
    let test_path = args["testPath"].as_str();
    let coverage = args["coverage"].as_bool().unwrap_or(false);

    match unit::run_unit_tests(&store(), test_path, coverage) {
        Ok(report) => to_value(&report),
        Err(e) => error_envelope(&e.to_string()),
    }
}

fn run_e2e(args: &Value) -> Value {
    // "url" is accepted as an alias for "baseUrl"
    let mut args = args.clone();
    if args.get("baseUrl").is_none() {
        if let Some(url) = args.get("url").cloned() {
            args["baseUrl"] = url;
        }
    }

    let scenario: Scenario = match serde_json::from_value(args) {
        Ok(scenario) => scenario,
        Err(e) => return error_envelope(&format!("Invalid scenario: {}", e)),
    };

    let browser = &config::get().browser;
    let mut session = match DriverBrowser::launch(
        &browser.driver_cmd,
        browser.viewport_width,
        browser.viewport_height,
    ) {
        Ok(session) => session,
        Err(e) => return error_envelope(&format!("Failed to start browser session: {}", e)),
    };

    let result = run_scenario(&mut session, &scenario, &store(), &ExecOptions::default());
    session.close();

    match result {
        Ok((report, _index)) => to_value(&report),
        Err(e) => error_envelope(&e.to_string()),
    }
}

fn inspect_screenshots(args: &Value) -> Value {
    inspect_screenshots_in(&store(), args)
}

fn inspect_screenshots_in(store: &ArtifactStore, args: &Value) -> Value {
    let screenshot_dir = args["screenshotDir"]
        .as_str()
        .map(PathBuf::from)
        .unwrap_or_else(|| store.screenshots_dir());
    // the baseline comparison only runs when a baseline dir is requested
    let baseline_dir = args["baselineDir"].as_str().map(PathBuf::from);
    let ocr_languages: Vec<String> = args["ocrLanguages"]
        .as_array()
        .map(|langs| {
            langs
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .filter(|langs: &Vec<String>| !langs.is_empty())
        .unwrap_or_else(|| vec!["eng".to_string()]);

    let screenshots = match artifacts::list_images(&screenshot_dir) {
        Ok(screenshots) => screenshots,
        Err(e) => {
            return error_envelope(&format!(
                "Cannot list screenshots in {}: {}",
                screenshot_dir.display(),
                e
            ))
        }
    };

    let index: StepsIndex = store.load_json(E2E_STEPS_FILE).unwrap_or_default();
    let inspector = Inspector::from_config(InspectConfig {
        baseline_dir,
        ocr_languages,
    });
    let report = inspector.inspect(&screenshots, &index);

    if let Err(e) = store.save_json(INSPECTION_RESULTS_FILE, &report) {
        return error_envelope(&e.to_string());
    }
    to_value(&report)
}

fn consolidate_report(args: &Value) -> Value {
    consolidate_report_in(&store(), args)
}

fn consolidate_report_in(store: &ArtifactStore, args: &Value) -> Value {
    let report = match consolidate::consolidate(store) {
        Ok(report) => report,
        Err(e) => return error_envelope(&e.to_string()),
    };

    // an extra copy alongside the fixed store path, when requested
    if let Some(path) = args["outputPath"].as_str() {
        let json = match serde_json::to_string_pretty(&report) {
            Ok(json) => json,
            Err(e) => return error_envelope(&e.to_string()),
        };
        if let Err(e) = std::fs::write(path, json) {
            return error_envelope(&format!("Failed to write {}: {}", path, e));
        }
    }

    let mut value = to_value(&report);
    if let Value::Object(map) = &mut value {
        map.insert(
            "summaryText".to_string(),
            Value::String(consolidate::text_summary(&report)),
        );
    }
    value
}

fn generate_html_report(args: &Value) -> Value {
    generate_html_report_in(&store(), args)
}

fn generate_html_report_in(store: &ArtifactStore, args: &Value) -> Value {
    let report: ConsolidatedReport = match args["reportPath"].as_str() {
        Some(path) => {
            let data = match std::fs::read_to_string(path) {
                Ok(data) => data,
                Err(e) => return error_envelope(&format!("Cannot read {}: {}", path, e)),
            };
            match serde_json::from_str(&data) {
                Ok(report) => report,
                Err(e) => {
                    return error_envelope(&format!(
                        "Invalid consolidated report at {}: {}",
                        path, e
                    ))
                }
            }
        }
        None => match store.load_json(CONSOLIDATED_REPORT_FILE) {
            Some(report) => report,
            None => match consolidate::consolidate(store) {
                Ok(report) => report,
                Err(e) => return error_envelope(&e.to_string()),
            },
        },
    };

    let out_path = args["outputPath"]
        .as_str()
        .map(PathBuf::from)
        .unwrap_or_else(|| store.document_path(HTML_REPORT_FILE));
    if let Err(e) = std::fs::write(&out_path, html::render(&report)) {
        return error_envelope(&format!("Failed to write {}: {}", out_path.display(), e));
    }

    json!({
        "success": true,
        "path": out_path,
    })
}
