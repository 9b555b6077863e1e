//! Web Vision - Automated UI testing with visual inspection.
//!
//! This crate provides:
//! - Scripted E2E browser runs with per-step retry and inline assertions
//! - Deferred visual inspection of screenshots (pixel diff, OCR, VLM judge)
//! - Unit-test scaffolding generation and external runner delegation
//! - Report consolidation across all phases, with HTML output
//! - A tool surface behind a line-delimited JSON request/response protocol
//!
//! # Example
//!
//! ```rust,no_run
//! use web_vision::artifacts::ArtifactStore;
//! use web_vision::browser::{BrowserSession, MockBrowser};
//! use web_vision::executor::ExecOptions;
//! use web_vision::runner::run_scenario;
//! use web_vision::scenario::{ActionKind, Scenario, Step};
//!
//! let scenario = Scenario::new("http://localhost:3000")
//!     .step(Step::new(ActionKind::Navigate))
//!     .step(Step::new(ActionKind::Screenshot));
//!
//! let store = ArtifactStore::new(".artifacts");
//! let mut session = MockBrowser::new().page("http://localhost:3000", "<h1>Home</h1>");
//! let (report, index) =
//!     run_scenario(&mut session, &scenario, &store, &ExecOptions::default()).unwrap();
//! session.close();
//! assert!(report.success);
//! assert_eq!(index.steps.len(), 2);
//! ```

pub mod artifacts;
pub mod browser;
pub mod config;
pub mod consolidate;
pub mod executor;
pub mod html;
pub mod inspect;
pub mod runner;
pub mod scenario;
pub mod tools;
pub mod unit;
pub mod vlm;

// Re-export scenario types
pub use scenario::{ActionKind, Assertion, AssertionKind, Scenario, ScenarioError, Step};

// Re-export browser session types
pub use browser::{BrowserError, BrowserResult, BrowserSession, DriverBrowser, MockBrowser};

// Re-export runner types
pub use runner::{
    AssertionResult, RunReport, RunnerError, RunnerResult, StepResult, StepsIndex, run_scenario,
};

// Re-export inspection types
pub use inspect::{
    CheckResult, InspectConfig, InspectionReport, InspectionResult, Inspector,
    diff::compare_images,
    ocr::{OcrEngine, TesseractOcr},
};

// Re-export VLM judge client
pub use vlm::{CurlVlmJudge, VlmConfig, VlmError, VlmJudge, VlmResult, check_health};

// Re-export reporting
pub use consolidate::{ConsolidatedReport, OverallStatus, consolidate};

// Re-export artifact store
pub use artifacts::{ArtifactError, ArtifactResult, ArtifactStore};
