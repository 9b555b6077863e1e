//! Command-line entry point for web-vision.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use web_vision::artifacts::ArtifactStore;
use web_vision::browser::{BrowserSession, DriverBrowser};
use web_vision::config;
use web_vision::consolidate;
use web_vision::executor::ExecOptions;
use web_vision::html;
use web_vision::inspect::{InspectConfig, Inspector};
use web_vision::runner::run_scenario;
use web_vision::scenario::Scenario;
use web_vision::tools;
use web_vision::unit;

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    WEB_VISION_JUDGE_HOST             Judge service base URL [default: http://127.0.0.1:11434]
    OLLAMA_HOST                       Legacy fallback for the judge host
    WEB_VISION_JUDGE_MODEL            Default judge model [default: llava:13b]
    WEB_VISION_JUDGE_CONNECT_TIMEOUT  Judge connect timeout in seconds [default: 10]
    WEB_VISION_JUDGE_TIMEOUT          Judge total timeout in seconds [default: 120]
    WEB_VISION_ARTIFACTS_DIR          Artifact store root [default: .artifacts]
    WEB_VISION_DRIVER                 Browser driver command [default: web-vision-driver]
    WEB_VISION_VIEWPORT               Viewport as WxH [default: 1280x720]
    WEB_VISION_TEST_CMD               Unit-test runner command [default: cargo test]";

#[derive(Parser)]
#[command(
    name = "web-vision",
    version,
    about = "Automated UI testing with visual inspection",
    after_help = ENV_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an E2E scenario from a JSON file
    Run {
        /// Path to the scenario JSON
        scenario: PathBuf,

        /// Override the scenario's base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Override the browser driver command
        #[arg(long, env = "WEB_VISION_DRIVER")]
        driver: Option<String>,
    },

    /// Inspect captured screenshots against baselines and deferred assertions
    Inspect {
        /// Additional OCR languages (tesseract codes)
        #[arg(long = "ocr-lang", default_value = "eng")]
        ocr_languages: Vec<String>,
    },

    /// Fold phase reports into the consolidated report
    Consolidate,

    /// Render the consolidated report as HTML
    HtmlReport,

    /// Generate unit-test scaffolding for Rust sources
    GenTests {
        /// File or directory to scan
        path: PathBuf,

        /// How much scaffolding to emit
        #[arg(long, value_enum, default_value = "basic")]
        strategy: StrategyArg,
    },

    /// Run the project's unit tests and record the results
    RunTests {
        /// Filter passed through to the test runner
        #[arg(long)]
        test_path: Option<String>,

        /// Record raw runner output as coverage
        #[arg(long)]
        coverage: bool,
    },

    /// Serve the tool surface over stdin/stdout (one JSON request per line)
    Serve,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Basic,
    Comprehensive,
    EdgeCases,
}

impl From<StrategyArg> for unit::TestStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Basic => unit::TestStrategy::Basic,
            StrategyArg::Comprehensive => unit::TestStrategy::Comprehensive,
            StrategyArg::EdgeCases => unit::TestStrategy::EdgeCases,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Command::Run {
            scenario,
            base_url,
            driver,
        } => cmd_run(&scenario, base_url, driver),
        Command::Inspect { ocr_languages } => cmd_inspect(ocr_languages),
        Command::Consolidate => cmd_consolidate(),
        Command::HtmlReport => cmd_html_report(),
        Command::GenTests { path, strategy } => cmd_gen_tests(&path, strategy.into()),
        Command::RunTests {
            test_path,
            coverage,
        } => cmd_run_tests(test_path.as_deref(), coverage),
        Command::Serve => cmd_serve(),
    };

    std::process::exit(exit_code);
}

fn cmd_run(scenario_path: &PathBuf, base_url: Option<String>, driver: Option<String>) -> i32 {
    let content = match std::fs::read_to_string(scenario_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {}: {}", scenario_path.display(), e);
            return 2;
        }
    };

    let mut scenario: Scenario = match serde_json::from_str(&content) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Error parsing scenario: {}", e);
            return 2;
        }
    };
    if let Some(url) = base_url {
        scenario.base_url = url;
    }

    let browser = &config::get().browser;
    let driver_cmd = driver.unwrap_or_else(|| browser.driver_cmd.clone());
    let mut session =
        match DriverBrowser::launch(&driver_cmd, browser.viewport_width, browser.viewport_height) {
            Ok(session) => session,
            Err(e) => {
                eprintln!("Failed to start browser session: {}", e);
                return 1;
            }
        };

    let store = ArtifactStore::from_config();
    let result = run_scenario(&mut session, &scenario, &store, &ExecOptions::default());
    session.close();

    match result {
        Ok((report, _index)) => {
            println!(
                "Executed {}/{} steps, {}",
                report.executed_steps,
                report.total_steps,
                if report.success { "passed" } else { "failed" }
            );
            for step in report.results.iter().filter(|r| !r.success) {
                eprintln!(
                    "  step {} ({}): {}",
                    step.step,
                    step.action.as_str(),
                    step.error.as_deref().unwrap_or("assertion failed")
                );
            }
            if report.success {
                0
            } else {
                1
            }
        }
        Err(e) => {
            eprintln!("Run failed: {}", e);
            1
        }
    }
}

fn cmd_inspect(ocr_languages: Vec<String>) -> i32 {
    let judge = &config::get().judge;
    match web_vision::vlm::check_health(&judge.host, judge.connect_timeout) {
        Ok(true) => {}
        _ => eprintln!(
            "Warning: judge service at {} is not reachable; VLM checks will fail",
            judge.host
        ),
    }

    let store = ArtifactStore::from_config();
    let inspector = Inspector::from_config(
        InspectConfig::for_store(&store).ocr_languages(ocr_languages),
    );

    match inspector.inspect_store(&store) {
        Ok(report) => {
            let failed = report.results.iter().filter(|r| !r.passed).count();
            println!(
                "Inspected {} screenshots, {} failed",
                report.total_screenshots, failed
            );
            for result in report.results.iter().filter(|r| !r.passed) {
                for check in result.checks.iter().filter(|c| !c.passed) {
                    eprintln!("  {}: {}", result.screenshot.display(), check.details);
                }
            }
            if report.success {
                0
            } else {
                1
            }
        }
        Err(e) => {
            eprintln!("Inspection failed: {}", e);
            1
        }
    }
}

fn cmd_consolidate() -> i32 {
    let store = ArtifactStore::from_config();
    match consolidate::consolidate(&store) {
        Ok(report) => {
            print!("{}", consolidate::text_summary(&report));
            match report.summary.overall_status {
                consolidate::OverallStatus::Passed => 0,
                _ => 1,
            }
        }
        Err(e) => {
            eprintln!("Consolidation failed: {}", e);
            1
        }
    }
}

fn cmd_html_report() -> i32 {
    let store = ArtifactStore::from_config();
    match html::generate_html_report(&store) {
        Ok(path) => {
            println!("Report written to {}", path.display());
            0
        }
        Err(e) => {
            eprintln!("Report generation failed: {}", e);
            1
        }
    }
}

fn cmd_gen_tests(path: &PathBuf, strategy: unit::TestStrategy) -> i32 {
    match unit::generate_unit_tests(path, strategy) {
        Ok(files) => {
            for file in &files {
                println!("{}", file.display());
            }
            0
        }
        Err(e) => {
            eprintln!("Generation failed: {}", e);
            1
        }
    }
}

fn cmd_run_tests(test_path: Option<&str>, coverage: bool) -> i32 {
    let store = ArtifactStore::from_config();
    if let Err(e) = store.init() {
        eprintln!("Failed to prepare artifact store: {}", e);
        return 1;
    }

    match unit::run_unit_tests(&store, test_path, coverage) {
        Ok(report) => {
            println!(
                "{} tests: {} passed, {} failed, {} ignored",
                report.summary.total,
                report.summary.passed,
                report.summary.failed,
                report.summary.ignored
            );
            if report.success {
                0
            } else {
                1
            }
        }
        Err(e) => {
            eprintln!("Test run failed: {}", e);
            1
        }
    }
}

/// One JSON request per stdin line, one JSON response per stdout line.
fn cmd_serve() -> i32 {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(request) => {
                let name = request["tool"].as_str().unwrap_or("");
                let args = request
                    .get("args")
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                tools::dispatch(name, &args)
            }
            Err(e) => serde_json::json!({
                "success": false,
                "error": format!("Invalid request: {}", e),
            }),
        };

        let mut out = stdout.lock();
        if serde_json::to_writer(&mut out, &response).is_err() {
            break;
        }
        if out.write_all(b"\n").and_then(|_| out.flush()).is_err() {
            break;
        }
    }

    0
}
