//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for Web Vision, supporting:
//! - Environment variables for all configurable values
//! - Sensible defaults for every value
//! - Explicit config values threaded into the judging strategies at
//!   construction, so nothing deep in the pipeline reads ambient state
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `WEB_VISION_JUDGE_HOST` | Judge service base URL | `http://127.0.0.1:11434` |
//! | `WEB_VISION_JUDGE_MODEL` | Default judge model | `llava:13b` |
//! | `WEB_VISION_JUDGE_CONNECT_TIMEOUT` | Judge connect timeout (seconds) | `10` |
//! | `WEB_VISION_JUDGE_TIMEOUT` | Judge total request timeout (seconds) | `120` |
//! | `WEB_VISION_ARTIFACTS_DIR` | Root directory for artifacts | `.artifacts` |
//! | `WEB_VISION_DRIVER` | Browser driver command | `web-vision-driver` |
//! | `WEB_VISION_VIEWPORT` | Browser viewport size | `1280x720` |
//! | `WEB_VISION_TEST_CMD` | Unit test runner command | `cargo test` |
//!
//! # Example
//!
//! ```bash
//! # Point the judge at a different host
//! export WEB_VISION_JUDGE_HOST="http://gpu-box:11434"
//! export WEB_VISION_JUDGE_MODEL="llava:34b"
//!
//! # Keep artifacts somewhere else
//! export WEB_VISION_ARTIFACTS_DIR="/var/tmp/web-vision-artifacts"
//! ```

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default judge service base URL
pub const DEFAULT_JUDGE_HOST: &str = "http://127.0.0.1:11434";

/// Default judge model identifier
pub const DEFAULT_JUDGE_MODEL: &str = "llava:13b";

/// Default judge connection timeout (seconds)
pub const DEFAULT_JUDGE_CONNECT_TIMEOUT: u64 = 10;

/// Default judge total request timeout (seconds)
pub const DEFAULT_JUDGE_TIMEOUT: u64 = 120;

/// Default artifacts root directory
pub const DEFAULT_ARTIFACTS_DIR: &str = ".artifacts";

/// Default browser driver command
pub const DEFAULT_DRIVER_CMD: &str = "web-vision-driver";

/// Default viewport width (pixels)
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

/// Default viewport height (pixels)
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 720;

/// Default unit test runner command
pub const DEFAULT_TEST_CMD: &str = "cargo test";

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the judge host
pub const ENV_JUDGE_HOST: &str = "WEB_VISION_JUDGE_HOST";

/// Environment variable for the judge model
pub const ENV_JUDGE_MODEL: &str = "WEB_VISION_JUDGE_MODEL";

/// Environment variable for the judge connection timeout
pub const ENV_JUDGE_CONNECT_TIMEOUT: &str = "WEB_VISION_JUDGE_CONNECT_TIMEOUT";

/// Environment variable for the judge total timeout
pub const ENV_JUDGE_TIMEOUT: &str = "WEB_VISION_JUDGE_TIMEOUT";

/// Environment variable for the artifacts root
pub const ENV_ARTIFACTS_DIR: &str = "WEB_VISION_ARTIFACTS_DIR";

/// Environment variable for the browser driver command
pub const ENV_DRIVER_CMD: &str = "WEB_VISION_DRIVER";

/// Environment variable for the viewport size
pub const ENV_VIEWPORT: &str = "WEB_VISION_VIEWPORT";

/// Environment variable for the unit test runner command
pub const ENV_TEST_CMD: &str = "WEB_VISION_TEST_CMD";

/// Legacy environment variable for the judge host (Ollama convention)
pub const ENV_JUDGE_HOST_LEGACY: &str = "OLLAMA_HOST";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for Web Vision
#[derive(Debug, Clone)]
pub struct Config {
    /// Judge service configuration
    pub judge: JudgeSettings,
    /// Artifact storage configuration
    pub artifacts: ArtifactSettings,
    /// Browser session configuration
    pub browser: BrowserSettings,
    /// Unit test phase configuration
    pub unit: UnitSettings,
}

/// Judge-service-related settings
#[derive(Debug, Clone)]
pub struct JudgeSettings {
    /// Base URL of the judge service
    pub host: String,
    /// Default model identifier
    pub model: String,
    /// Connection timeout (seconds)
    pub connect_timeout: u64,
    /// Total request timeout (seconds)
    pub request_timeout: u64,
}

/// Artifact-storage-related settings
#[derive(Debug, Clone)]
pub struct ArtifactSettings {
    /// Root directory for all persisted artifacts
    pub root_dir: String,
}

/// Browser-session-related settings
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Command used to launch the external browser driver
    pub driver_cmd: String,
    /// Viewport width in pixels
    pub viewport_width: u32,
    /// Viewport height in pixels
    pub viewport_height: u32,
}

/// Unit-test-phase settings
#[derive(Debug, Clone)]
pub struct UnitSettings {
    /// Command used to run the external unit test runner
    pub test_cmd: String,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            judge: JudgeSettings::from_env(),
            artifacts: ArtifactSettings::from_env(),
            browser: BrowserSettings::from_env(),
            unit: UnitSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            judge: JudgeSettings::defaults(),
            artifacts: ArtifactSettings::defaults(),
            browser: BrowserSettings::defaults(),
            unit: UnitSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl JudgeSettings {
    /// Create judge settings from environment variables
    pub fn from_env() -> Self {
        Self {
            host: env::var(ENV_JUDGE_HOST)
                .or_else(|_| env::var(ENV_JUDGE_HOST_LEGACY))
                .unwrap_or_else(|_| DEFAULT_JUDGE_HOST.to_string()),
            model: env::var(ENV_JUDGE_MODEL).unwrap_or_else(|_| DEFAULT_JUDGE_MODEL.to_string()),
            connect_timeout: env::var(ENV_JUDGE_CONNECT_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_JUDGE_CONNECT_TIMEOUT),
            request_timeout: env::var(ENV_JUDGE_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_JUDGE_TIMEOUT),
        }
    }

    /// Create judge settings with defaults
    pub fn defaults() -> Self {
        Self {
            host: DEFAULT_JUDGE_HOST.to_string(),
            model: DEFAULT_JUDGE_MODEL.to_string(),
            connect_timeout: DEFAULT_JUDGE_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_JUDGE_TIMEOUT,
        }
    }
}

impl ArtifactSettings {
    /// Create artifact settings from environment variables
    pub fn from_env() -> Self {
        Self {
            root_dir: env::var(ENV_ARTIFACTS_DIR)
                .unwrap_or_else(|_| DEFAULT_ARTIFACTS_DIR.to_string()),
        }
    }

    /// Create artifact settings with defaults
    pub fn defaults() -> Self {
        Self {
            root_dir: DEFAULT_ARTIFACTS_DIR.to_string(),
        }
    }
}

impl BrowserSettings {
    /// Create browser settings from environment variables
    pub fn from_env() -> Self {
        let viewport = env::var(ENV_VIEWPORT).unwrap_or_default();
        let (width, height) =
            parse_viewport(&viewport).unwrap_or((DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT));

        Self {
            driver_cmd: env::var(ENV_DRIVER_CMD).unwrap_or_else(|_| DEFAULT_DRIVER_CMD.to_string()),
            viewport_width: width,
            viewport_height: height,
        }
    }

    /// Create browser settings with defaults
    pub fn defaults() -> Self {
        Self {
            driver_cmd: DEFAULT_DRIVER_CMD.to_string(),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

impl UnitSettings {
    /// Create unit-test settings from environment variables
    pub fn from_env() -> Self {
        Self {
            test_cmd: env::var(ENV_TEST_CMD).unwrap_or_else(|_| DEFAULT_TEST_CMD.to_string()),
        }
    }

    /// Create unit-test settings with defaults
    pub fn defaults() -> Self {
        Self {
            test_cmd: DEFAULT_TEST_CMD.to_string(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse a viewport string like "1280x720" into (width, height)
pub fn parse_viewport(size: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = size.split('x').collect();
    if parts.len() == 2 {
        let w = parts[0].parse().ok()?;
        let h = parts[1].parse().ok()?;
        Some((w, h))
    } else {
        None
    }
}

/// Get judge host from environment (convenience function)
pub fn judge_host() -> String {
    get().judge.host.clone()
}

/// Get judge model from environment (convenience function)
pub fn judge_model() -> String {
    get().judge.model.clone()
}

/// Get artifacts root directory (convenience function)
pub fn artifacts_dir() -> String {
    get().artifacts.root_dir.clone()
}
