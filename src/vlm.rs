//! Vision Language Model (VLM) judge client.
//!
//! Sends a screenshot plus an evaluation prompt to an external judge service
//! and returns the reply text. Sampling is pinned (fixed temperature and
//! seed) so repeated inspection runs are reproducible.
//!
//! The judge host is explicit configuration threaded in at construction:
//! the inspection engine never reads ambient state, so tests can substitute
//! a fake judge behind the `VlmJudge` trait.

use std::process::Command;

use base64::Engine;

use crate::config::JudgeSettings;

/// Sampling temperature for judge requests
pub const JUDGE_TEMPERATURE: f64 = 0.1;

/// Sampling seed for judge requests
pub const JUDGE_SEED: u64 = 42;

/// Result type for VLM operations
pub type VlmResult<T> = Result<T, VlmError>;

/// Errors that can occur during VLM operations
#[derive(Debug)]
pub enum VlmError {
    /// Failed to connect to the judge service
    ConnectionFailed(String),
    /// Unparseable response from the judge
    InvalidResponse(String),
    /// IO error
    Io(std::io::Error),
}

impl std::fmt::Display for VlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VlmError::ConnectionFailed(msg) => write!(f, "{}", msg),
            VlmError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            VlmError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for VlmError {}

impl From<std::io::Error> for VlmError {
    fn from(e: std::io::Error) -> Self {
        VlmError::Io(e)
    }
}

/// Configuration for the VLM judge client
#[derive(Debug, Clone)]
pub struct VlmConfig {
    /// Base URL of the judge service
    pub host: String,
    /// Default model when an assertion names none
    pub model: String,
    /// Timeout for the initial connection (seconds)
    pub connection_timeout: u64,
    /// Timeout for the whole request (seconds)
    pub request_timeout: u64,
}

impl VlmConfig {
    pub fn new(host: impl Into<String>) -> Self {
        let defaults = JudgeSettings::defaults();
        Self {
            host: host.into(),
            model: defaults.model,
            connection_timeout: defaults.connect_timeout,
            request_timeout: defaults.request_timeout,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout = seconds;
        self
    }
}

impl From<&JudgeSettings> for VlmConfig {
    fn from(settings: &JudgeSettings) -> Self {
        Self {
            host: settings.host.clone(),
            model: settings.model.clone(),
            connection_timeout: settings.connect_timeout,
            request_timeout: settings.request_timeout,
        }
    }
}

/// Trait for vision judge backends
///
/// The concrete client shells out to the configured judge service; tests
/// substitute a canned-reply fake.
pub trait VlmJudge {
    /// Judge an image against a prompt, returning the reply text
    fn judge(&self, image_data: &[u8], prompt: &str, model: &str) -> VlmResult<String>;

    /// Default model identifier when an assertion names none
    fn default_model(&self) -> &str;
}

/// Judge client that POSTs to the service's chat endpoint via curl
#[derive(Debug, Clone)]
pub struct CurlVlmJudge {
    config: VlmConfig,
}

impl CurlVlmJudge {
    /// Create a judge client for the given configuration
    pub fn new(config: VlmConfig) -> Self {
        Self { config }
    }
}

impl VlmJudge for CurlVlmJudge {
    fn judge(&self, image_data: &[u8], prompt: &str, model: &str) -> VlmResult<String> {
        let img_base64 = base64::engine::general_purpose::STANDARD.encode(image_data);

        let request = serde_json::json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": prompt,
                "images": [img_base64]
            }],
            "stream": false,
            "options": {
                "temperature": JUDGE_TEMPERATURE,
                "seed": JUDGE_SEED
            }
        });

        let request_json = serde_json::to_string(&request)
            .map_err(|e| VlmError::InvalidResponse(e.to_string()))?;

        let endpoint = format!("{}/api/chat", self.config.host.trim_end_matches('/'));
        let output = Command::new("curl")
            .args([
                "-s",
                "-X", "POST",
                &endpoint,
                "-H", "Content-Type: application/json",
                "-d", &request_json,
                "--connect-timeout", &self.config.connection_timeout.to_string(),
                "--max-time", &self.config.request_timeout.to_string(),
            ])
            .output()
            .map_err(|e| connection_error(&self.config.host, &e.to_string()))?;

        if !output.status.success() || output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(connection_error(&self.config.host, stderr.trim()));
        }

        let response: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| VlmError::InvalidResponse(e.to_string()))?;

        if let Some(error) = response["error"].as_str() {
            return Err(VlmError::InvalidResponse(error.to_string()));
        }

        let content = response["message"]["content"].as_str().unwrap_or("");
        Ok(content.trim().to_string())
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }
}

/// Build the connection-failure error, naming the configured host so a
/// misconfigured environment is obvious from the check details.
fn connection_error(host: &str, detail: &str) -> VlmError {
    let mut message = format!(
        "Cannot connect to the judge service. Please ensure it is running at {}",
        host
    );
    if !detail.is_empty() {
        message.push_str(&format!(" ({})", detail));
    }
    VlmError::ConnectionFailed(message)
}

/// Check if the judge service is reachable (connection-only check).
///
/// Any HTTP response, even an error status, means the server is reachable;
/// exit code 000 from curl means the connection failed entirely.
pub fn check_health(host: &str, timeout_secs: u64) -> VlmResult<bool> {
    let endpoint = format!("{}/api/tags", host.trim_end_matches('/'));
    let output = Command::new("curl")
        .args([
            "-s",
            "-o", "/dev/null",
            "-w", "%{http_code}",
            "--connect-timeout", &timeout_secs.to_string(),
            "--max-time", &timeout_secs.to_string(),
            &endpoint,
        ])
        .output()?;

    let status = String::from_utf8_lossy(&output.stdout);
    let code: u16 = status.trim().parse().unwrap_or(0);
    Ok(code > 0)
}
