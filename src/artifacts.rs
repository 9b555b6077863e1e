//! Artifact storage for screenshots and JSON result documents.
//!
//! All pipeline phases share one append-mostly store rooted at a single
//! directory (default `.artifacts`). Documents live at fixed relative paths so
//! a later phase can pick up what an earlier phase wrote:
//!
//! - `screenshots/` - captured viewport images
//! - `baseline/` - accepted reference images, mirrored by basename
//! - `unit-test-results.json`, `e2e-results.json`, `e2e-steps.json`,
//!   `inspection-results.json`, `consolidated-report.json`, `test-report.html`
//!
//! Nothing in the pipeline ever deletes from the store.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// File name of the persisted unit test report
pub const UNIT_RESULTS_FILE: &str = "unit-test-results.json";

/// File name of the persisted E2E run report
pub const E2E_RESULTS_FILE: &str = "e2e-results.json";

/// File name of the persisted steps index (deferred assertion linkage)
pub const E2E_STEPS_FILE: &str = "e2e-steps.json";

/// File name of the persisted inspection report
pub const INSPECTION_RESULTS_FILE: &str = "inspection-results.json";

/// File name of the consolidated report
pub const CONSOLIDATED_REPORT_FILE: &str = "consolidated-report.json";

/// File name of the rendered HTML report
pub const HTML_REPORT_FILE: &str = "test-report.html";

/// Subdirectory for captured screenshots
pub const SCREENSHOTS_DIR: &str = "screenshots";

/// Subdirectory for baseline images
pub const BASELINE_DIR: &str = "baseline";

/// Result type for artifact operations
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Error types for artifact operations
#[derive(Debug)]
pub enum ArtifactError {
    /// I/O error
    Io(std::io::Error),

    /// Serialization error
    Serialization(serde_json::Error),
}

impl std::fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactError::Io(err) => write!(f, "I/O error: {}", err),
            ArtifactError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for ArtifactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArtifactError::Io(err) => Some(err),
            ArtifactError::Serialization(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ArtifactError {
    fn from(err: std::io::Error) -> Self {
        ArtifactError::Io(err)
    }
}

impl From<serde_json::Error> for ArtifactError {
    fn from(err: serde_json::Error) -> Self {
        ArtifactError::Serialization(err)
    }
}

/// Filesystem-backed keyed storage for pipeline artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// Root directory for this store
    pub root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store rooted at the configured default directory
    pub fn from_config() -> Self {
        Self::new(crate::config::artifacts_dir())
    }

    /// Create the root and screenshots directories if missing
    pub fn init(&self) -> ArtifactResult<()> {
        fs::create_dir_all(self.screenshots_dir())?;
        Ok(())
    }

    /// Directory holding captured screenshots
    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join(SCREENSHOTS_DIR)
    }

    /// Directory holding baseline images
    pub fn baseline_dir(&self) -> PathBuf {
        self.root.join(BASELINE_DIR)
    }

    /// Path for a named screenshot (sanitized, `.png` appended)
    pub fn screenshot_path(&self, name: &str) -> PathBuf {
        self.screenshots_dir()
            .join(format!("{}.png", sanitize_name(name)))
    }

    /// Path of a named JSON or HTML document inside the store
    pub fn document_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Serialize a value as pretty JSON at a fixed relative path
    pub fn save_json<T: Serialize>(&self, file_name: &str, value: &T) -> ArtifactResult<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.document_path(file_name);
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    /// Load a JSON document from a fixed relative path, `None` if absent or unparseable
    pub fn load_json<T: DeserializeOwned>(&self, file_name: &str) -> Option<T> {
        let data = fs::read_to_string(self.document_path(file_name)).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Write raw screenshot bytes under the screenshots directory
    pub fn save_screenshot(&self, name: &str, data: &[u8]) -> ArtifactResult<PathBuf> {
        fs::create_dir_all(self.screenshots_dir())?;
        let path = self.screenshot_path(name);
        fs::write(&path, data)?;
        Ok(path)
    }

    /// List screenshot images (`.png`/`.jpg`) in the store's screenshots directory
    pub fn list_screenshots(&self) -> ArtifactResult<Vec<PathBuf>> {
        list_images(&self.screenshots_dir())
    }
}

/// List image files (`.png`/`.jpg`) in an arbitrary directory, sorted
pub fn list_images(dir: &Path) -> ArtifactResult<Vec<PathBuf>> {
    let mut images = Vec::new();
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_image = path
                .extension()
                .map(|e| e == "png" || e == "jpg")
                .unwrap_or(false);
            if is_image {
                images.push(path);
            }
        }
    }
    images.sort();
    Ok(images)
}

/// Sanitize a name for use in filenames
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Doc {
        value: u32,
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("login-form"), "login-form");
        assert_eq!(sanitize_name("step 3/retry"), "step_3_retry");
        assert_eq!(sanitize_name("auto-step-1"), "auto-step-1");
    }

    #[test]
    fn test_screenshot_path() {
        let store = ArtifactStore::new("/tmp/wv");
        assert_eq!(
            store.screenshot_path("home page"),
            PathBuf::from("/tmp/wv/screenshots/home_page.png")
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save_json("doc.json", &Doc { value: 7 }).unwrap();

        let loaded: Option<Doc> = store.load_json("doc.json");
        assert_eq!(loaded, Some(Doc { value: 7 }));

        let missing: Option<Doc> = store.load_json("absent.json");
        assert!(missing.is_none());
    }

    #[test]
    fn test_list_screenshots_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.init().unwrap();
        store.save_screenshot("b-shot", &[1]).unwrap();
        store.save_screenshot("a-shot", &[2]).unwrap();
        fs::write(store.screenshots_dir().join("notes.txt"), "x").unwrap();

        let shots = store.list_screenshots().unwrap();
        assert_eq!(shots.len(), 2);
        assert!(shots[0].ends_with("a-shot.png"));
        assert!(shots[1].ends_with("b-shot.png"));
    }
}
