//! Text recognition over screenshots.
//!
//! The concrete engine shells out to the `tesseract` binary and parses its
//! TSV output. Tests substitute a canned-text fake behind `OcrEngine`.

use std::path::Path;
use std::process::Command;

/// Result type for OCR operations
pub type OcrResult<T> = Result<T, OcrError>;

/// Errors that can occur during text recognition
#[derive(Debug)]
pub enum OcrError {
    /// The OCR binary could not be started
    Unavailable(String),
    /// Recognition ran but failed
    Failed(String),
    /// IO error
    Io(std::io::Error),
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrError::Unavailable(msg) => write!(
                f,
                "OCR engine unavailable: {} (is tesseract installed?)",
                msg
            ),
            OcrError::Failed(msg) => write!(f, "OCR failed: {}", msg),
            OcrError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for OcrError {}

impl From<std::io::Error> for OcrError {
    fn from(e: std::io::Error) -> Self {
        OcrError::Io(e)
    }
}

/// What a recognition pass produced
#[derive(Debug, Clone)]
pub struct OcrOutcome {
    /// Recognized text, in reading order
    pub text: String,
    /// Mean word confidence reported by the engine (0-100)
    pub confidence: Option<f64>,
}

/// Trait for OCR backends
pub trait OcrEngine {
    /// Recognize text in the image at `path`
    fn recognize(&self, path: &Path, languages: &[String]) -> OcrResult<OcrOutcome>;
}

/// OCR engine backed by the `tesseract` command-line binary
#[derive(Debug, Clone, Default)]
pub struct TesseractOcr;

impl TesseractOcr {
    pub fn new() -> Self {
        Self
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, path: &Path, languages: &[String]) -> OcrResult<OcrOutcome> {
        let lang = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        let output = Command::new("tesseract")
            .arg(path)
            .arg("stdout")
            .args(["-l", &lang, "tsv"])
            .output()
            .map_err(|e| OcrError::Unavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed(stderr.trim().to_string()));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        Ok(parse_tsv(&tsv))
    }
}

/// Parse tesseract TSV output into recognized text plus mean confidence.
///
/// Word rows are level 5; the confidence column is -1 for structural rows.
fn parse_tsv(tsv: &str) -> OcrOutcome {
    let mut words: Vec<&str> = Vec::new();
    let mut confidences: Vec<f64> = Vec::new();

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }
        if fields[0] != "5" {
            continue;
        }
        let conf: f64 = fields[10].parse().unwrap_or(-1.0);
        let word = fields[11].trim();
        if conf < 0.0 || word.is_empty() {
            continue;
        }
        words.push(word);
        confidences.push(conf);
    }

    let confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    };

    OcrOutcome {
        text: words.join(" "),
        confidence,
    }
}

/// Lowercase and collapse whitespace so recognition artifacts do not defeat
/// substring matching.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case- and whitespace-insensitive substring check
pub fn contains_text(recognized: &str, expected: &str) -> bool {
    normalize(recognized).contains(&normalize(expected))
}
