use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::error::{Result, ScanError};

/// Where to find Tesseract and which language model to load.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractSettings {
    /// Explicit path to the tesseract executable
    pub executable: Option<PathBuf>,
    /// Explicit tessdata directory
    pub tessdata_dir: Option<PathBuf>,
    /// Language model, e.g. "jpn" or "jpn+eng"
    pub language: String,
}

impl Default for TesseractSettings {
    fn default() -> Self {
        Self {
            executable: None,
            tessdata_dir: None,
            language: "jpn".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    /// `None` lets tesseract use its compiled-in tessdata location
    pub tessdata: Option<PathBuf>,
}

const COMMON_EXECUTABLES: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

const COMMON_TESSDATA: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];

/// Private install location: `<data_local_dir>/docscan/tesseract`.
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docscan")
        .join("tesseract")
}

fn executable_name() -> &'static str {
    if cfg!(windows) { "tesseract.exe" } else { "tesseract" }
}

/// Finds the Tesseract executable: configured path, our local dir, PATH, then
/// common install locations.
pub async fn find_tesseract_executable(settings: &TesseractSettings) -> Result<PathBuf> {
    if let Some(exe) = &settings.executable {
        if exe.exists() {
            return Ok(exe.clone());
        }
        return Err(ScanError::engine_init(format!(
            "configured tesseract executable not found: {}",
            exe.display()
        )));
    }

    let local_exe = get_tesseract_dir().join(executable_name());
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    if let Ok(output) = Command::new("tesseract").arg("--version").output().await {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_EXECUTABLES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| ScanError::engine_init("tesseract not found; install Tesseract-OCR"))
}

fn has_model(dir: &Path, language: &str) -> bool {
    // "jpn+eng" needs every listed model
    language
        .split('+')
        .all(|lang| dir.join(format!("{}.traineddata", lang)).exists())
}

/// Finds a tessdata directory holding the configured language model.
///
/// Returns `Ok(None)` when nothing is found on disk; the engine then relies on
/// tesseract's built-in location and verifies the language at startup.
pub fn find_tessdata_dir(settings: &TesseractSettings) -> Result<Option<PathBuf>> {
    let language = settings.language.as_str();

    if let Some(dir) = &settings.tessdata_dir {
        if has_model(dir, language) {
            return Ok(Some(dir.clone()));
        }
        return Err(ScanError::engine_init(format!(
            "{}.traineddata not found in configured tessdata dir {}",
            language,
            dir.display()
        )));
    }

    let local = get_tesseract_dir().join("tessdata");
    if has_model(&local, language) {
        return Ok(Some(local));
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        for candidate in [prefix.clone(), prefix.join("tessdata")] {
            if has_model(&candidate, language) {
                return Ok(Some(candidate));
            }
        }
    }

    Ok(COMMON_TESSDATA
        .iter()
        .map(PathBuf::from)
        .find(|p| has_model(p, language)))
}

/// Parses `tesseract --list-langs` output (header line, then one code per line).
pub fn parse_list_langs(output: &str) -> Vec<String> {
    output
        .lines()
        .skip_while(|line| !line.starts_with("List of available languages"))
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Locates tesseract and confirms the language model is loadable.
pub async fn locate(settings: &TesseractSettings) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(settings).await?;
    let tessdata = find_tessdata_dir(settings)?;

    let mut cmd = Command::new(&executable);
    if let Some(dir) = &tessdata {
        cmd.arg("--tessdata-dir").arg(dir);
    }
    let output = cmd
        .arg("--list-langs")
        .output()
        .await
        .map_err(|e| ScanError::engine_init(format!("failed to run tesseract: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScanError::engine_init(format!("tesseract --list-langs failed: {}", stderr)));
    }

    // Older builds print the list on stderr
    let listing = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let available = parse_list_langs(&listing);
    if let Some(missing) = settings
        .language
        .split('+')
        .find(|lang| !available.iter().any(|a| a == lang))
    {
        return Err(ScanError::engine_init(format!(
            "tesseract language '{}' not installed (available: {})",
            missing,
            available.join(", ")
        )));
    }

    tracing::info!(
        executable = %executable.display(),
        tessdata = ?tessdata,
        language = %settings.language,
        "tesseract located"
    );

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}
