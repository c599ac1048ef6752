use async_trait::async_trait;
use image::GrayImage;
use std::cell::OnceCell;
use tempfile::NamedTempFile;
use tokio::process::Command;

use super::setup::{locate, TesseractPaths, TesseractSettings};
use crate::error::{Result, ScanError};

/// Tesseract page segmentation mode: treat the image as a single text line
/// (the guide box holds one field).
pub const SINGLE_LINE_PSM: &str = "7";

/// Per-call recognition constraints. Nothing carries over between calls.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OcrParams {
    /// Allowed output characters; empty means unconstrained
    pub whitelist: String,
}

impl OcrParams {
    pub fn single_line(whitelist: impl Into<String>) -> Self {
        Self {
            whitelist: whitelist.into(),
        }
    }
}

/// Black-box OCR engine.
///
/// `init` may be slow and may fail; `recognize` returns raw text, possibly
/// empty or whitespace-laden. Futures are not `Send`: the scanner runs on a
/// single cooperative thread.
#[async_trait(?Send)]
pub trait OcrEngine {
    async fn init(&self) -> Result<()>;
    async fn recognize(&self, image: &GrayImage, params: &OcrParams) -> Result<String>;
}

/// Runs the tesseract executable once per recognition.
pub struct TesseractCli {
    settings: TesseractSettings,
    paths: OnceCell<TesseractPaths>,
}

impl TesseractCli {
    pub fn new(settings: TesseractSettings) -> Self {
        Self {
            settings,
            paths: OnceCell::new(),
        }
    }

    fn build_command(&self, paths: &TesseractPaths, input: &std::path::Path, params: &OcrParams) -> Command {
        let mut cmd = Command::new(&paths.executable);
        cmd.arg(input).arg("stdout");
        if let Some(dir) = &paths.tessdata {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.arg("-l")
            .arg(&self.settings.language)
            .arg("--psm")
            .arg(SINGLE_LINE_PSM);
        if !params.whitelist.is_empty() {
            cmd.arg("-c")
                .arg(format!("tessedit_char_whitelist={}", params.whitelist));
        }
        // A cancelled attempt must not leave tesseract running
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait(?Send)]
impl OcrEngine for TesseractCli {
    async fn init(&self) -> Result<()> {
        if self.paths.get().is_some() {
            return Ok(());
        }
        let paths = locate(&self.settings).await?;
        let _ = self.paths.set(paths);
        Ok(())
    }

    async fn recognize(&self, image: &GrayImage, params: &OcrParams) -> Result<String> {
        let paths = self
            .paths
            .get()
            .ok_or_else(|| ScanError::engine_init("tesseract used before init"))?;

        // Save image to temporary file (removed when dropped)
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image
            .save(temp_input.path())
            .map_err(|e| ScanError::recognition(format!("failed to write OCR input: {}", e)))?;

        let output = self
            .build_command(paths, temp_input.path(), params)
            .output()
            .await
            .map_err(|e| ScanError::recognition(format!("failed to run tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::recognition(format!("tesseract failed: {}", stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_command_includes_whitelist_only_when_set() {
        let engine = TesseractCli::new(TesseractSettings::default());
        let paths = TesseractPaths {
            executable: PathBuf::from("tesseract"),
            tessdata: Some(PathBuf::from("/data/tessdata")),
        };
        let input = PathBuf::from("in.png");

        let constrained = engine.build_command(&paths, &input, &OcrParams::single_line("0123456789"));
        let args = args_of(&constrained);
        assert_eq!(
            args,
            vec![
                "in.png", "stdout", "--tessdata-dir", "/data/tessdata", "-l", "jpn", "--psm", "7",
                "-c", "tessedit_char_whitelist=0123456789",
            ]
        );

        let free = engine.build_command(&paths, &input, &OcrParams::single_line(""));
        assert!(!args_of(&free).iter().any(|a| a == "-c"));
    }

    #[tokio::test]
    async fn test_recognize_before_init_fails() {
        let engine = TesseractCli::new(TesseractSettings::default());
        let img = GrayImage::new(4, 4);
        let result = engine.recognize(&img, &OcrParams::default()).await;
        assert!(matches!(result, Err(ScanError::EngineInit(_))));
    }
}
