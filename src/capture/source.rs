//! Frame sources: a single uploaded image, or a live feed exposed as a frame
//! file that an external capture tool keeps overwriting.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Result, ScanError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMode {
    /// Continuously updating camera stream
    Live,
    /// Single uploaded image
    Static,
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionMode::Live => write!(f, "live"),
            AcquisitionMode::Static => write!(f, "static"),
        }
    }
}

/// Rendered size of the source on screen, in display pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

/// Anything the scanner can pull frames from.
pub trait FrameSource {
    fn mode(&self) -> AcquisitionMode;

    /// Picks up a newer frame if one is available. Cheap when nothing changed.
    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }

    /// Live sources: at least one frame has been decoded.
    fn has_frame(&self) -> bool;

    /// Native resolution of the current frame.
    fn pixel_size(&self) -> (u32, u32);

    /// Size the frame is rendered at. Defaults to native resolution.
    fn display_size(&self) -> DisplaySize {
        let (width, height) = self.pixel_size();
        DisplaySize { width, height }
    }

    /// Copies the current frame at native resolution.
    fn snapshot(&self) -> Result<RgbaImage>;
}

/// An already-decoded still image.
pub struct StaticImageSource {
    image: RgbaImage,
    display: Option<DisplaySize>,
}

impl StaticImageSource {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            display: None,
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)?.to_rgba8();
        tracing::info!(path = %path.display(), width = image.width(), height = image.height(), "image loaded");
        Ok(Self::new(image))
    }

    pub fn with_display(mut self, display: DisplaySize) -> Self {
        self.display = Some(display);
        self
    }
}

impl FrameSource for StaticImageSource {
    fn mode(&self) -> AcquisitionMode {
        AcquisitionMode::Static
    }

    fn has_frame(&self) -> bool {
        self.image.width() > 0 && self.image.height() > 0
    }

    fn pixel_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn display_size(&self) -> DisplaySize {
        self.display.unwrap_or(DisplaySize {
            width: self.image.width(),
            height: self.image.height(),
        })
    }

    fn snapshot(&self) -> Result<RgbaImage> {
        Ok(self.image.clone())
    }
}

/// Live feed read from a frame file. A frame that fails to decode (caught
/// mid-write) is skipped and the previous one stays current.
pub struct SnapshotFileSource {
    path: PathBuf,
    latest: Option<RgbaImage>,
    modified: Option<SystemTime>,
    display: Option<DisplaySize>,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            latest: None,
            modified: None,
            display: None,
        }
    }

    pub fn with_display(mut self, display: DisplaySize) -> Self {
        self.display = Some(display);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for SnapshotFileSource {
    fn mode(&self) -> AcquisitionMode {
        AcquisitionMode::Live
    }

    fn refresh(&mut self) -> Result<()> {
        let modified = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            // No frame written yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if self.latest.is_some() && self.modified == Some(modified) {
            return Ok(());
        }

        match image::open(&self.path) {
            Ok(img) => {
                self.latest = Some(img.to_rgba8());
                self.modified = Some(modified);
            }
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "frame not decodable yet");
            }
        }
        Ok(())
    }

    fn has_frame(&self) -> bool {
        self.latest.is_some()
    }

    fn pixel_size(&self) -> (u32, u32) {
        self.latest.as_ref().map(|img| img.dimensions()).unwrap_or((0, 0))
    }

    fn display_size(&self) -> DisplaySize {
        let (width, height) = self.pixel_size();
        self.display.unwrap_or(DisplaySize { width, height })
    }

    fn snapshot(&self) -> Result<RgbaImage> {
        self.latest
            .clone()
            .ok_or_else(|| ScanError::processing("no live frame available"))
    }
}
