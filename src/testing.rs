//! Test doubles for the engine and frame source.

use async_trait::async_trait;
use image::{GrayImage, Rgba, RgbaImage};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::capture::{AcquisitionMode, DisplaySize, FrameSource};
use crate::error::{Result, ScanError};
use crate::ocr::{OcrEngine, OcrParams};
use crate::scan::ResultSink;

/// Scripted OCR engine. Returns queued responses in order, then empty text.
pub struct FakeEngine {
    responses: RefCell<VecDeque<Result<String>>>,
    init_failures_left: Cell<u32>,
    init_delay: Duration,
    recognize_delay: Duration,
    init_calls: Cell<u32>,
    recognize_calls: Cell<u32>,
    last_params: RefCell<Option<OcrParams>>,
}

impl FakeEngine {
    pub fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            init_failures_left: Cell::new(0),
            init_delay: Duration::ZERO,
            recognize_delay: Duration::ZERO,
            init_calls: Cell::new(0),
            recognize_calls: Cell::new(0),
            last_params: RefCell::new(None),
        }
    }

    pub fn with_texts<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::new(texts.into_iter().map(|t| Ok(t.into())).collect())
    }

    pub fn init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    pub fn recognize_delay(mut self, delay: Duration) -> Self {
        self.recognize_delay = delay;
        self
    }

    /// Makes the first `times` startups fail.
    pub fn fail_init(self, times: u32) -> Self {
        self.init_failures_left.set(times);
        self
    }

    pub fn init_calls(&self) -> u32 {
        self.init_calls.get()
    }

    pub fn recognize_calls(&self) -> u32 {
        self.recognize_calls.get()
    }

    pub fn last_params(&self) -> Option<OcrParams> {
        self.last_params.borrow().clone()
    }
}

#[async_trait(?Send)]
impl OcrEngine for FakeEngine {
    async fn init(&self) -> Result<()> {
        self.init_calls.set(self.init_calls.get() + 1);
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        let left = self.init_failures_left.get();
        if left > 0 {
            self.init_failures_left.set(left - 1);
            return Err(ScanError::engine_init("traineddata missing"));
        }
        Ok(())
    }

    async fn recognize(&self, _image: &GrayImage, params: &OcrParams) -> Result<String> {
        self.recognize_calls.set(self.recognize_calls.get() + 1);
        *self.last_params.borrow_mut() = Some(params.clone());
        if !self.recognize_delay.is_zero() {
            tokio::time::sleep(self.recognize_delay).await;
        }
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// In-memory source with a switchable frame.
pub struct FakeSource {
    mode: AcquisitionMode,
    frame: Option<RgbaImage>,
    display: Option<DisplaySize>,
}

impl FakeSource {
    /// White 400x300 frame rendered at native size.
    pub fn new(mode: AcquisitionMode) -> Self {
        Self {
            mode,
            frame: Some(RgbaImage::from_pixel(400, 300, Rgba([255, 255, 255, 255]))),
            display: None,
        }
    }

    /// Live source that has not decoded a frame yet.
    pub fn without_frame(mode: AcquisitionMode) -> Self {
        Self {
            mode,
            frame: None,
            display: None,
        }
    }

    pub fn with_display(mut self, width: u32, height: u32) -> Self {
        self.display = Some(DisplaySize { width, height });
        self
    }
}

impl FrameSource for FakeSource {
    fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    fn has_frame(&self) -> bool {
        self.frame.is_some()
    }

    fn pixel_size(&self) -> (u32, u32) {
        self.frame.as_ref().map(|f| f.dimensions()).unwrap_or((0, 0))
    }

    fn display_size(&self) -> DisplaySize {
        let (width, height) = self.pixel_size();
        self.display.unwrap_or(DisplaySize { width, height })
    }

    fn snapshot(&self) -> Result<RgbaImage> {
        self.frame
            .clone()
            .ok_or_else(|| ScanError::processing("no frame"))
    }
}

/// Sink that records every result it receives.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub seen: Rc<RefCell<Vec<(String, String)>>>,
}

impl ResultSink for RecordingSink {
    fn on_result(&self, field_key: &str, text: &str) {
        self.seen
            .borrow_mut()
            .push((field_key.to_string(), text.to_string()));
    }
}
