//! Scan cycle state machine.
//!
//! Each attempt runs: capture → ROI → crop → normalize → charset → recognize →
//! clean → store. Live mode is level-triggered by a ticker; static mode is
//! edge-triggered by field selection or an explicit re-trigger.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;

use super::scheduler::Ticker;
use super::session::ScanSession;
use super::sink::{LogSink, ResultSink};
use crate::capture::{AcquisitionMode, FrameSource, GuideBox};
use crate::error::{Result, ScanError};
use crate::ocr::{clean_text, crop_roi, normalize, EngineState, FieldProfiles, OcrEngine, RecognitionGateway};
use crate::template::RecordTemplate;

/// Cooldowns and tick period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanTiming {
    /// Pause after a successful read in live mode
    pub live_cooldown: Duration,
    /// Pause after a successful read in static mode (guards double triggers)
    pub static_cooldown: Duration,
    /// Live-mode tick period
    pub tick_interval: Duration,
}

impl Default for ScanTiming {
    fn default() -> Self {
        Self {
            live_cooldown: Duration::from_millis(1500),
            static_cooldown: Duration::from_millis(500),
            tick_interval: Duration::from_millis(1500),
        }
    }
}

impl ScanTiming {
    pub fn cooldown(&self, mode: AcquisitionMode) -> Duration {
        match mode {
            AcquisitionMode::Live => self.live_cooldown,
            AcquisitionMode::Static => self.static_cooldown,
        }
    }
}

/// Why an attempt did not start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NoFieldSelected,
    /// Another attempt is in flight
    Busy,
    CoolingDown,
    /// OCR startup still pending; the attempt is dropped, not queued
    EngineStarting,
    SourceNotReady,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoFieldSelected => write!(f, "no field selected"),
            SkipReason::Busy => write!(f, "scan in progress"),
            SkipReason::CoolingDown => write!(f, "cooling down"),
            SkipReason::EngineStarting => write!(f, "OCR engine starting"),
            SkipReason::SourceNotReady => write!(f, "no frame available"),
        }
    }
}

/// Result of one controller invocation.
#[derive(Debug)]
pub enum ScanOutcome {
    Skipped(SkipReason),
    Recognized { key: String, text: String },
    /// Engine ran but returned nothing after cleanup
    NoText,
    /// Attempt aborted; nothing was written
    Failed(ScanError),
}

impl ScanOutcome {
    pub fn is_recognized(&self) -> bool {
        matches!(self, ScanOutcome::Recognized { .. })
    }
}

/// Coarse controller state for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// No field selected or no usable frame
    Idle,
    Ready,
    Scanning,
    CoolingDown,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Idle => write!(f, "Idle"),
            ControllerState::Ready => write!(f, "Ready"),
            ControllerState::Scanning => write!(f, "Scanning"),
            ControllerState::CoolingDown => write!(f, "Cooling down"),
        }
    }
}

/// What an attempt targets, captured when it starts.
struct Target {
    template: String,
    key: String,
    label: String,
    mode: AcquisitionMode,
}

/// Holds the session busy flag for the duration of one attempt and clears it
/// on every exit path, cancellation included. Owns its handle to the flag so
/// the clear never depends on the session being borrowable.
struct BusyGuard {
    flag: Rc<Cell<bool>>,
}

impl BusyGuard {
    fn acquire(session: &ScanSession) -> Self {
        let flag = session.busy_flag();
        flag.set(true);
        Self { flag }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

pub struct ScanController<E> {
    session: RefCell<ScanSession>,
    source: RefCell<Box<dyn FrameSource>>,
    gateway: RecognitionGateway<E>,
    profiles: FieldProfiles,
    guide: GuideBox,
    timing: ScanTiming,
    sink: Box<dyn ResultSink>,
}

impl<E: OcrEngine> ScanController<E> {
    pub fn new(mut session: ScanSession, source: Box<dyn FrameSource>, engine: E) -> Self {
        session.set_mode(source.mode());
        Self {
            session: RefCell::new(session),
            source: RefCell::new(source),
            gateway: RecognitionGateway::new(engine),
            profiles: FieldProfiles::default(),
            guide: GuideBox::default(),
            timing: ScanTiming::default(),
            sink: Box::new(LogSink),
        }
    }

    pub fn with_profiles(mut self, profiles: FieldProfiles) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_guide(mut self, guide: GuideBox) -> Self {
        self.guide = guide;
        self
    }

    pub fn with_timing(mut self, timing: ScanTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Read access to the session. Do not hold across an `.await`.
    pub fn session(&self) -> Ref<'_, ScanSession> {
        self.session.borrow()
    }

    pub fn gateway(&self) -> &RecognitionGateway<E> {
        &self.gateway
    }

    pub fn timing(&self) -> ScanTiming {
        self.timing
    }

    /// Selects the field for the next attempt.
    pub fn select_field(&self, key: &str) -> Result<()> {
        self.session.borrow_mut().select_field(key)
    }

    pub fn set_template(&self, template: RecordTemplate) {
        self.session.borrow_mut().set_template(template);
    }

    /// Operator correction of a stored value.
    pub fn set_result(&self, key: &str, value: &str) -> Result<()> {
        self.session.borrow_mut().set_result(key, value)
    }

    /// Swaps the frame source (camera ↔ uploaded image). The session mode
    /// follows the source.
    pub fn set_source(&self, source: Box<dyn FrameSource>) {
        let mode = source.mode();
        *self.source.borrow_mut() = source;
        let mut session = self.session.borrow_mut();
        session.set_mode(mode);
        session.set_cooldown_until(None);
        tracing::info!(%mode, "frame source switched");
    }

    pub fn state(&self) -> ControllerState {
        let session = self.session.borrow();
        if session.is_busy() {
            return ControllerState::Scanning;
        }
        if session.selected_key().is_none() || !self.source.borrow().has_frame() {
            return ControllerState::Idle;
        }
        if session.in_cooldown(Instant::now()) {
            ControllerState::CoolingDown
        } else {
            ControllerState::Ready
        }
    }

    /// Requests engine startup ahead of the first attempt.
    pub async fn warm_up(&self) -> Result<()> {
        self.session.borrow_mut().set_status("Starting OCR engine...");
        let result = self.gateway.ensure_ready().await;
        let status = match &result {
            Ok(()) => "OCR ready".to_string(),
            Err(e) => format!("{}", e),
        };
        self.session.borrow_mut().set_status(status);
        result
    }

    /// Time left before the next attempt is eligible.
    pub fn cooldown_remaining(&self) -> Duration {
        self.session
            .borrow()
            .cooldown_until()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    pub async fn wait_for_cooldown(&self) {
        let deadline = self.session.borrow().cooldown_until();
        if let Some(deadline) = deadline {
            tokio::time::sleep_until(deadline).await;
        }
    }

    fn check_eligibility(&self) -> std::result::Result<Target, SkipReason> {
        let session = self.session.borrow();
        let field = session.selected_field().ok_or(SkipReason::NoFieldSelected)?;
        if session.is_busy() {
            return Err(SkipReason::Busy);
        }
        if session.in_cooldown(Instant::now()) {
            return Err(SkipReason::CoolingDown);
        }
        if self.gateway.state() == EngineState::Initializing {
            return Err(SkipReason::EngineStarting);
        }

        let mut source = self.source.borrow_mut();
        if let Err(e) = source.refresh() {
            tracing::debug!(error = %e, "frame refresh failed");
            return Err(SkipReason::SourceNotReady);
        }
        let (width, height) = source.pixel_size();
        if !source.has_frame() || width == 0 || height == 0 {
            return Err(SkipReason::SourceNotReady);
        }

        Ok(Target {
            template: session.template().name.clone(),
            key: field.key.clone(),
            label: field.label.clone(),
            mode: session.mode(),
        })
    }

    /// Runs one scan attempt if the controller is eligible.
    ///
    /// Errors never escape: they are logged, reported through the session
    /// status and returned as `ScanOutcome::Failed`.
    pub async fn attempt(&self) -> ScanOutcome {
        let target = match self.check_eligibility() {
            Ok(target) => target,
            Err(reason) => {
                tracing::trace!(%reason, "scan skipped");
                return ScanOutcome::Skipped(reason);
            }
        };

        let _busy = BusyGuard::acquire(&self.session.borrow());
        tracing::debug!(field = %target.key, mode = %target.mode, "scan attempt started");

        match self.run_pipeline(&target).await {
            Ok(text) if !text.is_empty() => self.accept(target, text),
            Ok(_) => {
                // Live mode stays eligible and retries on the next tick
                if target.mode == AcquisitionMode::Static {
                    self.session
                        .borrow_mut()
                        .set_status("No text found, align the field with the guide box");
                }
                tracing::debug!(field = %target.key, "no text recognized");
                ScanOutcome::NoText
            }
            Err(e) => {
                tracing::warn!(field = %target.key, error = %e, "scan attempt failed");
                self.session
                    .borrow_mut()
                    .set_status(format!("Processing error: {}", e));
                ScanOutcome::Failed(e)
            }
        }
    }

    async fn run_pipeline(&self, target: &Target) -> Result<String> {
        // Frame and crop are released before the engine call
        let normalized = {
            let source = self.source.borrow();
            let frame = source.snapshot()?;
            let display = source.display_size();
            let roi = self
                .guide
                .compute_roi(frame.width(), frame.height(), display.width, display.height)?;
            let region = crop_roi(&frame, &roi)?;
            normalize(&region)?
        };

        let whitelist = self.profiles.resolve_charset(&target.label);
        let raw = self.gateway.recognize(&normalized, &whitelist).await?;
        Ok(clean_text(&raw))
    }

    fn accept(&self, target: Target, text: String) -> ScanOutcome {
        {
            let mut session = self.session.borrow_mut();
            if session.template().name != target.template {
                tracing::warn!(field = %target.key, "template changed during scan, result discarded");
                return ScanOutcome::Failed(ScanError::UnknownField {
                    template: session.template().name.clone(),
                    key: target.key,
                });
            }
            if let Err(e) = session.set_result(&target.key, &text) {
                return ScanOutcome::Failed(e);
            }
            let cooldown = self.timing.cooldown(target.mode);
            session.set_cooldown_until(Some(Instant::now() + cooldown));
            session.set_status(format!("Read: {}", text));
        }

        tracing::info!(field = %target.key, text = %text, "scan succeeded");
        self.sink.on_result(&target.key, &text);
        ScanOutcome::Recognized {
            key: target.key,
            text,
        }
    }

    /// Explicit re-trigger (static mode button).
    pub async fn trigger(&self) -> ScanOutcome {
        self.attempt().await
    }

    /// Selects a field; in static mode the selection itself triggers a scan.
    pub async fn select_and_trigger(&self, key: &str) -> Result<Option<ScanOutcome>> {
        let mode = {
            let mut session = self.session.borrow_mut();
            session.select_field(key)?;
            session.mode()
        };
        match mode {
            AcquisitionMode::Static => Ok(Some(self.attempt().await)),
            AcquisitionMode::Live => Ok(None),
        }
    }

    /// Level-triggered live loop: one attempt per tick until `keep_going`
    /// returns false. Returns the number of ticks run.
    pub async fn run_live<T: Ticker>(
        &self,
        ticker: &mut T,
        mut keep_going: impl FnMut(&ScanOutcome) -> bool,
    ) -> u64 {
        let mut ticks = 0;
        loop {
            ticker.tick().await;
            ticks += 1;
            let outcome = self.attempt().await;
            if !keep_going(&outcome) {
                return ticks;
            }
        }
    }
}
