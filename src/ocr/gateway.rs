//! OCR engine lifecycle: lazy startup shared by all callers, readiness
//! reporting, and single recognition calls.

use image::GrayImage;
use std::cell::RefCell;
use std::fmt;
use tokio::sync::watch;

use super::engine::{OcrEngine, OcrParams};
use crate::error::{Result, ScanError};

/// Externally visible engine state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    /// Startup failed; the next `ensure_ready` tries again
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Uninitialized => write!(f, "Uninitialized"),
            EngineState::Initializing => write!(f, "Starting OCR engine"),
            EngineState::Ready => write!(f, "OCR ready"),
            EngineState::Failed => write!(f, "OCR engine failed"),
        }
    }
}

type StartupResult = Option<std::result::Result<(), String>>;

#[derive(Clone)]
enum Phase {
    Uninitialized,
    /// Waiters subscribe here instead of starting a second startup
    Initializing(watch::Receiver<StartupResult>),
    Ready,
    Failed(String),
}

/// Resets the phase if a startup future is dropped before finishing.
struct StartupGuard<'a> {
    phase: &'a RefCell<Phase>,
    finished: bool,
}

impl Drop for StartupGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.phase.borrow_mut() = Phase::Uninitialized;
        }
    }
}

pub struct RecognitionGateway<E> {
    engine: E,
    phase: RefCell<Phase>,
}

impl<E: OcrEngine> RecognitionGateway<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            phase: RefCell::new(Phase::Uninitialized),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn state(&self) -> EngineState {
        match &*self.phase.borrow() {
            Phase::Uninitialized => EngineState::Uninitialized,
            Phase::Initializing(_) => EngineState::Initializing,
            Phase::Ready => EngineState::Ready,
            Phase::Failed(_) => EngineState::Failed,
        }
    }

    /// Message from the last failed startup, if the engine is in `Failed`.
    pub fn last_error(&self) -> Option<String> {
        match &*self.phase.borrow() {
            Phase::Failed(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    /// Idempotent startup. Concurrent callers await the in-flight startup;
    /// a failed startup is attempted again on the next call.
    pub async fn ensure_ready(&self) -> Result<()> {
        let phase = self.phase.borrow().clone();
        match phase {
            Phase::Ready => Ok(()),
            Phase::Initializing(mut rx) => {
                let outcome = rx.wait_for(Option::is_some).await.map(|v| v.clone());
                match outcome {
                    Ok(Some(Ok(()))) => Ok(()),
                    Ok(Some(Err(msg))) => Err(ScanError::EngineInit(msg)),
                    Ok(None) | Err(_) => Err(ScanError::engine_init("engine startup was abandoned")),
                }
            }
            Phase::Uninitialized | Phase::Failed(_) => self.start().await,
        }
    }

    async fn start(&self) -> Result<()> {
        let (tx, rx) = watch::channel(None);
        *self.phase.borrow_mut() = Phase::Initializing(rx);
        let mut guard = StartupGuard {
            phase: &self.phase,
            finished: false,
        };

        tracing::info!("starting OCR engine");
        let result = self.engine.init().await;
        guard.finished = true;

        match result {
            Ok(()) => {
                *self.phase.borrow_mut() = Phase::Ready;
                let _ = tx.send(Some(Ok(())));
                tracing::info!("OCR engine ready");
                Ok(())
            }
            Err(e) => {
                let msg = match e {
                    ScanError::EngineInit(msg) => msg,
                    other => other.to_string(),
                };
                tracing::error!(error = %msg, "OCR engine failed to start");
                *self.phase.borrow_mut() = Phase::Failed(msg.clone());
                let _ = tx.send(Some(Err(msg.clone())));
                Err(ScanError::EngineInit(msg))
            }
        }
    }

    /// One recognition pass with the given whitelist, single-line segmentation.
    ///
    /// Starts the engine first if needed. Never retries.
    pub async fn recognize(&self, image: &GrayImage, whitelist: &str) -> Result<String> {
        self.ensure_ready().await?;

        let params = OcrParams::single_line(whitelist);
        self.engine
            .recognize(image, &params)
            .await
            .map_err(|e| match e {
                ScanError::Recognition(_) => e,
                other => ScanError::recognition(other.to_string()),
            })
    }
}
