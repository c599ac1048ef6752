//! Scan cycle: session state, the controller state machine, its tick
//! scheduler, result consumers, and record export.

pub mod controller;
pub mod record;
pub mod scheduler;
pub mod session;
pub mod sink;

pub use controller::{ControllerState, ScanController, ScanOutcome, ScanTiming, SkipReason};
pub use record::{append_csv, write_json, RecordPayload};
pub use scheduler::{IntervalTicker, Ticker};
pub use session::ScanSession;
pub use sink::{LogSink, ResultSink};
