//! Consumers notified on every successful recognition.

/// Receives `(field_key, text)` after each successful read. How the value is
/// rendered or persisted is up to the consumer.
pub trait ResultSink {
    fn on_result(&self, field_key: &str, text: &str);
}

/// Writes each result to the log.
#[derive(Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn on_result(&self, field_key: &str, text: &str) {
        tracing::info!(field = field_key, text, "field recognized");
    }
}

impl<F: Fn(&str, &str)> ResultSink for F {
    fn on_result(&self, field_key: &str, text: &str) {
        self(field_key, text)
    }
}
