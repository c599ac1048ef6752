//! Per-session scan state.
//!
//! One session per operator run: the active template, the field being
//! scanned, accumulated values, and the flags the controller uses to keep a
//! single attempt in flight.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::time::Instant;

use crate::capture::AcquisitionMode;
use crate::error::Result;
use crate::template::{FieldDefinition, RecordTemplate};

pub struct ScanSession {
    template: RecordTemplate,
    selected: Option<String>,
    results: HashMap<String, String>,
    mode: AcquisitionMode,
    /// Shared with the in-flight attempt's guard, which clears it on drop
    busy: Rc<Cell<bool>>,
    cooldown_until: Option<Instant>,
    status: String,
}

impl ScanSession {
    pub fn new(template: RecordTemplate, mode: AcquisitionMode) -> Self {
        Self {
            template,
            selected: None,
            results: HashMap::new(),
            mode,
            busy: Rc::new(Cell::new(false)),
            cooldown_until: None,
            status: String::new(),
        }
    }

    pub fn template(&self) -> &RecordTemplate {
        &self.template
    }

    /// Switches template. Selection and accumulated values are discarded,
    /// since their keys belong to the old template.
    pub fn set_template(&mut self, template: RecordTemplate) {
        tracing::info!(template = %template.name, "template selected");
        self.template = template;
        self.selected = None;
        self.results.clear();
        self.cooldown_until = None;
    }

    pub fn selected_key(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_field(&self) -> Option<&FieldDefinition> {
        self.selected.as_deref().and_then(|key| self.template.field(key))
    }

    /// Chooses the field the next attempt targets. Never interrupts an
    /// attempt already in flight.
    pub fn select_field(&mut self, key: &str) -> Result<()> {
        let label = self.template.require_field(key)?.label.clone();
        self.selected = Some(key.to_string());
        self.status = format!("Scanning \"{}\"...", label);
        Ok(())
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AcquisitionMode) {
        self.mode = mode;
    }

    pub fn results(&self) -> &HashMap<String, String> {
        &self.results
    }

    pub fn result(&self, key: &str) -> Option<&str> {
        self.results.get(key).map(String::as_str)
    }

    /// Stores a value for a field of the active template. Used by the
    /// controller after recognition and for manual corrections.
    pub fn set_result(&mut self, key: &str, value: &str) -> Result<()> {
        self.template.require_field(key)?;
        self.results.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Fields in template order with their current values.
    pub fn ordered_results(&self) -> Vec<(&FieldDefinition, Option<&str>)> {
        self.template
            .fields
            .iter()
            .map(|f| (f, self.result(&f.key)))
            .collect()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    pub(crate) fn busy_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.busy)
    }

    pub fn cooldown_until(&self) -> Option<Instant> {
        self.cooldown_until
    }

    pub(crate) fn set_cooldown_until(&mut self, deadline: Option<Instant>) {
        self.cooldown_until = deadline;
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|deadline| now < deadline)
    }

    /// Transient status line for the operator.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }
}
