//! Field-by-field document scanning.
//!
//! An operator aligns a fixed guide box over one field of a printed document;
//! the scanner crops that region from a live or still frame, binarizes it,
//! runs a single-line OCR pass constrained to the field's character class,
//! and accumulates the cleaned text into a record.

pub mod capture;
pub mod config;
pub mod error;
pub mod logging;
pub mod ocr;
pub mod paths;
pub mod scan;
pub mod template;

#[cfg(test)]
mod testing;

pub use error::{Result, ScanError};
