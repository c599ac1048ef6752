pub mod engine;
pub mod gateway;
pub mod preprocess;
pub mod profile;
pub mod setup;

pub use engine::{OcrEngine, OcrParams, TesseractCli};
pub use gateway::{EngineState, RecognitionGateway};
pub use preprocess::{crop_roi, normalize};
pub use profile::{CharClass, FieldProfile, FieldProfiles, ProfileRule};
pub use setup::TesseractSettings;

/// Removes all whitespace (including full-width spaces) from raw OCR output.
pub fn clean_text(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}
