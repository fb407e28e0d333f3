//! Response classification: structured recipe step vs. free text.

pub mod parser;
pub mod scan;

pub use parser::{ParsedResponse, ResponseParser, NOTES_FIELD, RECIPE_FIELD};
pub use scan::{first_balanced_object, MAX_SCAN_BYTES};
