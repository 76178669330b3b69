//! Output schema: key abbreviation, token estimation and document validation

pub mod keys;
mod tokens;
mod validate;

pub use keys::{decode, detect_mode, encode, map_key, KeyMode};
pub use tokens::{estimate_text_tokens, estimate_tokens};
pub use validate::validate_workbook_document;
