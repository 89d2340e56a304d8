//! Statement extraction and error position mapping.
//!
//! Pure functions over a [`Document`](crate::editor::Document) snapshot; no
//! engine or editor state is touched here.

mod extract;
mod position;

pub use extract::{delimiter_offsets, extract, lex, ExtractedRequest, Lexemes, STATEMENT_DELIMITER};
pub use position::{locate_error, to_absolute_position, ErrorLocation};
