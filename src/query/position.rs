//! Error position mapping.
//!
//! Engines report a failure as a flat character offset into the statement
//! they received. The editor needs a row and column in the whole document,
//! plus a span to highlight.

use super::ExtractedRequest;
use crate::editor::{Document, Position, TextRange};
use serde::{Deserialize, Serialize};

/// Where an engine error lands in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    /// Caret position for the error.
    pub position: Position,
    /// The offending token; zero-width on whitespace or at end of text.
    pub span: TextRange,
}

/// Maps an offset into `request.query` to an absolute document position.
///
/// Offsets past the end of the statement are clamped to its end.
pub fn to_absolute_position(request: &ExtractedRequest, flat_offset: usize) -> Position {
    let mut relative_row = 0;
    let mut relative_column = 0;

    for c in request.query.chars().take(flat_offset) {
        if c == '\n' {
            relative_row += 1;
            relative_column = 0;
        } else {
            relative_column += 1;
        }
    }

    let column = if relative_row > 0 {
        relative_column
    } else {
        request.column + relative_column
    };
    Position::new(request.row + relative_row, column)
}

/// Resolves the error position and the token under it.
pub fn locate_error(
    document: &Document,
    request: &ExtractedRequest,
    flat_offset: usize,
) -> ErrorLocation {
    let start = document.offset_of(to_absolute_position(request, flat_offset));
    let len = token_len(&document.chars()[start..]);
    let position = document.position_of(start);

    ErrorLocation {
        position,
        span: TextRange::new(position, document.position_of(start + len)),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.')
}

/// Length in chars of the token starting at `rest[0]`.
fn token_len(rest: &[char]) -> usize {
    let Some(&first) = rest.first() else {
        return 0;
    };

    match first {
        c if c.is_whitespace() => 0,
        c if is_word_char(c) => rest.iter().take_while(|c| is_word_char(**c)).count(),
        '\'' | '"' => {
            let mut i = 1;
            while i < rest.len() {
                if rest[i] == first {
                    // Doubled quote is an escaped quote inside the literal
                    if rest.get(i + 1) == Some(&first) {
                        i += 2;
                        continue;
                    }
                    return i + 1;
                }
                i += 1;
            }
            rest.len()
        }
        _ => 1,
    }
}
