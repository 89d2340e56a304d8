//! Character-addressed document snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A caret position. Rows are 1-indexed, columns 0-indexed, both in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// A half-open span `[start, end)` between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width range at `position`.
    pub const fn empty_at(position: Position) -> Self {
        Self::new(position, position)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the range with `start <= end`.
    pub fn normalized(self) -> Self {
        if self.end < self.start {
            Self::new(self.end, self.start)
        } else {
            self
        }
    }
}

/// What a run request acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Cursor(Position),
    Selection(TextRange),
}

impl Anchor {
    /// Orders selection endpoints and turns an empty selection into a cursor.
    pub fn normalized(self) -> Self {
        match self {
            Self::Selection(range) if range.is_empty() => Self::Cursor(range.start),
            Self::Selection(range) => Self::Selection(range.normalized()),
            cursor => cursor,
        }
    }
}

/// An immutable view of editor text, indexable by char offset and position.
#[derive(Debug, Clone, Default)]
pub struct Document {
    chars: Vec<char>,
    /// Char offset of the first character of every line.
    line_starts: Vec<usize>,
}

impl Document {
    pub fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut line_starts = vec![0];
        line_starts.extend(
            chars
                .iter()
                .enumerate()
                .filter(|(_, c)| **c == '\n')
                .map(|(i, _)| i + 1),
        );
        Self { chars, line_starts }
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(offset).copied()
    }

    /// Char offset just past the last character of line `index` (0-based),
    /// excluding the line break.
    fn line_end(&self, index: usize) -> usize {
        match self.line_starts.get(index + 1) {
            Some(next) => next - 1,
            None => self.chars.len(),
        }
    }

    /// Converts a position to a char offset, clamping rows past the end to
    /// the document end and columns past the end of a line to that line's end.
    pub fn offset_of(&self, position: Position) -> usize {
        let index = position.row.max(1) - 1;
        let Some(&start) = self.line_starts.get(index) else {
            return self.chars.len();
        };
        (start + position.column).min(self.line_end(index))
    }

    /// Converts a char offset to a position, clamping to the document end.
    pub fn position_of(&self, offset: usize) -> Position {
        let offset = offset.min(self.chars.len());
        let index = self.line_starts.partition_point(|&start| start <= offset) - 1;
        Position::new(index + 1, offset - self.line_starts[index])
    }

    /// Returns the text between two char offsets.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.chars.len());
        let start = start.min(end);
        self.chars[start..end].iter().collect()
    }

    /// Returns the text covered by a range.
    pub fn text_in(&self, range: TextRange) -> String {
        let range = range.normalized();
        self.slice(self.offset_of(range.start), self.offset_of(range.end))
    }

    /// Returns the range covering the content of `row`, without its line break.
    pub fn line_range(&self, row: usize) -> TextRange {
        let row = row.clamp(1, self.line_count());
        let width = self.line_end(row - 1) - self.line_starts[row - 1];
        TextRange::new(Position::new(row, 0), Position::new(row, width))
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.chars.iter().try_for_each(|c| write!(f, "{c}"))
    }
}
