//! Statement extraction.
//!
//! Finds the text a run request should send: the selection verbatim when
//! there is one, otherwise the statement enclosing the caret. Statement
//! boundaries are found with a small lexer so that delimiters inside string
//! literals, quoted identifiers and comments do not split a statement.

use crate::editor::{Anchor, Document, Position, TextRange};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Terminates a statement outside of strings and comments.
pub const STATEMENT_DELIMITER: char = ';';

/// The text to execute and where it begins in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRequest {
    pub query: String,
    pub row: usize,
    pub column: usize,
}

impl ExtractedRequest {
    pub fn new(query: impl Into<String>, origin: Position) -> Self {
        Self {
            query: query.into(),
            row: origin.row,
            column: origin.column,
        }
    }

    /// Document position of the first character of `query`.
    pub fn origin(&self) -> Position {
        Position::new(self.row, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Normal,
    /// `escapes` is set for `E'...'` strings, where a backslash escapes the
    /// next character.
    SingleQuoted { escapes: bool },
    DoubleQuoted,
    /// `$tag$ ... $tag$`; the opening tag is `chars[tag_start..tag_start + tag_len]`.
    DollarQuoted { tag_start: usize, tag_len: usize },
    LineComment,
    /// Block comments nest.
    BlockComment { depth: u32 },
}

/// Delimiters and comments found outside string context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lexemes {
    /// Char offsets of statement delimiters.
    pub delimiters: Vec<usize>,
    /// Half-open char ranges of line and block comments.
    pub comments: Vec<(usize, usize)>,
}

impl Lexemes {
    pub fn in_comment(&self, offset: usize) -> bool {
        self.comments
            .iter()
            .any(|&(start, end)| start <= offset && offset < end)
    }
}

/// Scans `chars` for statement delimiters and comments, skipping string
/// literals (plain, `E'...'` and dollar-quoted) and quoted identifiers.
///
/// A doubled quote (`'it''s'`) stays inside the literal.
pub fn lex(chars: &[char]) -> Lexemes {
    let mut state = LexState::Normal;
    let mut lexemes = Lexemes::default();
    let mut comment_start = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match state {
            LexState::Normal => match c {
                '\'' => {
                    state = LexState::SingleQuoted {
                        escapes: is_escape_string_prefix(chars, i),
                    }
                }
                '"' => state = LexState::DoubleQuoted,
                '$' => {
                    if let Some(tag_len) = dollar_tag_len(chars, i) {
                        state = LexState::DollarQuoted {
                            tag_start: i,
                            tag_len,
                        };
                        i += tag_len - 1;
                    }
                }
                '-' if next == Some('-') => {
                    comment_start = i;
                    state = LexState::LineComment;
                    i += 1;
                }
                '/' if next == Some('*') => {
                    comment_start = i;
                    state = LexState::BlockComment { depth: 1 };
                    i += 1;
                }
                STATEMENT_DELIMITER => lexemes.delimiters.push(i),
                _ => {}
            },
            LexState::SingleQuoted { escapes: true } if c == '\\' => i += 1,
            LexState::SingleQuoted { .. } if c == '\'' => {
                if next == Some('\'') {
                    i += 1;
                } else {
                    state = LexState::Normal;
                }
            }
            LexState::DoubleQuoted if c == '"' => state = LexState::Normal,
            LexState::DollarQuoted { tag_start, tag_len }
                if c == '$' && chars[i..].starts_with(&chars[tag_start..tag_start + tag_len]) =>
            {
                state = LexState::Normal;
                i += tag_len - 1;
            }
            LexState::LineComment if c == '\n' => {
                lexemes.comments.push((comment_start, i));
                state = LexState::Normal;
            }
            LexState::BlockComment { depth } if c == '/' && next == Some('*') => {
                state = LexState::BlockComment { depth: depth + 1 };
                i += 1;
            }
            LexState::BlockComment { depth } if c == '*' && next == Some('/') => {
                i += 1;
                if depth > 1 {
                    state = LexState::BlockComment { depth: depth - 1 };
                } else {
                    lexemes.comments.push((comment_start, i + 1));
                    state = LexState::Normal;
                }
            }
            _ => {}
        }

        i += 1;
    }

    if matches!(state, LexState::LineComment | LexState::BlockComment { .. }) {
        lexemes.comments.push((comment_start, chars.len()));
    }

    lexemes
}

/// Returns the char offsets of every statement delimiter outside string
/// and comment context.
pub fn delimiter_offsets(chars: &[char]) -> Vec<usize> {
    lex(chars).delimiters
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// `E'` or `e'` where the `E` is not the tail of a longer identifier.
fn is_escape_string_prefix(chars: &[char], quote: usize) -> bool {
    match quote.checked_sub(1).map(|i| chars[i]) {
        Some('E' | 'e') => quote < 2 || !is_identifier_char(chars[quote - 2]),
        _ => false,
    }
}

/// Length of the `$tag$` opening at `at`, if one does.
///
/// `$1` positional parameters and `$` inside identifiers are not tags.
fn dollar_tag_len(chars: &[char], at: usize) -> Option<usize> {
    if at > 0 && is_identifier_char(chars[at - 1]) {
        return None;
    }
    let mut end = at + 1;
    if chars.get(end).is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    while chars
        .get(end)
        .is_some_and(|&c| c.is_alphanumeric() || c == '_')
    {
        end += 1;
    }
    (chars.get(end) == Some(&'$')).then_some(end - at + 1)
}

/// Extracts the statement a run request should execute.
///
/// Returns `None` when the caret sits in a region holding nothing but
/// whitespace and comments.
pub fn extract(document: &Document, anchor: Anchor) -> Option<ExtractedRequest> {
    match anchor.normalized() {
        Anchor::Selection(range) => from_selection(document, range),
        Anchor::Cursor(position) => from_cursor(document, position),
    }
}

fn from_selection(document: &Document, range: TextRange) -> Option<ExtractedRequest> {
    let start = document.offset_of(range.start);
    let end = document.offset_of(range.end);
    if start == end {
        // Selection lies entirely past the end of the text
        return from_cursor(document, range.start);
    }

    let request = ExtractedRequest::new(document.slice(start, end), document.position_of(start));
    debug!(
        "Extracted selection at {}: {} chars",
        request.origin(),
        end - start
    );
    Some(request)
}

fn from_cursor(document: &Document, position: Position) -> Option<ExtractedRequest> {
    let chars = document.chars();
    let caret = document.offset_of(position);
    let lexemes = lex(chars);
    let bounds = lexemes
        .delimiters
        .iter()
        .map(|&d| (d, true))
        .chain(std::iter::once((chars.len(), false)));

    let mut start = 0;
    let mut closed = None;
    for (end, delimited) in bounds {
        // A caret right after a delimiter still belongs to the statement it closes.
        let reach = if delimited { end + 1 } else { end };
        let statement = statement_between(document, &lexemes, start, end);

        if caret <= reach {
            if let Some(request) = statement {
                debug!("Extracted statement at {} for caret {}", request.origin(), position);
                return Some(request);
            }
            if !(delimited && caret == reach) {
                // Spaces or a comment trailing the closed statement on its own line
                if let Some(request) = closed.filter(|_| !chars[start..caret].contains(&'\n')) {
                    debug!("Extracted closed statement for caret {}", position);
                    return Some(request);
                }
                break;
            }
        }

        closed = statement;
        start = end + 1;
    }

    debug!("No statement under caret {}", position);
    None
}

/// Builds a request from `[start, end)`, trimmed of surrounding whitespace.
///
/// Regions with only whitespace and comments yield `None`.
fn statement_between(
    document: &Document,
    lexemes: &Lexemes,
    start: usize,
    end: usize,
) -> Option<ExtractedRequest> {
    let body = &document.chars()[start..end];
    let has_statement_text = body
        .iter()
        .enumerate()
        .any(|(i, c)| !c.is_whitespace() && !lexemes.in_comment(start + i));
    if !has_statement_text {
        return None;
    }

    let lead = body.iter().position(|c| !c.is_whitespace())?;
    let trail = body.iter().rposition(|c| !c.is_whitespace())?;

    Some(ExtractedRequest::new(
        document.slice(start + lead, start + trail + 1),
        document.position_of(start + lead),
    ))
}
