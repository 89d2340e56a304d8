//! In-memory editor surface.
//!
//! Backs the CLI driver and the test suites. Preferences are kept in memory
//! only; persisting them is the embedding UI's business.

use super::{Document, EditorAction, EditorSurface, Position, TextRange};

/// What `save_preferences` snapshots and `load_preferences` restores.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Preferences {
    text: String,
    cursor: Position,
}

/// A plain-text editor with markers, selection and a caret.
#[derive(Debug, Clone)]
pub struct BufferEditor {
    text: String,
    cursor: Position,
    selection: Option<TextRange>,
    markers: Vec<TextRange>,
    actions: Vec<EditorAction>,
    scrolled_to: Option<usize>,
    focused: bool,
    saved: Option<Preferences>,
    preference_saves: usize,
}

impl BufferEditor {
    /// Creates an editor holding `text` with the caret at the start.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cursor: Position::new(1, 0),
            selection: None,
            markers: Vec::new(),
            actions: Vec::new(),
            scrolled_to: None,
            focused: false,
            saved: None,
            preference_saves: 0,
        }
    }

    /// Builder-style caret placement.
    pub fn with_cursor(mut self, position: Position) -> Self {
        self.move_caret(position);
        self
    }

    /// Builder-style selection.
    pub fn with_selection(mut self, range: TextRange) -> Self {
        self.select(range);
        self
    }

    pub fn markers(&self) -> &[TextRange] {
        &self.markers
    }

    pub fn registered_actions(&self) -> &[EditorAction] {
        &self.actions
    }

    pub fn scrolled_to(&self) -> Option<usize> {
        self.scrolled_to
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Number of times preferences were snapshotted.
    pub fn preference_saves(&self) -> usize {
        self.preference_saves
    }

    fn clamp(&self, position: Position) -> Position {
        let doc = self.document();
        doc.position_of(doc.offset_of(position))
    }

    /// Replaces the chars in `[start, end)` and returns the offset past the
    /// inserted text.
    fn splice(&mut self, start: usize, end: usize, insert: &str) -> usize {
        let mut chars: Vec<char> = self.text.chars().collect();
        chars.splice(start..end, insert.chars());
        self.text = chars.into_iter().collect();
        start + insert.chars().count()
    }
}

impl Default for BufferEditor {
    fn default() -> Self {
        Self::new("")
    }
}

impl EditorSurface for BufferEditor {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn selection(&self) -> Option<TextRange> {
        self.selection
    }

    fn cursor(&self) -> Position {
        self.cursor
    }

    fn add_marker(&mut self, range: TextRange) {
        self.markers.push(range);
    }

    fn clear_markers(&mut self) {
        self.markers.clear();
    }

    fn move_caret(&mut self, position: Position) {
        self.cursor = self.clamp(position);
        self.selection = None;
    }

    fn scroll_to_row(&mut self, row: usize) {
        self.scrolled_to = Some(row);
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn select(&mut self, range: TextRange) {
        let range = TextRange::new(self.clamp(range.start), self.clamp(range.end));
        self.cursor = range.end;
        self.selection = Some(range);
    }

    fn insert_at_cursor(&mut self, text: &str) {
        let doc = self.document();
        let (start, end) = match self.selection.take() {
            Some(range) => {
                let range = range.normalized();
                (doc.offset_of(range.start), doc.offset_of(range.end))
            }
            None => {
                let at = doc.offset_of(self.cursor);
                (at, at)
            }
        };
        let after = self.splice(start, end, text);
        self.cursor = self.document().position_of(after);
    }

    fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.selection = None;
        self.markers.clear();
        self.cursor = self.clamp(self.cursor);
    }

    fn find(&mut self, needle: &str) -> Option<TextRange> {
        if needle.is_empty() {
            return None;
        }
        let doc = self.document();
        let needle: Vec<char> = needle.chars().collect();
        let haystack = doc.chars();
        let from = doc.offset_of(self.cursor);
        let matches_at = |i: &usize| haystack[*i..].starts_with(&needle);

        let last = haystack.len().checked_sub(needle.len())?;
        let hit = (from..=last)
            .find(matches_at)
            .or_else(|| (0..from.min(last + 1)).find(matches_at))?;

        let range = TextRange::new(doc.position_of(hit), doc.position_of(hit + needle.len()));
        self.select(range);
        Some(range)
    }

    fn register_action(&mut self, action: EditorAction) {
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
    }

    fn load_preferences(&mut self) {
        if let Some(saved) = self.saved.clone() {
            self.set_text(&saved.text);
            self.move_caret(saved.cursor);
        }
    }

    fn save_preferences(&mut self) {
        self.saved = Some(Preferences {
            text: self.text.clone(),
            cursor: self.cursor,
        });
        self.preference_saves += 1;
    }

    fn document(&self) -> Document {
        Document::new(&self.text)
    }
}
