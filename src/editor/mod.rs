//! Editor abstraction for the query pane.
//!
//! The session never talks to a text widget directly. Everything it needs
//! from one is expressed by [`EditorSurface`], so the controller can be driven
//! by the in-memory [`BufferEditor`] in tests and by a real widget adapter in
//! an embedding UI.

mod buffer;
mod document;

pub use buffer::BufferEditor;
pub use document::{Anchor, Document, Position, TextRange};

/// A named, keyboard-triggered editor action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorAction {
    /// Run (or stop) the statement under the cursor.
    Execute,
    /// Same as `Execute`, bound to the platform "submit" chord.
    ExecuteAt,
    /// Move keyboard focus to the result grid.
    FocusGrid,
}

/// Platform-specific key chords for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub mac: &'static str,
    pub win: &'static str,
}

impl KeyBinding {
    const fn same(key: &'static str) -> Self {
        Self { mac: key, win: key }
    }
}

impl EditorAction {
    /// Every action the session registers on start.
    pub const ALL: [EditorAction; 3] = [Self::Execute, Self::ExecuteAt, Self::FocusGrid];

    /// Returns the command name the editor registers the action under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::ExecuteAt => "execute_at",
            Self::FocusGrid => "focus_grid",
        }
    }

    /// Returns the key chords that trigger the action.
    pub fn key_binding(&self) -> KeyBinding {
        match self {
            Self::Execute => KeyBinding::same("F9"),
            Self::ExecuteAt => KeyBinding {
                mac: "Command-Enter",
                win: "Ctrl-Enter",
            },
            Self::FocusGrid => KeyBinding::same("F2"),
        }
    }

    /// Returns true if the action toggles statement execution.
    pub fn toggles_run(&self) -> bool {
        matches!(self, Self::Execute | Self::ExecuteAt)
    }
}

/// Capabilities the query session needs from a text editor.
///
/// Positions use 1-indexed rows and 0-indexed columns counted in characters.
pub trait EditorSurface: Send {
    /// Returns the full document text.
    fn text(&self) -> String;

    /// Returns the current selection, if any.
    fn selection(&self) -> Option<TextRange>;

    /// Returns the caret position.
    fn cursor(&self) -> Position;

    /// Places an error marker over the given range.
    fn add_marker(&mut self, range: TextRange);

    /// Removes every error marker.
    fn clear_markers(&mut self);

    /// Moves the caret, collapsing any selection.
    fn move_caret(&mut self, position: Position);

    /// Scrolls so that `row` is visible.
    fn scroll_to_row(&mut self, row: usize);

    /// Gives the editor keyboard focus.
    fn focus(&mut self);

    /// Selects a range and puts the caret at its end.
    fn select(&mut self, range: TextRange);

    /// Inserts text at the caret, replacing any selection.
    fn insert_at_cursor(&mut self, text: &str);

    /// Appends text at the end of the document.
    fn append(&mut self, text: &str);

    /// Replaces the whole document.
    fn set_text(&mut self, text: &str);

    /// Finds the next case-sensitive occurrence of `needle` after the caret,
    /// wrapping around, and selects it.
    fn find(&mut self, needle: &str) -> Option<TextRange>;

    /// Registers a keyboard action.
    fn register_action(&mut self, action: EditorAction);

    /// Restores previously saved preferences.
    fn load_preferences(&mut self);

    /// Snapshots the current preferences.
    fn save_preferences(&mut self);

    /// Returns the document as an indexable snapshot.
    fn document(&self) -> Document {
        Document::new(&self.text())
    }

    /// Returns what a run request should act on: the selection when it is
    /// non-empty, the caret otherwise.
    fn anchor(&self) -> Anchor {
        match self.selection() {
            Some(range) if !range.is_empty() => Anchor::Selection(range),
            _ => Anchor::Cursor(self.cursor()),
        }
    }
}
