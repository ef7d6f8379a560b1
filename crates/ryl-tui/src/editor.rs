//! The input surface: a small multi-line text buffer plus the lifecycle
//! that guarantees exactly one editable surface at a time.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::error;

/// Cursor movement commands understood by [`TextBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMove {
    Up,
    Down,
    Forward,
    Back,
    Head,
    End,
}

/// Multi-line text buffer with a (row, col) cursor in char units.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    lines: Vec<String>,
    cursor_row: usize,
    cursor_col: usize,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self {
            lines: vec![String::new()],
            cursor_row: 0,
            cursor_col: 0,
        }
    }
}

impl TextBuffer {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    /// The whole buffer as one string, lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(String::is_empty)
    }

    /// Replaces the whole buffer, cursor at the end.
    pub fn set_text(&mut self, text: &str) {
        self.lines = text.split('\n').map(str::to_string).collect();
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.cursor_row = self.lines.len() - 1;
        self.cursor_col = char_len(&self.lines[self.cursor_row]);
    }

    pub fn clear(&mut self) {
        self.lines = vec![String::new()];
        self.cursor_row = 0;
        self.cursor_col = 0;
    }

    pub fn insert_str(&mut self, text: &str) {
        for (n, part) in text.split('\n').enumerate() {
            if n > 0 {
                self.insert_newline();
            }
            if part.is_empty() {
                continue;
            }
            let line = &mut self.lines[self.cursor_row];
            let at = byte_index(line, self.cursor_col);
            line.insert_str(at, part);
            self.cursor_col += char_len(part);
        }
    }

    pub fn insert_char(&mut self, ch: char) {
        if ch == '\n' {
            self.insert_newline();
            return;
        }
        let line = &mut self.lines[self.cursor_row];
        let at = byte_index(line, self.cursor_col);
        line.insert(at, ch);
        self.cursor_col += 1;
    }

    pub fn insert_newline(&mut self) {
        let line = &mut self.lines[self.cursor_row];
        let at = byte_index(line, self.cursor_col);
        let rest = line.split_off(at);
        self.lines.insert(self.cursor_row + 1, rest);
        self.cursor_row += 1;
        self.cursor_col = 0;
    }

    /// Backspace semantics: joins with the previous line at column 0.
    pub fn delete_prev_char(&mut self) {
        if self.cursor_col > 0 {
            let line = &mut self.lines[self.cursor_row];
            let start = byte_index(line, self.cursor_col - 1);
            let end = byte_index(line, self.cursor_col);
            line.replace_range(start..end, "");
            self.cursor_col -= 1;
        } else if self.cursor_row > 0 {
            let removed = self.lines.remove(self.cursor_row);
            self.cursor_row -= 1;
            self.cursor_col = char_len(&self.lines[self.cursor_row]);
            self.lines[self.cursor_row].push_str(&removed);
        }
    }

    /// Delete-key semantics: joins with the next line at end of line.
    pub fn delete_next_char(&mut self) {
        let len = char_len(&self.lines[self.cursor_row]);
        if self.cursor_col < len {
            let line = &mut self.lines[self.cursor_row];
            let start = byte_index(line, self.cursor_col);
            let end = byte_index(line, self.cursor_col + 1);
            line.replace_range(start..end, "");
        } else if self.cursor_row + 1 < self.lines.len() {
            let next = self.lines.remove(self.cursor_row + 1);
            self.lines[self.cursor_row].push_str(&next);
        }
    }

    pub fn move_cursor(&mut self, movement: CursorMove) {
        match movement {
            CursorMove::Up => {
                if self.cursor_row > 0 {
                    self.cursor_row -= 1;
                    self.clamp_col();
                }
            }
            CursorMove::Down => {
                if self.cursor_row + 1 < self.lines.len() {
                    self.cursor_row += 1;
                    self.clamp_col();
                }
            }
            CursorMove::Forward => {
                if self.cursor_col < char_len(&self.lines[self.cursor_row]) {
                    self.cursor_col += 1;
                } else if self.cursor_row + 1 < self.lines.len() {
                    self.cursor_row += 1;
                    self.cursor_col = 0;
                }
            }
            CursorMove::Back => {
                if self.cursor_col > 0 {
                    self.cursor_col -= 1;
                } else if self.cursor_row > 0 {
                    self.cursor_row -= 1;
                    self.cursor_col = char_len(&self.lines[self.cursor_row]);
                }
            }
            CursorMove::Head => self.cursor_col = 0,
            CursorMove::End => self.cursor_col = char_len(&self.lines[self.cursor_row]),
        }
    }

    /// Basic key handling shared by every mode that edits text.
    pub fn input(&mut self, key: KeyEvent) {
        if matches!(key.kind, KeyEventKind::Release) {
            return;
        }
        match key.code {
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.insert_char(ch);
            }
            KeyCode::Backspace => self.delete_prev_char(),
            KeyCode::Delete => self.delete_next_char(),
            KeyCode::Left => self.move_cursor(CursorMove::Back),
            KeyCode::Right => self.move_cursor(CursorMove::Forward),
            KeyCode::Home => self.move_cursor(CursorMove::Head),
            KeyCode::End => self.move_cursor(CursorMove::End),
            _ => {}
        }
    }

    fn clamp_col(&mut self) {
        self.cursor_col = self.cursor_col.min(char_len(&self.lines[self.cursor_row]));
    }
}

fn char_len(line: &str) -> usize {
    line.chars().count()
}

fn byte_index(line: &str, col: usize) -> usize {
    line.char_indices()
        .nth(col)
        .map_or(line.len(), |(byte, _)| byte)
}

/// Identity of one input surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Owns the single active input surface.
///
/// A surface is opened for editing, then retired when its content is
/// frozen into the transcript; a retired surface is gone for good and the
/// next `open` starts an empty one. Opening while a surface is already
/// active is a front-end bug, surfaced loudly but tolerated.
#[derive(Debug, Default)]
pub struct EditorLifecycle {
    active: Option<(SurfaceId, TextBuffer)>,
    next_id: u64,
    scroll_requested: bool,
}

impl EditorLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh surface and makes it the active one.
    pub fn open(&mut self) -> SurfaceId {
        if self.active.is_some() {
            debug_assert!(false, "opened a surface while one is active");
            error!("opened a surface while one is active; replacing it");
        }
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        self.active = Some((id, TextBuffer::default()));
        self.scroll_requested = true;
        id
    }

    /// Retires the active surface, returning its content as lines.
    pub fn retire(&mut self) -> Vec<String> {
        match self.active.take() {
            Some((_, buffer)) => buffer.lines().to_vec(),
            None => {
                debug_assert!(false, "retired with no active surface");
                error!("retired with no active surface");
                Vec::new()
            }
        }
    }

    pub fn active(&self) -> Option<&TextBuffer> {
        self.active.as_ref().map(|(_, buffer)| buffer)
    }

    pub fn active_mut(&mut self) -> Option<&mut TextBuffer> {
        // Content is about to change; coalesce into one scroll request.
        self.scroll_requested = true;
        self.active.as_mut().map(|(_, buffer)| buffer)
    }

    pub fn active_id(&self) -> Option<SurfaceId> {
        self.active.as_ref().map(|(id, _)| *id)
    }

    /// Asks the renderer to bring the prompt into view.
    pub fn request_scroll(&mut self) {
        self.scroll_requested = true;
    }

    /// Consumes the coalesced scroll request.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }
}
