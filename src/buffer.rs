use crate::host::PromptContext;
use anyhow::{anyhow, Context};
use std::str::FromStr;
use std::sync::Mutex;

/// 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl FromStr for Position {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (line, col) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("expected LINE:COL, got {s:?}"))?;
        let line: usize = line.trim().parse().context("bad line number")?;
        let col: usize = col.trim().parse().context("bad column number")?;
        if line == 0 || col == 0 {
            anyhow::bail!("line and column are 1-based: {s:?}");
        }
        Ok(Self { line, col })
    }
}

/// A `FROM..TO` pair of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub from: Position,
    pub to: Position,
}

impl FromStr for Selection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (from, to) = s
            .split_once("..")
            .ok_or_else(|| anyhow!("expected LINE:COL..LINE:COL, got {s:?}"))?;
        Ok(Self {
            from: from.parse()?,
            to: to.parse()?,
        })
    }
}

#[derive(Debug)]
struct Inner {
    text: String,
    /// Char offset.
    cursor: usize,
    /// Half-open char range.
    selection: Option<(usize, usize)>,
}

/// In-memory text buffer with a cursor, used as the editor when running
/// from the command line.
#[derive(Debug)]
pub struct Buffer {
    inner: Mutex<Inner>,
}

impl Buffer {
    /// Cursor starts at the end of `text`.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.chars().count();
        Self {
            inner: Mutex::new(Inner {
                text,
                cursor,
                selection: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    pub fn set_cursor(&self, pos: Position) {
        let mut inner = self.lock();
        inner.cursor = offset_of(&inner.text, pos);
    }

    /// Select the text between two positions. The cursor moves to the start.
    pub fn select(&self, sel: Selection) {
        let mut inner = self.lock();
        let a = offset_of(&inner.text, sel.from);
        let b = offset_of(&inner.text, sel.to);
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        inner.selection = Some((start, end));
        inner.cursor = start;
    }

    pub fn cursor_position(&self) -> Position {
        let inner = self.lock();
        position_of(&inner.text, inner.cursor)
    }

    pub fn prompt_context(&self) -> PromptContext {
        let inner = self.lock();
        let at = byte_index(&inner.text, inner.cursor);
        let visual_selection = inner.selection.map(|(start, end)| {
            let s = byte_index(&inner.text, start);
            let e = byte_index(&inner.text, end);
            inner.text[s..e].to_string()
        });
        PromptContext {
            before_cursor: inner.text[..at].to_string(),
            after_cursor: inner.text[at..].to_string(),
            visual_selection,
        }
    }

    /// Remove the selected text and leave the cursor where it began.
    pub fn delete_selection(&self) {
        let mut inner = self.lock();
        let Some((start, end)) = inner.selection.take() else {
            return;
        };
        let s = byte_index(&inner.text, start);
        let e = byte_index(&inner.text, end);
        inner.text.replace_range(s..e, "");
        inner.cursor = start;
    }

    pub fn insert(&self, text: &str) {
        let mut inner = self.lock();
        let at = byte_index(&inner.text, inner.cursor);
        inner.text.insert_str(at, text);
        inner.cursor += text.chars().count();
    }
}

fn byte_index(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

/// Columns past the end of a line clamp to the line end; lines past the end
/// of the text clamp to the end of the text.
fn offset_of(text: &str, pos: Position) -> usize {
    let mut offset = 0;
    for (idx, line) in text.split('\n').enumerate() {
        let len = line.chars().count();
        if idx + 1 == pos.line {
            return offset + (pos.col - 1).min(len);
        }
        offset += len + 1;
    }
    text.chars().count()
}

fn position_of(text: &str, char_offset: usize) -> Position {
    let mut line = 1;
    let mut col = 1;
    for ch in text.chars().take(char_offset) {
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    Position { line, col }
}
