use std::iter::FusedIterator;

use crate::error::{AppError, AppResult};

/// Default chunk window, in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of characters shared by consecutive chunks
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Splits text into overlapping fixed-size character windows
///
/// Windows are measured in characters, not bytes, so a chunk never splits a
/// multi-byte code point. Each window after the first starts `overlap` characters
/// before the previous window ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    window_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    /// Creates a chunker, rejecting windows that could not make progress
    pub fn new(window_size: usize, overlap: usize) -> AppResult<Self> {
        if window_size == 0 {
            return Err(AppError::InvalidInput(
                "chunk window size must be positive".to_string(),
            ));
        }
        if overlap >= window_size {
            return Err(AppError::InvalidInput(format!(
                "chunk overlap ({}) must be smaller than the window size ({})",
                overlap, window_size
            )));
        }
        Ok(Self {
            window_size,
            overlap,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily yields the chunks of `text`
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks::new(text, self.window_size, self.overlap)
    }
}

/// Collects the chunks of `text` into owned strings
///
/// Unlike [`Chunker::new`] this accepts any window/overlap pair; a configuration
/// that would stall still advances one character per chunk.
pub fn chunk_text(text: &str, window_size: usize, overlap: usize) -> Vec<String> {
    Chunks::new(text, window_size, overlap)
        .map(str::to_string)
        .collect()
}

/// Iterator over the chunks of one text
///
/// Cloning the iterator restarts nothing and shares nothing mutable; a clone taken
/// before iteration replays exactly the same chunks.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    window_size: usize,
    step: usize,
    start: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    fn new(text: &'a str, window_size: usize, overlap: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            text,
            window_size,
            step: window_size.saturating_sub(overlap).max(1),
            start: 0,
            done: text.is_empty(),
        }
    }

    /// Byte offset reached after moving `chars` characters forward from `from`
    fn advance(&self, from: usize, chars: usize) -> usize {
        self.text[from..]
            .char_indices()
            .nth(chars)
            .map(|(offset, _)| from + offset)
            .unwrap_or(self.text.len())
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let end = self.advance(self.start, self.window_size);
        let chunk = &self.text[self.start..end];

        if end == self.text.len() {
            self.done = true;
        } else {
            self.start = self.advance(self.start, self.step);
        }

        Some(chunk)
    }
}

impl FusedIterator for Chunks<'_> {}
