use serde::{Deserialize, Serialize};

/// Byte-offset span in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub file_id: u32,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end, file_id: 0 }
    }

    pub fn with_file(start: usize, end: usize, file_id: u32) -> Self {
        Self { start, end, file_id }
    }

    /// Span for synthesized nodes. Converts to an unknown location.
    pub fn dummy() -> Self {
        Self { start: 0, end: 0, file_id: 0 }
    }

    pub fn is_dummy(&self) -> bool {
        self.start == 0 && self.end == 0
    }
}

/// A value annotated with its source span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn dummy(node: T) -> Self {
        Self { node, span: Span::dummy() }
    }
}

/// A resolved position: file plus 1-based line and column.
///
/// `line == 0` marks an unknown location (synthesized nodes, or spans that
/// could not be mapped back to source text).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self { file: Some(file.into()), line, column }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn has_location(&self) -> bool {
        self.line > 0
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.has_location() {
            return write!(f, "<unknown>");
        }
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// Maps byte offsets to 1-based line:column positions for a single source file.
/// Columns count characters, so a caret under column `n` lines up in an editor.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line. line_starts[0] == 0 always.
    line_starts: Vec<usize>,
    text: String,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts, text: source.to_string() }
    }

    /// Convert a byte offset to a (line, column) pair, both 1-based.
    /// Offsets inside a multi-byte character snap back to its start; offsets
    /// past the end clamp to the last position.
    pub fn line_col(&self, offset: usize) -> (u32, u32) {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(ins) => ins.saturating_sub(1),
        };
        let col = self.text[self.line_starts[line]..offset].chars().count();
        (line as u32 + 1, col as u32 + 1)
    }

    /// Byte offset of a 1-based (line, column) pair, if the line exists.
    pub fn offset(&self, line: u32, column: u32) -> Option<usize> {
        let start = *self.line_starts.get((line as usize).checked_sub(1)?)?;
        let skip = (column as usize).saturating_sub(1);
        Some(self.text[start..].char_indices().nth(skip).map_or(self.text.len(), |(i, _)| start + i))
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Convert a span into a location in `file`. Dummy spans map to unknown.
    pub fn location(&self, file: &str, span: Span) -> SourceLocation {
        if span.is_dummy() {
            return SourceLocation::unknown();
        }
        let (line, column) = self.line_col(span.start);
        SourceLocation::new(file, line, column)
    }
}
