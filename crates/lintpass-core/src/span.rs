//! File-relative positions and spans.

use serde::{Deserialize, Serialize};

/// Index of a file inside a [`Snapshot`](crate::Snapshot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    /// Returns the index as `usize`.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A byte offset inside one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    /// File the offset belongs to.
    pub file: FileId,
    /// Byte offset from the start of the file text.
    pub offset: u32,
}

impl Pos {
    /// Creates a new position.
    #[must_use]
    pub fn new(file: FileId, offset: u32) -> Self {
        Self { file, offset }
    }
}

/// Half-open byte range `[start, end)` inside one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    /// File the range belongs to.
    pub file: FileId,
    /// First byte of the range.
    pub start: u32,
    /// One past the last byte of the range.
    pub end: u32,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Position of the first byte.
    #[must_use]
    pub fn lo(self) -> Pos {
        Pos::new(self.file, self.start)
    }

    /// Position one past the last byte.
    #[must_use]
    pub fn hi(self) -> Pos {
        Pos::new(self.file, self.end)
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Returns true for a zero-width span.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Returns true if `other` lies entirely inside this span.
    #[must_use]
    pub fn encloses(self, other: Span) -> bool {
        self.file == other.file && other.start >= self.start && other.end <= self.end
    }

    /// Returns true if `pos` lies inside this span, both ends included.
    #[must_use]
    pub fn touches(self, pos: Pos) -> bool {
        self.file == pos.file && self.start <= pos.offset && pos.offset <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encloses_requires_same_file() {
        let outer = Span::new(FileId(0), 10, 50);
        assert!(outer.encloses(Span::new(FileId(0), 10, 50)));
        assert!(outer.encloses(Span::new(FileId(0), 20, 30)));
        assert!(!outer.encloses(Span::new(FileId(0), 5, 30)));
        assert!(!outer.encloses(Span::new(FileId(1), 20, 30)));
    }

    #[test]
    fn test_touches_includes_both_ends() {
        let span = Span::new(FileId(2), 4, 8);
        assert!(span.touches(Pos::new(FileId(2), 4)));
        assert!(span.touches(Pos::new(FileId(2), 8)));
        assert!(!span.touches(Pos::new(FileId(2), 9)));
        assert!(!span.touches(Pos::new(FileId(0), 6)));
    }
}
