//! Line/column to byte offset conversion.

/// Start offsets of every line in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    /// Builds the index for `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| to_u32(i + 1)),
        );
        Self {
            line_starts,
            len: to_u32(text.len()),
        }
    }

    /// Number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Converts a 1-indexed line and a 0-indexed character column into a byte
    /// offset, clamping to the end of the line (and of the text).
    #[must_use]
    pub fn offset(&self, text: &str, line: usize, column: usize) -> u32 {
        if line == 0 {
            return 0;
        }
        let Some(&start) = self.line_starts.get(line - 1) else {
            return self.len;
        };
        let end = self.line_starts.get(line).copied().unwrap_or(self.len);
        let line_text = text.get(start as usize..end as usize).unwrap_or("");
        let within = line_text
            .char_indices()
            .nth(column)
            .map_or(line_text.len(), |(i, _)| i);
        start + to_u32(within)
    }

    /// Converts a byte offset into a 1-indexed `(line, column)` pair; the
    /// column counts characters.
    #[must_use]
    pub fn line_col(&self, text: &str, offset: u32) -> (usize, usize) {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line] as usize;
        let column = text
            .get(start..offset as usize)
            .map_or(0, |prefix| prefix.chars().count());
        (line + 1, column + 1)
    }
}

/// Source files are capped well below 4 GiB; larger offsets saturate.
pub(crate) fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
