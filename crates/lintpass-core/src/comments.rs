//! Comment recovery.
//!
//! `syn` drops ordinary comments, so they are recovered with a small lexer
//! that understands just enough Rust (strings, raw strings, character
//! literals, nested block comments) to never mistake string contents for a
//! comment.

use serde::Serialize;

use crate::line_index::to_u32;
use crate::span::{FileId, Span};

/// A single `//` or `/* */` comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    /// Location of the comment, delimiters included.
    pub span: Span,
    /// Comment text, delimiters included (e.g. `"//nolint:demo"`).
    pub text: String,
}

/// Comments separated only by whitespace with at most one line break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentGroup {
    /// Comments in source order; never empty.
    pub list: Vec<Comment>,
}

impl CommentGroup {
    /// Span from the first comment's start to the last comment's end.
    #[must_use]
    pub fn span(&self) -> Span {
        let first = self.list[0].span;
        let last = self.list[self.list.len() - 1].span;
        Span::new(first.file, first.start, last.end)
    }

    /// Returns true if any comment starts with `prefix` and has text after it.
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.list
            .iter()
            .any(|c| c.text.len() > prefix.len() && c.text.starts_with(prefix))
    }

    /// Returns true if any comment is exactly `text`.
    #[must_use]
    pub fn has_comment(&self, text: &str) -> bool {
        self.list.iter().any(|c| c.text == text)
    }
}

/// Extracts comment groups from Rust source text.
#[must_use]
pub fn comment_groups(file: FileId, text: &str) -> Vec<CommentGroup> {
    let mut groups: Vec<CommentGroup> = Vec::new();
    let mut previous_end = 0usize;

    for (start, end) in scan(text) {
        let comment = Comment {
            span: Span::new(file, to_u32(start), to_u32(end)),
            text: text[start..end].trim_end_matches('\r').to_string(),
        };

        let gap = &text[previous_end..start];
        let joins = !groups.is_empty()
            && gap.chars().all(char::is_whitespace)
            && gap.matches('\n').count() <= 1;
        match groups.last_mut() {
            Some(group) if joins => group.list.push(comment),
            _ => groups.push(CommentGroup {
                list: vec![comment],
            }),
        }
        previous_end = end;
    }

    groups
}

/// Returns `(start, end)` byte ranges of every comment.
fn scan(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut comments = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = text[i..].find('\n').map_or(bytes.len(), |n| i + n);
                comments.push((i, end));
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = block_comment_end(bytes, i);
                comments.push((i, end));
                i = end;
            }
            b'"' => i = quoted_end(bytes, i + 1, b'"'),
            b'\'' => i = char_or_lifetime_end(text, i),
            b'r' | b'b' | b'c' if !preceded_by_ident(bytes, i) => {
                i = raw_string_end(bytes, i).unwrap_or(i + 1);
            }
            _ => i += 1,
        }
    }

    comments
}

fn block_comment_end(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'/', b'*') => {
                depth += 1;
                i += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Skips to just past the closing `quote`, honoring backslash escapes.
fn quoted_end(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn char_or_lifetime_end(text: &str, start: usize) -> usize {
    let bytes = text.as_bytes();
    if bytes.get(start + 1) == Some(&b'\\') {
        return quoted_end(bytes, start + 1, b'\'');
    }
    match text[start + 1..].chars().next() {
        Some(c) if bytes.get(start + 1 + c.len_utf8()) == Some(&b'\'') => {
            start + 2 + c.len_utf8()
        }
        // a lifetime or label: only the tick is consumed
        _ => start + 1,
    }
}

/// Handles `r"..."`, `r#"..."#`, `b"..."`, `br#"..."#`, `c"..."` and `b'x'`.
fn raw_string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    if matches!(bytes[i], b'b' | b'c') {
        i += 1;
        match bytes.get(i) {
            Some(b'"') => return Some(quoted_end(bytes, i + 1, b'"')),
            Some(b'\'') if bytes[start] == b'b' => return Some(quoted_end(bytes, i + 1, b'\'')),
            Some(b'r') => {}
            _ => return None,
        }
    }
    // at `r`
    i += 1;
    let hashes = bytes[i..].iter().take_while(|&&b| b == b'#').count();
    i += hashes;
    if bytes.get(i) != Some(&b'"') {
        return None;
    }
    i += 1;
    while i < bytes.len() {
        if bytes[i] == b'"' && bytes[i + 1..].iter().take(hashes).filter(|&&b| b == b'#').count() == hashes {
            return Some(i + 1 + hashes);
        }
        i += 1;
    }
    Some(bytes.len())
}

fn preceded_by_ident(bytes: &[u8], i: usize) -> bool {
    i > 0 && (bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<Vec<String>> {
        comment_groups(FileId(0), source)
            .into_iter()
            .map(|g| g.list.into_iter().map(|c| c.text).collect())
            .collect()
    }

    #[test]
    fn test_groups_adjacent_lines() {
        let source = "// a\n// b\n\n// c\nfn f() {}\n";
        assert_eq!(texts(source), vec![vec!["// a", "// b"], vec!["// c"]]);
    }

    #[test]
    fn test_ignores_comment_markers_in_strings() {
        let source = r##"
fn f() {
    let url = "http://example.com";
    let raw = r#"// not a comment "quoted" "#;
    let bytes = b"//";
    let slash = '/';
    let quote = '"';
    // real
}
"##;
        assert_eq!(texts(source), vec![vec!["// real"]]);
    }

    #[test]
    fn test_lifetimes_are_not_char_literals() {
        let source = "fn f<'a>(x: &'a str) -> &'a str { x } // tail\n";
        assert_eq!(texts(source), vec![vec!["// tail"]]);
    }

    #[test]
    fn test_nested_block_comments() {
        let source = "/* outer /* inner */ still */ fn f() {} // after\n";
        assert_eq!(
            texts(source),
            vec![vec!["/* outer /* inner */ still */"], vec!["// after"]]
        );
    }

    #[test]
    fn test_code_between_comments_splits_groups() {
        let source = "let a = 1; // first\nlet b = 2; // second\n";
        assert_eq!(texts(source), vec![vec!["// first"], vec!["// second"]]);
    }

    #[test]
    fn test_crlf_is_trimmed() {
        let source = "//nolint:demo\r\nfn f() {}\r\n";
        assert_eq!(texts(source), vec![vec!["//nolint:demo"]]);
    }

    #[test]
    fn test_group_span_and_prefix() {
        let groups = comment_groups(FileId(3), "// x\n//nolint:demo\nfn f() {}\n");
        let group = &groups[0];

        assert_eq!(group.span(), Span::new(FileId(3), 0, 18));
        assert!(group.has_prefix("//nolint:"));
        assert!(!group.has_prefix("//nolint:demo"));
        assert!(group.has_comment("// x"));
    }
}
