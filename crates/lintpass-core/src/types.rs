//! Core types for diagnostics, findings and run reports.

use miette::{Diagnostic as MietteDiagnostic, GraphicalReportHandler, GraphicalTheme, NamedSource, SourceSpan};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::source::Snapshot;
use crate::span::{Pos, Span};

/// Source code location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File path relative to the snapshot root.
    pub file: PathBuf,
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed, in characters).
    pub column: usize,
    /// Byte offset in file (for miette integration).
    pub offset: usize,
    /// Length of the span in bytes.
    pub length: usize,
}

impl Location {
    /// Creates a new location with explicit values.
    #[must_use]
    pub fn new(file: PathBuf, line: usize, column: usize) -> Self {
        Self {
            file,
            line,
            column,
            offset: 0,
            length: 0,
        }
    }

    /// Sets the byte offset and length for this location.
    #[must_use]
    pub fn with_span(mut self, offset: usize, length: usize) -> Self {
        self.offset = offset;
        self.length = length;
        self
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// A finding emitted by a check through its pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Position the finding is reported at.
    pub pos: Pos,
    /// Optional end of the reported range.
    pub end: Option<Pos>,
    /// Human-readable message.
    pub message: String,
    /// Optional documentation link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Diagnostic {
    /// Creates a diagnostic at a single position.
    #[must_use]
    pub fn new(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            pos,
            end: None,
            message: message.into(),
            url: None,
        }
    }

    /// Creates a diagnostic covering `span`.
    #[must_use]
    pub fn spanning(span: Span, message: impl Into<String>) -> Self {
        Self::new(span.lo(), message).with_end(span.hi())
    }

    /// Sets the end of the reported range.
    #[must_use]
    pub fn with_end(mut self, end: Pos) -> Self {
        self.end = Some(end);
        self
    }

    /// Adds a documentation link.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Reported range, when an end in the same file is known.
    #[must_use]
    pub fn span(&self) -> Option<Span> {
        self.end
            .filter(|end| end.file == self.pos.file && end.offset >= self.pos.offset)
            .map(|end| Span::new(self.pos.file, self.pos.offset, end.offset))
    }
}

/// A diagnostic that reached the host sink, tagged with its check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Name of the check that reported it.
    pub check: String,
    /// Resolved location of `diagnostic.pos`.
    pub location: Location,
    /// The diagnostic as emitted.
    pub diagnostic: Diagnostic,
}

impl Finding {
    /// Creates a new finding.
    #[must_use]
    pub fn new(check: impl Into<String>, location: Location, diagnostic: Diagnostic) -> Self {
        Self {
            check: check.into(),
            location,
            diagnostic,
        }
    }

    /// Formats the finding for terminal output.
    #[must_use]
    pub fn format(&self) -> String {
        use std::fmt::Write;
        let mut output = format!("{} at {}\n", self.check, self.location);
        let _ = writeln!(output, "  {}", self.diagnostic.message);
        if let Some(url) = &self.diagnostic.url {
            let _ = writeln!(output, "  = see: {url}");
        }
        output
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: [{}] {}",
            self.location, self.check, self.diagnostic.message
        )?;
        if let Some(url) = &self.diagnostic.url {
            write!(f, " (see: {url})")?;
        }
        Ok(())
    }
}

/// A finding paired with its source text for rich miette rendering.
#[derive(Debug, thiserror::Error, MietteDiagnostic)]
#[error("[{check}] {message}")]
pub struct FindingDiagnostic {
    check: String,
    message: String,
    #[source_code]
    source_code: NamedSource<String>,
    #[label("{check}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
}

impl FindingDiagnostic {
    /// Builds a rich diagnostic from a finding and the snapshot it came from.
    #[must_use]
    pub fn new(finding: &Finding, snapshot: &Snapshot) -> Self {
        let text = snapshot
            .file_of(finding.diagnostic.pos)
            .map(|file| file.text().to_string())
            .unwrap_or_default();
        let length = finding.diagnostic.span().map_or(0, |s| s.len() as usize);

        Self {
            check: finding.check.clone(),
            message: finding.diagnostic.message.clone(),
            source_code: NamedSource::new(finding.location.file.display().to_string(), text),
            span: SourceSpan::from((finding.location.offset, length)),
            help: finding.diagnostic.url.as_ref().map(|url| format!("see: {url}")),
        }
    }
}

/// Result of one run over a snapshot.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Every forwarded finding, sorted by location.
    pub findings: Vec<Finding>,
    /// Number of files in the snapshot.
    pub files_checked: usize,
}

impl Report {
    /// Creates a new empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if any finding was reported.
    #[must_use]
    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }

    /// Returns findings reported by `check`.
    #[must_use]
    pub fn by_check(&self, check: &str) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.check == check).collect()
    }

    /// Sorts findings by file, line, column, then check name.
    pub fn sort(&mut self) {
        self.findings.sort_by(|a, b| {
            a.location
                .file
                .cmp(&b.location.file)
                .then(a.location.line.cmp(&b.location.line))
                .then(a.location.column.cmp(&b.location.column))
                .then(a.check.cmp(&b.check))
        });
    }

    /// Formats all findings followed by a summary line.
    #[must_use]
    pub fn format(&self) -> String {
        use std::fmt::Write;
        let mut output = String::new();
        for finding in &self.findings {
            let _ = writeln!(output, "{}", finding.format());
        }
        let _ = write!(
            output,
            "Found {} finding(s) in {} file(s)",
            self.findings.len(),
            self.files_checked
        );
        output
    }

    /// Renders every finding with source context using miette.
    #[must_use]
    pub fn render(&self, snapshot: &Snapshot) -> String {
        let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
        let mut output = String::new();
        for finding in &self.findings {
            let diagnostic = FindingDiagnostic::new(finding, snapshot);
            if handler.render_report(&mut output, &diagnostic).is_err() {
                output.push_str(&finding.to_string());
                output.push('\n');
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FileId;

    fn make_finding(check: &str, line: usize) -> Finding {
        Finding::new(
            check,
            Location::new(PathBuf::from("src/lib.rs"), line, 5),
            Diagnostic::new(Pos::new(FileId(0), 0), "value copied"),
        )
    }

    #[test]
    fn diagnostic_span_requires_ordered_end() {
        let d = Diagnostic::spanning(Span::new(FileId(1), 4, 9), "x");
        assert_eq!(d.span(), Some(Span::new(FileId(1), 4, 9)));

        let backwards = Diagnostic::new(Pos::new(FileId(1), 9), "x").with_end(Pos::new(FileId(1), 4));
        assert_eq!(backwards.span(), None);

        let other_file = Diagnostic::new(Pos::new(FileId(1), 4), "x").with_end(Pos::new(FileId(2), 9));
        assert_eq!(other_file.span(), None);
    }

    #[test]
    fn finding_display_includes_url() {
        let mut finding = make_finding("copyproto", 3);
        finding.diagnostic = finding.diagnostic.with_url("https://example.com/copyproto");

        assert_eq!(
            finding.to_string(),
            "src/lib.rs:3:5: [copyproto] value copied (see: https://example.com/copyproto)"
        );
    }

    #[test]
    fn report_sorts_by_location_then_check() {
        let mut report = Report::new();
        report.findings.push(make_finding("b", 7));
        report.findings.push(make_finding("z", 2));
        report.findings.push(make_finding("a", 7));
        report.sort();

        let order: Vec<&str> = report.findings.iter().map(|f| f.check.as_str()).collect();
        assert_eq!(order, vec!["z", "a", "b"]);
        assert_eq!(report.by_check("a").len(), 1);
    }

    #[test]
    fn report_format_text() {
        let mut report = Report::new();
        report.files_checked = 2;
        report.findings.push(make_finding("demo", 1));

        insta::assert_snapshot!(report.format(), @r###"
        demo at src/lib.rs:1:5
          value copied

        Found 1 finding(s) in 2 file(s)
        "###);
    }
}
