//! Parsed source files and the immutable snapshot a run works on.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::comments::{comment_groups, Comment, CommentGroup};
use crate::config::AnalyzerConfig;
use crate::line_index::{to_u32, LineIndex};
use crate::span::{FileId, Pos, Span};
use crate::syntax::{NodeId, SyntaxTree};
use crate::types::Location;

/// Errors that can occur while building a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error reading a file.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Error parsing Rust source file.
    #[error("Parse error in {path}: {message}")]
    Parse {
        /// Path to the file that failed to parse.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// Glob pattern error.
    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    /// Directory walk error.
    #[error("Failed to walk source tree: {0}")]
    Walk(#[from] ignore::Error),
}

/// One parsed file: text, lowered syntax tree and comment groups.
#[derive(Debug, Clone)]
pub struct SourceFile {
    id: FileId,
    path: PathBuf,
    text: String,
    lines: LineIndex,
    tree: SyntaxTree,
    comments: Vec<CommentGroup>,
}

impl SourceFile {
    /// Parses `text` as a Rust file.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Parse`] if `text` is not valid Rust.
    pub fn parse(
        id: FileId,
        path: impl Into<PathBuf>,
        text: impl Into<String>,
    ) -> Result<Self, SnapshotError> {
        let path = path.into();
        let mut text = text.into();
        if text.starts_with('\u{feff}') {
            text.remove(0);
        }

        let ast = syn::parse_file(&text).map_err(|e| SnapshotError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let lines = LineIndex::new(&text);
        let tree = SyntaxTree::lower(id, &ast, &text, &lines);
        let comments = comment_groups(id, &text);

        Ok(Self {
            id,
            path,
            text,
            lines,
            tree,
            comments,
        })
    }

    /// Identifier of this file within its snapshot.
    #[must_use]
    pub fn id(&self) -> FileId {
        self.id
    }

    /// Path the file was loaded from (relative to the snapshot root when
    /// loaded from disk).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Lowered syntax tree.
    #[must_use]
    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// All comment groups in source order.
    #[must_use]
    pub fn comments(&self) -> &[CommentGroup] {
        &self.comments
    }

    /// Comments that end before the first token of the file.
    ///
    /// Decided per comment: a group that runs into an inner doc comment
    /// (`//!`, itself a token) still yields the comments above it.
    pub fn header_comments(&self) -> impl Iterator<Item = &Comment> {
        let first_token = self.tree.root_span().start;
        self.comments
            .iter()
            .flat_map(|group| group.list.iter())
            .take_while(move |comment| comment.span.end <= first_token)
    }

    /// Byte range of the whole text.
    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.id, 0, to_u32(self.text.len()))
    }

    /// Broadest node starting exactly at `pos`.
    #[must_use]
    pub fn node_at(&self, pos: Pos) -> Option<NodeId> {
        if pos.file != self.id {
            return None;
        }
        self.tree.node_at(pos.offset)
    }

    /// Converts an offset into a [`Location`].
    #[must_use]
    pub fn location(&self, offset: u32) -> Location {
        let (line, column) = self.lines.line_col(&self.text, offset);
        Location::new(self.path.clone(), line, column).with_span(offset as usize, 0)
    }

    /// Converts a span into a [`Location`] carrying its length.
    #[must_use]
    pub fn location_of(&self, span: Span) -> Location {
        let location = self.location(span.start);
        let offset = location.offset;
        location.with_span(offset, span.len() as usize)
    }
}

/// Immutable set of parsed files analysed by one run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    root: PathBuf,
    files: Vec<SourceFile>,
}

impl Snapshot {
    /// Creates a new builder for an in-memory snapshot.
    #[must_use]
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    /// Discovers, reads and parses every `.rs` file under `config.root`.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery or reading fails, or if a file fails to
    /// parse while `fail_on_parse_error` is set.
    pub fn load(config: &AnalyzerConfig) -> Result<Self, SnapshotError> {
        let root = config.root.clone();
        info!("Loading sources from {:?}", root);

        let mut builder = SnapshotBuilder::new()
            .root(&root)
            .fail_on_parse_error(config.fail_on_parse_error);
        for path in discover_files(config)? {
            let text = std::fs::read_to_string(&path).map_err(|e| SnapshotError::Io {
                path: path.clone(),
                source: e,
            })?;
            let relative = path
                .strip_prefix(&root)
                .map_or_else(|_| path.clone(), Path::to_path_buf);
            builder = builder.source(relative, text);
        }

        builder.build()
    }

    /// Root directory the files were loaded from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All files in load order.
    #[must_use]
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Returns the file for `id`.
    #[must_use]
    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.index())
    }

    /// Returns the file containing `pos`.
    #[must_use]
    pub fn file_of(&self, pos: Pos) -> Option<&SourceFile> {
        self.file(pos.file)
            .filter(|file| pos.offset as usize <= file.text.len())
    }

    /// Broadest node starting exactly at `pos`.
    #[must_use]
    pub fn node_at(&self, pos: Pos) -> Option<NodeId> {
        self.file_of(pos).and_then(|file| file.node_at(pos))
    }

    /// Converts a position into a [`Location`].
    #[must_use]
    pub fn location(&self, pos: Pos) -> Option<Location> {
        self.file_of(pos).map(|file| file.location(pos.offset))
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if the snapshot holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Builder for a [`Snapshot`].
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    root: PathBuf,
    sources: Vec<(PathBuf, String)>,
    fail_on_parse_error: bool,
}

impl SnapshotBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root directory reported by the snapshot.
    #[must_use]
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = path.into();
        self
    }

    /// Adds a source file.
    #[must_use]
    pub fn source(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.sources.push((path.into(), text.into()));
        self
    }

    /// Sets whether to fail on parse errors (default: false).
    #[must_use]
    pub fn fail_on_parse_error(mut self, fail: bool) -> Self {
        self.fail_on_parse_error = fail;
        self
    }

    /// Parses every source and builds the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Parse`] for the first unparsable source when
    /// `fail_on_parse_error` is set; otherwise such sources are skipped.
    pub fn build(self) -> Result<Snapshot, SnapshotError> {
        let mut files = Vec::with_capacity(self.sources.len());

        for (path, text) in self.sources {
            let id = FileId(to_u32(files.len()));
            match SourceFile::parse(id, path, text) {
                Ok(file) => {
                    debug!(
                        "Parsed {} ({} nodes, {} comment groups)",
                        file.path.display(),
                        file.tree.len(),
                        file.comments.len()
                    );
                    files.push(file);
                }
                Err(SnapshotError::Parse { path, message }) => {
                    warn!("Failed to parse {}: {}", path.display(), message);
                    if self.fail_on_parse_error {
                        return Err(SnapshotError::Parse { path, message });
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Snapshot {
            root: self.root,
            files,
        })
    }
}

/// Discovers all Rust source files to analyze.
fn discover_files(config: &AnalyzerConfig) -> Result<Vec<PathBuf>, SnapshotError> {
    let excludes = compile_patterns(&config.exclude)?;
    let includes = compile_patterns(&config.include)?;

    let mut walker = ignore::WalkBuilder::new(&config.root);
    walker
        .hidden(false)
        .git_ignore(config.respect_gitignore)
        .parents(config.respect_gitignore);

    let mut files = Vec::new();
    for entry in walker.build() {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("rs") {
            continue;
        }

        let relative = path.strip_prefix(&config.root).unwrap_or(path);
        if excludes.iter().any(|p| p.matches_path(relative) || p.matches_path(path)) {
            debug!("Excluding: {}", path.display());
            continue;
        }
        if !includes.is_empty() && !includes.iter().any(|p| p.matches_path(relative)) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    info!("Found {} files to analyze", files.len());
    Ok(files)
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<glob::Pattern>, SnapshotError> {
    patterns
        .iter()
        .map(|p| glob::Pattern::new(p).map_err(SnapshotError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_sequential_ids() {
        let snapshot = Snapshot::builder()
            .source("a.rs", "fn a() {}\n")
            .source("b.rs", "fn b() {}\n")
            .build()
            .expect("sources should parse");

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.files()[1].id(), FileId(1));
        assert_eq!(snapshot.file(FileId(1)).unwrap().path(), Path::new("b.rs"));
    }

    #[test]
    fn test_parse_errors_are_skipped_by_default() {
        let snapshot = Snapshot::builder()
            .source("bad.rs", "fn {")
            .source("good.rs", "fn good() {}\n")
            .build()
            .expect("bad source should be skipped");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.files()[0].id(), FileId(0));
        assert_eq!(snapshot.files()[0].path(), Path::new("good.rs"));
    }

    #[test]
    fn test_parse_errors_fail_when_requested() {
        let err = Snapshot::builder()
            .source("bad.rs", "fn {")
            .fail_on_parse_error(true)
            .build()
            .unwrap_err();

        assert!(matches!(err, SnapshotError::Parse { .. }));
    }

    #[test]
    fn test_header_comments_stop_at_first_token() {
        let file = SourceFile::parse(
            FileId(0),
            "gen.rs",
            "// @generated\n\n// licence\nfn f() {}\n// tail\n",
        )
        .unwrap();

        let headers: Vec<_> = file.header_comments().collect();
        assert_eq!(headers.len(), 2);
        assert_eq!(file.comments().len(), 3);
    }

    #[test]
    fn test_header_comments_split_group_at_inner_doc() {
        let file = SourceFile::parse(
            FileId(0),
            "msg.rs",
            "// Code generated by tool. DO NOT EDIT.\n//! Generated module.\npub struct Msg;\n",
        )
        .unwrap();

        let headers: Vec<&str> = file.header_comments().map(|c| c.text.as_str()).collect();
        assert_eq!(file.comments().len(), 1);
        assert_eq!(headers, vec!["// Code generated by tool. DO NOT EDIT."]);
    }

    #[test]
    fn test_bom_is_stripped() {
        let file = SourceFile::parse(FileId(0), "bom.rs", "\u{feff}fn f() {}\n").unwrap();
        assert!(file.text().starts_with("fn"));
        assert_eq!(file.tree().root_span().start, 0);
    }

    #[test]
    fn test_location_is_one_based() {
        let snapshot = Snapshot::builder()
            .source("a.rs", "fn a() {\n    let x = 1;\n}\n")
            .build()
            .unwrap();

        let location = snapshot.location(Pos::new(FileId(0), 13)).unwrap();
        assert_eq!((location.line, location.column), (2, 5));
        assert!(snapshot.location(Pos::new(FileId(7), 0)).is_none());
    }

    #[test]
    fn test_load_respects_excludes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn f() {}\n").unwrap();
        std::fs::write(dir.path().join("target/debug/out.rs"), "pub fn g() {}\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "# readme\n").unwrap();

        let config = AnalyzerConfig {
            root: dir.path().to_path_buf(),
            ..AnalyzerConfig::default()
        };
        let snapshot = Snapshot::load(&config).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.files()[0].path(), Path::new("src/lib.rs"));
    }
}
