//! Pass that collects `//nolint:<check>` directives into a suppression index.
//!
//! # Directives
//!
//! A directive is a line comment starting with `//nolint:` followed by a
//! check name. Anything after the first whitespace is an explanation and is
//! ignored. A comment group may carry several directives, one per line:
//!
//! ```text
//! //nolint:copyproto
//! //nolint:nilness false positive on the early return
//! let msg = take(req);
//! ```
//!
//! The group binds to the first node that starts after it, which is the
//! broadest syntactic construct following the comment. A group placed before
//! the first token of a file binds to the file itself and covers all of it.
//!
//! Generated files are skipped: their diagnostics are dropped wholesale by
//! the generated-file middleware, so directives in them are never needed.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use lintpass_core::{
    output, Check, CheckError, CheckRef, CommentGroup, NodeId, Output, Pass, Pos, SourceFile,
    Span,
};
use tracing::{debug, trace};

use crate::nogen::{self, GeneratedFiles};

/// Pass name for nolint.
pub const NAME: &str = "nolint";

/// Prefix introducing a directive.
pub const PREFIX: &str = "//nolint:";

/// Returns the directive users write to silence `check`.
#[must_use]
pub fn directive_for(check: &str) -> String {
    format!("{PREFIX}{}", check.to_lowercase())
}

/// Lowercased check names named by the directives in `group`, in order.
#[must_use]
pub fn directive_names(group: &CommentGroup) -> Vec<String> {
    group
        .list
        .iter()
        .filter_map(|comment| comment.text.strip_prefix(PREFIX))
        .filter_map(|rest| rest.split(char::is_whitespace).next())
        .filter(|name| !name.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// A directive bound to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Lowercased check name.
    pub check: String,
    /// Node the directive is bound to.
    pub node: NodeId,
    /// Range of that node.
    pub span: Span,
}

impl Directive {
    /// Returns true if the directive is bound to the whole file.
    #[must_use]
    pub fn is_whole_file(&self) -> bool {
        self.node == NodeId::ROOT
    }

    /// Returns true if a finding covering `span` falls under this directive.
    #[must_use]
    pub fn covers(&self, span: Span) -> bool {
        if self.is_whole_file() {
            return span.file == self.span.file;
        }
        self.span.encloses(span)
    }

    /// Returns true if `pos` falls under this directive.
    #[must_use]
    pub fn touches(&self, pos: Pos) -> bool {
        if self.is_whole_file() {
            return pos.file == self.span.file;
        }
        self.span.touches(pos)
    }
}

/// Extracts the directives of one file.
#[must_use]
pub fn directives(file: &SourceFile) -> Vec<Directive> {
    let tree = file.tree();
    let mut found = Vec::new();

    for group in file.comments().iter().filter(|g| g.has_prefix(PREFIX)) {
        let names = directive_names(group);
        if names.is_empty() {
            continue;
        }

        let group_span = group.span();
        if !file.span().encloses(group_span) {
            trace!("{}: directive group outside file range", file.path().display());
            continue;
        }
        let Some((node, span)) = tree
            .first_after(group_span.start)
            .and_then(|id| tree.get(id).map(|node| (id, node.span)))
        else {
            trace!(
                "{}: no node follows directive at offset {}",
                file.path().display(),
                group_span.start
            );
            continue;
        };

        found.extend(names.into_iter().map(|check| Directive { check, node, span }));
    }

    found
}

/// Every directive of a run, grouped by check name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuppressionIndex {
    by_check: BTreeMap<String, Vec<Directive>>,
}

impl SuppressionIndex {
    /// Builds the index from `files`.
    pub fn build<'a>(files: impl IntoIterator<Item = &'a SourceFile>) -> Self {
        let mut index = Self::default();
        for file in files {
            for directive in directives(file) {
                index.insert(directive);
            }
        }
        for list in index.by_check.values_mut() {
            list.sort_by_key(|d| (d.span.file, d.span.start));
        }
        index
    }

    fn insert(&mut self, directive: Directive) {
        self.by_check
            .entry(directive.check.clone())
            .or_default()
            .push(directive);
    }

    /// Directives that apply to the check called `name`.
    ///
    /// The list stored under `name` followed by the list stored under its
    /// lowercase form, so a directive matches regardless of the case either
    /// side was written in. The union is not deduplicated: for an already
    /// lowercase name the same list appears twice.
    #[must_use]
    pub fn for_check(&self, name: &str) -> CheckIndex<'_> {
        let mut directives: Vec<&Directive> = Vec::new();
        for key in [name.to_string(), name.to_lowercase()] {
            if let Some(list) = self.by_check.get(&key) {
                directives.extend(list);
            }
        }
        CheckIndex { directives }
    }

    /// Names that carry at least one directive.
    pub fn checks(&self) -> impl Iterator<Item = &str> {
        self.by_check.keys().map(String::as_str)
    }

    /// Total number of directives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_check.values().map(Vec::len).sum()
    }

    /// Returns true if no directive was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_check.is_empty()
    }
}

/// Directives of a single check.
#[derive(Debug, Clone, Default)]
pub struct CheckIndex<'a> {
    directives: Vec<&'a Directive>,
}

impl<'a> CheckIndex<'a> {
    /// Returns true if a finding covering `span` is suppressed.
    #[must_use]
    pub fn excluded(&self, span: Span) -> bool {
        self.directives.iter().any(|d| d.covers(span))
    }

    /// Returns true if `pos` lies inside a directive's range.
    #[must_use]
    pub fn contains(&self, pos: Pos) -> bool {
        self.directives.iter().any(|d| d.touches(pos))
    }

    /// Directives in this view.
    pub fn iter(&self) -> impl Iterator<Item = &'a Directive> + '_ {
        self.directives.iter().copied()
    }

    /// Number of directives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Returns true if the check has no directives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

/// Builds the suppression index over the analyzable files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nolint;

impl Check for Nolint {
    fn name(&self) -> &str {
        NAME
    }

    fn doc(&self) -> &str {
        "collects //nolint:<check> directives"
    }

    fn requires(&self) -> Vec<CheckRef> {
        vec![nogen::analyzer()]
    }

    fn run(&self, pass: &mut Pass<'_>) -> Result<Output, CheckError> {
        let generated = pass
            .result::<GeneratedFiles>(nogen::NAME)
            .ok_or_else(|| CheckError::MissingDependency(nogen::NAME.to_string()))?;
        let files = pass
            .snapshot()
            .files()
            .iter()
            .filter(|file| !generated.is_generated(file.id()));

        let index = SuppressionIndex::build(files);
        debug!(
            "{} nolint directive(s) for {} check(s)",
            index.len(),
            index.by_check.len()
        );
        Ok(output(index))
    }
}

/// The shared nolint pass.
#[must_use]
pub fn analyzer() -> CheckRef {
    static ANALYZER: OnceLock<CheckRef> = OnceLock::new();
    Arc::clone(ANALYZER.get_or_init(|| Arc::new(Nolint)))
}
