//! The check contract, the per-run pass handed to each check, and the
//! by-name result registry.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

use crate::config::CheckConfig;
use crate::source::Snapshot;
use crate::span::Span;
use crate::types::Diagnostic;

/// Type-erased value produced by a check for its dependents.
pub type Output = Arc<dyn Any + Send + Sync>;

/// Wraps a value as an [`Output`].
#[must_use]
pub fn output<T: Any + Send + Sync>(value: T) -> Output {
    Arc::new(value)
}

/// The [`Output`] of a check that produces nothing for dependents.
#[must_use]
pub fn no_output() -> Output {
    Arc::new(())
}

/// A fatal failure raised by a check's `run`.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The check could not complete.
    #[error("{0}")]
    Failed(String),

    /// A result the check depends on was not produced.
    #[error("required result `{0}` is not available")]
    MissingDependency(String),

    /// Any other error.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// An independent, pluggable analysis unit.
///
/// A check inspects the snapshot carried by its [`Pass`], reports findings
/// through [`Pass::report`], and may hand a value to the checks that require
/// it. Its name is both its identity in the schedule and the key users write
/// in `//nolint:<name>` directives.
///
/// # Example
///
/// ```ignore
/// use lintpass_core::{no_output, Check, CheckError, Diagnostic, Output, Pass};
///
/// struct NoTodo;
///
/// impl Check for NoTodo {
///     fn name(&self) -> &str { "notodo" }
///
///     fn run(&self, pass: &mut Pass<'_>) -> Result<Output, CheckError> {
///         for file in pass.snapshot().files() {
///             for group in file.comments() {
///                 if group.has_prefix("// TODO") {
///                     pass.report(Diagnostic::new(group.span().lo(), "unowned TODO"));
///                 }
///             }
///         }
///         Ok(no_output())
///     }
/// }
/// ```
pub trait Check: Send + Sync {
    /// Unique name of the check.
    fn name(&self) -> &str;

    /// Brief description of what this check reports.
    fn doc(&self) -> &str {
        ""
    }

    /// Checks whose results must be available before this one runs.
    fn requires(&self) -> Vec<CheckRef> {
        Vec::new()
    }

    /// Runs the check.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckError`] when the check cannot complete; the driver
    /// aborts the whole run.
    fn run(&self, pass: &mut Pass<'_>) -> Result<Output, CheckError>;
}

/// Shared handle to a check.
pub type CheckRef = Arc<dyn Check>;

/// Results of the dependencies available to one check, looked up by the
/// producer's name.
#[derive(Clone, Default)]
pub struct Results {
    entries: Vec<(String, Output)>,
}

impl Results {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the output of the check called `name`.
    pub fn insert(&mut self, name: impl Into<String>, output: Output) {
        self.entries.push((name.into(), output));
    }

    /// Returns the output produced by the check called `name`, or `None` if
    /// no such dependency result is available.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Output> {
        self.entries
            .iter()
            .find(|(producer, _)| producer == name)
            .map(|(_, output)| output)
    }

    /// Like [`get`](Self::get), downcast to `T`; `None` on a type mismatch.
    #[must_use]
    pub fn get_as<T: Any>(&self, name: &str) -> Option<&T> {
        self.get(name)?.as_ref().downcast_ref::<T>()
    }

    /// Names of the producers in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl std::fmt::Debug for Results {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Everything a check sees during its run.
pub struct Pass<'a> {
    check: &'a str,
    snapshot: &'a Snapshot,
    results: &'a Results,
    options: Option<&'a CheckConfig>,
    report: &'a mut dyn FnMut(Diagnostic),
}

impl<'a> Pass<'a> {
    /// Creates a pass for the check called `check`.
    #[must_use]
    pub fn new(
        check: &'a str,
        snapshot: &'a Snapshot,
        results: &'a Results,
        report: &'a mut dyn FnMut(Diagnostic),
    ) -> Self {
        Self {
            check,
            snapshot,
            results,
            options: None,
            report,
        }
    }

    /// Attaches the check's configuration section.
    #[must_use]
    pub fn with_options(mut self, options: Option<&'a CheckConfig>) -> Self {
        self.options = options;
        self
    }

    /// Name of the check being run.
    #[must_use]
    pub fn check_name(&self) -> &'a str {
        self.check
    }

    /// The files under analysis.
    #[must_use]
    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    /// Dependency results visible to this check.
    #[must_use]
    pub fn results(&self) -> &'a Results {
        self.results
    }

    /// The check's configuration section, if any.
    #[must_use]
    pub fn options(&self) -> Option<&'a CheckConfig> {
        self.options
    }

    /// Output of the dependency called `name`.
    #[must_use]
    pub fn result_of(&self, name: &str) -> Option<&'a Output> {
        self.results.get(name)
    }

    /// Output of the dependency called `name`, downcast to `T`.
    #[must_use]
    pub fn result<T: Any>(&self, name: &str) -> Option<&'a T> {
        self.results.get_as::<T>(name)
    }

    /// Emits a diagnostic.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        (self.report)(diagnostic);
    }

    /// Emits a diagnostic covering `span`.
    pub fn report_span(&mut self, span: Span, message: impl Into<String>) {
        self.report(Diagnostic::spanning(span, message));
    }
}

impl std::fmt::Debug for Pass<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass")
            .field("check", &self.check)
            .field("files", &self.snapshot.len())
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}
