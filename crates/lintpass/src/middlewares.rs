//! Decorators that wrap any [`Check`] with suppression and generated-file
//! filtering.
//!
//! A wrapped check keeps its name, documentation and result. Only the
//! diagnostics it emits are filtered, and the pass it depends on is listed
//! ahead of its own dependencies.
//!
//! ```ignore
//! use lintpass::middlewares;
//!
//! let driver = Driver::builder()
//!     .check(middlewares::standard(copyproto::analyzer()))
//!     .build()?;
//! ```

use std::sync::Arc;

use lintpass_core::{Check, CheckError, CheckRef, Diagnostic, Output, Pass};
use lintpass_passes::{nogen, nolint, GeneratedFiles, SuppressionIndex};
use tracing::trace;

/// Leading text of the hint emitted next to every forwarded diagnostic.
pub const NOLINT_HINT: &str = "if you believe this report is false positive, please silence it with";

/// Hint text pointing at the directive that silences `check`.
#[must_use]
pub fn nolint_hint(check: &str) -> String {
    format!("{NOLINT_HINT} {} comment", nolint::directive_for(check))
}

/// Wraps `check` so that diagnostics covered by a `//nolint:<name>`
/// directive are dropped.
///
/// Every diagnostic that gets through is followed by a hint at the same
/// position telling the user how to silence it.
#[must_use]
pub fn nolint(check: CheckRef) -> CheckRef {
    Arc::new(WithNolint { inner: check })
}

/// Wraps `check` so that diagnostics located in generated files are dropped.
#[must_use]
pub fn nogen(check: CheckRef) -> CheckRef {
    Arc::new(WithNogen { inner: check })
}

/// Both filters: `nogen(nolint(check))`.
#[must_use]
pub fn standard(check: CheckRef) -> CheckRef {
    nogen(nolint(check))
}

struct WithNolint {
    inner: CheckRef,
}

impl Check for WithNolint {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn doc(&self) -> &str {
        self.inner.doc()
    }

    fn requires(&self) -> Vec<CheckRef> {
        let mut requires = vec![nolint::analyzer()];
        requires.extend(self.inner.requires());
        requires
    }

    fn run(&self, pass: &mut Pass<'_>) -> Result<Output, CheckError> {
        let index = pass
            .result::<SuppressionIndex>(nolint::NAME)
            .ok_or_else(|| CheckError::MissingDependency(nolint::NAME.to_string()))?;
        let name = pass.check_name();
        let snapshot = pass.snapshot();
        let results = pass.results();
        let options = pass.options();

        let directives = index.for_check(self.inner.name());
        let hint = nolint_hint(self.inner.name());

        let mut filter = |diagnostic: Diagnostic| {
            let node = snapshot.file_of(diagnostic.pos).and_then(|file| {
                let id = file.node_at(diagnostic.pos)?;
                file.tree().get(id)
            });
            let suppressed = match node {
                Some(node) => directives.excluded(node.span),
                None => directives.contains(diagnostic.pos),
            };
            if suppressed {
                trace!("{name}: suppressed `{}`", diagnostic.message);
                return;
            }

            let pos = diagnostic.pos;
            pass.report(diagnostic);
            pass.report(Diagnostic::new(pos, hint.as_str()));
        };

        let mut inner = Pass::new(name, snapshot, results, &mut filter).with_options(options);
        self.inner.run(&mut inner)
    }
}

struct WithNogen {
    inner: CheckRef,
}

impl Check for WithNogen {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn doc(&self) -> &str {
        self.inner.doc()
    }

    fn requires(&self) -> Vec<CheckRef> {
        let mut requires = vec![nogen::analyzer()];
        requires.extend(self.inner.requires());
        requires
    }

    fn run(&self, pass: &mut Pass<'_>) -> Result<Output, CheckError> {
        let generated = pass
            .result::<GeneratedFiles>(nogen::NAME)
            .ok_or_else(|| CheckError::MissingDependency(nogen::NAME.to_string()))?;
        let name = pass.check_name();
        let snapshot = pass.snapshot();
        let results = pass.results();
        let options = pass.options();

        let mut filter = |diagnostic: Diagnostic| {
            if generated.is_generated(diagnostic.pos.file) {
                trace!("{name}: dropped diagnostic in generated file");
                return;
            }
            pass.report(diagnostic);
        };

        let mut inner = Pass::new(name, snapshot, results, &mut filter).with_options(options);
        self.inner.run(&mut inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lintpass_core::no_output;

    struct Named(&'static str);

    impl Check for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn doc(&self) -> &str {
            "reports nothing"
        }

        fn requires(&self) -> Vec<CheckRef> {
            vec![nogen::analyzer()]
        }

        fn run(&self, _pass: &mut Pass<'_>) -> Result<Output, CheckError> {
            Ok(no_output())
        }
    }

    #[test]
    fn test_hint_text() {
        assert_eq!(
            nolint_hint("CopyProto"),
            "if you believe this report is false positive, please silence it with //nolint:copyproto comment"
        );
    }

    #[test]
    fn test_wrapper_keeps_identity() {
        let wrapped = standard(Arc::new(Named("demo")));
        assert_eq!(wrapped.name(), "demo");
        assert_eq!(wrapped.doc(), "reports nothing");
    }

    #[test]
    fn test_pass_dependency_is_listed_first() {
        let wrapped = nolint(Arc::new(Named("demo")));
        let names: Vec<String> = wrapped
            .requires()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["nolint", "nogen"]);

        let wrapped = nogen(nolint(Arc::new(Named("demo"))));
        let names: Vec<String> = wrapped
            .requires()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["nogen", "nolint", "nogen"]);
    }
}
