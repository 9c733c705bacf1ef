//! Driver that schedules checks in dependency order over one snapshot.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::check::{CheckError, CheckRef, Output, Pass, Results};
use crate::config::Config;
use crate::source::{Snapshot, SnapshotError};
use crate::types::{Diagnostic, Finding, Location, Report};

/// Errors that can occur while planning or running checks.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Two distinct checks share a name.
    #[error("Check name `{0}` is bound to two different implementations")]
    DuplicateName(String),

    /// The dependency graph contains a cycle.
    #[error("Dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    /// A check failed; the run is aborted.
    #[error("Check `{name}` failed: {source}")]
    Check {
        /// Name of the failing check.
        name: String,
        /// The check's error.
        source: CheckError,
    },

    /// Loading the snapshot failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Builder for configuring a [`Driver`].
#[derive(Default)]
pub struct DriverBuilder {
    checks: Vec<CheckRef>,
    config: Option<Config>,
}

impl DriverBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root check whose findings are reported.
    #[must_use]
    pub fn check(mut self, check: CheckRef) -> Self {
        self.checks.push(check);
        self
    }

    /// Adds several root checks.
    #[must_use]
    pub fn checks<I>(mut self, checks: I) -> Self
    where
        I: IntoIterator<Item = CheckRef>,
    {
        self.checks.extend(checks);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Resolves the dependency graph into a run plan.
    ///
    /// # Errors
    ///
    /// Returns an error on a name bound to two implementations or a cycle.
    pub fn build(self) -> Result<Driver, DriverError> {
        let config = self.config.unwrap_or_default();
        let mut planner = Planner::default();

        for check in &self.checks {
            if !config.is_check_enabled(check.name()) {
                debug!("Skipping disabled check: {}", check.name());
                continue;
            }
            planner.visit(check)?;
            planner.roots.push(check.name().to_string());
        }

        let plan = planner
            .order
            .into_iter()
            .map(|check| {
                let name = check.name().to_string();
                Unit {
                    requires: check
                        .requires()
                        .iter()
                        .map(|dep| dep.name().to_string())
                        .collect(),
                    root: planner.roots.contains(&name),
                    check,
                }
            })
            .collect();

        Ok(Driver { plan, config })
    }
}

#[derive(Default)]
struct Planner {
    seen: HashMap<String, CheckRef>,
    visiting: Vec<String>,
    order: Vec<CheckRef>,
    roots: Vec<String>,
}

impl Planner {
    /// Depth-first post-order: dependencies land in `order` before their
    /// dependents.
    fn visit(&mut self, check: &CheckRef) -> Result<(), DriverError> {
        let name = check.name().to_string();

        if let Some(at) = self.visiting.iter().position(|n| *n == name) {
            let mut cycle = self.visiting[at..].to_vec();
            cycle.push(name);
            return Err(DriverError::Cycle(cycle));
        }
        if let Some(known) = self.seen.get(&name) {
            if Arc::ptr_eq(known, check) {
                return Ok(());
            }
            return Err(DriverError::DuplicateName(name));
        }

        self.visiting.push(name.clone());
        for dep in check.requires() {
            self.visit(&dep)?;
        }
        self.visiting.pop();

        self.seen.insert(name, Arc::clone(check));
        self.order.push(Arc::clone(check));
        Ok(())
    }
}

struct Unit {
    check: CheckRef,
    requires: Vec<String>,
    root: bool,
}

/// Runs a fixed set of checks, each exactly once, in dependency order.
///
/// Use [`Driver::builder()`] to construct an instance.
pub struct Driver {
    plan: Vec<Unit>,
    config: Config,
}

impl Driver {
    /// Creates a new builder for configuring a driver.
    #[must_use]
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    /// Names of all scheduled checks in execution order.
    #[must_use]
    pub fn plan(&self) -> Vec<&str> {
        self.plan.iter().map(|unit| unit.check.name()).collect()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Loads the snapshot described by the configuration and runs every
    /// check over it.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails or a check fails.
    pub fn analyze(&self) -> Result<(Snapshot, Report), DriverError> {
        let snapshot = Snapshot::load(&self.config.analyzer)?;
        let report = self.run(&snapshot)?;
        Ok((snapshot, report))
    }

    /// Runs every check over `snapshot` and collects the findings of root
    /// checks.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Check`] with the first check failure; no
    /// partial report is produced.
    pub fn run(&self, snapshot: &Snapshot) -> Result<Report, DriverError> {
        info!(
            "Running {} check(s) over {} file(s)",
            self.plan.len(),
            snapshot.len()
        );

        let mut outputs: HashMap<&str, Output> = HashMap::new();
        let mut report = Report::new();
        report.files_checked = snapshot.len();

        for unit in &self.plan {
            let name = unit.check.name();

            let mut results = Results::new();
            for dep in &unit.requires {
                if let Some(output) = outputs.get(dep.as_str()) {
                    results.insert(dep.clone(), Arc::clone(output));
                }
            }

            let mut diagnostics: Vec<Diagnostic> = Vec::new();
            let output = {
                let mut sink = |d: Diagnostic| diagnostics.push(d);
                let mut pass = Pass::new(name, snapshot, &results, &mut sink)
                    .with_options(self.config.checks.get(name));
                unit.check
                    .run(&mut pass)
                    .map_err(|source| DriverError::Check {
                        name: name.to_string(),
                        source,
                    })?
            };
            debug!("{} reported {} diagnostic(s)", name, diagnostics.len());

            if unit.root {
                for diagnostic in diagnostics {
                    let location = snapshot
                        .file_of(diagnostic.pos)
                        .map(|file| match diagnostic.span() {
                            Some(span) => file.location_of(span),
                            None => file.location(diagnostic.pos.offset),
                        })
                        .unwrap_or_else(|| Location::new(PathBuf::new(), 0, 0));
                    report.findings.push(Finding::new(name, location, diagnostic));
                }
            }
            outputs.insert(name, output);
        }

        report.sort();
        info!("Run complete: {} finding(s)", report.findings.len());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{no_output, output, Check};
    use crate::span::Pos;

    struct Producer;

    impl Check for Producer {
        fn name(&self) -> &str {
            "producer"
        }

        fn run(&self, _pass: &mut Pass<'_>) -> Result<Output, CheckError> {
            Ok(output(41_u32))
        }
    }

    struct Consumer {
        dep: CheckRef,
    }

    impl Check for Consumer {
        fn name(&self) -> &str {
            "consumer"
        }

        fn requires(&self) -> Vec<CheckRef> {
            vec![Arc::clone(&self.dep)]
        }

        fn run(&self, pass: &mut Pass<'_>) -> Result<Output, CheckError> {
            let value = pass
                .result::<u32>("producer")
                .ok_or_else(|| CheckError::MissingDependency("producer".into()))?;
            for file in pass.snapshot().files() {
                pass.report(Diagnostic::new(file.span().lo(), format!("value {}", value + 1)));
            }
            Ok(no_output())
        }
    }

    struct Failing;

    impl Check for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn run(&self, _pass: &mut Pass<'_>) -> Result<Output, CheckError> {
            Err(CheckError::Failed("type information unavailable".into()))
        }
    }

    struct Looping(&'static str);

    impl Check for Looping {
        fn name(&self) -> &str {
            self.0
        }

        fn requires(&self) -> Vec<CheckRef> {
            let next = if self.0 == "a" { "b" } else { "a" };
            vec![Arc::new(Looping(next))]
        }

        fn run(&self, _pass: &mut Pass<'_>) -> Result<Output, CheckError> {
            Ok(no_output())
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot::builder()
            .source("lib.rs", "fn f() {}\n")
            .build()
            .unwrap()
    }

    #[test]
    fn test_dependencies_run_first() {
        let producer: CheckRef = Arc::new(Producer);
        let driver = Driver::builder()
            .check(Arc::new(Consumer { dep: Arc::clone(&producer) }))
            .check(producer)
            .build()
            .unwrap();

        assert_eq!(driver.plan(), vec!["producer", "consumer"]);

        let report = driver.run(&snapshot()).unwrap();
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].check, "consumer");
        assert_eq!(report.findings[0].diagnostic.message, "value 42");
        assert_eq!(report.findings[0].diagnostic.pos, Pos::new(crate::FileId(0), 0));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Driver::builder()
            .check(Arc::new(Producer))
            .check(Arc::new(Producer))
            .build()
            .err()
            .unwrap();

        assert!(matches!(err, DriverError::DuplicateName(name) if name == "producer"));
    }

    #[test]
    fn test_cycles_rejected() {
        let err = Driver::builder()
            .check(Arc::new(Looping("a")))
            .build()
            .err()
            .unwrap();

        assert!(matches!(err, DriverError::Cycle(_)));
        assert_eq!(err.to_string(), "Dependency cycle: a -> b -> a");
    }

    #[test]
    fn test_failure_aborts_run() {
        let driver = Driver::builder()
            .check(Arc::new(Producer))
            .check(Arc::new(Failing))
            .build()
            .unwrap();

        let err = driver.run(&snapshot()).unwrap_err();
        assert!(matches!(
            &err,
            DriverError::Check { name, source: CheckError::Failed(_) } if name == "failing"
        ));
    }

    #[test]
    fn test_disabled_root_is_skipped() {
        let config = Config::parse("[checks.failing]\nenabled = false\n").unwrap();
        let driver = Driver::builder()
            .check(Arc::new(Failing))
            .config(config)
            .build()
            .unwrap();

        assert!(driver.plan().is_empty());
        assert!(!driver.run(&snapshot()).unwrap().has_findings());
    }

    #[test]
    fn test_dependency_findings_are_not_reported() {
        struct Noisy;

        impl Check for Noisy {
            fn name(&self) -> &str {
                "noisy"
            }

            fn run(&self, pass: &mut Pass<'_>) -> Result<Output, CheckError> {
                pass.report(Diagnostic::new(Pos::new(crate::FileId(0), 0), "internal"));
                Ok(output(41_u32))
            }
        }

        struct UsesNoisy;

        impl Check for UsesNoisy {
            fn name(&self) -> &str {
                "uses-noisy"
            }

            fn requires(&self) -> Vec<CheckRef> {
                vec![Arc::new(Noisy)]
            }

            fn run(&self, pass: &mut Pass<'_>) -> Result<Output, CheckError> {
                assert!(pass.result_of("noisy").is_some());
                Ok(no_output())
            }
        }

        let driver = Driver::builder().check(Arc::new(UsesNoisy)).build().unwrap();
        let report = driver.run(&snapshot()).unwrap();

        assert_eq!(driver.plan(), vec!["noisy", "uses-noisy"]);
        assert!(!report.has_findings());
    }
}
