//! # lintpass-core
//!
//! Core framework for running pluggable static-analysis checks over a
//! snapshot of Rust sources parsed with `syn`.
//!
//! This crate provides:
//!
//! - [`Snapshot`] and [`SourceFile`]: parsed files with their syntax tree
//!   and comment groups
//! - [`Check`] trait for independent analysis units
//! - [`Pass`] and [`Results`] for what a check sees while it runs
//! - [`Driver`] for scheduling checks in dependency order
//! - [`Report`] and [`Finding`] for the diagnostics that reach the user
//!
//! ## Example
//!
//! ```ignore
//! use lintpass_core::{Driver, Snapshot};
//!
//! let snapshot = Snapshot::builder()
//!     .source("src/lib.rs", "fn main() {}\n")
//!     .build()?;
//!
//! let driver = Driver::builder().check(my_check()).build()?;
//! let report = driver.run(&snapshot)?;
//! println!("{}", report.format());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod check;
mod comments;
mod config;
mod driver;
mod source;
mod span;
mod syntax;
mod types;

/// Line/column conversion for source text.
pub mod line_index;

pub use check::{no_output, output, Check, CheckError, CheckRef, Output, Pass, Results};
pub use comments::{comment_groups, Comment, CommentGroup};
pub use config::{AnalyzerConfig, CheckConfig, Config, ConfigError};
pub use driver::{Driver, DriverBuilder, DriverError};
pub use source::{Snapshot, SnapshotBuilder, SnapshotError, SourceFile};
pub use span::{FileId, Pos, Span};
pub use syntax::{Node, NodeId, NodeKind, SyntaxTree};
pub use types::{Diagnostic, Finding, FindingDiagnostic, Location, Report};
