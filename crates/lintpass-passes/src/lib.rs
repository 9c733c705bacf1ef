//! # lintpass-passes
//!
//! Infrastructure passes other checks build on.
//!
//! ## Available Passes
//!
//! | Name | Result | Description |
//! |------|--------|-------------|
//! | `nogen` | [`GeneratedFiles`] | Partitions files into analyzable and generated |
//! | `nolint` | [`SuppressionIndex`] | Collects `//nolint:<check>` directives |
//!
//! Neither pass reports diagnostics. Each is exposed as a shared handle
//! (`nogen::analyzer()`, `nolint::analyzer()`) so every dependent requires
//! the same instance and the driver runs it once.
//!
//! ## Usage
//!
//! ```ignore
//! use lintpass_passes::{nolint, SuppressionIndex};
//!
//! fn requires(&self) -> Vec<CheckRef> {
//!     vec![nolint::analyzer()]
//! }
//!
//! fn run(&self, pass: &mut Pass<'_>) -> Result<Output, CheckError> {
//!     let index = pass.result::<SuppressionIndex>(nolint::NAME);
//!     // ...
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod nogen;
pub mod nolint;

pub use nogen::{GeneratedFiles, Nogen};
pub use nolint::{CheckIndex, Directive, Nolint, SuppressionIndex};
