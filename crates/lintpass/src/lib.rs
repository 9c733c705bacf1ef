//! # lintpass
//!
//! Pluggable source checks for Rust with `//nolint` suppression and
//! generated-file filtering.
//!
//! This is the main facade crate that re-exports the core framework, the
//! infrastructure passes, and the middlewares that wire them around any
//! check.
//!
//! ## Suppression Directives
//!
//! Put `//nolint:<check>` on the line above the construct a check reports
//! on:
//!
//! ```rust,ignore
//! fn handle(req: Request) {
//!     //nolint:copyproto the message is tiny and never mutated
//!     let msg = *req.message();
//! }
//! ```
//!
//! A directive above the first token of a file silences the check for the
//! whole file. Findings that get through carry a hint naming the directive
//! that would silence them.
//!
//! ## Programmatic Usage
//!
//! ```rust,ignore
//! use lintpass::{middlewares, Config, Driver};
//!
//! let driver = Driver::builder()
//!     .config(Config::from_file("lintpass.toml".as_ref())?)
//!     .check(middlewares::standard(my_check()))
//!     .build()?;
//!
//! let (snapshot, report) = driver.analyze()?;
//! print!("{}", report.render(&snapshot));
//! ```

#![forbid(unsafe_code)]

// Re-export core types and traits
pub use lintpass_core::*;

pub mod middlewares;

/// Infrastructure passes.
pub mod passes {
    pub use lintpass_passes::*;
}
