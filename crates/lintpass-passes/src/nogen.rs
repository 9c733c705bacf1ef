//! Pass that partitions the snapshot into analyzable and generated files.
//!
//! # Markers
//!
//! A file is generated when a comment before its first token contains
//!
//! - a line of the form `// Code generated <anything> DO NOT EDIT.`, or
//! - the token `@generated`.
//!
//! Checks wrapped by the generated-file middleware never report into
//! generated files.

use std::sync::{Arc, OnceLock};

use lintpass_core::{
    output, Check, CheckError, CheckRef, Comment, FileId, Output, Pass, SourceFile,
};
use tracing::debug;

/// Pass name for nogen.
pub const NAME: &str = "nogen";

const CODE_GENERATED_PREFIX: &str = "// Code generated ";
const CODE_GENERATED_SUFFIX: &str = " DO NOT EDIT.";
const GENERATED_TOKEN: &str = "@generated";

/// Result of the nogen pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedFiles {
    analyzable: Vec<FileId>,
    generated: Vec<FileId>,
}

impl GeneratedFiles {
    /// Classifies every file of a snapshot.
    pub fn classify<'a>(files: impl IntoIterator<Item = &'a SourceFile>) -> Self {
        let mut result = Self::default();
        for file in files {
            if is_generated(file) {
                result.generated.push(file.id());
            } else {
                result.analyzable.push(file.id());
            }
        }
        result
    }

    /// Files that are not generated, in snapshot order.
    #[must_use]
    pub fn analyzable(&self) -> &[FileId] {
        &self.analyzable
    }

    /// Generated files, in snapshot order.
    #[must_use]
    pub fn generated(&self) -> &[FileId] {
        &self.generated
    }

    /// Returns true if `file` carries a generated marker.
    #[must_use]
    pub fn is_generated(&self, file: FileId) -> bool {
        self.generated.contains(&file)
    }
}

/// Returns true if the file's header comments carry a generated marker.
#[must_use]
pub fn is_generated(file: &SourceFile) -> bool {
    file.header_comments().any(has_marker)
}

fn has_marker(comment: &Comment) -> bool {
    let text = comment.text.as_str();
    text.contains(GENERATED_TOKEN)
        || (text.starts_with(CODE_GENERATED_PREFIX) && text.ends_with(CODE_GENERATED_SUFFIX))
}

/// Classifies files by their generated marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nogen;

impl Check for Nogen {
    fn name(&self) -> &str {
        NAME
    }

    fn doc(&self) -> &str {
        "partitions files into analyzable and generated"
    }

    fn run(&self, pass: &mut Pass<'_>) -> Result<Output, CheckError> {
        let files = GeneratedFiles::classify(pass.snapshot().files());
        debug!(
            "{} generated file(s), {} analyzable",
            files.generated.len(),
            files.analyzable.len()
        );
        Ok(output(files))
    }
}

/// The shared nogen pass.
///
/// Every dependent must hold the same handle so the driver runs it once.
#[must_use]
pub fn analyzer() -> CheckRef {
    static ANALYZER: OnceLock<CheckRef> = OnceLock::new();
    Arc::clone(ANALYZER.get_or_init(|| Arc::new(Nogen)))
}
