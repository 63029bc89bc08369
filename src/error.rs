//! Error and diagnostic types for the extraction pipeline.
//!
//! Fatal conditions are [`PipelineError`] and abort a run before the
//! canonical file is touched. Everything else is a [`Diagnostic`] that is
//! logged, counted and carried alongside the best-effort output.

use serde::Serialize;
use std::{collections::BTreeMap, path::PathBuf};
use tracing::warn;

/// Fatal pipeline failures.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Raw agent content could not be parsed as any structured shape.
    #[error("extraction error: {diagnostic}")]
    Extraction { diagnostic: String },

    /// The upstream agent failed, timed out, or produced unreadable output.
    #[error("agent error: {0:#}")]
    Agent(anyhow::Error),

    /// Filesystem I/O error on the working or canonical file.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// CSV encoding/decoding error on the working or canonical file.
    #[error("CSV error at {path:?}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn extraction(diagnostic: impl Into<String>) -> Self {
        Self::Extraction {
            diagnostic: diagnostic.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Process exit code reported for this failure.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// A non-fatal condition observed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Parsed successfully but nothing to write.
    #[error("empty result: {context}")]
    EmptyResult { context: String },

    /// Agent output parsed but matched none of the known shapes.
    #[error("unrecognized agent output shape: {description}")]
    UnrecognizedShape { description: String },

    /// Record dropped for a missing `Course` key or a bad course code.
    #[error("malformed record (course {course:?}): {reason}")]
    MalformedRecord {
        course: Option<String>,
        reason: String,
    },

    /// An embedded payload was found but did not parse.
    #[error("row {row}: embedded payload failed to parse: {message}")]
    RecoveryParseFailure { row: usize, message: String },

    /// A first-pass row that is neither a record nor a recoverable payload.
    #[error("row {row}: not a record and no embedded payload")]
    UnstructuredRow { row: usize },
}

impl Diagnostic {
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::EmptyResult { .. } => "empty_result",
            Diagnostic::UnrecognizedShape { .. } => "unrecognized_shape",
            Diagnostic::MalformedRecord { .. } => "malformed_record",
            Diagnostic::RecoveryParseFailure { .. } => "recovery_parse_failure",
            Diagnostic::UnstructuredRow { .. } => "unstructured_row",
        }
    }

    pub fn malformed(course: Option<&str>, reason: impl Into<String>) -> Self {
        Diagnostic::MalformedRecord {
            course: course.map(str::to_string),
            reason: reason.into(),
        }
    }
}

/// Ordered list of diagnostics collected by a stage or a whole run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic. Every entry is logged exactly once, here.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!(kind = diagnostic.kind(), "{}", diagnostic);
        self.entries.push(diagnostic);
    }

    /// Merge diagnostics already logged by another stage.
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.entries.iter().filter(|d| d.kind() == kind).count()
    }

    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut out = BTreeMap::new();
        for d in &self.entries {
            *out.entry(d.kind()).or_insert(0) += 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PipelineError::extraction("expected value at line 1 column 1");
        assert_eq!(
            err.to_string(),
            "extraction error: expected value at line 1 column 1"
        );
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn diagnostics_count_by_kind() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::malformed(Some("XYZ"), "no digits"));
        diags.push(Diagnostic::malformed(None, "missing Course"));
        diags.push(Diagnostic::UnstructuredRow { row: 3 });

        assert_eq!(diags.len(), 3);
        assert_eq!(diags.count("malformed_record"), 2);
        assert_eq!(diags.counts().get("unstructured_row"), Some(&1));
        assert_eq!(diags.count("recovery_parse_failure"), 0);
    }

    #[test]
    fn diagnostic_serializes_with_kind_tag() {
        let d = Diagnostic::RecoveryParseFailure {
            row: 2,
            message: "EOF while parsing".into(),
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "recovery_parse_failure");
        assert_eq!(json["row"], 2);
    }
}
