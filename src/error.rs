use std::path::Path;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AbundanceError>;

/// Error taxonomy for the abundance pipeline.
///
/// Every variant is fatal to the run: abundance comparison is meaningless if
/// any sample is corrupt, so there is no per-sample skipping and no retry.
#[derive(Error, Debug)]
pub enum AbundanceError {
    /// A structurally invalid report line.
    #[error("{path}: malformed report line {line}: {reason}")]
    MalformedReport {
        path: String,
        line: usize,
        reason: String,
    },

    /// Clade counts do not add up to direct plus children, beyond tolerance.
    /// Reported rather than corrected so upstream classifier bugs stay visible.
    #[error("{path}: inconsistent clade counts for taxa {taxids:?}")]
    InconsistentTree { path: String, taxids: Vec<u64> },

    /// A report with zero valid taxon records. A silently-zero sample would
    /// corrupt cross-sample normalization, so this is a hard failure.
    #[error("{path}: report contains no valid taxon records")]
    EmptyInput { path: String },

    #[error("expected {expected} sample labels to match the input files, got {actual}")]
    SampleLabelCount { expected: usize, actual: usize },

    /// The plotting backend failed; its message is surfaced verbatim.
    #[error("{path}: render failed: {reason}")]
    Render { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AbundanceError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        AbundanceError::MalformedReport {
            path: String::new(),
            line,
            reason: reason.into(),
        }
    }

    /// Attach the originating file to an error produced below the driver,
    /// where only the stream is known.
    pub fn with_path(self, p: &Path) -> Self {
        let name = p.display().to_string();
        match self {
            AbundanceError::MalformedReport { line, reason, .. } => {
                AbundanceError::MalformedReport {
                    path: name,
                    line,
                    reason,
                }
            }
            AbundanceError::InconsistentTree { taxids, .. } => {
                AbundanceError::InconsistentTree { path: name, taxids }
            }
            AbundanceError::EmptyInput { .. } => AbundanceError::EmptyInput { path: name },
            AbundanceError::Render { reason, .. } => AbundanceError::Render { path: name, reason },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn with_path_fills_the_file_name() {
        let err = AbundanceError::malformed(3, "too few fields")
            .with_path(&PathBuf::from("sample_report.txt"));
        assert_eq!(
            err.to_string(),
            "sample_report.txt: malformed report line 3: too few fields"
        );
    }
}
