use std::path::PathBuf;
use std::process::ExitStatus;

/// Problems with an uploaded timing table. All of these are user-correctable.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("could not read timing table: {0}")]
    Csv(#[from] csv::Error),

    #[error("timing table is missing required column(s): {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("timing table has no rows")]
    EmptyTable,

    #[error("line {line}: `word` is not valid text")]
    NonTextWord { line: u64 },

    #[error("line {line}: `word` is empty")]
    EmptyWord { line: u64 },

    #[error("duplicate word(s) in timing table: {}", .words.join(", "))]
    DuplicateWords { words: Vec<String> },

    #[error("line {line}: `start_time` value {value:?} is not a number")]
    InvalidStartTime { line: u64, value: String },

    #[error("line {line}: `start_time` value {value} is negative")]
    NegativeStartTime { line: u64, value: f64 },
}

/// Failures while running the external splitting tool.
#[derive(thiserror::Error, Debug)]
pub enum SegmentationError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}\n{stderr}")]
    ToolFailed {
        program: String,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
}

impl SegmentationError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SegmentationError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Segment files on disk do not line up one-to-one with the word list.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentMismatchError {
    #[error(
        "expected {} segments ({words} words plus the lead-in) but found {segments}",
        .words + 1
    )]
    Count { words: usize, segments: usize },

    #[error("segment {missing} is missing from the workspace")]
    Gap { missing: u32 },
}

/// Failures while renaming segments to their words.
#[derive(thiserror::Error, Debug)]
pub enum RelabelError {
    #[error(transparent)]
    Mismatch(#[from] SegmentMismatchError),

    #[error("segment index {index} appears twice: {first} and {second}")]
    DuplicateIndex {
        index: u32,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("words {first:?} and {second:?} both map to the file name {file_name:?}")]
    NameCollision {
        first: String,
        second: String,
        file_name: String,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RelabelError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RelabelError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Error from whichever pipeline stage failed first, kept as-is.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Segmentation(#[from] SegmentationError),

    #[error(transparent)]
    Relabel(#[from] RelabelError),
}

impl PipelineError {
    /// The mismatch error, when relabeling failed on segment/word counts.
    pub fn as_mismatch(&self) -> Option<&SegmentMismatchError> {
        match self {
            PipelineError::Relabel(RelabelError::Mismatch(e)) => Some(e),
            _ => None,
        }
    }
}
