//! ASL Flash - per-word clip builder
//!
//! Takes a timing table of vocabulary words with start times and a video of a
//! signer performing them in order, cuts the video at those times and names
//! each clip after its word, ready to be zipped or imported as flashcards.

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod package;
pub mod pipeline;
pub mod relabel;
pub mod segmenter;
pub mod split_points;
pub mod table;
pub mod workspace;

// Re-export main types for easy access
pub use crate::batch::{build_deck, BatchProcessor, BatchReport};
pub use crate::cache::{CachedPipeline, SegmentCache};
pub use crate::config::{Config, SplitMode};
pub use crate::error::{
    PipelineError, RelabelError, SegmentMismatchError, SegmentationError, ValidationError,
};
pub use crate::package::{package, PackageOptions, PackageReport};
pub use crate::pipeline::Pipeline;
pub use crate::relabel::{relabel, sanitize_word};
pub use crate::segmenter::{FfmpegSplitter, Segmenter, SplitTool, ToolOutput};
pub use crate::split_points::SegmentPoints;
pub use crate::table::{TimingEntry, TimingTable};
pub use crate::workspace::{LabeledSegment, LabeledWorkspace, Workspace};
