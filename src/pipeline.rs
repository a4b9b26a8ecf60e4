use crate::config::SegmenterConfig;
use crate::error::PipelineError;
use crate::relabel::relabel;
use crate::segmenter::{FfmpegSplitter, Segmenter, SplitTool};
use crate::split_points::SegmentPoints;
use crate::table::TimingTable;
use crate::workspace::LabeledWorkspace;
use std::time::Instant;
use tracing::{info, warn};

/// Table -> split points -> segments -> labeled clips, stopping at the first failure.
pub struct Pipeline<T: SplitTool = FfmpegSplitter> {
    segmenter: Segmenter<T>,
}

impl Pipeline<FfmpegSplitter> {
    pub fn from_config(config: &SegmenterConfig) -> Self {
        Self::new(Segmenter::from_config(config))
    }
}

impl<T: SplitTool> Pipeline<T> {
    pub fn new(segmenter: Segmenter<T>) -> Self {
        Self { segmenter }
    }

    pub fn segmenter(&self) -> &Segmenter<T> {
        &self.segmenter
    }

    /// Run every stage on raw uploads. The returned workspace belongs to the
    /// caller, who deletes it once packaging is done.
    pub fn run(&self, table: &[u8], video: &[u8]) -> Result<LabeledWorkspace, PipelineError> {
        let table = TimingTable::parse(table)?;
        let points = SegmentPoints::derive(&table);
        self.run_parsed(&table, &points, video)
    }

    /// Run segmentation and relabeling for an already validated table.
    pub fn run_parsed(
        &self,
        table: &TimingTable,
        points: &SegmentPoints,
        video: &[u8],
    ) -> Result<LabeledWorkspace, PipelineError> {
        let start = Instant::now();
        let words = table.words();

        let workspace = self.segmenter.segment(video, points)?;

        let segments = match relabel(&workspace, &words) {
            Ok(segments) => segments,
            Err(e) => {
                // The caller never receives this workspace, so it is cleaned up here.
                let path = workspace.path().to_path_buf();
                if let Err(cleanup) = workspace.remove() {
                    warn!("Failed to remove workspace {}: {}", path.display(), cleanup);
                }
                return Err(e.into());
            }
        };

        info!(
            "🎉 {} word clip(s) ready in {:.2}s",
            segments.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(LabeledWorkspace {
            workspace,
            segments,
        })
    }
}
