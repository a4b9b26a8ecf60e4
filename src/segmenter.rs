//! Cutting the source video into numbered segments with an external tool.

use crate::config::{SegmenterConfig, SplitMode};
use crate::error::SegmentationError;
use crate::split_points::SegmentPoints;
use crate::workspace::Workspace;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Placeholder the splitter replaces with the zero-based segment index
pub const INDEX_PLACEHOLDER: &str = "%d";

/// Captured output of a successful tool run
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Something that can cut `input` at `points`, writing segment `i` to
/// `output_pattern` with [`INDEX_PLACEHOLDER`] replaced by `i`.
pub trait SplitTool: Send + Sync {
    fn split(
        &self,
        input: &Path,
        points: &SegmentPoints,
        output_pattern: &Path,
    ) -> Result<ToolOutput, SegmentationError>;

    fn name(&self) -> &str;
}

/// ffmpeg's segment muxer
#[derive(Debug, Clone)]
pub struct FfmpegSplitter {
    program: String,
    mode: SplitMode,
    video_codec: String,
    audio_codec: String,
}

impl FfmpegSplitter {
    pub fn new(program: impl Into<String>, mode: SplitMode) -> Self {
        let defaults = SegmenterConfig::default();
        Self {
            program: program.into(),
            mode,
            video_codec: defaults.video_codec,
            audio_codec: defaults.audio_codec,
        }
    }

    pub fn from_config(config: &SegmenterConfig) -> Self {
        Self {
            program: config.program.clone(),
            mode: config.mode,
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
        }
    }

    /// Build the full invocation without running it.
    pub fn command(&self, input: &Path, points: &SegmentPoints, output_pattern: &Path) -> Command {
        let segment_times = points.to_arg();

        let mut cmd = Command::new(&self.program);
        cmd.args(["-hide_banner", "-nostdin", "-y", "-i"])
            .arg(input)
            .args(["-map", "0"]);

        match self.mode {
            SplitMode::Copy => {
                cmd.args(["-c", "copy"]);
            }
            SplitMode::Reencode => {
                cmd.args([
                    "-c:v",
                    self.video_codec.as_str(),
                    "-c:a",
                    self.audio_codec.as_str(),
                ]);
                if !points.is_empty() {
                    cmd.args(["-force_key_frames", segment_times.as_str()]);
                }
            }
        }

        cmd.args(["-f", "segment"]);
        if !points.is_empty() {
            cmd.args(["-segment_times", segment_times.as_str()]);
        }
        cmd.args(["-reset_timestamps", "1"]).arg(output_pattern);
        cmd
    }
}

impl SplitTool for FfmpegSplitter {
    fn split(
        &self,
        input: &Path,
        points: &SegmentPoints,
        output_pattern: &Path,
    ) -> Result<ToolOutput, SegmentationError> {
        let mut cmd = self.command(input, points, output_pattern);
        debug!("Running {:?}", cmd);

        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SegmentationError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(SegmentationError::ToolFailed {
                program: self.program.clone(),
                status: output.status,
                stdout,
                stderr,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Writes the uploaded video to a scratch file and splits it into a new workspace
pub struct Segmenter<T: SplitTool = FfmpegSplitter> {
    tool: T,
    extension: String,
    workspace_root: Option<PathBuf>,
}

impl Segmenter<FfmpegSplitter> {
    pub fn from_config(config: &SegmenterConfig) -> Self {
        Self::with_tool(
            FfmpegSplitter::from_config(config),
            config.output_extension.clone(),
            config.workspace_root.clone(),
        )
    }
}

impl<T: SplitTool> Segmenter<T> {
    pub fn with_tool(tool: T, extension: impl Into<String>, workspace_root: Option<PathBuf>) -> Self {
        Self {
            tool,
            extension: extension.into(),
            workspace_root,
        }
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// Split `video` at `points`.
    ///
    /// On success the workspace holds `0.<ext>` (lead-in) through
    /// `<points.len()>.<ext>` and belongs to the caller. On failure the
    /// workspace is removed. The scratch copy of the video is removed on
    /// every path when `input` drops.
    pub fn segment(&self, video: &[u8], points: &SegmentPoints) -> Result<Workspace, SegmentationError> {
        let mut input = tempfile::Builder::new()
            .prefix("aslflash-input-")
            .tempfile()
            .map_err(|e| SegmentationError::io("failed to create scratch video file", e))?;
        input
            .write_all(video)
            .and_then(|_| input.flush())
            .map_err(|e| SegmentationError::io("failed to write scratch video file", e))?;

        let workspace = Workspace::create(self.workspace_root.as_deref())
            .map_err(|e| SegmentationError::io("failed to create workspace directory", e))?;
        let pattern = workspace
            .path()
            .join(format!("{INDEX_PLACEHOLDER}.{}", self.extension));

        info!(
            "✂️ Splitting {} bytes of video at {} point(s) with {}",
            video.len(),
            points.len(),
            self.tool.name()
        );

        let output = match self.tool.split(input.path(), points, &pattern) {
            Ok(output) => output,
            Err(e) => {
                if let Err(cleanup) = workspace.clone().remove() {
                    warn!(
                        "Failed to remove workspace {}: {}",
                        workspace.path().display(),
                        cleanup
                    );
                }
                return Err(e);
            }
        };
        debug!("{} stderr:\n{}", self.tool.name(), output.stderr);

        let produced = workspace.files().map(|f| f.len()).unwrap_or(0);
        if produced != points.len() + 1 {
            warn!(
                "{} produced {} segment(s) for {} split point(s)",
                self.tool.name(),
                produced,
                points.len()
            );
        }
        info!("✅ Segmented into {}", workspace.path().display());

        Ok(workspace)
    }
}
