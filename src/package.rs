//! Downstream packaging of a labeled workspace: a zip of the clips and a
//! card table that flashcard tools can import alongside the media.

use crate::config::OutputConfig;
use crate::workspace::{LabeledSegment, LabeledWorkspace};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const ARCHIVE_NAME: &str = "clips.zip";
pub const CARD_TABLE_NAME: &str = "cards.csv";
pub const MEDIA_DIR_NAME: &str = "media";

/// Which artifacts to write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageOptions {
    pub archive: bool,
    pub card_table: bool,
}

impl From<&OutputConfig> for PackageOptions {
    fn from(config: &OutputConfig) -> Self {
        Self {
            archive: config.write_archive,
            card_table: config.write_card_table,
        }
    }
}

/// What was written, and where
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReport {
    pub clip_count: usize,
    pub archive: Option<PathBuf>,
    pub card_table: Option<PathBuf>,
    pub media_dir: Option<PathBuf>,
}

/// Write every enabled artifact into `out_dir`.
///
/// Without an archive the clips are copied to `out_dir/media` so the card
/// table still has its media next to it.
pub fn package(labeled: &LabeledWorkspace, out_dir: &Path, options: PackageOptions) -> Result<PackageReport> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let mut report = PackageReport {
        clip_count: labeled.len(),
        ..PackageReport::default()
    };

    if options.archive {
        let dest = out_dir.join(ARCHIVE_NAME);
        write_archive(&labeled.segments, &dest)?;
        report.archive = Some(dest);
    }

    if options.card_table {
        let dest = out_dir.join(CARD_TABLE_NAME);
        write_card_table(&labeled.segments, &dest)?;
        report.card_table = Some(dest);

        if !options.archive {
            let media = out_dir.join(MEDIA_DIR_NAME);
            copy_clips(&labeled.segments, &media)?;
            report.media_dir = Some(media);
        }
    }

    info!("📦 Packaged {} clip(s) into {}", report.clip_count, out_dir.display());
    Ok(report)
}

/// Zip the clips flat, by file name. Video is already compressed, so entries are stored.
pub fn write_archive(segments: &[LabeledSegment], dest: &Path) -> Result<()> {
    let file = File::create(dest)
        .with_context(|| format!("Failed to create archive {}", dest.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .large_file(true);

    for segment in segments {
        zip.start_file(segment.file_name.as_str(), options)?;
        let mut clip = File::open(&segment.file_path)
            .with_context(|| format!("Failed to open clip {}", segment.file_path.display()))?;
        std::io::copy(&mut clip, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}

/// Headerless `word,[sound:<file>]` rows in table order.
///
/// The file reference is the sanitized clip name, which is what ends up in the
/// flashcard tool's media folder.
pub fn write_card_table(segments: &[LabeledSegment], dest: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(dest)
        .with_context(|| format!("Failed to create card table {}", dest.display()))?;

    for segment in segments {
        let reference = media_reference(&segment.file_name);
        writer.write_record([segment.word.as_str(), reference.as_str()])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn media_reference(file_name: &str) -> String {
    format!("[sound:{file_name}]")
}

fn copy_clips(segments: &[LabeledSegment], media: &Path) -> Result<()> {
    std::fs::create_dir_all(media)?;
    for segment in segments {
        std::fs::copy(&segment.file_path, media.join(&segment.file_name))
            .with_context(|| format!("Failed to copy clip {}", segment.file_path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Workspace;
    use std::io::Read;
    use tempfile::TempDir;

    fn labeled_fixture(dir: &Path) -> LabeledWorkspace {
        let clips = [("hello", "hello.mov"), ("a/b", "a_b.mov"), ("say \"hi\"", "say _hi_.mov")];
        let segments = clips
            .iter()
            .map(|(word, file_name)| {
                let file_path = dir.join(file_name);
                std::fs::write(&file_path, format!("clip for {word}")).unwrap();
                LabeledSegment {
                    word: word.to_string(),
                    file_name: file_name.to_string(),
                    file_path,
                }
            })
            .collect();
        LabeledWorkspace {
            workspace: Workspace::open(dir),
            segments,
        }
    }

    #[test]
    fn test_card_table_references_sanitized_names() {
        let ws = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let labeled = labeled_fixture(ws.path());

        let dest = out.path().join(CARD_TABLE_NAME);
        write_card_table(&labeled.segments, &dest).unwrap();

        let contents = std::fs::read_to_string(&dest).unwrap();
        assert_eq!(
            contents,
            "hello,[sound:hello.mov]\na/b,[sound:a_b.mov]\n\"say \"\"hi\"\"\",[sound:say _hi_.mov]\n"
        );
    }

    #[test]
    fn test_archive_holds_every_clip_by_name() {
        let ws = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let labeled = labeled_fixture(ws.path());

        let dest = out.path().join(ARCHIVE_NAME);
        write_archive(&labeled.segments, &dest).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);

        let mut entry = archive.by_name("a_b.mov").unwrap();
        let mut body = String::new();
        entry.read_to_string(&mut body).unwrap();
        assert_eq!(body, "clip for a/b");
    }

    #[test]
    fn test_package_without_archive_copies_media() {
        let ws = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let labeled = labeled_fixture(ws.path());

        let report = package(
            &labeled,
            out.path(),
            PackageOptions {
                archive: false,
                card_table: true,
            },
        )
        .unwrap();

        assert_eq!(report.clip_count, 3);
        assert!(report.archive.is_none());
        let media = report.media_dir.unwrap();
        assert!(media.join("hello.mov").exists());
        assert!(out.path().join(CARD_TABLE_NAME).exists());
    }

    #[test]
    fn test_package_with_everything_disabled_writes_nothing() {
        let ws = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let labeled = labeled_fixture(ws.path());

        let report = package(
            &labeled,
            out.path(),
            PackageOptions {
                archive: false,
                card_table: false,
            },
        )
        .unwrap();

        assert_eq!(report.archive, None);
        assert_eq!(report.card_table, None);
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }
}
