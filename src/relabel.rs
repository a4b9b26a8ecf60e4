//! Renaming numbered segments to the words they show.
//!
//! Segment `0` is lead-in footage and is deleted. Segment `i` (for `i >= 1`)
//! becomes `<word i-1>.<ext>`. The workspace must hold exactly one segment per
//! word plus the lead-in, with no gaps; anything else is a
//! [`SegmentMismatchError`] and leaves the workspace untouched.

use crate::error::{RelabelError, SegmentMismatchError};
use crate::workspace::{LabeledSegment, Workspace};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

const MAX_NAME_BYTES: usize = 200;

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F\x7F]"#).expect("valid regex"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Turn a word into a file stem that is safe on Linux, macOS and Windows.
pub fn sanitize_word(word: &str) -> String {
    let replaced = unsafe_chars().replace_all(word, "_");
    let collapsed = whitespace_runs().replace_all(&replaced, " ");
    let trimmed = collapsed.trim().trim_end_matches(['.', ' ']);

    let mut name = match trimmed.strip_prefix('.') {
        Some(rest) => format!("_{rest}"),
        None => trimmed.to_string(),
    };

    let device = name.split('.').next().unwrap_or_default().to_ascii_uppercase();
    if RESERVED_NAMES.contains(&device.as_str()) {
        name.insert(0, '_');
    }

    if name.len() > MAX_NAME_BYTES {
        let mut cut = MAX_NAME_BYTES;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
        let kept = name.trim_end_matches(['.', ' ']).len();
        name.truncate(kept);
    }

    if name.is_empty() {
        name.push('_');
    }
    name
}

/// Numbered segment files keyed by index, from a single directory listing
#[derive(Debug, Clone, Default)]
pub struct SegmentIndex {
    segments: BTreeMap<u32, PathBuf>,
}

impl SegmentIndex {
    /// List the workspace once. Files whose stem is not a plain decimal index
    /// are skipped.
    pub fn scan(workspace: &Workspace) -> Result<Self, RelabelError> {
        let files = workspace.files().map_err(|e| {
            RelabelError::io(
                format!("failed to list workspace {}", workspace.path().display()),
                e,
            )
        })?;

        let mut segments = BTreeMap::new();
        for path in files {
            let Some(index) = segment_index(&path) else {
                warn!("Ignoring non-segment file {}", path.display());
                continue;
            };
            if let Some(first) = segments.insert(index, path.clone()) {
                return Err(RelabelError::DuplicateIndex {
                    index,
                    first,
                    second: path,
                });
            }
        }

        Ok(Self { segments })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&Path> {
        self.segments.get(&index).map(PathBuf::as_path)
    }

    /// Require exactly indices `0..=word_count`.
    pub fn check(&self, word_count: usize) -> Result<(), SegmentMismatchError> {
        if self.segments.len() != word_count + 1 {
            return Err(SegmentMismatchError::Count {
                words: word_count,
                segments: self.segments.len(),
            });
        }
        for (expected, &index) in (0u32..).zip(self.segments.keys()) {
            if index != expected {
                return Err(SegmentMismatchError::Gap { missing: expected });
            }
        }
        Ok(())
    }
}

/// `12` for `12.mov`; `None` for `hello.mov`, `+1.mov` or `01x.mov`.
fn segment_index(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

struct PlannedRename {
    word: String,
    source: PathBuf,
    staging: PathBuf,
    target: PathBuf,
    file_name: String,
}

/// Rename segments `1..=words.len()` to their words and delete the lead-in.
///
/// All checks run before anything on disk changes. Renames go through hidden
/// staging names so a numeric word like `2` cannot overwrite segment `2`
/// before it has been moved. If a rename fails, completed moves are undone.
pub fn relabel(workspace: &Workspace, words: &[String]) -> Result<Vec<LabeledSegment>, RelabelError> {
    let index = SegmentIndex::scan(workspace)?;
    index.check(words.len())?;

    let plan = plan_renames(workspace, &index, words)?;
    let lead_in = index
        .get(0)
        .map(Path::to_path_buf)
        .ok_or(SegmentMismatchError::Gap { missing: 0 })?;

    // The lead-in is staged too, so a word like `0` can take its name.
    let lead_in_staging = staging_path(workspace, 0);

    let mut done: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(plan.len() * 2 + 1);
    let moves = std::iter::once((&lead_in, &lead_in_staging))
        .chain(plan.iter().map(|p| (&p.source, &p.staging)))
        .chain(plan.iter().map(|p| (&p.staging, &p.target)));
    for (from, to) in moves {
        if let Err(e) = std::fs::rename(from, to) {
            roll_back(&done);
            return Err(RelabelError::io(
                format!("failed to rename {} to {}", from.display(), to.display()),
                e,
            ));
        }
        done.push((from.clone(), to.clone()));
    }

    // Every clip is in place by now; a lead-in that will not go away is only
    // a stray hidden file, which later scans ignore.
    discard_lead_in(&lead_in_staging);

    info!(
        "🏷️ Labeled {} clip(s) in {}",
        plan.len(),
        workspace.path().display()
    );

    Ok(plan
        .into_iter()
        .map(|p| LabeledSegment {
            word: p.word,
            file_name: p.file_name,
            file_path: p.target,
        })
        .collect())
}

fn plan_renames(
    workspace: &Workspace,
    index: &SegmentIndex,
    words: &[String],
) -> Result<Vec<PlannedRename>, RelabelError> {
    // Lowercased names, so the plan is also safe on case-insensitive filesystems.
    let mut claimed: HashMap<String, &str> = HashMap::new();
    let mut plan = Vec::with_capacity(words.len());

    for (i, word) in words.iter().enumerate() {
        let seg = i as u32 + 1;
        let source = index
            .get(seg)
            .map(Path::to_path_buf)
            .ok_or(SegmentMismatchError::Gap { missing: seg })?;

        let file_name = match source.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", sanitize_word(word), ext),
            None => sanitize_word(word),
        };

        if let Some(first) = claimed.insert(file_name.to_lowercase(), word.as_str()) {
            return Err(RelabelError::NameCollision {
                first: first.to_string(),
                second: word.clone(),
                file_name,
            });
        }

        let target = workspace.path().join(&file_name);
        let is_pending_segment =
            segment_index(&target).and_then(|n| index.get(n)) == Some(target.as_path());
        if target.exists() && !is_pending_segment {
            return Err(RelabelError::io(
                format!("refusing to overwrite {}", target.display()),
                std::io::Error::from(std::io::ErrorKind::AlreadyExists),
            ));
        }

        let staging = staging_path(workspace, seg);
        debug!("{} -> {}", source.display(), file_name);
        plan.push(PlannedRename {
            word: word.clone(),
            source,
            staging,
            target,
            file_name,
        });
    }

    Ok(plan)
}

fn discard_lead_in(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to delete lead-in {}: {}", path.display(), e);
            false
        }
    }
}

fn staging_path(workspace: &Workspace, index: u32) -> PathBuf {
    workspace.path().join(format!(".relabel-{index}.partial"))
}

fn roll_back(done: &[(PathBuf, PathBuf)]) {
    for (from, to) in done.iter().rev() {
        if let Err(e) = std::fs::rename(to, from) {
            warn!(
                "Failed to restore {} from {}: {}",
                from.display(),
                to.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace_with(files: &[&str]) -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        for name in files {
            std::fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }
        let workspace = Workspace::open(dir.path());
        (dir, workspace)
    }

    fn names(workspace: &Workspace) -> Vec<String> {
        workspace
            .files()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_sanitize_word() {
        assert_eq!(sanitize_word("hello"), "hello");
        assert_eq!(sanitize_word("a/b"), "a_b");
        assert_eq!(sanitize_word(r"why?\how*"), "why__how_");
        assert_eq!(sanitize_word("  thank   you  "), "thank you");
        assert_eq!(sanitize_word("etc."), "etc");
        assert_eq!(sanitize_word(".hidden"), "_hidden");
        assert_eq!(sanitize_word("con"), "_con");
        assert_eq!(sanitize_word("Nul.txt"), "_Nul.txt");
        assert_eq!(sanitize_word(".."), "_");
        assert_eq!(sanitize_word("café"), "café");
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let long = "é".repeat(150); // 300 bytes
        let name = sanitize_word(&long);
        assert_eq!(name.len(), MAX_NAME_BYTES);
        assert!(name.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_truncation_does_not_leave_trailing_dot() {
        let word = format!("{}. tail", "a".repeat(MAX_NAME_BYTES - 1));
        let name = sanitize_word(&word);
        assert_eq!(name, "a".repeat(MAX_NAME_BYTES - 1));
    }

    #[test]
    fn test_segment_index_is_numeric_not_lexical() {
        let (_dir, ws) = workspace_with(&["10.mov", "2.mov", "0.mov", "1.mov", "notes.txt"]);
        let index = SegmentIndex::scan(&ws).unwrap();

        assert_eq!(index.len(), 4);
        assert!(index.get(10).unwrap().ends_with("10.mov"));
        assert!(index.get(2).unwrap().ends_with("2.mov"));
    }

    #[test]
    fn test_relabel_pairs_index_with_word_order() {
        let files: Vec<String> = (0..=11).map(|i| format!("{i}.mov")).collect();
        let file_refs: Vec<&str> = files.iter().map(String::as_str).collect();
        let (_dir, ws) = workspace_with(&file_refs);
        let word_list: Vec<String> = (1..=11).map(|i| format!("w{i}")).collect();

        let labeled = relabel(&ws, &word_list).unwrap();

        // w10 must receive segment 10, not segment "1"+"0" ordering.
        let w10 = labeled.iter().find(|s| s.word == "w10").unwrap();
        assert_eq!(std::fs::read(&w10.file_path).unwrap(), b"10.mov");
        assert_eq!(labeled.len(), 11);
        assert!(!ws.path().join("0.mov").exists());
    }

    #[test]
    fn test_round_trip_scenario() {
        let (_dir, ws) = workspace_with(&["0.mov", "1.mov", "2.mov"]);
        let labeled = relabel(&ws, &words(&["hello", "world"])).unwrap();

        assert_eq!(names(&ws), vec!["hello.mov", "world.mov"]);
        assert_eq!(std::fs::read(ws.path().join("hello.mov")).unwrap(), b"1.mov");
        assert_eq!(std::fs::read(ws.path().join("world.mov")).unwrap(), b"2.mov");
        assert_eq!(labeled[0].word, "hello");
        assert_eq!(labeled[1].file_name, "world.mov");
    }

    #[test]
    fn test_too_few_segments_renames_nothing() {
        let (_dir, ws) = workspace_with(&["0.mov", "1.mov"]);
        let err = relabel(&ws, &words(&["hello", "world"])).unwrap_err();

        assert!(matches!(
            err,
            RelabelError::Mismatch(SegmentMismatchError::Count { words: 2, segments: 2 })
        ));
        assert_eq!(names(&ws), vec!["0.mov", "1.mov"]);
    }

    #[test]
    fn test_too_many_segments_is_an_error() {
        let (_dir, ws) = workspace_with(&["0.mov", "1.mov", "2.mov", "3.mov"]);
        let err = relabel(&ws, &words(&["hello", "world"])).unwrap_err();

        assert!(matches!(
            err,
            RelabelError::Mismatch(SegmentMismatchError::Count { words: 2, segments: 4 })
        ));
        assert_eq!(names(&ws).len(), 4);
    }

    #[test]
    fn test_gap_in_indices_is_an_error() {
        let (_dir, ws) = workspace_with(&["0.mov", "1.mov", "3.mov"]);
        let err = relabel(&ws, &words(&["hello", "world"])).unwrap_err();

        assert!(matches!(
            err,
            RelabelError::Mismatch(SegmentMismatchError::Gap { missing: 2 })
        ));
    }

    #[test]
    fn test_second_relabel_is_a_mismatch_and_touches_nothing() {
        let (_dir, ws) = workspace_with(&["0.mov", "1.mov", "2.mov"]);
        let list = words(&["hello", "world"]);
        relabel(&ws, &list).unwrap();

        let err = relabel(&ws, &list).unwrap_err();
        assert!(matches!(
            err,
            RelabelError::Mismatch(SegmentMismatchError::Count { words: 2, segments: 0 })
        ));
        assert_eq!(names(&ws), vec!["hello.mov", "world.mov"]);
    }

    #[test]
    fn test_numeric_words_do_not_clobber_pending_segments() {
        let (_dir, ws) = workspace_with(&["0.mov", "1.mov", "2.mov", "3.mov"]);
        relabel(&ws, &words(&["2", "3", "1"])).unwrap();

        assert_eq!(std::fs::read(ws.path().join("2.mov")).unwrap(), b"1.mov");
        assert_eq!(std::fs::read(ws.path().join("3.mov")).unwrap(), b"2.mov");
        assert_eq!(std::fs::read(ws.path().join("1.mov")).unwrap(), b"3.mov");
        assert!(!ws.path().join("0.mov").exists());
    }

    #[test]
    fn test_word_zero_survives_lead_in_removal() {
        let (_dir, ws) = workspace_with(&["0.mov", "1.mov"]);
        relabel(&ws, &words(&["0"])).unwrap();

        assert_eq!(names(&ws), vec!["0.mov"]);
        assert_eq!(std::fs::read(ws.path().join("0.mov")).unwrap(), b"1.mov");
    }

    #[test]
    fn test_failed_rename_restores_every_segment() {
        // The target name is over the filesystem's limit, so only the final
        // rename fails, after the lead-in and segment 1 have been staged.
        let ext = "x".repeat(80);
        let segment = format!("1.{ext}");
        let (_dir, ws) = workspace_with(&[&format!("0.{ext}"), &segment]);
        let word = "w".repeat(MAX_NAME_BYTES);

        let err = relabel(&ws, &words(&[&word])).unwrap_err();

        assert!(matches!(err, RelabelError::Io { .. }));
        assert_eq!(names(&ws), vec![format!("0.{ext}"), segment]);
        assert!(!ws.path().join(".relabel-0.partial").exists());
        assert!(!ws.path().join(".relabel-1.partial").exists());
    }

    #[test]
    fn test_numeric_directory_blocks_the_plan() {
        let (dir, ws) = workspace_with(&["0.mov", "1.mov"]);
        std::fs::create_dir(dir.path().join("7.mov")).unwrap();

        let err = relabel(&ws, &words(&["7"])).unwrap_err();

        match err {
            RelabelError::Io { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::AlreadyExists)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(names(&ws), vec!["0.mov", "1.mov"]);
        assert!(dir.path().join("7.mov").is_dir());
    }

    #[test]
    fn test_discard_lead_in_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let lead_in = dir.path().join(".relabel-0.partial");
        assert!(!discard_lead_in(&lead_in));

        std::fs::write(&lead_in, b"lead-in").unwrap();
        assert!(discard_lead_in(&lead_in));
        assert!(!lead_in.exists());
    }

    #[test]
    fn test_sanitized_name_is_used_and_reported() {
        let (_dir, ws) = workspace_with(&["0.mov", "1.mov"]);
        let labeled = relabel(&ws, &words(&["a/b"])).unwrap();

        assert_eq!(labeled[0].word, "a/b");
        assert_eq!(labeled[0].file_name, "a_b.mov");
        assert_eq!(names(&ws), vec!["a_b.mov"]);
    }

    #[test]
    fn test_sanitized_collision_renames_nothing() {
        let (_dir, ws) = workspace_with(&["0.mov", "1.mov", "2.mov"]);
        let err = relabel(&ws, &words(&["a/b", "a_b"])).unwrap_err();

        assert!(matches!(err, RelabelError::NameCollision { .. }));
        assert_eq!(names(&ws), vec!["0.mov", "1.mov", "2.mov"]);
    }

    #[test]
    fn test_duplicate_index_with_different_extensions() {
        let (_dir, ws) = workspace_with(&["0.mov", "1.mov", "1.mp4"]);
        assert!(matches!(
            relabel(&ws, &words(&["hello"])),
            Err(RelabelError::DuplicateIndex { index: 1, .. })
        ));
    }

    #[test]
    fn test_existing_foreign_file_is_not_overwritten() {
        let (_dir, ws) = workspace_with(&["0.mov", "1.mov", "hello.mov"]);
        assert!(matches!(
            relabel(&ws, &words(&["hello"])),
            Err(RelabelError::Io { .. })
        ));
        assert_eq!(std::fs::read(ws.path().join("hello.mov")).unwrap(), b"hello.mov");
        assert!(ws.path().join("1.mov").exists());
    }
}
