use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Directory of segment files owned by one pipeline run.
///
/// Nothing in the pipeline deletes a workspace it has handed out; whoever
/// receives it calls [`Workspace::remove`] once packaging has read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `root` (or the system temp dir).
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("aslflash-segments-");
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.keep();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        }

        Ok(Self { path })
    }

    /// Adopt a directory that already holds segment files.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Regular files in the workspace, sorted by name
    pub fn files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete the directory and everything in it.
    pub fn remove(self) -> io::Result<()> {
        std::fs::remove_dir_all(&self.path)
    }
}

/// A clip renamed after the word it shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledSegment {
    /// The word exactly as it appeared in the timing table
    pub word: String,
    /// Sanitized file name, e.g. `a_b.mov`
    pub file_name: String,
    pub file_path: PathBuf,
}

/// A workspace after relabeling: one clip per word, in table order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledWorkspace {
    pub workspace: Workspace,
    pub segments: Vec<LabeledSegment>,
}

impl LabeledWorkspace {
    pub fn path(&self) -> &Path {
        self.workspace.path()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn into_workspace(self) -> Workspace {
        self.workspace
    }
}
