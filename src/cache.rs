//! Content-addressed cache of labeled workspaces
//!
//! Sits outside the pipeline: the key is derived from the uploaded bytes,
//! and a hit hands back a workspace produced by an earlier run.

use crate::config::{PerformanceConfig, SegmenterConfig};
use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::segmenter::{FfmpegSplitter, Segmenter, SplitTool};
use crate::split_points::SegmentPoints;
use crate::table::TimingTable;
use crate::workspace::LabeledWorkspace;
use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const WORKSPACES_DIR: &str = "workspaces";

/// One cached run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unix timestamp of when the entry was stored
    pub timestamp: i64,
    pub cache_key: String,
    pub labeled: LabeledWorkspace,
}

/// Manages cached workspaces and their JSON index files
#[derive(Debug, Clone)]
pub struct SegmentCache {
    cache_dir: PathBuf,
    cache_ttl_hours: u64,
}

impl SegmentCache {
    pub fn new(cache_dir: PathBuf, cache_ttl_hours: u64) -> Self {
        Self {
            cache_dir,
            cache_ttl_hours,
        }
    }

    pub fn from_config(config: &PerformanceConfig) -> Self {
        Self::new(config.cache_dir.clone(), config.cache_ttl_hours)
    }

    /// Initialize cache directories
    pub fn initialize(&self) -> Result<()> {
        std::fs::create_dir_all(self.workspace_root())?;
        debug!("📁 Segment cache directory initialized: {}", self.cache_dir.display());
        Ok(())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where cached runs keep their workspaces
    pub fn workspace_root(&self) -> PathBuf {
        self.cache_dir.join(WORKSPACES_DIR)
    }

    /// md5 over the video bytes, the split-point argument and the words.
    ///
    /// Words are hashed as written, not as sanitized file names, because the
    /// cached segments carry the card text.
    pub fn cache_key(video: &[u8], points: &SegmentPoints, words: &[String]) -> String {
        let mut ctx = md5::Context::new();
        ctx.consume(video);
        ctx.consume(b"\0");
        ctx.consume(points.to_arg().as_bytes());
        for word in words {
            ctx.consume(b"\0");
            ctx.consume(word.as_bytes());
        }
        format!("{:x}", ctx.compute())
    }

    fn entry_path(&self, cache_key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", cache_key))
    }

    /// Cached workspace for `cache_key`, if fresh and every clip is still on disk
    pub fn lookup(&self, cache_key: &str) -> Option<LabeledWorkspace> {
        let entry = self.read_entry(&self.entry_path(cache_key))?;

        if !self.is_cache_valid(&entry) {
            info!("⏰ Cache expired for key: {}", cache_key);
            self.discard(entry);
            return None;
        }

        if !entry.labeled.segments.iter().all(|s| s.file_path.is_file()) {
            warn!("Cached clips for {} are missing, dropping entry", cache_key);
            self.discard(entry);
            return None;
        }

        info!("📚 Cache hit: {} clip(s) for {}", entry.labeled.len(), cache_key);
        Some(entry.labeled)
    }

    /// Record a labeled workspace under `cache_key`
    pub fn store(&self, cache_key: &str, labeled: &LabeledWorkspace) -> Result<()> {
        let entry = CacheEntry {
            timestamp: Utc::now().timestamp(),
            cache_key: cache_key.to_string(),
            labeled: labeled.clone(),
        };

        let json_content = serde_json::to_string_pretty(&entry)?;
        std::fs::write(self.entry_path(cache_key), json_content)?;
        info!("💾 Cached {} clip(s) under {}", labeled.len(), cache_key);
        Ok(())
    }

    /// Drop one entry and its workspace
    pub fn invalidate(&self, cache_key: &str) -> Result<bool> {
        match self.read_entry(&self.entry_path(cache_key)) {
            Some(entry) => {
                self.discard(entry);
                info!("🗑️ Invalidated cache for key: {}", cache_key);
                Ok(true)
            }
            None => {
                debug!("Cache entry not found for key: {}", cache_key);
                Ok(false)
            }
        }
    }

    /// Drop every expired entry
    pub fn cleanup_expired(&self) -> Result<usize> {
        let mut cleaned_count = 0;
        for entry in self.entries()? {
            if !self.is_cache_valid(&entry) {
                self.discard(entry);
                cleaned_count += 1;
            }
        }

        if cleaned_count > 0 {
            info!("🧹 Cleaned up {} expired cache entries", cleaned_count);
        }
        Ok(cleaned_count)
    }

    /// Drop everything, including workspaces no entry points at
    pub fn clear(&self) -> Result<usize> {
        let entries = self.entries()?;
        let cleared_count = entries.len();
        for entry in entries {
            self.discard(entry);
        }

        let root = self.workspace_root();
        if root.exists() {
            std::fs::remove_dir_all(&root)?;
            std::fs::create_dir_all(&root)?;
        }

        if cleared_count > 0 {
            info!("🧹 Cleared {} cache entries", cleared_count);
        }
        Ok(cleared_count)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for entry in self.entries()? {
            stats.total_entries += 1;
            if self.is_cache_valid(&entry) {
                stats.valid_entries += 1;
                stats.total_clips += entry.labeled.len();
            } else {
                stats.expired_entries += 1;
            }
        }
        Ok(stats)
    }

    /// All entries, newest first
    pub fn list(&self) -> Result<Vec<CachedEntryInfo>> {
        let mut list: Vec<CachedEntryInfo> = self
            .entries()?
            .into_iter()
            .map(|entry| CachedEntryInfo {
                is_valid: self.is_cache_valid(&entry),
                age_hours: self.cache_age_hours(&entry),
                clip_count: entry.labeled.len(),
                workspace: entry.labeled.path().to_path_buf(),
                cache_key: entry.cache_key,
                timestamp: entry.timestamp,
            })
            .collect();

        list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(list)
    }

    fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        if !self.cache_dir.exists() {
            return Ok(entries);
        }
        for dir_entry in std::fs::read_dir(&self.cache_dir)? {
            let path = dir_entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                if let Some(entry) = self.read_entry(&path) {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    fn read_entry(&self, path: &Path) -> Option<CacheEntry> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Failed to parse cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Remove an entry's index file and, if it lives under our root, its workspace.
    fn discard(&self, entry: CacheEntry) {
        let entry_path = self.entry_path(&entry.cache_key);
        if let Err(e) = std::fs::remove_file(&entry_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove cache entry {}: {}", entry_path.display(), e);
            }
        }
        let workspace = entry.labeled.workspace;
        if workspace.path().starts_with(self.workspace_root()) && workspace.path().exists() {
            let path = workspace.path().to_path_buf();
            if let Err(e) = workspace.remove() {
                warn!("Failed to remove cached workspace {}: {}", path.display(), e);
            }
        }
    }

    fn is_cache_valid(&self, entry: &CacheEntry) -> bool {
        self.cache_age_hours(entry) < self.cache_ttl_hours
    }

    fn cache_age_hours(&self, entry: &CacheEntry) -> u64 {
        let age_secs = Utc::now().timestamp().saturating_sub(entry.timestamp).max(0);
        age_secs as u64 / 3600
    }
}

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub total_clips: usize,
}

/// Summary of one cached run
#[derive(Debug, Clone)]
pub struct CachedEntryInfo {
    pub cache_key: String,
    pub workspace: PathBuf,
    pub clip_count: usize,
    pub is_valid: bool,
    pub age_hours: u64,
    pub timestamp: i64,
}

/// [`Pipeline`] with a [`SegmentCache`] in front of it.
///
/// Workspaces returned from here belong to the cache; callers must not
/// remove them.
pub struct CachedPipeline<T: SplitTool = FfmpegSplitter> {
    pipeline: Pipeline<T>,
    cache: SegmentCache,
}

impl CachedPipeline<FfmpegSplitter> {
    /// Build a pipeline whose workspaces live inside the cache directory.
    pub fn from_config(config: &SegmenterConfig, cache: SegmentCache) -> Self {
        let mut config = config.clone();
        config.workspace_root = Some(cache.workspace_root());
        Self::new(Pipeline::from_config(&config), cache)
    }
}

impl<T: SplitTool> CachedPipeline<T> {
    pub fn new(pipeline: Pipeline<T>, cache: SegmentCache) -> Self {
        Self { pipeline, cache }
    }

    /// Build from a segmenter, placing its workspaces inside the cache directory.
    pub fn with_tool(tool: T, extension: impl Into<String>, cache: SegmentCache) -> Self {
        let segmenter = Segmenter::with_tool(tool, extension, Some(cache.workspace_root()));
        Self::new(Pipeline::new(segmenter), cache)
    }

    pub fn cache(&self) -> &SegmentCache {
        &self.cache
    }

    pub fn pipeline(&self) -> &Pipeline<T> {
        &self.pipeline
    }

    pub fn run(&self, table: &[u8], video: &[u8]) -> Result<LabeledWorkspace, PipelineError> {
        let table = TimingTable::parse(table)?;
        let points = SegmentPoints::derive(&table);
        let key = SegmentCache::cache_key(video, &points, &table.words());

        if let Some(labeled) = self.cache.lookup(&key) {
            return Ok(labeled);
        }
        debug!("Cache miss for {}", key);

        let labeled = self.pipeline.run_parsed(&table, &points, video)?;
        if let Err(e) = self.cache.store(&key, &labeled) {
            warn!("Failed to cache result {}: {}", key, e);
        }
        Ok(labeled)
    }
}
