use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::cache::{CachedPipeline, SegmentCache};
use crate::config::Config;
use crate::package::{package, PackageOptions, PackageReport};
use crate::pipeline::Pipeline;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "m4v"];
pub const TABLE_EXTENSION: &str = "csv";
pub const RESULTS_FILE: &str = "batch_results.json";

/// A video and the timing table next to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    pub name: String,
    pub video: PathBuf,
    pub table: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Completed,
    Failed,
    Skipped,
}

/// Outcome of a single job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub name: String,
    pub video: PathBuf,
    pub status: JobStatus,
    pub package: Option<PackageReport>,
    pub error_message: Option<String>,
    pub processing_time: Duration,
}

/// Overall batch results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_time: Duration,
    pub jobs: Vec<JobResult>,
}

/// Run the pipeline for one table/video pair and package the clips into `out_dir`.
///
/// Without caching the workspace is deleted once packaging has read it; with
/// caching it stays with the cache.
pub fn build_deck(config: &Config, table: &[u8], video: &[u8], out_dir: &Path) -> Result<PackageReport> {
    let options = PackageOptions::from(&config.output);

    if config.performance.enable_caching {
        let cache = SegmentCache::from_config(&config.performance);
        cache.initialize()?;
        let labeled = CachedPipeline::from_config(&config.segmenter, cache).run(table, video)?;
        return package(&labeled, out_dir, options);
    }

    let labeled = Pipeline::from_config(&config.segmenter).run(table, video)?;
    let report = package(&labeled, out_dir, options);

    let workspace = labeled.into_workspace();
    let path = workspace.path().to_path_buf();
    if let Err(e) = workspace.remove() {
        warn!("Failed to remove workspace {}: {}", path.display(), e);
    }

    report
}

/// Read one job's inputs from disk and build it
pub fn run_job(config: &Config, job: &BatchJob, output_dir: &Path) -> JobResult {
    let start_time = Instant::now();
    let out_dir = output_dir.join(&job.name);

    let outcome = (|| -> Result<PackageReport> {
        let table = std::fs::read(&job.table)
            .with_context(|| format!("Failed to read {}", job.table.display()))?;
        let video = std::fs::read(&job.video)
            .with_context(|| format!("Failed to read {}", job.video.display()))?;
        build_deck(config, &table, &video, &out_dir)
    })();

    let (status, package, error_message) = match outcome {
        Ok(report) => (JobStatus::Completed, Some(report), None),
        Err(e) => (JobStatus::Failed, None, Some(format!("{:#}", e))),
    };

    JobResult {
        name: job.name.clone(),
        video: job.video.clone(),
        status,
        package,
        error_message,
        processing_time: start_time.elapsed(),
    }
}

/// Pair every video in `dir` with `<stem>.csv`. Videos without a table come
/// back in the second list.
pub fn discover_jobs(dir: &Path) -> Result<(Vec<BatchJob>, Vec<PathBuf>)> {
    let mut jobs = Vec::new();
    let mut unpaired = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to scan {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_video_file(path) {
            continue;
        }

        let table = path.with_extension(TABLE_EXTENSION);
        if table.is_file() {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            jobs.push(BatchJob {
                name,
                video: path.to_path_buf(),
                table,
            });
        } else {
            debug!("No timing table for {}", path.display());
            unpaired.push(path.to_path_buf());
        }
    }

    Ok((jobs, unpaired))
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Runs independent jobs concurrently, each start-to-finish on its own blocking thread
pub struct BatchProcessor {
    config: Arc<Config>,
    worker_semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl BatchProcessor {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let max_workers = config.performance.max_workers;
        info!("🔧 Initializing BatchProcessor with {} workers", max_workers);

        Ok(Self {
            config: Arc::new(config),
            worker_semaphore: Arc::new(Semaphore::new(max_workers)),
            max_concurrent: max_workers,
        })
    }

    /// Process every video/table pair in a directory
    pub async fn process_directory(&self, input_dir: PathBuf, output_dir: PathBuf) -> Result<BatchReport> {
        let start_time = Instant::now();

        info!("🚀 Starting batch processing...");
        info!("📁 Input: {}", input_dir.display());
        info!("📂 Output: {}", output_dir.display());

        tokio::fs::create_dir_all(&output_dir).await?;

        let (jobs, unpaired) = discover_jobs(&input_dir)?;
        for video in &unpaired {
            warn!("Skipping {}: no {} timing table", video.display(), TABLE_EXTENSION);
        }
        info!("📹 Found {} job(s) to process", jobs.len());

        let mut results = self.process_jobs_parallel(jobs, &output_dir).await;
        results.extend(unpaired.into_iter().map(|video| JobResult {
            name: video
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            video,
            status: JobStatus::Skipped,
            package: None,
            error_message: Some("no timing table".to_string()),
            processing_time: Duration::ZERO,
        }));
        results.sort_by(|a, b| a.name.cmp(&b.name));

        let count = |status: JobStatus| results.iter().filter(|r| r.status == status).count();
        let report = BatchReport {
            total: results.len(),
            successful: count(JobStatus::Completed),
            failed: count(JobStatus::Failed),
            skipped: count(JobStatus::Skipped),
            total_time: start_time.elapsed(),
            jobs: results,
        };

        let results_path = output_dir.join(RESULTS_FILE);
        let json_data = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(&results_path, json_data).await?;
        info!("💾 Results saved to: {}", results_path.display());

        Ok(report)
    }

    async fn process_jobs_parallel(&self, jobs: Vec<BatchJob>, output_dir: &Path) -> Vec<JobResult> {
        let (tx, mut rx) = mpsc::channel(self.max_concurrent.max(1));
        let total_jobs = jobs.len();

        for (index, job) in jobs.into_iter().enumerate() {
            let config = Arc::clone(&self.config);
            let output_dir = output_dir.to_path_buf();
            let tx = tx.clone();
            let semaphore = Arc::clone(&self.worker_semaphore);

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    error!("Worker pool closed before {} could start", job.name);
                    return;
                };

                info!("📹 Processing job {}/{}: {}", index + 1, total_jobs, job.name);

                let name = job.name.clone();
                let result =
                    tokio::task::spawn_blocking(move || run_job(&config, &job, &output_dir)).await;

                match result {
                    Ok(job_result) => {
                        if let Err(e) = tx.send(job_result).await {
                            error!("Failed to send result: {}", e);
                        }
                    }
                    Err(e) => error!("Job {} panicked: {}", name, e),
                }
            });
        }

        // Drop the original sender so the channel closes when all tasks finish
        drop(tx);

        let mut results = Vec::new();
        while let Some(job_result) = rx.recv().await {
            match job_result.status {
                JobStatus::Completed => info!(
                    "✅ Completed: {} in {:.2}s",
                    job_result.name,
                    job_result.processing_time.as_secs_f64()
                ),
                _ => warn!(
                    "❌ Failed: {} - {}",
                    job_result.name,
                    job_result.error_message.as_deref().unwrap_or("Unknown error")
                ),
            }
            results.push(job_result);
        }

        results
    }

    pub fn get_stats(&self) -> ProcessingStats {
        ProcessingStats {
            max_workers: self.max_concurrent,
            available_permits: self.worker_semaphore.available_permits(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessingStats {
    pub max_workers: usize,
    pub available_permits: usize,
}
