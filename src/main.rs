use anyhow::{Context, Result};
use aslflash::{build_deck, BatchProcessor, Config, SegmentPoints, SplitMode, TimingTable};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "aslflash", version)]
#[command(about = "Cut a signing video into per-word clips and package them as flashcards")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./aslflash.toml or ./config/aslflash.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build clips for one timing table and video
    Build {
        /// CSV with `word` and `start_time` columns
        #[arg(short, long)]
        table: PathBuf,

        /// Recording of the words, in table order
        #[arg(short = 'i', long)]
        video: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Re-encode for keyframe-accurate cuts instead of stream copy
        #[arg(long)]
        reencode: bool,

        /// Do not write clips.zip
        #[arg(long)]
        no_archive: bool,

        /// Do not write cards.csv
        #[arg(long)]
        no_cards: bool,

        /// Reuse a cached result for identical inputs
        #[arg(long)]
        cache: bool,
    },
    /// Build every `<name>.<video>` + `<name>.csv` pair in a directory
    Batch {
        /// Directory containing videos and timing tables
        #[arg(short, long)]
        dir: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of jobs run at once
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Check a timing table and print the split points it produces
    Validate {
        #[arg(short, long)]
        table: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    let filter = if cli.verbose {
        "aslflash=debug,info".to_string()
    } else {
        config.logging.level.clone()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Build {
            table,
            video,
            output,
            reencode,
            no_archive,
            no_cards,
            cache,
        } => {
            if reencode {
                config.segmenter.mode = SplitMode::Reencode;
            }
            config.output.write_archive &= !no_archive;
            config.output.write_card_table &= !no_cards;
            config.performance.enable_caching |= cache;
            let output = output.unwrap_or_else(|| config.output.base_dir.clone());
            config.validate()?;

            info!("🚀 ASL Flash starting...");
            info!("{}", config.summary());
            info!("📄 Table: {}", table.display());
            info!("📹 Video: {}", video.display());
            info!("📂 Output: {}", output.display());

            let table_bytes = tokio::fs::read(&table)
                .await
                .with_context(|| format!("Failed to read {}", table.display()))?;
            let video_bytes = tokio::fs::read(&video)
                .await
                .with_context(|| format!("Failed to read {}", video.display()))?;

            let start_time = std::time::Instant::now();
            let report = tokio::task::spawn_blocking(move || {
                build_deck(&config, &table_bytes, &video_bytes, &output)
            })
            .await??;

            info!(
                "🎉 Built {} clip(s) in {:.2}s",
                report.clip_count,
                start_time.elapsed().as_secs_f64()
            );
            for path in [&report.archive, &report.card_table, &report.media_dir]
                .into_iter()
                .flatten()
            {
                info!("  {}", path.display());
            }
        }

        Commands::Batch {
            dir,
            output,
            workers,
        } => {
            if let Some(workers) = workers {
                config.performance.max_workers = workers;
            }
            if !dir.is_dir() {
                return Err(anyhow::anyhow!("Input directory not found: {}", dir.display()));
            }
            let output = output.unwrap_or_else(|| config.output.base_dir.clone());
            info!("{}", config.summary());

            let processor = BatchProcessor::new(config)?;
            let report = processor.process_directory(dir, output).await?;

            info!("🎉 Processing completed in {:.2}s", report.total_time.as_secs_f64());
            info!("✅ Successful: {}", report.successful);
            info!("❌ Failed: {}", report.failed);
            if report.skipped > 0 {
                warn!("⏭️ Skipped (no table): {}", report.skipped);
            }
            if report.failed > 0 {
                return Err(anyhow::anyhow!("{} job(s) failed", report.failed));
            }
        }

        Commands::Validate { table } => {
            let bytes = std::fs::read(&table)
                .with_context(|| format!("Failed to read {}", table.display()))?;
            let parsed = TimingTable::parse(&bytes)?;
            let points = SegmentPoints::derive(&parsed);

            info!("✅ {} is valid: {} word(s)", table.display(), parsed.len());
            for entry in parsed.entries() {
                info!("  {:>10.3}s  {}", entry.start_time, entry.word);
            }
            info!("✂️ Split points: {}", points.to_arg());
        }
    }

    Ok(())
}
