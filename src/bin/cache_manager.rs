use anyhow::Result;
use aslflash::SegmentCache;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cache-manager")]
#[command(about = "Segment cache management utility")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value = "cache")]
    cache_dir: PathBuf,

    /// Entries older than this are reported as expired
    #[arg(long, default_value_t = 24)]
    ttl_hours: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// List all cached runs
    List,
    /// Get cache statistics
    Stats,
    /// Invalidate one cached run
    Invalidate {
        /// Cache key to invalidate
        cache_key: String,
    },
    /// Clear all cache entries
    Clear,
    /// Clean up expired cache entries
    Cleanup,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();

    let cache = SegmentCache::new(cli.cache_dir, cli.ttl_hours);
    cache.initialize()?;

    match cli.command {
        Commands::List => {
            let entries = cache.list()?;

            if entries.is_empty() {
                info!("📭 No cached runs found");
                return Ok(());
            }

            info!("📚 Found {} cached run(s):", entries.len());

            for entry in entries {
                let status = if entry.is_valid { "✅ Valid" } else { "❌ Expired" };
                info!(
                    "  {} - {} clips, {} hours old, {}",
                    entry.cache_key, entry.clip_count, entry.age_hours, status
                );
                info!("    Workspace: {}", entry.workspace.display());
            }
        }

        Commands::Stats => {
            let stats = cache.stats()?;
            info!("📊 Cache Statistics:");
            info!("  Total entries: {}", stats.total_entries);
            info!("  Valid entries: {}", stats.valid_entries);
            info!("  Expired entries: {}", stats.expired_entries);
            info!("  Total clips: {}", stats.total_clips);
        }

        Commands::Invalidate { cache_key } => {
            if cache.invalidate(&cache_key)? {
                info!("✅ Successfully invalidated cache for: {}", cache_key);
            } else {
                warn!("⚠️ Cache key not found: {}", cache_key);
            }
        }

        Commands::Clear => {
            let count = cache.clear()?;
            info!("🧹 Cleared {} cache entries", count);
        }

        Commands::Cleanup => {
            let count = cache.cleanup_expired()?;
            info!("🗑️ Cleaned up {} expired cache entries", count);
        }
    }

    Ok(())
}
