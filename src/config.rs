use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the ASL flashcard builder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External splitter settings
    pub segmenter: SegmenterConfig,

    /// Where and what to package
    pub output: OutputConfig,

    /// Worker pool and cache settings
    pub performance: PerformanceConfig,

    /// Log filter used by the binaries
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Splitter executable, looked up on PATH when not absolute
    pub program: String,

    /// Stream copy or keyframe-accurate re-encode
    pub mode: SplitMode,

    /// Video encoder for re-encode mode
    pub video_codec: String,

    /// Audio encoder for re-encode mode
    pub audio_codec: String,

    /// Container extension of every produced clip
    pub output_extension: String,

    /// Parent directory for workspaces; system temp dir when unset
    pub workspace_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// No re-encode. Cuts land on the nearest keyframe.
    Copy,
    /// Re-encode with forced keyframes at every split point.
    Reencode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Base output directory
    pub base_dir: PathBuf,

    /// Write `clips.zip`
    pub write_archive: bool,

    /// Write `cards.csv`
    pub write_card_table: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Maximum number of concurrent batch jobs
    pub max_workers: usize,

    /// Reuse labeled workspaces for identical inputs
    pub enable_caching: bool,

    /// Cache directory
    pub cache_dir: PathBuf,

    /// Cache TTL in hours
    pub cache_ttl_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub level: String,
}

impl Config {
    /// Load configuration from the first config file found, or defaults
    /// when there is none. A file that exists but does not parse is an error.
    pub fn load() -> Result<Self> {
        let config_paths = ["aslflash.toml", "config/aslflash.toml"];

        for path in &config_paths {
            if Path::new(path).exists() {
                return Self::from_file(Path::new(path));
            }
        }

        tracing::debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.performance.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        if self.segmenter.program.trim().is_empty() {
            return Err(anyhow!("segmenter.program must not be empty"));
        }

        let ext = &self.segmenter.output_extension;
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(anyhow!(
                "segmenter.output_extension must be a bare extension like \"mov\", got {:?}",
                ext
            ));
        }

        if self.segmenter.mode == SplitMode::Reencode
            && (self.segmenter.video_codec.is_empty() || self.segmenter.audio_codec.is_empty())
        {
            return Err(anyhow!("re-encode mode needs both video_codec and audio_codec"));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "ASL Flash Configuration:\n\
            - Splitter: {} ({:?})\n\
            - Clip Extension: {}\n\
            - Output Directory: {}\n\
            - Workers: {}\n\
            - Caching Enabled: {}",
            self.segmenter.program,
            self.segmenter.mode,
            self.segmenter.output_extension,
            self.output.base_dir.display(),
            self.performance.max_workers,
            self.performance.enable_caching
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            output: OutputConfig::default(),
            performance: PerformanceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            mode: SplitMode::Copy,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            output_extension: "mov".to_string(),
            workspace_root: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./output"),
            write_archive: true,
            write_card_table: true,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get().min(8), // Use available cores, max 8
            enable_caching: false,
            cache_dir: PathBuf::from("./cache"),
            cache_ttl_hours: 24,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "aslflash=info,warn".to_string(),
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.config.segmenter.program = program.into();
        self
    }

    pub fn with_mode(mut self, mode: SplitMode) -> Self {
        self.config.segmenter.mode = mode;
        self
    }

    pub fn with_output_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.segmenter.output_extension = ext.into();
        self
    }

    pub fn with_workspace_root(mut self, dir: PathBuf) -> Self {
        self.config.segmenter.workspace_root = Some(dir);
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.base_dir = dir;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.performance.max_workers = workers;
        self
    }

    pub fn enable_archive(mut self, enable: bool) -> Self {
        self.config.output.write_archive = enable;
        self
    }

    pub fn enable_card_table(mut self, enable: bool) -> Self {
        self.config.output.write_card_table = enable;
        self
    }

    pub fn enable_caching(mut self, enable: bool) -> Self {
        self.config.performance.enable_caching = enable;
        self
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.config.performance.cache_dir = dir;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
