// src/utils/progress_bars/progress_config.rs

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::env;

/// Configuration for progress tracking throughout the pipeline
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to show the per-record worker bar
    pub detailed: bool,
    /// Whether to show memory usage in progress messages
    pub show_memory: bool,
    /// Whether to show database connection pool statistics
    pub show_db_connection_stats: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
            show_memory: true,
            show_db_connection_stats: true,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            enabled: env_flag("PROGRESS_ENABLED", true),
            detailed: env_flag("PROGRESS_DETAILED", true),
            show_memory: env_flag("PROGRESS_SHOW_MEMORY", true),
            show_db_connection_stats: env_flag("PROGRESS_SHOW_DB_CONNECTIONS", true),
        }
    }

    /// Create a MultiProgress instance if progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.enabled {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    pub fn should_show_memory(&self) -> bool {
        self.enabled && self.show_memory
    }

    pub fn should_show_db_connection_stats(&self) -> bool {
        self.enabled && self.show_db_connection_stats
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

/// Adds a record-count bar to `multi_progress`, if there is one.
pub fn add_record_bar(multi_progress: Option<&MultiProgress>, len: u64, message: &str) -> Option<ProgressBar> {
    let mp = multi_progress?;
    let pb = mp.add(ProgressBar::new(len));
    if let Ok(style) = ProgressStyle::default_bar()
        .template("    {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    Some(pb)
}
