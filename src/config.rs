use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Locations of the three raw table exports
#[derive(Debug, Clone, Deserialize)]
pub struct RawCsv {
    pub strain: PathBuf,
    pub allele: PathBuf,
    pub plasmid: PathBuf,
}

/// Run configuration loaded from a TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub raw_csv: RawCsv,
    pub output_directory: PathBuf,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Directory holding the filtered tables
    pub fn filter_dir(&self) -> PathBuf {
        self.output_directory.join("filter")
    }

    /// Directory holding the per-fault rejected-row logs
    pub fn errorlog_dir(&self) -> PathBuf {
        self.output_directory.join("filter_errorlog")
    }

    /// Directory holding the fully normalized tables
    pub fn normalize_dir(&self) -> PathBuf {
        self.output_directory.join("normalize")
    }
}
