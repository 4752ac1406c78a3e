//! Host configuration file and logging flags

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use vcs_core::logging::{LogCategory, LogConfig, LogLevel};
use vcs_core::scheduler::SchedulerConfig;

/// Settings read from `--config`. Every field is optional in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub scheduler: SchedulerConfig,
    /// Scanline drawn into row 0 of the frame
    pub first_visible_scanline: u16,
}

impl HostConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))
    }
}

/// Parse a `category=level` pair, e.g. `tia=debug`
pub fn parse_category_level(arg: &str) -> Result<(LogCategory, LogLevel)> {
    let Some((category, level)) = arg.split_once('=') else {
        bail!("expected CATEGORY=LEVEL, got '{}'", arg);
    };
    let Some(category) = LogCategory::from_str(category.trim()) else {
        bail!("unknown log category '{}'", category);
    };
    let Some(level) = LogLevel::from_str(level.trim()) else {
        bail!("unknown log level '{}'", level);
    };
    Ok((category, level))
}

/// Apply the command line logging flags to the global emulator log config
pub fn apply_logging(
    global: Option<&str>,
    categories: &[String],
    file: Option<&Path>,
) -> Result<()> {
    let config = LogConfig::global();
    if let Some(level) = global {
        let Some(level) = LogLevel::from_str(level) else {
            bail!("unknown log level '{}'", level);
        };
        config.set_global_level(level);
    }
    for arg in categories {
        let (category, level) = parse_category_level(arg)?;
        config.set_level(category, level);
    }
    if let Some(path) = file {
        config
            .set_log_file(path.to_path_buf())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let config: HostConfig = serde_json::from_str(r#"{"first_visible_scanline": 40}"#).unwrap();
        assert_eq!(config.first_visible_scanline, 40);
        assert_eq!(config.scheduler, SchedulerConfig::default());

        let config: HostConfig =
            serde_json::from_str(r#"{"scheduler": {"frame_budget_ms": 20}}"#).unwrap();
        assert_eq!(config.scheduler.frame_budget_ms, 20);
        assert_eq!(config.scheduler.min_delay_ms, 1);
        assert_eq!(config.first_visible_scanline, 0);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("vcs_cli_config_{}.json", std::process::id()));
        fs::write(&path, r#"{"scheduler": {"history_len": 8}}"#).unwrap();
        let config = HostConfig::load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.scheduler.history_len, 8);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        assert!(HostConfig::load(Path::new("/nonexistent/vcs.json")).is_err());
    }

    #[test]
    fn test_parse_category_level() {
        let (category, level) = parse_category_level("tia=debug").unwrap();
        assert_eq!(category, LogCategory::Tia);
        assert_eq!(level, LogLevel::Debug);

        assert!(parse_category_level("tia").is_err());
        assert!(parse_category_level("ppu=debug").is_err());
        assert!(parse_category_level("tia=loud").is_err());
    }
}
