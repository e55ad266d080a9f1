use std::path::Path;
use anyhow::{Context, Result};

/// Ensure directory exists
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {:?}", path))?;
    }
    Ok(())
}

/// Ensure the parent directory of a file exists
pub fn ensure_parent_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    match path.as_ref().parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

/// Format duration as human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

/// Validation utilities
pub mod validation {
    use anyhow::{bail, Result};
    use std::fmt::Display;

    /// Validate that value is in range
    pub fn in_range<T: PartialOrd + Display>(value: T, min: T, max: T, name: &str) -> Result<()> {
        if value < min || value > max {
            bail!("{} must be between {} and {}, got {}", name, min, max, value);
        }
        Ok(())
    }

    /// Validate that a ratio lies strictly between 0 and 1
    pub fn open_unit_interval(value: f64, name: &str) -> Result<()> {
        if !(value > 0.0 && value < 1.0) {
            bail!("{} must be between 0 and 1 (exclusive), got {}", name, value);
        }
        Ok(())
    }
}
