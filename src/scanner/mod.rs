//! Export discovery for batch conversion.
//!
//! This module walks a directory and picks out spreadsheet exports,
//! skipping office lock files and hidden entries.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration for export scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to include (e.g., ["xlsx", "csv"])
    pub extensions: Vec<String>,
    /// File name prefixes to skip (e.g., ["~$", "."])
    pub exclude_prefixes: Vec<String>,
    /// Maximum number of files to return
    pub max_files: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::from(&crate::config::ScannerConfig::default())
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            extensions: config.extensions.iter().map(|e| e.to_lowercase()).collect(),
            exclude_prefixes: config.exclude_prefixes.clone(),
            max_files: Some(config.max_files),
        }
    }
}

/// An export found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Path relative to the scanned directory
    pub relative: PathBuf,
    /// Full path
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Scanner for discovering export files.
pub struct ExportScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl ExportScanner {
    /// Create a new scanner rooted at `root`.
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// Scan for all matching files, sorted by relative path.
    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        let mut files = Vec::new();
        self.walk_dir(&self.root, &mut files)?;

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        if let Some(max) = self.config.max_files {
            files.truncate(max);
        }

        Ok(files)
    }

    /// Check if a file is an export the scanner should pick up.
    pub fn matches(&self, path: &Path) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if self.is_excluded(name) {
                return false;
            }
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        self.config.extensions.contains(&ext)
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.config
            .exclude_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// Walk directory recursively.
    fn walk_dir(&self, dir: &Path, files: &mut Vec<ScannedFile>) -> Result<()> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Cannot read directory {}", dir.display()))?;

        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            if self.is_excluded(&name) {
                debug!("Skipping {}", path.display());
                continue;
            }

            if path.is_dir() {
                self.walk_dir(&path, files)?;
            } else if path.is_file() && self.matches(&path) {
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                let relative = path
                    .strip_prefix(&self.root)
                    .unwrap_or(&path)
                    .to_path_buf();

                files.push(ScannedFile {
                    relative,
                    path,
                    size,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("week22.xlsx"), b"x").unwrap();
        fs::write(root.join("week23.CSV"), b"x").unwrap();
        fs::write(root.join("~$week22.xlsx"), b"x").unwrap();
        fs::write(root.join("notes.txt"), b"x").unwrap();
        fs::create_dir(root.join("archive")).unwrap();
        fs::write(root.join("archive/week21.ods"), b"x").unwrap();
        fs::create_dir(root.join(".cache")).unwrap();
        fs::write(root.join(".cache/week20.xlsx"), b"x").unwrap();

        dir
    }

    #[test]
    fn test_scan_finds_exports() {
        let dir = setup_dir();
        let scanner = ExportScanner::new(dir.path().to_path_buf(), ScanConfig::default());

        let files = scanner.scan().unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.relative.to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(names, vec!["archive/week21.ods", "week22.xlsx", "week23.CSV"]);
    }

    #[test]
    fn test_scan_max_files() {
        let dir = setup_dir();
        let config = ScanConfig {
            max_files: Some(1),
            ..ScanConfig::default()
        };
        let scanner = ExportScanner::new(dir.path().to_path_buf(), config);
        assert_eq!(scanner.scan().unwrap().len(), 1);
    }

    #[test]
    fn test_matches() {
        let scanner = ExportScanner::new(PathBuf::from("."), ScanConfig::default());
        assert!(scanner.matches(Path::new("export.xlsx")));
        assert!(!scanner.matches(Path::new("~$export.xlsx")));
        assert!(!scanner.matches(Path::new("export.pdf")));
    }
}
