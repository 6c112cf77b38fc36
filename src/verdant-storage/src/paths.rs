//! OS-aware path detection for Verdant storage.
//!
//! - **Windows**: `%APPDATA%\Verdant\`
//! - **macOS**: `~/Library/Application Support/Verdant/`
//! - **Linux**: `~/.local/share/Verdant/`
//!
//! The config file lives in the platform config directory
//! (`~/.config/Verdant/` on Linux).

use std::path::PathBuf;

use tracing::debug;

use crate::error::{Result, StorageError};

/// Application name used for storage directories.
pub const APP_NAME: &str = "Verdant";

/// Subdirectory names.
pub const CONVERSATIONS_DIR: &str = "conversations";
pub const EXPORTS_DIR: &str = "exports";
pub const CONFIG_FILE: &str = "config.toml";

/// Verdant storage paths container.
#[derive(Debug, Clone)]
pub struct VerdantPaths {
    /// Root data directory (platform-specific).
    pub data_dir: PathBuf,
    /// Conversation documents directory.
    pub conversations_dir: PathBuf,
    /// Generated exports directory.
    pub exports_dir: PathBuf,
}

impl VerdantPaths {
    /// Create VerdantPaths with automatic OS detection.
    pub fn new() -> Result<Self> {
        let data_dir = verdant_data_dir()?;
        Ok(Self::from_root(data_dir))
    }

    /// Create VerdantPaths from a custom root directory.
    pub fn from_root(data_dir: PathBuf) -> Self {
        Self {
            conversations_dir: data_dir.join(CONVERSATIONS_DIR),
            exports_dir: data_dir.join(EXPORTS_DIR),
            data_dir,
        }
    }

    /// Ensure all directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.conversations_dir)?;
        std::fs::create_dir_all(&self.exports_dir)?;
        debug!(data_dir = %self.data_dir.display(), "Verdant storage directories initialized");
        Ok(())
    }

    /// Ensure all directories exist (async version).
    pub async fn ensure_dirs_async(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::create_dir_all(&self.conversations_dir).await?;
        tokio::fs::create_dir_all(&self.exports_dir).await?;
        debug!(data_dir = %self.data_dir.display(), "Verdant storage directories initialized");
        Ok(())
    }

    /// Get path for a conversation document.
    pub fn conversation_path(&self, conversation_id: &str) -> PathBuf {
        self.conversations_dir
            .join(format!("{}.json", conversation_id))
    }

    /// Get path for a generated export file.
    pub fn export_path(&self, filename: &str) -> PathBuf {
        self.exports_dir.join(filename)
    }
}

/// Get the Verdant data directory based on the current OS.
pub fn verdant_data_dir() -> Result<PathBuf> {
    // Check environment variable override first
    if let Ok(val) = std::env::var("VERDANT_DATA_DIR") {
        if !val.is_empty() {
            let path = PathBuf::from(val);
            debug!(path = %path.display(), "Using VERDANT_DATA_DIR override");
            return Ok(path);
        }
    }

    let base = dirs::data_dir().ok_or(StorageError::HomeDirNotFound)?;
    Ok(base.join(APP_NAME))
}

/// Get the Verdant config directory based on the current OS.
pub fn verdant_config_dir() -> Result<PathBuf> {
    // Check environment variable override first
    if let Ok(val) = std::env::var("VERDANT_CONFIG_DIR") {
        if !val.is_empty() {
            let path = PathBuf::from(val);
            debug!(path = %path.display(), "Using VERDANT_CONFIG_DIR override");
            return Ok(path);
        }
    }

    let base = dirs::config_dir().ok_or(StorageError::HomeDirNotFound)?;
    Ok(base.join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_structure() {
        let paths = VerdantPaths::from_root(PathBuf::from("/tmp/verdant-test"));
        assert!(paths.conversations_dir.ends_with(CONVERSATIONS_DIR));
        assert!(paths.exports_dir.ends_with(EXPORTS_DIR));
        assert_eq!(paths.data_dir, PathBuf::from("/tmp/verdant-test"));
    }

    #[test]
    fn test_conversation_path() {
        let paths = VerdantPaths::from_root(PathBuf::from("/tmp/verdant-test"));
        let path = paths.conversation_path("conv-123");
        assert!(path.to_string_lossy().contains("conv-123.json"));
    }

    #[test]
    fn test_export_path() {
        let paths = VerdantPaths::from_root(PathBuf::from("/tmp/verdant-test"));
        let path = paths.export_path("My_Chat_1700000000000.json");
        assert!(path.starts_with(&paths.exports_dir));
    }
}
