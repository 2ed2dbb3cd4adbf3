//! Profile persistence
//!
//! Save/load/list/delete PTT profiles as JSON files in a directory the
//! embedding application chooses.

use std::path::{Path, PathBuf};

use crate::domain::{PttConfig, PttError, PttResult};

/// Sanitize a profile name to prevent path traversal: rejects anything with
/// path separators, "..", or empty strings.
fn sanitize_name(name: &str) -> PttResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PttError::Config("Profile name cannot be empty".to_string()));
    }
    if trimmed.contains("..") || trimmed.contains('/') || trimmed.contains('\\') {
        return Err(PttError::Config("Invalid profile name".to_string()));
    }
    // Only allow alphanumeric, spaces, hyphens, underscores
    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return Err(PttError::Config(
            "Profile name contains invalid characters".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Directory-backed set of named profiles.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get (and create if needed) the profiles directory.
    fn ensure_dir(&self) -> PttResult<&Path> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| PttError::Config(format!("Failed to create profiles dir: {e}")))?;
        Ok(&self.dir)
    }

    fn path_for(&self, name: &str) -> PttResult<PathBuf> {
        let name = sanitize_name(name)?;
        Ok(self.ensure_dir()?.join(format!("{name}.json")))
    }

    pub fn save(&self, config: &PttConfig) -> PttResult<()> {
        let path = self.path_for(&config.name)?;
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| PttError::Config(format!("Serialization error: {e}")))?;
        std::fs::write(&path, json)
            .map_err(|e| PttError::Config(format!("Failed to write profile: {e}")))?;
        log::debug!("Saved PTT profile to {}", path.display());
        Ok(())
    }

    pub fn load(&self, name: &str) -> PttResult<PttConfig> {
        let path = self.path_for(name)?;
        let json = std::fs::read_to_string(&path)
            .map_err(|e| PttError::Config(format!("Failed to read profile '{name}': {e}")))?;
        serde_json::from_str(&json)
            .map_err(|e| PttError::Config(format!("Failed to parse profile '{name}': {e}")))
    }

    /// Names of all saved profiles, sorted
    pub fn list(&self) -> PttResult<Vec<String>> {
        let dir = self.ensure_dir()?;
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map_err(|e| PttError::Config(format!("Failed to read profiles dir: {e}")))?
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let path = entry.path();
                if path.extension()?.to_str()? == "json" {
                    path.file_stem()?.to_str().map(String::from)
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn delete(&self, name: &str) -> PttResult<()> {
        let path = self.path_for(name)?;
        std::fs::remove_file(&path)
            .map_err(|e| PttError::Config(format!("Failed to delete profile '{name}': {e}")))
    }
}
