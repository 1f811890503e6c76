//! Script filename validation and resolution
//!
//! Checks run in a fixed order: name shape, extension, existence, and finally
//! the canonical-path containment check against the scripts root.

use hub_foundation::{Error, Result, ScriptSettings};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const MAX_FILENAME_LEN: usize = 255;

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\- ]+$").expect("valid filename regex"))
}

/// A script that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScript {
    pub filename: String,
    pub path: PathBuf,
    pub extension: String,
    pub interpreter: String,
}

/// Validate the shape of `filename` and return its lowercased extension.
///
/// Does not touch the filesystem.
pub fn validate_filename(filename: &str, settings: &ScriptSettings) -> Result<String> {
    if filename.trim().is_empty() {
        return Err(Error::InvalidName("Script filename is empty".to_string()));
    }
    if filename.len() > MAX_FILENAME_LEN {
        return Err(Error::InvalidName(format!(
            "Script filename longer than {} bytes",
            MAX_FILENAME_LEN
        )));
    }
    if filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains('\0')
    {
        return Err(Error::InvalidName(format!(
            "Script filename must not contain path components: {}",
            filename
        )));
    }
    if !filename_pattern().is_match(filename) {
        return Err(Error::InvalidName(format!(
            "Script filename has invalid characters: {}",
            filename
        )));
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| Error::UnsupportedType(format!("No file extension: {}", filename)))?;

    if !settings.is_allowed_extension(&extension) {
        return Err(Error::UnsupportedType(format!(
            "Script type '.{}' is not allowed",
            extension
        )));
    }

    Ok(extension)
}

/// Validate `filename` and resolve it inside `root`
pub async fn resolve(
    filename: &str,
    root: &Path,
    settings: &ScriptSettings,
) -> Result<ResolvedScript> {
    let extension = validate_filename(filename, settings)?;

    let interpreter = settings
        .interpreter_for(&extension)
        .ok_or_else(|| {
            Error::UnsupportedType(format!("No interpreter configured for '.{}'", extension))
        })?
        .to_string();

    let candidate = root.join(filename);
    let is_file = tokio::fs::metadata(&candidate)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(Error::NotFound(format!("Script not found: {}", filename)));
    }

    let canonical_root = tokio::fs::canonicalize(root).await?;
    let path = tokio::fs::canonicalize(&candidate).await?;
    if !path.starts_with(&canonical_root) {
        return Err(Error::InvalidName(format!(
            "Script resolves outside the scripts directory: {}",
            filename
        )));
    }

    Ok(ResolvedScript {
        filename: filename.to_string(),
        path,
        extension,
        interpreter,
    })
}
