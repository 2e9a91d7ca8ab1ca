// Name rules: case-insensitive keys, workspace name limits, file name splitting.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Maximum workspace name length in characters.
pub const MAX_WORKSPACE_NAME_CHARS: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name is empty")]
    Empty,

    #[error("name cannot exceed {max} characters")]
    TooLong { max: usize },

    #[error("`{0}` does not name a file")]
    NoFileName(String),
}

/// Case-insensitive lookup key for a workspace or file name.
///
/// Applies NFKC normalization before lower-casing so that composed and
/// decomposed spellings of the same name collide.
pub fn fold(name: &str) -> String {
    name.nfkc().collect::<String>().to_lowercase()
}

/// Validate a workspace name before it is sent to the store.
pub fn validate_workspace_name(name: &str) -> Result<(), NameError> {
    if name.trim().is_empty() {
        return Err(NameError::Empty);
    }
    if name.chars().count() > MAX_WORKSPACE_NAME_CHARS {
        return Err(NameError::TooLong { max: MAX_WORKSPACE_NAME_CHARS });
    }
    Ok(())
}

/// Split a path into `(base name, extension)`.
///
/// The directory part is dropped (both `/` and `\` separate components).
/// The extension is everything from the last `.` and keeps the dot. A name
/// whose only dot is the leading one (`.env`) has no extension.
pub fn split_file_name(path: &str) -> Result<(String, String), NameError> {
    let last = path.rsplit(['/', '\\']).next().unwrap_or_default();
    if last.is_empty() || last == "." || last == ".." {
        return Err(NameError::NoFileName(path.to_string()));
    }

    match last.rfind('.') {
        Some(dot) if dot > 0 => Ok((last[..dot].to_string(), last[dot..].to_string())),
        _ => Ok((last.to_string(), String::new())),
    }
}

/// Final component of a path, as used for cache lookups.
pub fn file_name_of(path: &str) -> Result<String, NameError> {
    let (name, extension) = split_file_name(path)?;
    Ok(format!("{name}{extension}"))
}
