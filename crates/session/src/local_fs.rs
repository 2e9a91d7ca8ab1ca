// Local filesystem access relative to the session's working directory.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    /// Path as the user should type it (`dir/name` for directories).
    pub display: String,
    pub is_dir: bool,
}

/// File primitives used by the sync operations. Relative paths resolve
/// against `cwd`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    cwd: PathBuf,
}

impl LocalFs {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    /// Working directory of the current process.
    pub fn current_dir() -> io::Result<Self> {
        std::env::current_dir().map(Self::new)
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.cwd.join(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    pub fn read_text(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(self.resolve(path))
    }

    /// Absolute, canonical form of an existing path.
    pub fn resolve_absolute(&self, path: &str) -> Option<String> {
        fs::canonicalize(self.resolve(path)).ok().map(|p| p.display().to_string())
    }

    /// Write `name + extension` into the working directory, replacing any
    /// existing file of that name. Names come from the store, so anything
    /// other than a single plain path component is rejected.
    pub fn write_file(&self, name: &str, extension: &str, contents: &str) -> io::Result<PathBuf> {
        let file_name = format!("{name}{extension}");
        let mut components = Path::new(&file_name).components();
        if !matches!((components.next(), components.next()), (Some(Component::Normal(_)), None)) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to write `{file_name}` outside the working directory"),
            ));
        }
        let target = self.cwd.join(&file_name);
        fs::write(&target, contents)?;
        Ok(target)
    }

    /// List a directory, skipping hidden entries, directories first then
    /// files, each alphabetically.
    pub fn list_directory(&self, path: Option<&str>) -> io::Result<Vec<DirEntry>> {
        let shown = path.unwrap_or(".");
        let dir = self.resolve(shown);
        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type()?.is_dir();
            let display = if is_dir {
                format!("{}/{name}", shown.trim_end_matches('/'))
            } else {
                name.clone()
            };
            entries.push(DirEntry { name, display, is_dir });
        }
        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }
}
