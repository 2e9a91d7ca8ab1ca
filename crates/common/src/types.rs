// Core domain types shared across all MobileCoder crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Store-assigned user identifier (the auth provider's uid).
    UserId
);
opaque_id!(
    /// Store-assigned workspace identifier, immutable once created.
    WorkspaceId
);
opaque_id!(
    /// Store-assigned file identifier. Changes on every overwrite.
    FileId
);

/// A signed-in user together with the workspaces they own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { id, name: name.into(), email: email.into(), workspaces: Vec::new() }
    }
}

/// A named container of files owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<File>,
}

impl Workspace {
    pub fn new(id: WorkspaceId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self { id, name: name.into(), created_at, files: Vec::new() }
    }
}

/// A file stored in a workspace.
///
/// `contents` is empty when the file came from a bulk read; contents are
/// only fetched on demand for a single file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct File {
    pub id: FileId,
    pub name: String,
    /// Extension including the leading dot (`.txt`), or empty.
    pub extension: String,
    #[serde(default)]
    pub contents: String,
    /// Absolute local path the file was last added from.
    pub source_path: Option<String>,
}

impl File {
    /// Base name plus extension, e.g. `hello.txt`.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }

    /// Copy of this record with contents dropped.
    pub fn without_contents(&self) -> Self {
        Self { contents: String::new(), ..self.clone() }
    }
}

/// Draft of a file to be created remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub extension: String,
    pub contents: String,
    pub source_path: Option<String>,
}

impl NewFile {
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }

    pub fn into_file(self, id: FileId) -> File {
        File {
            id,
            name: self.name,
            extension: self.extension,
            contents: self.contents,
            source_path: self.source_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> File {
        File {
            id: FileId::new("f-1"),
            name: "hello".into(),
            extension: ".txt".into(),
            contents: "hi there".into(),
            source_path: Some("/tmp/hello.txt".into()),
        }
    }

    #[test]
    fn file_name_joins_name_and_extension() {
        assert_eq!(sample_file().file_name(), "hello.txt");
    }

    #[test]
    fn file_name_without_extension() {
        let file = File { extension: String::new(), ..sample_file() };
        assert_eq!(file.file_name(), "hello");
    }

    #[test]
    fn without_contents_keeps_identity() {
        let stripped = sample_file().without_contents();
        assert!(stripped.contents.is_empty());
        assert_eq!(stripped.id, FileId::new("f-1"));
        assert_eq!(stripped.source_path.as_deref(), Some("/tmp/hello.txt"));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_value(&sample_file()).unwrap();
        assert_eq!(json["id"], "f-1");
    }

    #[test]
    fn workspace_files_default_to_empty() {
        let json = serde_json::json!({
            "id": "w-1",
            "name": "Notes",
            "created_at": "2020-12-07T00:00:00Z"
        });
        let workspace: Workspace = serde_json::from_value(json).unwrap();
        assert!(workspace.files.is_empty());
        assert_eq!(workspace.id.as_str(), "w-1");
    }
}
