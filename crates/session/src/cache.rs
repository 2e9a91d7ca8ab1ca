// Local name cache over the authoritative user → workspace → file tree.
//
// The cache never owns entities. It holds folded names (and file ids) in
// arrays parallel to `User::workspaces` and `Workspace::files`, plus a hash
// index for O(1) case-insensitive lookup. Every patch must keep the parallel
// arrays in lockstep with the tree; `is_consistent_with_*` verifies that.

use std::collections::HashMap;

use mobilecoder_common::names::fold;
use mobilecoder_common::types::{File, FileId, User, Workspace};
use tracing::debug;

/// Folded names in tree order plus a first-wins lookup index.
#[derive(Debug, Default, Clone)]
struct NameIndex {
    keys: Vec<String>,
    positions: HashMap<String, usize>,
}

impl NameIndex {
    fn rebuild<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        self.keys = names.into_iter().map(fold).collect();
        self.reindex();
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.positions.clear();
    }

    fn push(&mut self, name: &str) {
        let key = fold(name);
        self.positions.entry(key.clone()).or_insert(self.keys.len());
        self.keys.push(key);
    }

    fn remove(&mut self, index: usize) {
        if index < self.keys.len() {
            self.keys.remove(index);
            self.reindex();
        }
    }

    fn replace(&mut self, index: usize, name: &str) {
        if let Some(slot) = self.keys.get_mut(index) {
            *slot = fold(name);
            self.reindex();
        }
    }

    fn get(&self, name: &str) -> Option<usize> {
        self.positions.get(&fold(name)).copied()
    }

    fn reindex(&mut self) {
        self.positions.clear();
        for (position, key) in self.keys.iter().enumerate() {
            self.positions.entry(key.clone()).or_insert(position);
        }
    }

    fn matches<'a>(&self, names: impl ExactSizeIterator<Item = &'a str>) -> bool {
        names.len() == self.keys.len()
            && names.zip(&self.keys).all(|(name, key)| fold(name) == *key)
    }
}

/// Workspace index for the signed-in user and file index for the current
/// workspace.
#[derive(Debug, Default, Clone)]
pub struct LocalCache {
    workspaces: NameIndex,
    files: NameIndex,
    file_ids: Vec<FileId>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the workspace index from scratch.
    pub fn index_workspaces(&mut self, user: &User) {
        self.workspaces.rebuild(user.workspaces.iter().map(|w| w.name.as_str()));
        debug!(workspaces = self.workspaces.keys.len(), "rebuilt workspace cache");
    }

    /// Rebuild the file index for the workspace the session just entered.
    pub fn index_files(&mut self, workspace: &Workspace) {
        let names: Vec<String> = workspace.files.iter().map(File::file_name).collect();
        self.files.rebuild(names.iter().map(String::as_str));
        self.file_ids = workspace.files.iter().map(|f| f.id.clone()).collect();
        debug!(workspace = %workspace.name, files = self.file_ids.len(), "rebuilt file cache");
    }

    pub fn clear_files(&mut self) {
        self.files.clear();
        self.file_ids.clear();
    }

    pub fn clear(&mut self) {
        self.workspaces.clear();
        self.clear_files();
    }

    pub fn lookup_workspace(&self, name: &str) -> Option<usize> {
        self.workspaces.get(name)
    }

    pub fn lookup_file(&self, name_with_ext: &str) -> Option<usize> {
        self.files.get(name_with_ext)
    }

    pub fn file_id(&self, name_with_ext: &str) -> Option<&FileId> {
        self.lookup_file(name_with_ext).and_then(|index| self.file_ids.get(index))
    }

    pub fn workspace_count(&self) -> usize {
        self.workspaces.keys.len()
    }

    pub fn file_count(&self) -> usize {
        self.file_ids.len()
    }

    pub fn on_workspace_created(&mut self, workspace: &Workspace) {
        self.workspaces.push(&workspace.name);
    }

    pub fn on_workspace_deleted(&mut self, index: usize) {
        self.workspaces.remove(index);
    }

    pub fn on_file_created(&mut self, file: &File) {
        self.files.push(&file.file_name());
        self.file_ids.push(file.id.clone());
    }

    /// Swap in the record produced by an overwrite (same name, new id).
    pub fn on_file_replaced(&mut self, index: usize, file: &File) {
        if let Some(slot) = self.file_ids.get_mut(index) {
            *slot = file.id.clone();
            self.files.replace(index, &file.file_name());
        }
    }

    pub fn on_file_deleted(&mut self, index: usize) {
        if index < self.file_ids.len() {
            self.file_ids.remove(index);
            self.files.remove(index);
        }
    }

    /// True when the workspace index mirrors `user.workspaces` position by position.
    pub fn is_consistent_with_user(&self, user: &User) -> bool {
        self.workspaces.matches(user.workspaces.iter().map(|w| w.name.as_str()))
    }

    /// True when the file index mirrors `workspace.files` names and ids.
    pub fn is_consistent_with_workspace(&self, workspace: &Workspace) -> bool {
        let names: Vec<String> = workspace.files.iter().map(File::file_name).collect();
        self.files.matches(names.iter().map(String::as_str))
            && workspace.files.iter().map(|f| &f.id).eq(self.file_ids.iter())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mobilecoder_common::types::{UserId, WorkspaceId};

    use super::*;

    fn file(id: &str, name: &str, ext: &str) -> File {
        File {
            id: FileId::new(id),
            name: name.into(),
            extension: ext.into(),
            contents: String::new(),
            source_path: None,
        }
    }

    fn workspace(id: &str, name: &str, files: Vec<File>) -> Workspace {
        Workspace { files, ..Workspace::new(WorkspaceId::new(id), name, Utc::now()) }
    }

    fn user(workspaces: Vec<Workspace>) -> User {
        User { workspaces, ..User::new(UserId::new("u-1"), "a", "a@b.com") }
    }

    #[test]
    fn workspace_lookup_is_case_insensitive() {
        let user = user(vec![workspace("w-1", "Notes", vec![]), workspace("w-2", "Work", vec![])]);
        let mut cache = LocalCache::new();
        cache.index_workspaces(&user);

        assert_eq!(cache.lookup_workspace("notes"), Some(0));
        assert_eq!(cache.lookup_workspace("WORK"), Some(1));
        assert_eq!(cache.lookup_workspace("missing"), None);
    }

    #[test]
    fn index_workspaces_replaces_previous_contents() {
        let mut cache = LocalCache::new();
        cache.index_workspaces(&user(vec![workspace("w-1", "Old", vec![])]));
        cache.index_workspaces(&user(vec![workspace("w-2", "New", vec![])]));

        assert_eq!(cache.lookup_workspace("old"), None);
        assert_eq!(cache.lookup_workspace("new"), Some(0));
        assert_eq!(cache.workspace_count(), 1);
    }

    #[test]
    fn file_lookup_uses_name_and_extension() {
        let ws = workspace(
            "w-1",
            "Notes",
            vec![file("f-1", "hello", ".txt"), file("f-2", "Main", ".RS")],
        );
        let mut cache = LocalCache::new();
        cache.index_files(&ws);

        assert_eq!(cache.lookup_file("HELLO.TXT"), Some(0));
        assert_eq!(cache.lookup_file("main.rs"), Some(1));
        assert_eq!(cache.file_id("main.rs"), Some(&FileId::new("f-2")));
        assert_eq!(cache.lookup_file("hello"), None);
    }

    #[test]
    fn deleting_a_workspace_shifts_later_positions() {
        let mut user = user(vec![
            workspace("w-1", "A", vec![]),
            workspace("w-2", "B", vec![]),
            workspace("w-3", "C", vec![]),
        ]);
        let mut cache = LocalCache::new();
        cache.index_workspaces(&user);

        user.workspaces.remove(0);
        cache.on_workspace_deleted(0);

        assert_eq!(cache.lookup_workspace("a"), None);
        assert_eq!(cache.lookup_workspace("b"), Some(0));
        assert_eq!(cache.lookup_workspace("c"), Some(1));
        assert!(cache.is_consistent_with_user(&user));
    }

    #[test]
    fn created_workspace_is_indexed_folded() {
        let mut user = user(vec![]);
        let mut cache = LocalCache::new();
        cache.index_workspaces(&user);

        let ws = workspace("w-1", "Project X", vec![]);
        user.workspaces.push(ws.clone());
        cache.on_workspace_created(&ws);

        assert_eq!(cache.lookup_workspace("project x"), Some(0));
        assert!(cache.is_consistent_with_user(&user));
    }

    #[test]
    fn replacing_a_file_swaps_only_its_id() {
        let mut ws = workspace(
            "w-1",
            "Notes",
            vec![file("f-1", "a", ".txt"), file("f-2", "b", ".txt")],
        );
        let mut cache = LocalCache::new();
        cache.index_files(&ws);

        let replacement = file("f-9", "a", ".txt");
        ws.files[0] = replacement.clone();
        cache.on_file_replaced(0, &replacement);

        assert_eq!(cache.file_id("a.txt"), Some(&FileId::new("f-9")));
        assert_eq!(cache.file_id("b.txt"), Some(&FileId::new("f-2")));
        assert!(cache.is_consistent_with_workspace(&ws));
    }

    #[test]
    fn deleting_a_file_keeps_ids_aligned() {
        let mut ws = workspace(
            "w-1",
            "Notes",
            vec![file("f-1", "a", ".txt"), file("f-2", "b", ".txt"), file("f-3", "c", ".txt")],
        );
        let mut cache = LocalCache::new();
        cache.index_files(&ws);

        ws.files.remove(1);
        cache.on_file_deleted(1);

        assert_eq!(cache.file_id("c.txt"), Some(&FileId::new("f-3")));
        assert_eq!(cache.lookup_file("c.txt"), Some(1));
        assert_eq!(cache.lookup_file("b.txt"), None);
        assert!(cache.is_consistent_with_workspace(&ws));
    }

    #[test]
    fn out_of_range_patches_are_ignored() {
        let ws = workspace("w-1", "Notes", vec![file("f-1", "a", ".txt")]);
        let mut cache = LocalCache::new();
        cache.index_files(&ws);

        cache.on_file_deleted(5);
        cache.on_file_replaced(5, &file("f-9", "z", ".txt"));
        cache.on_workspace_deleted(5);

        assert!(cache.is_consistent_with_workspace(&ws));
    }

    #[test]
    fn duplicate_remote_names_resolve_to_first_until_removed() {
        // A companion client may have created names that collide after folding.
        let mut ws = workspace(
            "w-1",
            "Notes",
            vec![file("f-1", "Readme", ".md"), file("f-2", "README", ".md")],
        );
        let mut cache = LocalCache::new();
        cache.index_files(&ws);
        assert_eq!(cache.lookup_file("readme.md"), Some(0));

        ws.files.remove(0);
        cache.on_file_deleted(0);
        assert_eq!(cache.lookup_file("readme.md"), Some(0));
        assert_eq!(cache.file_id("readme.md"), Some(&FileId::new("f-2")));
    }

    #[test]
    fn clear_files_keeps_workspaces() {
        let ws = workspace("w-1", "Notes", vec![file("f-1", "a", ".txt")]);
        let user = user(vec![ws.clone()]);
        let mut cache = LocalCache::new();
        cache.index_workspaces(&user);
        cache.index_files(&ws);

        cache.clear_files();
        assert_eq!(cache.file_count(), 0);
        assert_eq!(cache.workspace_count(), 1);

        cache.clear();
        assert_eq!(cache.workspace_count(), 0);
    }
}
