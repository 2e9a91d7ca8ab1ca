// SQLite-backed document store and password authentication.
//
// Identifiers are random UUIDs assigned on insert. Sibling order is the
// insertion order (`seq`), so bulk reads list workspaces and files the way
// they were created.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use mobilecoder_common::types::{File, FileId, NewFile, User, UserId, Workspace, WorkspaceId};
use rand::rngs::OsRng;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use super::db;
use crate::auth::{AuthError, AuthProvider, AuthUser, MIN_PASSWORD_CHARS};
use crate::remote::{RemoteStore, StoreError};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_connection(db::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(db::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self { conn: Arc::new(Mutex::new(conn)) }
    }

    /// Password auth over the same database.
    pub fn auth(&self) -> LocalAuth {
        LocalAuth { conn: Arc::clone(&self.conn) }
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        f(&conn)
    }
}

fn backend(action: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |error| StoreError::Backend(format!("failed to {action}: {error}"))
}

fn user_exists(conn: &Connection, uid: &UserId) -> Result<bool, StoreError> {
    conn.query_row("SELECT 1 FROM users WHERE uid = ?1", params![uid.as_str()], |_| Ok(()))
        .optional()
        .map(|row| row.is_some())
        .map_err(backend("look up user"))
}

fn owns_workspace(conn: &Connection, uid: &UserId, wid: &WorkspaceId) -> Result<bool, StoreError> {
    conn.query_row(
        "SELECT 1 FROM workspaces WHERE workspace_id = ?1 AND uid = ?2",
        params![wid.as_str(), uid.as_str()],
        |_| Ok(()),
    )
    .optional()
    .map(|row| row.is_some())
    .map_err(backend("look up workspace"))
}

fn require_workspace(conn: &Connection, uid: &UserId, wid: &WorkspaceId) -> Result<(), StoreError> {
    if owns_workspace(conn, uid, wid)? {
        Ok(())
    } else {
        Err(StoreError::NotFound(format!("workspace {wid}")))
    }
}

fn load_workspaces(
    conn: &Connection,
    uid: &UserId,
    skip_contents: bool,
) -> Result<Vec<Workspace>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT workspace_id, name, created_at FROM workspaces \
             WHERE uid = ?1 ORDER BY seq ASC",
        )
        .map_err(backend("prepare workspace query"))?;
    let rows = stmt
        .query_map(params![uid.as_str()], row_to_workspace)
        .map_err(backend("query workspaces"))?;
    let mut workspaces =
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend("decode workspace row"))?;

    for workspace in &mut workspaces {
        workspace.files = load_files(conn, &workspace.id, skip_contents)?;
    }
    Ok(workspaces)
}

fn load_files(
    conn: &Connection,
    wid: &WorkspaceId,
    skip_contents: bool,
) -> Result<Vec<File>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT file_id, name, extension, contents, source_path FROM files \
             WHERE workspace_id = ?1 ORDER BY seq ASC",
        )
        .map_err(backend("prepare file query"))?;
    let rows = stmt
        .query_map(params![wid.as_str()], row_to_file)
        .map_err(backend("query files"))?;
    let files = rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend("decode file row"))?;

    Ok(if skip_contents { files.iter().map(File::without_contents).collect() } else { files })
}

fn next_seq(conn: &Connection, table: &str, parent_column: &str, parent: &str) -> Result<i64, StoreError> {
    conn.query_row(
        &format!("SELECT COALESCE(MAX(seq), -1) + 1 FROM {table} WHERE {parent_column} = ?1"),
        params![parent],
        |row| row.get(0),
    )
    .map_err(backend("compute insertion order"))
}

fn row_to_workspace(row: &rusqlite::Row<'_>) -> rusqlite::Result<Workspace> {
    let created_at: String = row.get(2)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error)))?
        .with_timezone(&Utc);
    Ok(Workspace::new(WorkspaceId::new(row.get::<_, String>(0)?), row.get::<_, String>(1)?, created_at))
}

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<File> {
    Ok(File {
        id: FileId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        extension: row.get(2)?,
        contents: row.get(3)?,
        source_path: row.get(4)?,
    })
}

impl RemoteStore for SqliteStore {
    async fn create_user(&self, uid: &UserId, name: &str, email: &str) -> Result<User, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (uid, name, email) VALUES (?1, ?2, ?3)",
                params![uid.as_str(), name, email],
            )
            .map_err(backend("insert user"))?;
            debug!(uid = %uid, "inserted user profile");
            Ok(User::new(uid.clone(), name, email))
        })
    }

    async fn get_user(&self, uid: &UserId, skip_contents: bool) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| {
            let profile = conn
                .query_row(
                    "SELECT name, email FROM users WHERE uid = ?1",
                    params![uid.as_str()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()
                .map_err(backend("load user"))?;

            let Some((name, email)) = profile else {
                return Ok(None);
            };
            let mut user = User::new(uid.clone(), name, email);
            user.workspaces = load_workspaces(conn, uid, skip_contents)?;
            Ok(Some(user))
        })
    }

    async fn create_workspace(
        &self,
        uid: &UserId,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Workspace, StoreError> {
        self.with_conn(|conn| {
            if !user_exists(conn, uid)? {
                return Err(StoreError::NotFound(format!("user {uid}")));
            }
            let wid = WorkspaceId::new(Uuid::new_v4().to_string());
            let seq = next_seq(conn, "workspaces", "uid", uid.as_str())?;
            conn.execute(
                "INSERT INTO workspaces (workspace_id, uid, name, created_at, seq) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![wid.as_str(), uid.as_str(), name, created_at.to_rfc3339(), seq],
            )
            .map_err(backend("insert workspace"))?;
            Ok(Workspace::new(wid, name, created_at))
        })
    }

    async fn delete_workspace(&self, uid: &UserId, wid: &WorkspaceId) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM workspaces WHERE workspace_id = ?1 AND uid = ?2",
                    params![wid.as_str(), uid.as_str()],
                )
                .map_err(backend("delete workspace"))?;
            if removed == 0 {
                return Err(StoreError::NotFound(format!("workspace {wid}")));
            }
            Ok(())
        })
    }

    async fn get_workspaces(
        &self,
        uid: &UserId,
        skip_contents: bool,
    ) -> Result<Vec<Workspace>, StoreError> {
        self.with_conn(|conn| load_workspaces(conn, uid, skip_contents))
    }

    async fn create_file(
        &self,
        uid: &UserId,
        wid: &WorkspaceId,
        file: NewFile,
    ) -> Result<File, StoreError> {
        self.with_conn(|conn| {
            require_workspace(conn, uid, wid)?;
            let fid = FileId::new(Uuid::new_v4().to_string());
            let seq = next_seq(conn, "files", "workspace_id", wid.as_str())?;
            conn.execute(
                "INSERT INTO files \
                 (file_id, workspace_id, name, extension, contents, source_path, seq) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    fid.as_str(),
                    wid.as_str(),
                    file.name,
                    file.extension,
                    file.contents,
                    file.source_path,
                    seq,
                ],
            )
            .map_err(backend("insert file"))?;
            Ok(file.into_file(fid).without_contents())
        })
    }

    async fn get_files(
        &self,
        uid: &UserId,
        wid: &WorkspaceId,
        skip_contents: bool,
    ) -> Result<Vec<File>, StoreError> {
        self.with_conn(|conn| {
            require_workspace(conn, uid, wid)?;
            load_files(conn, wid, skip_contents)
        })
    }

    async fn get_file_contents(
        &self,
        uid: &UserId,
        wid: &WorkspaceId,
        fid: &FileId,
    ) -> Result<String, StoreError> {
        self.with_conn(|conn| {
            require_workspace(conn, uid, wid)?;
            conn.query_row(
                "SELECT contents FROM files WHERE file_id = ?1 AND workspace_id = ?2",
                params![fid.as_str(), wid.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend("read file contents"))?
            .ok_or_else(|| StoreError::NotFound(format!("file {fid}")))
        })
    }

    async fn delete_file(&self, uid: &UserId, wid: &WorkspaceId, fid: &FileId) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            require_workspace(conn, uid, wid)?;
            let removed = conn
                .execute(
                    "DELETE FROM files WHERE file_id = ?1 AND workspace_id = ?2",
                    params![fid.as_str(), wid.as_str()],
                )
                .map_err(backend("delete file"))?;
            if removed == 0 {
                return Err(StoreError::NotFound(format!("file {fid}")));
            }
            Ok(())
        })
    }
}

/// Email/password accounts stored next to the documents, hashed with argon2.
#[derive(Clone)]
pub struct LocalAuth {
    conn: Arc<Mutex<Connection>>,
}

impl LocalAuth {
    fn with_conn<T, F>(&self, f: F) -> Result<T, AuthError>
    where
        F: FnOnce(&Connection) -> Result<T, AuthError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AuthError::Backend("store lock poisoned".to_string()))?;
        f(&conn)
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| AuthError::Backend(format!("failed to hash password: {error}")))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

fn auth_backend(error: rusqlite::Error) -> AuthError {
    AuthError::Backend(error.to_string())
}

impl AuthProvider for LocalAuth {
    async fn signup(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::WeakPassword);
        }
        let password_hash = hash_password(password)?;

        self.with_conn(|conn| {
            let taken = conn
                .query_row("SELECT 1 FROM credentials WHERE email = ?1", params![email], |_| Ok(()))
                .optional()
                .map_err(auth_backend)?
                .is_some();
            if taken {
                return Err(AuthError::EmailInUse);
            }

            let uid = UserId::new(Uuid::new_v4().to_string());
            conn.execute(
                "INSERT INTO credentials (email, uid, password_hash, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![email, uid.as_str(), password_hash, Utc::now().to_rfc3339()],
            )
            .map_err(auth_backend)?;
            debug!(uid = %uid, "created credentials");
            Ok(AuthUser { uid, email: email.to_string() })
        })
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let account = self.with_conn(|conn| {
            conn.query_row(
                "SELECT uid, email, password_hash FROM credentials WHERE email = ?1",
                params![email],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
            )
            .optional()
            .map_err(auth_backend)
        })?;

        match account {
            Some((uid, email, hash)) if verify_password(password, &hash) => {
                Ok(AuthUser { uid: UserId::new(uid), email })
            }
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn signout(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, ext: &str, contents: &str) -> NewFile {
        NewFile {
            name: name.into(),
            extension: ext.into(),
            contents: contents.into(),
            source_path: None,
        }
    }

    async fn store_with_user() -> (SqliteStore, UserId) {
        let store = SqliteStore::open_in_memory().expect("store should open");
        let uid = UserId::new("u-1");
        store.create_user(&uid, "a", "a@b.com").await.expect("user should be created");
        (store, uid)
    }

    #[tokio::test]
    async fn missing_user_reads_as_none() {
        let store = SqliteStore::open_in_memory().expect("store should open");
        let user = store.get_user(&UserId::new("nobody"), true).await.expect("read should succeed");
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn workspaces_and_files_keep_insertion_order() {
        let (store, uid) = store_with_user().await;
        let first = store.create_workspace(&uid, "Zeta", Utc::now()).await.unwrap();
        let second = store.create_workspace(&uid, "alpha", Utc::now()).await.unwrap();
        store.create_file(&uid, &first.id, draft("b", ".txt", "B")).await.unwrap();
        store.create_file(&uid, &first.id, draft("a", ".rs", "A")).await.unwrap();

        let user = store.get_user(&uid, true).await.unwrap().expect("user should exist");
        let names: Vec<_> = user.workspaces.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, ["Zeta", "alpha"]);
        assert_eq!(user.workspaces[0].id, first.id);
        assert_eq!(user.workspaces[1].id, second.id);

        let files: Vec<_> = user.workspaces[0].files.iter().map(File::file_name).collect();
        assert_eq!(files, ["b.txt", "a.rs"]);
        assert!(user.workspaces[0].files.iter().all(|f| f.contents.is_empty()));
    }

    #[tokio::test]
    async fn contents_are_fetched_on_demand() {
        let (store, uid) = store_with_user().await;
        let ws = store.create_workspace(&uid, "ws", Utc::now()).await.unwrap();
        let file = store.create_file(&uid, &ws.id, draft("hello", ".txt", "hi\n")).await.unwrap();
        assert!(file.contents.is_empty());

        let contents = store.get_file_contents(&uid, &ws.id, &file.id).await.unwrap();
        assert_eq!(contents, "hi\n");

        let full = store.get_files(&uid, &ws.id, false).await.unwrap();
        assert_eq!(full[0].contents, "hi\n");
    }

    #[tokio::test]
    async fn replace_assigns_a_new_identifier() {
        let (store, uid) = store_with_user().await;
        let ws = store.create_workspace(&uid, "ws", Utc::now()).await.unwrap();
        let old = store.create_file(&uid, &ws.id, draft("hello", ".txt", "v1")).await.unwrap();

        let new = store
            .replace_file(&uid, &ws.id, &old.id, draft("hello", ".txt", "v2"))
            .await
            .expect("replace should succeed");
        assert_ne!(new.id, old.id);
        assert_eq!(store.get_file_contents(&uid, &ws.id, &new.id).await.unwrap(), "v2");
        assert!(matches!(
            store.get_file_contents(&uid, &ws.id, &old.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deletes_report_missing_records() {
        let (store, uid) = store_with_user().await;
        let ws = store.create_workspace(&uid, "ws", Utc::now()).await.unwrap();
        assert!(matches!(
            store.delete_file(&uid, &ws.id, &FileId::new("nope")).await,
            Err(StoreError::NotFound(_))
        ));

        store.delete_workspace(&uid, &ws.id).await.expect("delete should succeed");
        assert!(matches!(
            store.delete_workspace(&uid, &ws.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn other_users_workspaces_are_invisible() {
        let (store, uid) = store_with_user().await;
        let intruder = UserId::new("u-2");
        store.create_user(&intruder, "b", "b@b.com").await.unwrap();
        let ws = store.create_workspace(&uid, "ws", Utc::now()).await.unwrap();

        assert!(matches!(
            store.create_file(&intruder, &ws.id, draft("x", ".txt", "")).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.get_workspaces(&intruder, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn signup_then_login_round_trips_identity() {
        let store = SqliteStore::open_in_memory().expect("store should open");
        let auth = store.auth();

        let account = auth.signup("A@B.com", "hunter22").await.expect("signup should succeed");
        let again = auth.login("a@b.com", "hunter22").await.expect("login should succeed");
        assert_eq!(account.uid, again.uid);

        assert_eq!(auth.login("a@b.com", "wrong-pass").await, Err(AuthError::InvalidCredentials));
        assert_eq!(auth.login("x@b.com", "hunter22").await, Err(AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn signup_rejects_duplicates_and_weak_passwords() {
        let store = SqliteStore::open_in_memory().expect("store should open");
        let auth = store.auth();

        assert_eq!(auth.signup("a@b.com", "12345").await, Err(AuthError::WeakPassword));
        auth.signup("a@b.com", "123456").await.expect("signup should succeed");
        assert_eq!(auth.signup("a@b.com", "abcdef").await, Err(AuthError::EmailInUse));
    }

    #[test]
    fn password_hashes_are_salted_per_call() {
        let first = hash_password("hunter22").expect("hash should succeed");
        let second = hash_password("hunter22").expect("hash should succeed");
        assert_ne!(first, second);
        assert!(verify_password("hunter22", &first));
        assert!(verify_password("hunter22", &second));
        assert!(!verify_password("hunter23", &first));
        assert!(!verify_password("hunter22", "not a phc string"));
    }
}
