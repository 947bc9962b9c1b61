//! SQLite-backed graph store and its unit of work.

use crate::error::{Error, Result};
use crate::model::{ChatKind, FileLeaf, Folder, NewFile, User};
use crate::vertex::{ChatId, FileId, FolderId, VertexRef, decode_children, encode_children};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// How long a writer waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        chat_id INTEGER PRIMARY KEY,
        path TEXT NOT NULL,
        pages TEXT NOT NULL DEFAULT '1',
        delete_mode INTEGER NOT NULL DEFAULT 0,
        chat_kind TEXT NOT NULL DEFAULT 'private'
    );

    CREATE TABLE IF NOT EXISTS folders (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        author_id INTEGER NOT NULL,
        private_mode INTEGER NOT NULL,
        share_count INTEGER NOT NULL DEFAULT 1,
        children TEXT NOT NULL DEFAULT '',
        head_text TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY,
        external_ref TEXT NOT NULL,
        name TEXT NOT NULL,
        media_kind TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_folders_author_id ON folders(author_id);
"#;

/// Shared handle to the graph database.
///
/// Holds a single connection; every logical operation borrows it for the
/// length of one [`Txn`].
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        debug!("Opened database");

        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        debug!("Opened in-memory database");
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` as one atomic unit of work.
    ///
    /// The transaction takes SQLite's write lock up front. It commits when
    /// `f` returns `Ok` and rolls back every write when it returns `Err`.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Txn<'_>) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let txn = Txn { tx };

        match f(&txn) {
            Ok(value) => {
                txn.tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                // Dropping an uncommitted rusqlite transaction rolls it back.
                debug!(error = %err, "Rolling back transaction");
                drop(txn);
                Err(err)
            }
        }
    }
}

/// Record counts, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCounts {
    pub folders: usize,
    pub files: usize,
    pub users: usize,
}

/// A unit of work over the graph tables.
///
/// Nothing written through a `Txn` is visible outside it until
/// [`Database::transaction`] commits.
pub struct Txn<'conn> {
    tx: rusqlite::Transaction<'conn>,
}

impl Txn<'_> {
    /// Fetch a folder record.
    pub fn folder(&self, id: FolderId) -> Result<Option<Folder>> {
        let row = self
            .tx
            .prepare_cached(
                "SELECT name, author_id, private_mode, share_count, children, head_text
                 FROM folders WHERE id = ?1",
            )?
            .query_row(params![id.0], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .optional()?;

        let Some((name, author, private, share_count, children, head_text)) = row else {
            return Ok(None);
        };

        Ok(Some(Folder {
            id,
            name,
            author: ChatId(author),
            private,
            share_count,
            children: decode_children(&children)?,
            head_text,
        }))
    }

    /// Fetch a folder or fail with `NotFound`.
    pub fn require_folder(&self, id: FolderId) -> Result<Folder> {
        self.folder(id)?.ok_or_else(|| Error::folder_not_found(id.0))
    }

    /// Whether a folder record exists.
    pub fn folder_exists(&self, id: FolderId) -> Result<bool> {
        let found = self
            .tx
            .prepare_cached("SELECT 1 FROM folders WHERE id = ?1")?
            .query_row(params![id.0], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// A folder's share count, or `None` when the folder is gone.
    pub fn share_count(&self, id: FolderId) -> Result<Option<i64>> {
        let count = self
            .tx
            .prepare_cached("SELECT share_count FROM folders WHERE id = ?1")?
            .query_row(params![id.0], |row| row.get(0))
            .optional()?;
        Ok(count)
    }

    pub fn set_share_count(&self, id: FolderId, count: i64) -> Result<()> {
        self.tx
            .prepare_cached("UPDATE folders SET share_count = ?1 WHERE id = ?2")?
            .execute(params![count, id.0])?;
        Ok(())
    }

    /// A folder's child sequence, or `None` when the folder is gone.
    pub fn children(&self, id: FolderId) -> Result<Option<Vec<VertexRef>>> {
        let text: Option<String> = self
            .tx
            .prepare_cached("SELECT children FROM folders WHERE id = ?1")?
            .query_row(params![id.0], |row| row.get(0))
            .optional()?;

        text.map(|text| decode_children(&text)).transpose()
    }

    pub fn set_children(&self, id: FolderId, children: &[VertexRef]) -> Result<()> {
        self.tx
            .prepare_cached("UPDATE folders SET children = ?1 WHERE id = ?2")?
            .execute(params![encode_children(children), id.0])?;
        Ok(())
    }

    pub fn set_head_text(&self, id: FolderId, text: &str) -> Result<()> {
        self.tx
            .prepare_cached("UPDATE folders SET head_text = ?1 WHERE id = ?2")?
            .execute(params![text, id.0])?;
        Ok(())
    }

    /// Insert a childless folder.
    pub fn insert_folder(
        &self,
        name: &str,
        author: ChatId,
        private: bool,
        share_count: i64,
    ) -> Result<FolderId> {
        self.tx
            .prepare_cached(
                "INSERT INTO folders (name, author_id, private_mode, share_count)
                 VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![name, author.0, private, share_count])?;
        Ok(FolderId(self.tx.last_insert_rowid()))
    }

    /// Fetch a file leaf.
    pub fn file(&self, id: FileId) -> Result<Option<FileLeaf>> {
        let row = self
            .tx
            .prepare_cached("SELECT external_ref, name, media_kind FROM files WHERE id = ?1")?
            .query_row(params![id.0], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .optional()?;

        let Some((external_ref, name, media)) = row else {
            return Ok(None);
        };

        Ok(Some(FileLeaf {
            id,
            external_ref,
            name,
            media: media.parse()?,
        }))
    }

    pub fn insert_file(&self, file: &NewFile) -> Result<FileId> {
        self.tx
            .prepare_cached("INSERT INTO files (external_ref, name, media_kind) VALUES (?1, ?2, ?3)")?
            .execute(params![file.external_ref, file.name, file.media.as_str()])?;
        Ok(FileId(self.tx.last_insert_rowid()))
    }

    /// Delete folder records. Returns how many existed.
    pub fn delete_folders(&self, ids: &[FolderId]) -> Result<usize> {
        let mut stmt = self.tx.prepare_cached("DELETE FROM folders WHERE id = ?1")?;
        let mut deleted = 0;
        for id in ids {
            deleted += stmt.execute(params![id.0])?;
        }
        Ok(deleted)
    }

    /// Whether any folder lists `id` among its children.
    pub fn is_referenced(&self, id: FolderId) -> Result<bool> {
        let needle = format!(";{};", VertexRef::Folder(id));
        let found = self
            .tx
            .prepare_cached("SELECT 1 FROM folders WHERE instr(';' || children || ';', ?1) > 0")?
            .exists(params![needle])?;
        Ok(found)
    }

    /// Whether `id` is the root folder of some user.
    pub fn is_user_root(&self, id: FolderId) -> Result<bool> {
        let exact = format!("U:{}", id);
        let prefix = format!("U:{}\\", id);
        let found = self
            .tx
            .prepare_cached(
                "SELECT 1 FROM users WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2",
            )?
            .exists(params![exact, prefix])?;
        Ok(found)
    }

    /// Delete file records. Returns how many existed.
    pub fn delete_files(&self, ids: &[FileId]) -> Result<usize> {
        let mut stmt = self.tx.prepare_cached("DELETE FROM files WHERE id = ?1")?;
        let mut deleted = 0;
        for id in ids {
            deleted += stmt.execute(params![id.0])?;
        }
        Ok(deleted)
    }

    /// Fetch a user's navigation state.
    pub fn user(&self, chat: ChatId) -> Result<Option<User>> {
        let row = self
            .tx
            .prepare_cached(
                "SELECT path, pages, delete_mode, chat_kind FROM users WHERE chat_id = ?1",
            )?
            .query_row(params![chat.0], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .optional()?;

        let Some((path, pages, delete_mode, kind)) = row else {
            return Ok(None);
        };

        Ok(Some(User {
            chat_id: chat,
            kind: kind.parse::<ChatKind>()?,
            path: path.parse()?,
            pages: pages.parse()?,
            delete_mode,
        }))
    }

    /// Fetch a user or fail with `UserNotFound`.
    pub fn require_user(&self, chat: ChatId) -> Result<User> {
        self.user(chat)?.ok_or_else(|| Error::user_not_found(chat.0))
    }

    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.tx
            .prepare_cached(
                "INSERT INTO users (chat_id, path, pages, delete_mode, chat_kind)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?
            .execute(params![
                user.chat_id.0,
                user.path.to_string(),
                user.pages.to_string(),
                user.delete_mode,
                user.kind.as_str()
            ])?;
        Ok(())
    }

    /// Write back a user's path, page cursors and delete mode.
    pub fn update_user(&self, user: &User) -> Result<()> {
        self.tx
            .prepare_cached(
                "UPDATE users SET path = ?1, pages = ?2, delete_mode = ?3 WHERE chat_id = ?4",
            )?
            .execute(params![
                user.path.to_string(),
                user.pages.to_string(),
                user.delete_mode,
                user.chat_id.0
            ])?;
        Ok(())
    }

    /// Every folder's share count, ordered by id.
    #[cfg(test)]
    pub(crate) fn share_counts(&self) -> Result<Vec<(FolderId, i64)>> {
        let mut stmt = self
            .tx
            .prepare("SELECT id, share_count FROM folders ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((FolderId(row.get(0)?), row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Count records in every table.
    pub fn counts(&self) -> Result<StoreCounts> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .tx
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            Ok(n as usize)
        };

        Ok(StoreCounts {
            folders: count("folders")?,
            files: count("files")?,
            users: count("users")?,
        })
    }
}
