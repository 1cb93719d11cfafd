use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, Row};

use crate::sqlite::configure_connection;

use super::error::{StoreError, StoreResult};
use super::models::Post;

const POSTS_SCHEMA: &str = include_str!("../../../sql/posts.sql");

#[derive(Debug, Clone)]
pub struct SqlitePostStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for SqlitePostStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl SqlitePostStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> StoreResult<SqlitePostStore> {
        let path = self.path.ok_or(StoreError::MissingStore)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };

        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }

        Ok(SqlitePostStore { path, flags })
    }
}

/// Append-only post persistence. Cheap to clone: the struct carries only the
/// database path and open flags, and every call opens its own connection.
#[derive(Debug, Clone)]
pub struct SqlitePostStore {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqlitePostStore {
    pub fn builder() -> SqlitePostStoreBuilder {
        SqlitePostStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        SqlitePostStoreBuilder::new().path(path).build()
    }

    fn open(&self) -> StoreResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            StoreError::OpenDatabase {
                path: self.path.clone(),
                source,
            }
        })?;
        configure_connection(&conn).map_err(|source| StoreError::OpenDatabase {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> StoreResult<()> {
        let conn = self.open()?;
        conn.execute_batch(POSTS_SCHEMA)?;
        Ok(())
    }

    /// Plain insert. No dedup: appending an identical post twice yields two
    /// rows.
    pub fn append(&self, post: &Post) -> StoreResult<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO posts(text, time, username) VALUES (?1, ?2, ?3)",
            params![post.text, post.time, post.username],
        )?;
        Ok(())
    }

    /// All stored posts in insertion order.
    pub fn list_all(&self) -> StoreResult<Vec<Post>> {
        let conn = self.open()?;
        let mut stmt =
            conn.prepare("SELECT text, time, username FROM posts ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Newest-first slice for page rendering.
    pub fn list_recent(&self, limit: usize) -> StoreResult<Vec<Post>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare("SELECT text, time, username FROM posts ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt
            .query_map([limit as i64], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_by_username(&self) -> StoreResult<HashMap<String, usize>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT username, COUNT(*) FROM posts GROUP BY username")?;
        let mut map = HashMap::new();
        for row in stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })? {
            let (username, count) = row?;
            map.insert(username, count as usize);
        }
        Ok(map)
    }
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        text: row.get(0)?,
        time: row.get(1)?,
        username: row.get(2)?,
    })
}
