//! SQLite connection implementation.
//!
//! Safe wrappers around SQLite's C API implementing the [`Connection`] trait
//! from ormkit-core. A [`SqliteConnection`] is a cheap handle: clones share
//! one database handle behind a mutex, which is how several query
//! interfaces talk to the same in-memory database.

// FFI code matches C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::borrow_as_ptr)]
#![allow(clippy::if_not_else)]

use crate::types;
use libsqlite3_sys as ffi;
use ormkit_core::{
    Connection, ConnectionError, ConnectionErrorKind, Cx, DatabaseError, DatabaseErrorKind,
    Dialect, Error, Outcome, Row, Value, row::ColumnInfo,
};
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for an in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in serialized mode.
    pub full_mutex: bool,
    /// Enable shared cache mode.
    pub shared_cache: bool,
}

impl OpenFlags {
    /// Read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Read-write access; the database must exist.
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Read-write access, creating the database if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;
        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        if self.shared_cache {
            flags |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }
        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Whether this config names an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.path == ":memory:" || self.path.is_empty()
    }
}

struct SqliteInner {
    db: *mut ffi::sqlite3,
}

// SAFETY: the handle is only touched while holding the surrounding Mutex
unsafe impl Send for SqliteInner {}

impl Drop for SqliteInner {
    fn drop(&mut self) {
        if !self.db.is_null() {
            // SAFETY: db is valid and no statement outlives a locked call
            unsafe {
                ffi::sqlite3_close(self.db);
            }
        }
    }
}

/// A connection to a SQLite database.
#[derive(Clone)]
pub struct SqliteConnection {
    inner: Arc<Mutex<SqliteInner>>,
    path: Arc<str>,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    #[tracing::instrument(level = "debug", skip(config), fields(path = %config.path))]
    pub fn open(config: &SqliteConfig) -> Result<Self, Error> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            connect_error("Invalid path: contains null byte".to_string())
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: we pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if !db.is_null() {
                // SAFETY: db is valid, errmsg returns a valid C string
                unsafe {
                    let msg = CStr::from_ptr(ffi::sqlite3_errmsg(db))
                        .to_string_lossy()
                        .into_owned();
                    ffi::sqlite3_close(db);
                    msg
                }
            } else {
                error_string(rc)
            };
            return Err(connect_error(format!("Failed to open database: {}", msg)));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        tracing::debug!(path = %config.path, "opened sqlite database");
        Ok(Self {
            inner: Arc::new(Mutex::new(SqliteInner { db })),
            path: Arc::from(config.path.as_str()),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, Error> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self, Error> {
        Self::open(&SqliteConfig::file(path))
    }

    /// The database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of live handles sharing this database.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute SQL directly without preparing. Accepts several statements.
    pub fn execute_raw(&self, sql: &str) -> Result<(), Error> {
        let inner = self.lock();
        let c_sql = CString::new(sql).map_err(|_| null_byte_error(sql))?;
        let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

        // SAFETY: all pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(inner.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg)
        };

        if rc != ffi::SQLITE_OK {
            let msg = if !errmsg.is_null() {
                // SAFETY: errmsg is valid and owned by us
                let msg = unsafe { CStr::from_ptr(errmsg).to_string_lossy().into_owned() };
                unsafe { ffi::sqlite3_free(errmsg.cast()) };
                msg
            } else {
                error_string(rc)
            };
            return Err(Error::Database(
                DatabaseError::new(error_code_to_kind(rc), msg).with_sql(sql),
            ));
        }
        Ok(())
    }

    /// The rowid of the most recent successful INSERT.
    pub fn last_insert_rowid(&self) -> i64 {
        let inner = self.lock();
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(inner.db) }
    }

    /// Rows changed by the most recent statement.
    pub fn changes(&self) -> i32 {
        let inner = self.lock();
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_changes(inner.db) }
    }

    /// Prepare and run a query, returning all rows.
    pub fn query_sync(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let inner = self.lock();
        let stmt = prepare_stmt(inner.db, sql)?;
        bind_params(inner.db, stmt, sql, params)?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt) };
        let names = (0..col_count)
            .map(|i| unsafe { types::column_name(stmt, i) }.unwrap_or_else(|| format!("col{}", i)))
            .collect();
        let columns = Arc::new(ColumnInfo::new(names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            match unsafe { ffi::sqlite3_step(stmt) } {
                ffi::SQLITE_ROW => {
                    let values = (0..col_count)
                        // SAFETY: we just got SQLITE_ROW
                        .map(|i| unsafe { types::read_column(stmt, i) })
                        .collect();
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => {
                    // SAFETY: stmt is valid
                    unsafe { ffi::sqlite3_finalize(stmt) };
                    return Err(step_error(inner.db, sql));
                }
            }
        }

        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_finalize(stmt) };
        Ok(rows)
    }

    /// Prepare and run a statement, returning rows affected.
    pub fn execute_sync(&self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        let inner = self.lock();
        execute_locked(&inner, sql, params)
    }

    /// Run an INSERT and return the generated rowid.
    pub fn insert_sync(&self, sql: &str, params: &[Value]) -> Result<i64, Error> {
        // Hold the lock across both calls so a concurrent insert cannot
        // replace the rowid in between.
        let inner = self.lock();
        execute_locked(&inner, sql, params)?;
        // SAFETY: db is valid
        Ok(unsafe { ffi::sqlite3_last_insert_rowid(inner.db) })
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.query_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn query_one(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let result = self
            .query_sync(sql, params)
            .map(|rows| rows.into_iter().next());
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.execute_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let result = self.insert_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn batch(
        &self,
        _cx: &Cx,
        statements: &[(String, Vec<Value>)],
    ) -> impl Future<Output = Outcome<Vec<u64>, Error>> + Send {
        let result = statements
            .iter()
            .map(|(sql, params)| self.execute_sync(sql, params))
            .collect::<Result<Vec<_>, _>>();
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn ping(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = self.query_sync("SELECT 1", &[]).map(|_| ());
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    async fn close(self, _cx: &Cx) -> ormkit_core::Result<()> {
        // The handle closes when the last clone drops
        Ok(())
    }
}

fn execute_locked(inner: &SqliteInner, sql: &str, params: &[Value]) -> Result<u64, Error> {
    let stmt = prepare_stmt(inner.db, sql)?;
    bind_params(inner.db, stmt, sql, params)?;

    // SAFETY: stmt is valid
    let rc = unsafe { ffi::sqlite3_step(stmt) };
    // SAFETY: stmt is valid
    unsafe { ffi::sqlite3_finalize(stmt) };

    match rc {
        ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
            // SAFETY: db is valid
            let changes = unsafe { ffi::sqlite3_changes(inner.db) };
            Ok(u64::try_from(changes).unwrap_or(0))
        }
        _ => Err(step_error(inner.db, sql)),
    }
}

fn bind_params(
    db: *mut ffi::sqlite3,
    stmt: *mut ffi::sqlite3_stmt,
    sql: &str,
    params: &[Value],
) -> Result<(), Error> {
    for (i, param) in params.iter().enumerate() {
        // SAFETY: stmt is valid, index is 1-based
        let rc = unsafe { types::bind_value(stmt, (i + 1) as c_int, param) };
        if rc != ffi::SQLITE_OK {
            // SAFETY: stmt is valid
            unsafe { ffi::sqlite3_finalize(stmt) };
            let msg = last_error_message(db);
            return Err(Error::Database(
                DatabaseError::new(
                    DatabaseErrorKind::Database,
                    format!("Failed to bind parameter {}: {}", i + 1, msg),
                )
                .with_sql(sql),
            ));
        }
    }
    Ok(())
}

fn prepare_stmt(db: *mut ffi::sqlite3, sql: &str) -> Result<*mut ffi::sqlite3_stmt, Error> {
    let c_sql = CString::new(sql).map_err(|_| null_byte_error(sql))?;
    let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();

    // SAFETY: all pointers are valid
    let rc = unsafe {
        ffi::sqlite3_prepare_v2(
            db,
            c_sql.as_ptr(),
            c_sql.as_bytes().len() as c_int,
            &mut stmt,
            ptr::null_mut(),
        )
    };

    if rc != ffi::SQLITE_OK {
        // Prepare failures are mostly parse errors
        let code = unsafe { ffi::sqlite3_errcode(db) };
        let kind = match error_code_to_kind(code) {
            DatabaseErrorKind::Database => DatabaseErrorKind::Syntax,
            other => other,
        };
        return Err(Error::Database(
            DatabaseError::new(kind, last_error_message(db)).with_sql(sql),
        ));
    }
    Ok(stmt)
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let code = unsafe { ffi::sqlite3_errcode(db) };
    Error::Database(DatabaseError::new(error_code_to_kind(code), last_error_message(db)).with_sql(sql))
}

fn last_error_message(db: *mut ffi::sqlite3) -> String {
    // SAFETY: db is valid; errmsg never returns null for a live handle
    unsafe { CStr::from_ptr(ffi::sqlite3_errmsg(db)).to_string_lossy().into_owned() }
}

fn error_string(code: c_int) -> String {
    // SAFETY: errstr returns a static string
    unsafe { CStr::from_ptr(ffi::sqlite3_errstr(code)).to_string_lossy().into_owned() }
}

fn error_code_to_kind(code: c_int) -> DatabaseErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => DatabaseErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => DatabaseErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH | ffi::SQLITE_READONLY => DatabaseErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => DatabaseErrorKind::NotFound,
        _ => DatabaseErrorKind::Database,
    }
}

fn connect_error(message: String) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Connect,
        message,
        source: None,
    })
}

fn null_byte_error(sql: &str) -> Error {
    Error::Database(
        DatabaseError::new(DatabaseErrorKind::Syntax, "SQL contains null byte").with_sql(sql),
    )
}
