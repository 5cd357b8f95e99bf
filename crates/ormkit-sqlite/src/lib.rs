//! SQLite driver for ormkit.
//!
// FFI bindings require unsafe code
#![allow(unsafe_code)]
//!
//! Implements the `Connection` trait from ormkit-core on top of
//! `libsqlite3-sys`, plus the connection manager that keys connections by
//! uuid and shares a single in-memory database.
//!
//! # Example
//!
//! ```rust,ignore
//! use ormkit_sqlite::SqliteConnection;
//! use ormkit_core::{Connection, Cx, Outcome, Value};
//!
//! let conn = SqliteConnection::open_memory()?;
//! conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//! let cx = Cx::for_testing();
//! if let Outcome::Ok(id) = conn.insert(&cx, "INSERT INTO users (name) VALUES (?)", &[Value::Text("Alice".into())]).await {
//!     tracing::info!(id, "inserted");
//! }
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite storage |
//! |-------|----------------|
//! | `Bool`, `SmallInt`, `Int`, `BigInt` | INTEGER |
//! | `Float`, `Double` | REAL |
//! | `Text`, `Decimal`, `Date`, `Time`, `Timestamp`, `Uuid` | TEXT |
//! | `Json`, `Array` | TEXT (JSON) |
//! | `Bytes` | BLOB |
//! | `Null`, `Default` | NULL |
//!
//! INTEGER columns always read back as `BigInt`.

pub mod connection;
pub mod manager;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};
pub use manager::{DEFAULT_UUID, SqliteConnectionManager};

/// Version string of the linked SQLite library.
pub fn sqlite_version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a static NUL-terminated string
    unsafe { std::ffi::CStr::from_ptr(libsqlite3_sys::sqlite3_libversion()) }
        .to_str()
        .unwrap_or("")
}

/// Numeric version of the linked SQLite library.
pub fn sqlite_version_number() -> i32 {
    // SAFETY: no preconditions
    unsafe { libsqlite3_sys::sqlite3_libversion_number() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_version() {
        let version = sqlite_version();
        assert!(version.starts_with('3'), "Expected SQLite 3.x, got {}", version);
        assert!(sqlite_version_number() >= 3_000_000);
    }
}
