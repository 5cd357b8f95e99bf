//! Value binding and column decoding.
//!
//! SQLite has five storage classes: INTEGER, REAL, TEXT, BLOB and NULL.
//! Every [`Value`] is bound as one of them; string-backed variants (dates,
//! times, UUIDs, decimals) travel as TEXT and JSON or arrays as JSON text.

use libsqlite3_sys as ffi;
use ormkit_core::Value;
use std::ffi::{CStr, c_int};

fn bind_text(stmt: *mut ffi::sqlite3_stmt, index: c_int, text: &str) -> c_int {
    let bytes = text.as_bytes();
    // SAFETY: SQLITE_TRANSIENT makes SQLite copy the bytes before returning
    unsafe {
        ffi::sqlite3_bind_text(
            stmt,
            index,
            bytes.as_ptr().cast(),
            bytes.len() as c_int,
            ffi::SQLITE_TRANSIENT(),
        )
    }
}

/// Bind a value to a 1-based parameter.
///
/// # Safety
/// `stmt` must be a valid prepared statement and `index` a parameter index
/// within its parameter count.
pub unsafe fn bind_value(stmt: *mut ffi::sqlite3_stmt, index: c_int, value: &Value) -> c_int {
    match value {
        // SAFETY: caller guarantees a valid statement
        Value::Null | Value::Default => unsafe { ffi::sqlite3_bind_null(stmt, index) },
        Value::Bool(b) => unsafe { ffi::sqlite3_bind_int(stmt, index, c_int::from(*b)) },
        Value::SmallInt(v) => unsafe { ffi::sqlite3_bind_int(stmt, index, c_int::from(*v)) },
        Value::Int(v) => unsafe { ffi::sqlite3_bind_int(stmt, index, *v) },
        Value::BigInt(v) => unsafe { ffi::sqlite3_bind_int64(stmt, index, *v) },
        Value::Float(v) => unsafe { ffi::sqlite3_bind_double(stmt, index, f64::from(*v)) },
        Value::Double(v) => unsafe { ffi::sqlite3_bind_double(stmt, index, *v) },
        Value::Decimal(s)
        | Value::Text(s)
        | Value::Date(s)
        | Value::Time(s)
        | Value::Timestamp(s)
        | Value::Uuid(s) => bind_text(stmt, index, s),
        Value::Bytes(b) => unsafe {
            ffi::sqlite3_bind_blob(
                stmt,
                index,
                b.as_ptr().cast(),
                b.len() as c_int,
                ffi::SQLITE_TRANSIENT(),
            )
        },
        Value::Json(json) => bind_text(stmt, index, &json.to_string()),
        Value::Array(items) => {
            let json = serde_json::Value::Array(items.iter().map(value_to_json).collect());
            bind_text(stmt, index, &json.to_string())
        }
    }
}

/// Decode one column of the current row.
///
/// # Safety
/// `stmt` must have just returned `SQLITE_ROW` and `index` must be below its
/// column count.
pub unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Value {
    // SAFETY: caller guarantees a row is available
    unsafe {
        match ffi::sqlite3_column_type(stmt, index) {
            ffi::SQLITE_INTEGER => Value::BigInt(ffi::sqlite3_column_int64(stmt, index)),
            ffi::SQLITE_FLOAT => Value::Double(ffi::sqlite3_column_double(stmt, index)),
            ffi::SQLITE_TEXT => {
                let ptr = ffi::sqlite3_column_text(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                if ptr.is_null() {
                    Value::Null
                } else {
                    let slice = std::slice::from_raw_parts(ptr, len as usize);
                    Value::Text(String::from_utf8_lossy(slice).into_owned())
                }
            }
            ffi::SQLITE_BLOB => {
                let ptr = ffi::sqlite3_column_blob(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                if ptr.is_null() || len == 0 {
                    Value::Bytes(Vec::new())
                } else {
                    Value::Bytes(std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize).to_vec())
                }
            }
            _ => Value::Null,
        }
    }
}

/// Name of a result column.
///
/// # Safety
/// `stmt` must be a valid prepared statement.
pub unsafe fn column_name(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    // SAFETY: caller guarantees a valid statement; SQLite owns the string
    unsafe {
        let ptr = ffi::sqlite3_column_name(stmt, index);
        if ptr.is_null() {
            None
        } else {
            CStr::from_ptr(ptr).to_str().ok().map(String::from)
        }
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null | Value::Default => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::SmallInt(v) => serde_json::Value::from(*v),
        Value::Int(v) => serde_json::Value::from(*v),
        Value::BigInt(v) => serde_json::Value::from(*v),
        Value::Float(v) => serde_json::Value::from(f64::from(*v)),
        Value::Double(v) => serde_json::Value::from(*v),
        Value::Decimal(s)
        | Value::Text(s)
        | Value::Date(s)
        | Value::Time(s)
        | Value::Timestamp(s)
        | Value::Uuid(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::Array(b.iter().map(|&x| serde_json::Value::from(x)).collect()),
        Value::Json(j) => j.clone(),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
    }
}
