//! Repositories over the backup database tables.
//!
//! Each repository is a thin borrow of the unit of work's connection;
//! rusqlite's statement cache keeps re-prepared queries cheap.

use rusqlite::types::Type;
use uuid::Uuid;

use crate::event::{FileEventAction, FileType, RunEventAction};
use crate::hashing::Address;

pub mod blobs;
pub mod events;
pub mod paths;
pub mod runs;

// Column decoding helpers shared by the row mappers below.
// Anything malformed is surfaced as a conversion failure on that column
// rather than a panic; the database is the source of truth, not trusted input.

pub(crate) fn address_column(idx: usize, bytes: &[u8]) -> rusqlite::Result<Address> {
    Address::from_bytes(bytes)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e)))
}

pub(crate) fn uuid_column(idx: usize, bytes: &[u8]) -> rusqlite::Result<Uuid> {
    Uuid::from_slice(bytes)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e)))
}

pub(crate) fn action_column(idx: usize, value: i64) -> rusqlite::Result<FileEventAction> {
    FileEventAction::from_i64(value)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

pub(crate) fn file_type_column(idx: usize, value: i64) -> rusqlite::Result<FileType> {
    FileType::from_i64(value).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

pub(crate) fn run_action_column(idx: usize, value: i64) -> rusqlite::Result<RunEventAction> {
    RunEventAction::from_i64(value).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

/// Renders `items` as a SQL set literal, e.g. `(0, 1, 2)`.
pub(crate) fn set_literal<T, F: Fn(&T) -> String>(items: impl IntoIterator<Item = T>, render: F) -> String {
    let mut out = String::from("(");
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&render(&item));
    }
    out.push(')');
    out
}

/// Renders a uuid as a SQLite blob literal (`X'...'`, dashless hex).
pub(crate) fn uuid_literal(id: &Uuid) -> String {
    format!("X'{}'", id.simple())
}
