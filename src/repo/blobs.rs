//! Blob metadata: which digests we hold, and how big their contents are.

use rusqlite::Connection;

use super::address_column;
use crate::error::{Error, Result};
use crate::hashing::Address;

/// One row of the `Blob` table. Inserted once per unique digest, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobInfo {
    pub address: Address,
    pub size_bytes: u64,
}

pub struct BlobInfoRepository<'c> {
    conn: &'c Connection,
}

impl<'c> BlobInfoRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Records a new blob. The caller is expected to have checked
    /// [`find`](Self::find) first; a duplicate insert is an error.
    pub fn add(&self, info: &BlobInfo) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO Blob (Address, SizeBytes) VALUES (?1, ?2)")?;
        match stmt.execute((info.address.as_bytes(), info.size_bytes as i64)) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::DuplicateBlob(info.address))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn find(&self, address: &Address) -> Result<Option<BlobInfo>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT SizeBytes FROM Blob WHERE Address = ?1")?;
        let size: Option<i64> = stmt
            .query_row([address.as_bytes()], |r| r.get(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(e),
            })?;
        Ok(size.map(|s| BlobInfo {
            address: *address,
            size_bytes: s as u64,
        }))
    }

    pub fn all(&self) -> Result<Vec<BlobInfo>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT Address, SizeBytes FROM Blob")?;
        let rows = stmt.query_map((), |r| {
            let address: Vec<u8> = r.get(0)?;
            let size: i64 = r.get(1)?;
            Ok(BlobInfo {
                address: address_column(0, &address)?,
                size_bytes: size as u64,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
