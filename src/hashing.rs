//! Content addresses: every blob is named by the SHA-1 of its bytes.

use std::fmt;

use data_encoding::HEXLOWER;
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// Length of an [`Address`] in bytes.
pub const ADDRESS_LEN: usize = 20;

/// The content digest used to identify all blobs in our system.
///
/// Serialized as 40 lowercase hex characters; ordered bytewise.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Address {
    digest: [u8; ADDRESS_LEN],
}

impl Address {
    /// Calculates the address of the given bytes
    pub fn from_contents(bytes: &[u8]) -> Self {
        Self {
            digest: Sha1::digest(bytes).into(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let digest: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| Error::InvalidAddress(HEXLOWER.encode(bytes)))?;
        Ok(Self { digest })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.digest
    }

    /// Gets a git-like shortened version of the address that's unique enough
    /// for most UI uses.
    pub fn short_name(&self) -> String {
        let mut full = format!("{self}");
        let _rest = full.split_off(8);
        full
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ digest: {} }}", HEXLOWER.encode(&self.digest))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.digest))
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = HEXLOWER
            .decode(s.as_bytes())
            .map_err(|_| Error::InvalidAddress(s.to_owned()))?;
        Self::from_bytes(&bytes)
    }
}
