//! Datum
//!
//! Length-tagged byte record passed across the engine boundary.
//!
//! Keys and values are opaque bytes with an explicit length; nothing here
//! relies on NUL termination, so embedded zero bytes survive the trip.
//! A `Datum` handed back by an engine owns its buffer, which is released
//! when the datum is dropped or converted.

use std::fmt;
use std::ops::Deref;
use std::string::FromUtf8Error;

use bytes::Bytes;

/// An owned, immutable byte record
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Datum(Bytes);

impl Datum {
    /// Copy a borrowed slice into a new datum
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(data))
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert into an owned byte vector
    pub fn into_vec(self) -> Vec<u8> {
        Vec::from(self.0)
    }

    /// Convert into a `String`, failing on invalid UTF-8
    pub fn into_string(self) -> Result<String, FromUtf8Error> {
        String::from_utf8(self.into_vec())
    }
}

impl Deref for Datum {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Datum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Datum {
    fn from(data: Vec<u8>) -> Self {
        Self(Bytes::from(data))
    }
}

impl From<&[u8]> for Datum {
    fn from(data: &[u8]) -> Self {
        Self::copy_from_slice(data)
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Self::copy_from_slice(s.as_bytes())
    }
}

impl From<Datum> for Vec<u8> {
    fn from(datum: Datum) -> Self {
        datum.into_vec()
    }
}

impl fmt::Debug for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "Datum({:?})", s),
            Err(_) => write!(f, "Datum({:?})", self.0.as_ref()),
        }
    }
}
