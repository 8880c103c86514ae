//! Error type shared by the fallible map operations.

use core::fmt;

/// Errors returned by the fallible [`HashMap`](crate::HashMap) operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The requested key is not present in the map.
    KeyNotFound,
    /// [`try_insert`](crate::HashMap::try_insert) was called with a key that
    /// is already present.
    DuplicateKey,
    /// A [`Cursor`](crate::Cursor) was advanced after the map underwent a
    /// structural change (new key, removal, growth, or clear).
    Invalidated,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Error::KeyNotFound => "key not found",
            Error::DuplicateKey => "key already present",
            Error::Invalidated => "cursor invalidated by a structural change",
        };
        f.write_str(text)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
