//! Shared vocabulary for the image filesystem: error kinds and entry types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Longest name a directory entry can hold, in bytes.
pub const MAX_NAME_LEN: usize = 31;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("cannot open image {}: {source}", .path.display())]
    ImageOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed image: {0}")]
    Format(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("no free blocks left in the image")]
    AllocationExhausted,
    #[error("cannot open source file {}: {source}", .path.display())]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("block chain is corrupt at block {block}")]
    CorruptChain { block: u32 },
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("invalid entry name {0:?}")]
    InvalidName(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FsError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// True for the error kinds produced by a missing path or file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type FsResult<T> = Result<T, FsError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    File,
    Dir,
}

impl FileType {
    /// Single-letter tag used in directory listings.
    pub fn tag(self) -> char {
        match self {
            Self::File => 'F',
            Self::Dir => 'D',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_subject() {
        let err = FsError::not_found("/a/b");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "/a/b not found");
        let err = FsError::CorruptChain { block: 7 };
        assert_eq!(err.to_string(), "block chain is corrupt at block 7");
    }

    #[test]
    fn io_errors_convert() {
        let io = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        let err: FsError = io.into();
        assert!(matches!(err, FsError::Io(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn file_type_tags() {
        assert_eq!(FileType::File.tag(), 'F');
        assert_eq!(FileType::Dir.tag(), 'D');
    }
}
