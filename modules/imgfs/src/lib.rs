//! Engine for FAT-style disk images: a big-endian superblock, a flat table
//! of block links and 64-byte directory entries.

pub mod block;
mod bytes;
pub mod dir;
pub mod dirent;
pub mod fat;
pub mod fs;
pub mod path;
pub mod superblock;
#[cfg(any(test, feature = "test-image"))]
pub mod testimg;
pub mod transfer;

pub use block::{BlockId, FileImage, ImageDevice, MemImage};
pub use dirent::{DirEntry, Timestamp};
pub use fat::FatStats;
pub use fs::{FsInfo, ImageFs};
pub use imgvfs::{FileType, FsError, FsResult, MAX_NAME_LEN};
pub use superblock::Superblock;
