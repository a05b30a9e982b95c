//! Directory entry codec.
//!
//! Layout of one 64-byte record (multi-byte fields big-endian):
//!
//! | offset | field          | width |
//! |--------|----------------|-------|
//! | 0      | status         | 1     |
//! | 1      | starting block | 4     |
//! | 5      | block count    | 4     |
//! | 9      | size           | 4     |
//! | 13     | created        | 7     |
//! | 20     | modified       | 7     |
//! | 27     | name           | 31    |
//! | 58     | reserved       | 6     |

use core::fmt;

use imgvfs::{FileType, FsError, FsResult, MAX_NAME_LEN};
use time::OffsetDateTime;

use crate::bytes::{read_u16, read_u32, write_u16, write_u32};

pub const DIR_ENTRY_SIZE: usize = 64;
pub const STATUS_FREE: u8 = 0x00;
pub const STATUS_FILE: u8 = 1 << 1;
pub const STATUS_DIR: u8 = 1 << 2;
pub const TIMESTAMP_LEN: usize = 7;

const DE_STATUS_OFFSET: usize = 0;
const DE_START_OFFSET: usize = 1;
const DE_BLOCKS_OFFSET: usize = 5;
const DE_SIZE_OFFSET: usize = 9;
const DE_CREATED_OFFSET: usize = 13;
const DE_MODIFIED_OFFSET: usize = 20;
const DE_NAME_OFFSET: usize = 27;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    pub fn decode(raw: &[u8]) -> Self {
        Self {
            year: read_u16(raw, 0),
            month: raw[2],
            day: raw[3],
            hour: raw[4],
            minute: raw[5],
            second: raw[6],
        }
    }

    pub fn encode(&self) -> [u8; TIMESTAMP_LEN] {
        let mut raw = [0u8; TIMESTAMP_LEN];
        write_u16(&mut raw, 0, self.year);
        raw[2] = self.month;
        raw[3] = self.day;
        raw[4] = self.hour;
        raw[5] = self.minute;
        raw[6] = self.second;
        raw
    }

    /// Current local time, or UTC when the local offset cannot be determined.
    pub fn now() -> Self {
        OffsetDateTime::now_local()
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
            .into()
    }

    pub fn now_utc() -> Self {
        OffsetDateTime::now_utc().into()
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(dt: OffsetDateTime) -> Self {
        Self {
            year: dt.year().clamp(0, u16::MAX as i32) as u16,
            month: u8::from(dt.month()),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}/{:02}/{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub status: u8,
    pub starting_block: u32,
    /// Advisory only; traversal follows the FAT.
    pub block_count: u32,
    pub size: u32,
    pub created: Timestamp,
    pub modified: Timestamp,
    pub name: String,
}

/// Reject names a directory entry cannot hold or a path cannot address.
/// Trailing spaces are padding on disk, so a name ending in one would not
/// decode back to itself.
pub fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty()
        || name.len() > MAX_NAME_LEN
        || name.contains(['/', '\0'])
        || name.ends_with(' ')
        || name == "."
        || name == ".."
    {
        return Err(FsError::InvalidName(name.to_owned()));
    }
    Ok(())
}

/// Strip the space/zero padding from a raw name field.
fn trim_name(raw: &[u8]) -> &[u8] {
    let raw = match raw.iter().position(|&b| b == 0) {
        Some(nul) => &raw[..nul],
        None => raw,
    };
    let end = raw
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(0, |idx| idx + 1);
    &raw[..end]
}

impl DirEntry {
    pub fn new_file(
        name: &str,
        starting_block: u32,
        block_count: u32,
        size: u32,
        now: Timestamp,
    ) -> FsResult<Self> {
        validate_name(name)?;
        Ok(Self {
            status: STATUS_FILE,
            starting_block,
            block_count,
            size,
            created: now,
            modified: now,
            name: name.to_owned(),
        })
    }

    pub fn new_dir(name: &str, starting_block: u32, now: Timestamp) -> FsResult<Self> {
        validate_name(name)?;
        Ok(Self {
            status: STATUS_DIR,
            starting_block,
            block_count: 1,
            size: 0,
            created: now,
            modified: now,
            name: name.to_owned(),
        })
    }

    pub fn decode(buf: &[u8]) -> FsResult<Self> {
        if buf.len() < DIR_ENTRY_SIZE {
            return Err(FsError::format(format!(
                "directory entry needs {DIR_ENTRY_SIZE} bytes, got {}",
                buf.len()
            )));
        }
        let name = trim_name(&buf[DE_NAME_OFFSET..DE_NAME_OFFSET + MAX_NAME_LEN]);
        Ok(Self {
            status: buf[DE_STATUS_OFFSET],
            starting_block: read_u32(buf, DE_START_OFFSET),
            block_count: read_u32(buf, DE_BLOCKS_OFFSET),
            size: read_u32(buf, DE_SIZE_OFFSET),
            created: Timestamp::decode(&buf[DE_CREATED_OFFSET..]),
            modified: Timestamp::decode(&buf[DE_MODIFIED_OFFSET..]),
            name: String::from_utf8_lossy(name).into_owned(),
        })
    }

    pub fn encode(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut buf = [0u8; DIR_ENTRY_SIZE];
        buf[DE_STATUS_OFFSET] = self.status;
        write_u32(&mut buf, DE_START_OFFSET, self.starting_block);
        write_u32(&mut buf, DE_BLOCKS_OFFSET, self.block_count);
        write_u32(&mut buf, DE_SIZE_OFFSET, self.size);
        buf[DE_CREATED_OFFSET..DE_CREATED_OFFSET + TIMESTAMP_LEN]
            .copy_from_slice(&self.created.encode());
        buf[DE_MODIFIED_OFFSET..DE_MODIFIED_OFFSET + TIMESTAMP_LEN]
            .copy_from_slice(&self.modified.encode());
        for (idx, byte) in self.name.bytes().take(MAX_NAME_LEN).enumerate() {
            buf[DE_NAME_OFFSET + idx] = byte;
        }
        buf
    }

    pub fn is_unused(&self) -> bool {
        self.status == STATUS_FREE
    }

    pub fn is_file(&self) -> bool {
        self.status & STATUS_FILE != 0
    }

    pub fn is_directory(&self) -> bool {
        self.status & STATUS_DIR != 0
    }

    /// Listing type: anything without the file bit shows as a directory.
    pub fn file_type(&self) -> FileType {
        if self.is_file() {
            FileType::File
        } else {
            FileType::Dir
        }
    }

    pub fn is_kind(&self, kind: FileType) -> bool {
        match kind {
            FileType::File => self.is_file(),
            FileType::Dir => self.is_directory(),
        }
    }

    /// Exact match against the padding-stripped stored name.
    pub fn name_matches(&self, name: &str) -> bool {
        self.name == name
    }
}

/// Status byte of a raw slot, without decoding the rest.
pub(crate) fn slot_status(raw: &[u8]) -> u8 {
    raw[DE_STATUS_OFFSET]
}
