use imgvfs::{FsError, FsResult};

use crate::block::ImageDevice;
use crate::bytes::{read_u16, read_u32, write_u16, write_u32};
use crate::dirent::DIR_ENTRY_SIZE;
use crate::fat::FAT_ENTRY_SIZE;

/// Length of the opaque filesystem identifier that precedes the superblock.
pub const FS_ID_LEN: usize = 8;
pub const SUPERBLOCK_OFFSET: u64 = FS_ID_LEN as u64;
pub const SUPERBLOCK_SIZE: usize = 22;

const SB_BLOCK_SIZE_OFFSET: usize = 0;
const SB_BLOCK_COUNT_OFFSET: usize = 2;
const SB_FAT_START_OFFSET: usize = 6;
const SB_FAT_BLOCKS_OFFSET: usize = 10;
const SB_ROOT_START_OFFSET: usize = 14;
const SB_ROOT_BLOCKS_OFFSET: usize = 18;

/// Image geometry. Loaded once per session and never modified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Superblock {
    pub block_size: u16,
    pub block_count: u32,
    pub fat_start: u32,
    pub fat_blocks: u32,
    pub root_start: u32,
    pub root_blocks: u32,
}

impl Superblock {
    pub fn parse(buf: &[u8]) -> FsResult<Self> {
        if buf.len() < SUPERBLOCK_SIZE {
            return Err(FsError::format(format!(
                "superblock needs {SUPERBLOCK_SIZE} bytes, got {}",
                buf.len()
            )));
        }
        let sb = Self {
            block_size: read_u16(buf, SB_BLOCK_SIZE_OFFSET),
            block_count: read_u32(buf, SB_BLOCK_COUNT_OFFSET),
            fat_start: read_u32(buf, SB_FAT_START_OFFSET),
            fat_blocks: read_u32(buf, SB_FAT_BLOCKS_OFFSET),
            root_start: read_u32(buf, SB_ROOT_START_OFFSET),
            root_blocks: read_u32(buf, SB_ROOT_BLOCKS_OFFSET),
        };
        let block_size = sb.block_size as usize;
        if block_size < DIR_ENTRY_SIZE || block_size % FAT_ENTRY_SIZE != 0 {
            return Err(FsError::format(format!("unusable block size {block_size}")));
        }
        if sb.block_count == 0 || sb.fat_blocks == 0 {
            return Err(FsError::format("image has no blocks or no FAT"));
        }
        Ok(sb)
    }

    /// Seek past the identifier and decode the header.
    pub fn read(device: &dyn ImageDevice) -> FsResult<Self> {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        device.read_at(SUPERBLOCK_OFFSET, &mut buf)?;
        Self::parse(&buf)
    }

    pub fn encode(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        write_u16(&mut buf, SB_BLOCK_SIZE_OFFSET, self.block_size);
        write_u32(&mut buf, SB_BLOCK_COUNT_OFFSET, self.block_count);
        write_u32(&mut buf, SB_FAT_START_OFFSET, self.fat_start);
        write_u32(&mut buf, SB_FAT_BLOCKS_OFFSET, self.fat_blocks);
        write_u32(&mut buf, SB_ROOT_START_OFFSET, self.root_start);
        write_u32(&mut buf, SB_ROOT_BLOCKS_OFFSET, self.root_blocks);
        buf
    }

    pub fn block_size(&self) -> usize {
        self.block_size as usize
    }

    /// Number of 4-byte entries the FAT region holds.
    pub fn fat_entry_count(&self) -> u32 {
        (self.fat_blocks as u64 * self.block_size as u64 / FAT_ENTRY_SIZE as u64) as u32
    }

    /// Blocks that both exist in the image and have a FAT entry.
    pub fn allocatable_blocks(&self) -> u32 {
        self.fat_entry_count().min(self.block_count)
    }

    pub fn entries_per_block(&self) -> usize {
        self.block_size() / DIR_ENTRY_SIZE
    }

    pub fn fat_offset(&self) -> u64 {
        self.fat_start as u64 * self.block_size as u64
    }
}
