//! FAT accessor: single-entry link I/O, free-block allocation and chain walking.
//!
//! Nothing is cached. Every call goes back to the image, so the table seen by
//! one operation always reflects the writes of the previous one.

use imgvfs::{FsError, FsResult};
use log::{debug, trace, warn};

use crate::block::{BlockId, BlockIo, ImageDevice};
use crate::bytes::{read_u32, write_u32};
use crate::superblock::Superblock;

pub const FAT_ENTRY_SIZE: usize = 4;
pub const FAT_FREE: u32 = 0;
pub const FAT_RESERVED: u32 = 1;
pub const FAT_EOF: u32 = 0xffff_ffff;

/// Allocation state of every entry in the table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FatStats {
    pub free: u32,
    pub reserved: u32,
    pub allocated: u32,
}

impl FatStats {
    pub fn total(&self) -> u32 {
        self.free + self.reserved + self.allocated
    }
}

pub struct Fat<'a> {
    io: BlockIo<'a>,
    sb: Superblock,
}

impl<'a> Fat<'a> {
    pub fn new(device: &'a dyn ImageDevice, sb: Superblock) -> Self {
        Self {
            io: BlockIo::new(device, sb.block_size()),
            sb,
        }
    }

    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    pub fn io(&self) -> &BlockIo<'a> {
        &self.io
    }

    fn entry_offset(&self, block: BlockId) -> FsResult<u64> {
        if block >= self.sb.fat_entry_count() {
            return Err(FsError::format(format!("block {block} has no FAT entry")));
        }
        Ok(self.sb.fat_offset() + block as u64 * FAT_ENTRY_SIZE as u64)
    }

    pub fn read_link(&self, block: BlockId) -> FsResult<u32> {
        let mut raw = [0u8; FAT_ENTRY_SIZE];
        self.io.read_at(self.entry_offset(block)?, &mut raw)?;
        Ok(read_u32(&raw, 0))
    }

    pub fn write_link(&self, block: BlockId, value: u32) -> FsResult<()> {
        let mut raw = [0u8; FAT_ENTRY_SIZE];
        write_u32(&mut raw, 0, value);
        self.io.write_at(self.entry_offset(block)?, &raw)
    }

    /// Claim the lowest-numbered free block and terminate it.
    pub fn allocate_block(&self) -> FsResult<BlockId> {
        let block_size = self.sb.block_size();
        let per_block = (block_size / FAT_ENTRY_SIZE) as u32;
        let limit = self.sb.allocatable_blocks();
        let mut scratch = vec![0u8; block_size];
        for fat_index in 0..self.sb.fat_blocks {
            let base = fat_index * per_block;
            if base >= limit {
                break;
            }
            self.io.read_block(self.sb.fat_start + fat_index, &mut scratch)?;
            for slot in 0..per_block {
                let block = base + slot;
                if block >= limit {
                    break;
                }
                if read_u32(&scratch, slot as usize * FAT_ENTRY_SIZE) == FAT_FREE {
                    self.write_link(block, FAT_EOF)?;
                    debug!("allocated block {block}");
                    return Ok(block);
                }
            }
        }
        Err(FsError::AllocationExhausted)
    }

    /// Number of blocks needed to hold `byte_length` bytes.
    pub fn blocks_for(&self, byte_length: u64) -> u64 {
        byte_length.div_ceil(self.sb.block_size as u64)
    }

    /// Allocate and link enough blocks for `byte_length` bytes.
    ///
    /// Returns the first block, or `FAT_EOF` for an empty chain. If the
    /// table runs out part way, the blocks claimed so far stay allocated.
    pub fn allocate_chain(&self, byte_length: u64) -> FsResult<BlockId> {
        let needed = self.blocks_for(byte_length);
        if needed == 0 {
            return Ok(FAT_EOF);
        }
        let first = self.allocate_block()?;
        let mut tail = first;
        for _ in 1..needed {
            let next = self.allocate_block()?;
            self.write_link(tail, next)?;
            tail = next;
        }
        debug!("allocated {needed}-block chain starting at {first}");
        Ok(first)
    }

    /// Walk the chain that starts at `first`.
    pub fn chain(&self, first: BlockId) -> Chain<'_, 'a> {
        let cursor = if first == FAT_EOF {
            Cursor::End
        } else if first >= self.sb.allocatable_blocks() {
            Cursor::Corrupt(first)
        } else {
            Cursor::Next(first)
        };
        Chain {
            fat: self,
            cursor,
            steps: 0,
        }
    }

    /// Classify every entry in the table.
    pub fn stats(&self) -> FsResult<FatStats> {
        let block_size = self.sb.block_size();
        let mut stats = FatStats::default();
        let mut scratch = vec![0u8; block_size];
        for fat_index in 0..self.sb.fat_blocks {
            self.io.read_block(self.sb.fat_start + fat_index, &mut scratch)?;
            for raw in scratch.chunks_exact(FAT_ENTRY_SIZE) {
                match read_u32(raw, 0) {
                    FAT_FREE => stats.free += 1,
                    FAT_RESERVED => stats.reserved += 1,
                    _ => stats.allocated += 1,
                }
            }
        }
        Ok(stats)
    }

    pub(crate) fn write_block_bytes(&self, block: BlockId, data: &[u8]) -> FsResult<()> {
        self.io.write_in_block(block, 0, data)
    }

    pub(crate) fn zero_block(&self, block: BlockId) -> FsResult<()> {
        let zero = vec![0u8; self.sb.block_size()];
        self.io.write_block(block, &zero)
    }
}

#[derive(Clone, Copy, Debug)]
enum Cursor {
    Next(BlockId),
    Corrupt(BlockId),
    End,
}

/// Lazy walk over the blocks of one chain.
///
/// Ends at the terminator. A link to a free or reserved entry, a link past
/// the table, or more steps than the image has blocks yields one
/// `CorruptChain` error and ends the walk.
pub struct Chain<'f, 'a> {
    fat: &'f Fat<'a>,
    cursor: Cursor,
    steps: u32,
}

impl Iterator for Chain<'_, '_> {
    type Item = FsResult<BlockId>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor {
            Cursor::End => None,
            Cursor::Corrupt(block) => {
                self.cursor = Cursor::End;
                warn!("corrupt chain at block {block} after {} steps", self.steps);
                Some(Err(FsError::CorruptChain { block }))
            }
            Cursor::Next(block) => {
                let limit = self.fat.sb.allocatable_blocks();
                if self.steps >= limit {
                    self.cursor = Cursor::Corrupt(block);
                    return self.next();
                }
                let link = match self.fat.read_link(block) {
                    Ok(link) => link,
                    Err(err) => {
                        self.cursor = Cursor::End;
                        return Some(Err(err));
                    }
                };
                trace!("chain step {}: {block} -> {link:#x}", self.steps);
                self.steps += 1;
                self.cursor = if link == FAT_EOF {
                    Cursor::End
                } else if link <= FAT_RESERVED || link >= limit {
                    Cursor::Corrupt(block)
                } else {
                    Cursor::Next(link)
                };
                Some(Ok(block))
            }
        }
    }
}
