//! Moving file bytes in and out of block chains.

use std::io::Write;

use imgvfs::{FsError, FsResult};
use log::warn;

use crate::block::BlockId;
use crate::fat::Fat;

/// Stream up to `byte_length` bytes of the chain at `first_block` into `out`.
///
/// Stops early at the terminator; returns the number of bytes copied.
pub fn copy_chain<W: Write>(
    fat: &Fat<'_>,
    first_block: BlockId,
    byte_length: u64,
    out: &mut W,
) -> FsResult<u64> {
    let block_size = fat.superblock().block_size();
    let mut scratch = vec![0u8; block_size];
    let mut remaining = byte_length;
    let mut chain = fat.chain(first_block);
    while remaining > 0 {
        let block = match chain.next() {
            Some(block) => block?,
            None => {
                warn!(
                    "chain at block {first_block} ended {remaining} bytes short of {byte_length}"
                );
                break;
            }
        };
        let take = remaining.min(block_size as u64) as usize;
        fat.io().read_in_block(block, 0, &mut scratch[..take])?;
        out.write_all(&scratch[..take])?;
        remaining -= take as u64;
    }
    Ok(byte_length - remaining)
}

pub fn read_chain(fat: &Fat<'_>, first_block: BlockId, byte_length: u64) -> FsResult<Vec<u8>> {
    let mut data = Vec::with_capacity(byte_length as usize);
    copy_chain(fat, first_block, byte_length, &mut data)?;
    Ok(data)
}

/// Write `data` across an already allocated chain, one block-sized slice
/// per block. The last slice may be short; the rest of that block is left
/// as it was.
pub fn write_chain(fat: &Fat<'_>, first_block: BlockId, data: &[u8]) -> FsResult<()> {
    let block_size = fat.superblock().block_size();
    let mut chain = fat.chain(first_block);
    for (idx, slice) in data.chunks(block_size).enumerate() {
        let block = chain.next().ok_or_else(|| {
            FsError::format(format!(
                "chain at block {first_block} has only {idx} blocks for {} bytes",
                data.len()
            ))
        })??;
        fat.write_block_bytes(block, slice)?;
    }
    Ok(())
}
