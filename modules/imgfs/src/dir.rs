//! Directory scanning and the directory writer.

use imgvfs::{FileType, FsError, FsResult};
use log::debug;

use crate::block::BlockId;
use crate::dirent::{slot_status, DirEntry, DIR_ENTRY_SIZE, STATUS_FREE};
use crate::fat::Fat;

/// Position of one entry slot on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotRef {
    pub block: BlockId,
    pub index: usize,
}

impl SlotRef {
    fn offset(&self) -> usize {
        self.index * DIR_ENTRY_SIZE
    }
}

/// Visit every slot of the directory at `first_block` in chain order.
/// The walk stops early once `visit` returns `true`.
pub fn scan(
    fat: &Fat<'_>,
    first_block: BlockId,
    mut visit: impl FnMut(SlotRef, &[u8]) -> FsResult<bool>,
) -> FsResult<()> {
    let mut scratch = vec![0u8; fat.superblock().block_size()];
    for block in fat.chain(first_block) {
        let block = block?;
        fat.io().read_block(block, &mut scratch)?;
        for (index, raw) in scratch.chunks_exact(DIR_ENTRY_SIZE).enumerate() {
            if visit(SlotRef { block, index }, raw)? {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Occupied entries, in slot order.
pub fn entries(fat: &Fat<'_>, first_block: BlockId) -> FsResult<Vec<DirEntry>> {
    let mut found = Vec::new();
    scan(fat, first_block, |_, raw| {
        if slot_status(raw) != STATUS_FREE {
            found.push(DirEntry::decode(raw)?);
        }
        Ok(false)
    })?;
    Ok(found)
}

/// First occupied entry of the given kind whose trimmed name equals `name`.
pub fn find_entry(
    fat: &Fat<'_>,
    first_block: BlockId,
    name: &str,
    kind: FileType,
) -> FsResult<Option<DirEntry>> {
    let mut found = None;
    scan(fat, first_block, |_, raw| {
        if slot_status(raw) == STATUS_FREE {
            return Ok(false);
        }
        let entry = DirEntry::decode(raw)?;
        if entry.is_kind(kind) && entry.name_matches(name) {
            found = Some(entry);
            return Ok(true);
        }
        Ok(false)
    })?;
    Ok(found)
}

/// Mark every slot of `block` unused.
pub fn init_block(fat: &Fat<'_>, block: BlockId) -> FsResult<()> {
    fat.zero_block(block)
}

/// Store `entry` in the first unused slot, growing the chain when full.
///
/// Growth links the new block before writing the entry; a failure after the
/// link leaves an empty block on the chain.
pub fn insert_entry(fat: &Fat<'_>, first_block: BlockId, entry: &DirEntry) -> FsResult<SlotRef> {
    let mut free = None;
    let mut tail = None;
    scan(fat, first_block, |slot, raw| {
        tail = Some(slot.block);
        if slot_status(raw) == STATUS_FREE {
            free = Some(slot);
            return Ok(true);
        }
        Ok(false)
    })?;
    let slot = match (free, tail) {
        (Some(slot), _) => slot,
        (None, Some(tail)) => {
            let block = fat.allocate_block()?;
            fat.write_link(tail, block)?;
            init_block(fat, block)?;
            debug!("directory at block {first_block} grew into block {block}");
            SlotRef { block, index: 0 }
        }
        (None, None) => {
            return Err(FsError::format(format!(
                "directory at block {first_block} has no blocks"
            )))
        }
    };
    fat.io()
        .write_in_block(slot.block, slot.offset(), &entry.encode())?;
    Ok(slot)
}
