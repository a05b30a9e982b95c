//! Blank image fixtures for tests.

use crate::block::MemImage;
use crate::fat::{FAT_ENTRY_SIZE, FAT_EOF, FAT_RESERVED};
use crate::superblock::{Superblock, FS_ID_LEN, SUPERBLOCK_OFFSET};

pub const FS_ID: &[u8; FS_ID_LEN] = b"CSC360FS";

/// Geometry with the FAT right after the header block and the root
/// directory right after the FAT.
pub fn geometry(block_size: u16, block_count: u32, root_blocks: u32) -> Superblock {
    let fat_bytes = block_count as u64 * FAT_ENTRY_SIZE as u64;
    let fat_blocks = fat_bytes.div_ceil(block_size as u64) as u32;
    Superblock {
        block_size,
        block_count,
        fat_start: 1,
        fat_blocks,
        root_start: 1 + fat_blocks,
        root_blocks,
    }
}

/// 64 blocks of 512 bytes, two root directory blocks. The single FAT block
/// has 128 entries, so the table is longer than the image.
pub fn small_geometry() -> Superblock {
    geometry(512, 64, 2)
}

/// 16 blocks of 128 bytes (two entries per directory block), one root block.
pub fn tiny_geometry() -> Superblock {
    geometry(128, 16, 1)
}

/// Header blocks and FAT blocks are reserved; the root directory blocks
/// are chained and zeroed; everything else is free.
pub fn blank_image(sb: &Superblock) -> Vec<u8> {
    let block_size = sb.block_size();
    let mut image = vec![0u8; sb.block_count as usize * block_size];
    image[..FS_ID_LEN].copy_from_slice(FS_ID);
    let sb_start = SUPERBLOCK_OFFSET as usize;
    let header = sb.encode();
    image[sb_start..sb_start + header.len()].copy_from_slice(&header);

    let fat_offset = sb.fat_offset() as usize;
    let mut set = |block: u32, value: u32| {
        let at = fat_offset + block as usize * FAT_ENTRY_SIZE;
        image[at..at + FAT_ENTRY_SIZE].copy_from_slice(&value.to_be_bytes());
    };
    for block in 0..sb.fat_start + sb.fat_blocks {
        set(block, FAT_RESERVED);
    }
    let root_end = sb.root_start + sb.root_blocks;
    for block in sb.root_start..root_end {
        let next = if block + 1 == root_end { FAT_EOF } else { block + 1 };
        set(block, next);
    }
    image
}

pub fn mem_image(sb: &Superblock) -> MemImage {
    MemImage::new(blank_image(sb))
}
