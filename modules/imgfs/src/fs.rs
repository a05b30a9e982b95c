use imgvfs::{FileType, FsError, FsResult};
use log::{debug, info};

use crate::block::ImageDevice;
use crate::dir;
use crate::dirent::{validate_name, DirEntry, Timestamp};
use crate::fat::{Fat, FatStats};
use crate::path::{self, split_parent, DirRef};
use crate::superblock::Superblock;
use crate::transfer;

/// Geometry plus the allocation census of the whole table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FsInfo {
    pub superblock: Superblock,
    pub fat: FatStats,
}

/// The filesystem engine, operating directly on an open image.
pub struct ImageFs<'a> {
    fat: Fat<'a>,
}

impl<'a> ImageFs<'a> {
    pub fn open(device: &'a dyn ImageDevice) -> FsResult<Self> {
        let sb = Superblock::read(device)?;
        let needed = sb.block_count as u64 * sb.block_size as u64;
        let actual = device.len()?;
        if actual < needed {
            return Err(FsError::format(format!(
                "superblock describes {needed} bytes but the image holds {actual}"
            )));
        }
        debug!(
            "image: {} blocks of {} bytes, FAT at {}+{}, root at {}+{}",
            sb.block_count, sb.block_size, sb.fat_start, sb.fat_blocks, sb.root_start, sb.root_blocks
        );
        Ok(Self {
            fat: Fat::new(device, sb),
        })
    }

    pub fn superblock(&self) -> &Superblock {
        self.fat.superblock()
    }

    pub fn fat(&self) -> &Fat<'a> {
        &self.fat
    }

    pub fn inspect(&self) -> FsResult<FsInfo> {
        Ok(FsInfo {
            superblock: *self.superblock(),
            fat: self.fat.stats()?,
        })
    }

    /// Occupied entries of the directory at `path`.
    pub fn list(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let dir = path::resolve(&self.fat, path)?;
        dir::entries(&self.fat, dir.first_block)
    }

    /// Directory entry of the file at `path`.
    pub fn lookup_file(&self, path: &str) -> FsResult<DirEntry> {
        let (dir_path, name) = split_parent(path);
        let dir = path::resolve(&self.fat, dir_path)?;
        dir::find_entry(&self.fat, dir.first_block, name, FileType::File)?
            .ok_or_else(|| FsError::not_found(path))
    }

    pub fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        let entry = self.lookup_file(path)?;
        transfer::read_chain(&self.fat, entry.starting_block, entry.size as u64)
    }

    pub fn create_dir_all(&self, path: &str, now: Timestamp) -> FsResult<DirRef> {
        validate_components(path)?;
        let dir = path::resolve_or_create(&self.fat, path, now)?;
        self.fat.io().flush()?;
        Ok(dir)
    }

    /// Store `data` as a new file at `path`, creating missing directories.
    pub fn write_file(&self, path: &str, data: &[u8], now: Timestamp) -> FsResult<DirEntry> {
        let (dir_path, name) = split_parent(path);
        validate_name(name)?;
        validate_components(dir_path)?;
        let size = u32::try_from(data.len())
            .map_err(|_| FsError::format(format!("{} bytes do not fit a file entry", data.len())))?;
        let dir = path::resolve_or_create(&self.fat, dir_path, now)?;
        if dir::find_entry(&self.fat, dir.first_block, name, FileType::File)?.is_some() {
            return Err(FsError::AlreadyExists(path.to_owned()));
        }
        let first = self.fat.allocate_chain(data.len() as u64)?;
        transfer::write_chain(&self.fat, first, data)?;
        let blocks = self.fat.blocks_for(data.len() as u64) as u32;
        let entry = DirEntry::new_file(name, first, blocks, size, now)?;
        dir::insert_entry(&self.fat, dir.first_block, &entry)?;
        self.fat.io().flush()?;
        info!("stored {size} bytes at {path} starting at block {first}");
        Ok(entry)
    }
}

/// Check every component up front so a bad one late in the path cannot
/// leave freshly created directories behind.
fn validate_components(path: &str) -> FsResult<()> {
    path::components(path).try_for_each(validate_name)
}
