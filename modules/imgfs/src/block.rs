use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use imgvfs::{FsError, FsResult};

pub type BlockId = u32;

/// Random-access byte storage backing an image.
pub trait ImageDevice {
    fn len(&self) -> FsResult<u64>;
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> FsResult<()>;
    fn write_at(&self, offset: u64, buf: &[u8]) -> FsResult<()>;
    fn flush(&self) -> FsResult<()>;
}

fn short_read(offset: u64, len: usize) -> FsError {
    FsError::format(format!("short read of {len} bytes at offset {offset}"))
}

/// An image stored in a regular file. Every write goes straight to the file.
pub struct FileImage {
    file: File,
    writable: bool,
}

impl FileImage {
    /// Open an image for the read-only commands.
    pub fn open(path: impl AsRef<Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| FsError::ImageOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            file,
            writable: false,
        })
    }

    /// Open an image that will be modified in place.
    pub fn open_rw(path: impl AsRef<Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| FsError::ImageOpen {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            file,
            writable: true,
        })
    }
}

impl ImageDevice for FileImage {
    fn len(&self) -> FsResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> FsResult<()> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => short_read(offset, buf.len()),
            _ => err.into(),
        })
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> FsResult<()> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "image is opened read-only",
            )
            .into());
        }
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> FsResult<()> {
        if self.writable {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

/// An image held in memory. It never grows: writes past the end fail.
pub struct MemImage {
    data: RefCell<Vec<u8>>,
}

impl MemImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: RefCell::new(data),
        }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }
}

impl ImageDevice for MemImage {
    fn len(&self) -> FsResult<u64> {
        Ok(self.data.borrow().len() as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> FsResult<()> {
        let data = self.data.borrow();
        let start = offset as usize;
        let end = start.checked_add(buf.len()).filter(|end| *end <= data.len());
        match end {
            Some(end) => {
                buf.copy_from_slice(&data[start..end]);
                Ok(())
            }
            None => Err(short_read(offset, buf.len())),
        }
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> FsResult<()> {
        let mut data = self.data.borrow_mut();
        let start = offset as usize;
        let end = start.checked_add(buf.len()).filter(|end| *end <= data.len());
        match end {
            Some(end) => {
                data[start..end].copy_from_slice(buf);
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("write of {} bytes at offset {offset} runs past the image", buf.len()),
            )
            .into()),
        }
    }

    fn flush(&self) -> FsResult<()> {
        Ok(())
    }
}

/// Block-addressed view over an image device.
pub struct BlockIo<'a> {
    device: &'a dyn ImageDevice,
    block_size: usize,
}

impl<'a> BlockIo<'a> {
    pub fn new(device: &'a dyn ImageDevice, block_size: usize) -> Self {
        Self { device, block_size }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_offset(&self, block: BlockId) -> u64 {
        block as u64 * self.block_size as u64
    }

    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> FsResult<()> {
        self.device.read_at(offset, buf)
    }

    pub fn write_at(&self, offset: u64, buf: &[u8]) -> FsResult<()> {
        self.device.write_at(offset, buf)
    }

    pub fn read_block(&self, block: BlockId, buf: &mut [u8]) -> FsResult<()> {
        if buf.len() < self.block_size {
            return Err(FsError::format("buffer shorter than a block"));
        }
        self.device
            .read_at(self.block_offset(block), &mut buf[..self.block_size])
    }

    pub fn write_block(&self, block: BlockId, buf: &[u8]) -> FsResult<()> {
        if buf.len() < self.block_size {
            return Err(FsError::format("buffer shorter than a block"));
        }
        self.device
            .write_at(self.block_offset(block), &buf[..self.block_size])
    }

    /// Read `buf.len()` bytes starting `offset` bytes into `block`.
    pub fn read_in_block(&self, block: BlockId, offset: usize, buf: &mut [u8]) -> FsResult<()> {
        if offset + buf.len() > self.block_size {
            return Err(FsError::format("read crosses a block boundary"));
        }
        self.device
            .read_at(self.block_offset(block) + offset as u64, buf)
    }

    pub fn write_in_block(&self, block: BlockId, offset: usize, buf: &[u8]) -> FsResult<()> {
        if offset + buf.len() > self.block_size {
            return Err(FsError::format("write crosses a block boundary"));
        }
        self.device
            .write_at(self.block_offset(block) + offset as u64, buf)
    }

    pub fn flush(&self) -> FsResult<()> {
        self.device.flush()
    }
}
