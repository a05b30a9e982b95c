//! The four image commands. Each one opens the image, runs a single engine
//! operation and writes its report to `out`.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use imgfs::{DirEntry, FileImage, FsError, FsInfo, ImageFs, Timestamp};
use log::info;

pub fn inspect(image: &Path, out: &mut impl Write) -> Result<()> {
    let device = FileImage::open(image)?;
    let disk = ImageFs::open(&device).with_context(|| format!("reading {}", image.display()))?;
    let info = disk.inspect()?;
    write_info(out, &info)?;
    Ok(())
}

pub fn write_info(out: &mut impl Write, info: &FsInfo) -> std::io::Result<()> {
    let sb = &info.superblock;
    writeln!(out, "Super block information:")?;
    writeln!(out, "Block size: {}", sb.block_size)?;
    writeln!(out, "Block count: {}", sb.block_count)?;
    writeln!(out, "FAT starts: {}", sb.fat_start)?;
    writeln!(out, "FAT blocks: {}", sb.fat_blocks)?;
    writeln!(out, "Root directory start: {}", sb.root_start)?;
    writeln!(out, "Root directory blocks: {}", sb.root_blocks)?;
    writeln!(out)?;
    writeln!(out, "FAT information:")?;
    writeln!(out, "Free blocks: {}", info.fat.free)?;
    writeln!(out, "Reserved blocks: {}", info.fat.reserved)?;
    writeln!(out, "Allocated blocks: {}", info.fat.allocated)
}

pub fn list(image: &Path, path: &str, out: &mut impl Write) -> Result<()> {
    let device = FileImage::open(image)?;
    let disk = ImageFs::open(&device).with_context(|| format!("reading {}", image.display()))?;
    let entries = disk
        .list(path)
        .with_context(|| format!("cannot list {path}"))?;
    for entry in &entries {
        writeln!(out, "{}", list_line(entry))?;
    }
    Ok(())
}

pub fn list_line(entry: &DirEntry) -> String {
    format!(
        "{} {:>10} {:>30} {}",
        entry.file_type().tag(),
        entry.size,
        entry.name,
        entry.created
    )
}

/// Copy the file at `path` to `output`. The output is created only once
/// the whole file has been read from the image.
pub fn get(image: &Path, path: &str, output: &Path) -> Result<u64> {
    let device = FileImage::open(image)?;
    let disk = ImageFs::open(&device).with_context(|| format!("reading {}", image.display()))?;
    let data = disk
        .read_file(path)
        .with_context(|| format!("cannot get {path}"))?;
    fs::write(output, &data).with_context(|| format!("cannot write {}", output.display()))?;
    info!("copied {} bytes from {path} to {}", data.len(), output.display());
    Ok(data.len() as u64)
}

/// Copy the host file `source` into the image at `dest`, creating any
/// missing directories on the way.
pub fn put(image: &Path, source: &Path, dest: &str, now: Timestamp) -> Result<DirEntry> {
    let data = fs::read(source).map_err(|err| FsError::SourceOpen {
        path: source.to_path_buf(),
        source: err,
    })?;
    let device = FileImage::open_rw(image)?;
    let disk = ImageFs::open(&device).with_context(|| format!("reading {}", image.display()))?;
    let entry = disk
        .write_file(dest, &data, now)
        .with_context(|| format!("cannot put {dest}"))?;
    Ok(entry)
}

/// Flush the command's output; a failed flush fails the command.
pub fn finish(result: Result<()>, out: &mut impl Write) -> Result<()> {
    result?;
    out.flush().context("cannot write to stdout")
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgfs::testimg;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    /// Scratch directory holding a freshly built image.
    struct Workdir {
        root: PathBuf,
    }

    impl Workdir {
        fn new(sb: &imgfs::Superblock) -> Self {
            let id = NEXT_DIR.fetch_add(1, Ordering::Relaxed);
            let root = std::env::temp_dir().join(format!("imgtool-{}-{id}", std::process::id()));
            let _ = fs::remove_dir_all(&root);
            fs::create_dir_all(&root).unwrap();
            fs::write(root.join("disk.img"), testimg::blank_image(sb)).unwrap();
            Self { root }
        }

        fn image(&self) -> PathBuf {
            self.root.join("disk.img")
        }

        fn file(&self, name: &str) -> PathBuf {
            self.root.join(name)
        }
    }

    impl Drop for Workdir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    fn stamp() -> Timestamp {
        Timestamp {
            year: 2024,
            month: 12,
            day: 31,
            hour: 23,
            minute: 59,
            second: 58,
        }
    }

    fn root_cause(err: &anyhow::Error) -> Option<&FsError> {
        err.chain().find_map(|cause| cause.downcast_ref::<FsError>())
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn failed_flush_fails_the_command() {
        let err = finish(Ok(()), &mut BrokenPipe).unwrap_err();
        assert!(err.to_string().contains("stdout"));
        assert!(finish(Ok(()), &mut Vec::<u8>::new()).is_ok());
        let err = finish(Err(anyhow::anyhow!("earlier")), &mut Vec::<u8>::new()).unwrap_err();
        assert_eq!(err.to_string(), "earlier");
    }

    #[test]
    fn inspect_prints_both_sections() {
        let work = Workdir::new(&testimg::small_geometry());
        let mut out = Vec::new();
        inspect(&work.image(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let expected = "Super block information:\n\
                        Block size: 512\n\
                        Block count: 64\n\
                        FAT starts: 1\n\
                        FAT blocks: 1\n\
                        Root directory start: 2\n\
                        Root directory blocks: 2\n\
                        \n\
                        FAT information:\n\
                        Free blocks: 124\n\
                        Reserved blocks: 2\n\
                        Allocated blocks: 2\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn list_formats_columns() {
        let work = Workdir::new(&testimg::small_geometry());
        fs::write(work.file("a.txt"), b"hello world").unwrap();
        put(&work.image(), &work.file("a.txt"), "/a.txt", stamp()).unwrap();
        put(&work.image(), &work.file("a.txt"), "/sub/b.txt", stamp()).unwrap();

        let mut out = Vec::new();
        list(&work.image(), "/", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            format!("F {:>10} {:>30} 2024/12/31 23:59:58", 11, "a.txt")
        );
        assert!(lines[1].starts_with("D "));
        assert!(lines[1].contains(&format!("{:>30}", "sub")));

        let mut out = Vec::new();
        list(&work.image(), "/sub", &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("b.txt"));
    }

    #[test]
    fn empty_root_lists_nothing() {
        let work = Workdir::new(&testimg::small_geometry());
        let mut out: Vec<u8> = Vec::new();
        list(&work.image(), "/", &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn put_then_get_round_trip() {
        let work = Workdir::new(&testimg::small_geometry());
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 253) as u8).collect();
        fs::write(work.file("src.bin"), &data).unwrap();
        let entry = put(&work.image(), &work.file("src.bin"), "/x/y/data.bin", stamp()).unwrap();
        assert_eq!(entry.size, 5000);
        assert_eq!(entry.block_count, 10);

        let copied = get(&work.image(), "/x/y/data.bin", &work.file("out.bin")).unwrap();
        assert_eq!(copied, 5000);
        assert_eq!(fs::read(work.file("out.bin")).unwrap(), data);
    }

    #[test]
    fn get_missing_leaves_no_output() {
        let work = Workdir::new(&testimg::small_geometry());
        let output = work.file("never.bin");
        let err = get(&work.image(), "/missing.txt", &output).unwrap_err();
        assert!(root_cause(&err).is_some_and(FsError::is_not_found));
        assert!(!output.exists());
    }

    #[test]
    fn put_missing_source_is_reported() {
        let work = Workdir::new(&testimg::small_geometry());
        let before = fs::read(work.image()).unwrap();
        let err = put(&work.image(), &work.file("absent"), "/absent", stamp()).unwrap_err();
        assert!(matches!(root_cause(&err), Some(FsError::SourceOpen { .. })));
        assert_eq!(fs::read(work.image()).unwrap(), before);
    }

    #[test]
    fn put_into_full_image_keeps_existing_files() {
        let work = Workdir::new(&testimg::tiny_geometry());
        let data = vec![0x5a; 128 * 4];
        fs::write(work.file("big"), &data).unwrap();
        put(&work.image(), &work.file("big"), "/one", stamp()).unwrap();
        put(&work.image(), &work.file("big"), "/two", stamp()).unwrap();
        put(&work.image(), &work.file("big"), "/three", stamp()).unwrap();
        let err = put(&work.image(), &work.file("big"), "/four", stamp()).unwrap_err();
        assert!(matches!(
            root_cause(&err),
            Some(FsError::AllocationExhausted)
        ));
        for name in ["/one", "/two", "/three"] {
            get(&work.image(), name, &work.file("check")).unwrap();
            assert_eq!(fs::read(work.file("check")).unwrap(), data);
        }
    }

    #[test]
    fn missing_image_is_an_open_error() {
        let work = Workdir::new(&testimg::small_geometry());
        let err = inspect(&work.file("nope.img"), &mut Vec::<u8>::new()).unwrap_err();
        assert!(matches!(root_cause(&err), Some(FsError::ImageOpen { .. })));
    }
}
