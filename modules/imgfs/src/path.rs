//! Slash-separated path resolution, read-only or creating missing directories.

use imgvfs::{FileType, FsError, FsResult};
use log::debug;

use crate::block::BlockId;
use crate::dir;
use crate::dirent::{validate_name, DirEntry, Timestamp};
use crate::fat::Fat;
use crate::superblock::Superblock;

/// A directory located by the resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirRef {
    pub first_block: BlockId,
    /// Advisory length copied from the parent entry.
    pub block_count: u32,
}

impl DirRef {
    pub fn root(sb: &Superblock) -> Self {
        Self {
            first_block: sb.root_start,
            block_count: sb.root_blocks,
        }
    }
}

/// Non-empty components of `path`; leading, trailing and repeated slashes
/// are ignored.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

/// Split at the last slash into (directory, final name).
/// A path without a slash names an entry in the root.
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("/", path),
    }
}

/// Subdirectory `name` of `parent`, if there is one.
pub fn find_subdir(fat: &Fat<'_>, parent: DirRef, name: &str) -> FsResult<Option<DirRef>> {
    let found = dir::find_entry(fat, parent.first_block, name, FileType::Dir)?;
    Ok(found.map(|entry| DirRef {
        first_block: entry.starting_block,
        block_count: entry.block_count,
    }))
}

/// Walk `path` from the root without modifying the image.
pub fn resolve(fat: &Fat<'_>, path: &str) -> FsResult<DirRef> {
    let mut current = DirRef::root(fat.superblock());
    let mut walked = String::new();
    for name in components(path) {
        walked.push('/');
        walked.push_str(name);
        current = find_subdir(fat, current, name)?.ok_or_else(|| FsError::not_found(&walked))?;
    }
    Ok(current)
}

/// Walk `path` from the root, creating each missing directory on the way.
pub fn resolve_or_create(fat: &Fat<'_>, path: &str, now: Timestamp) -> FsResult<DirRef> {
    let mut current = DirRef::root(fat.superblock());
    for name in components(path) {
        current = match find_subdir(fat, current, name)? {
            Some(next) => next,
            None => create_subdir(fat, current, name, now)?,
        };
    }
    Ok(current)
}

fn create_subdir(fat: &Fat<'_>, parent: DirRef, name: &str, now: Timestamp) -> FsResult<DirRef> {
    validate_name(name)?;
    let block = fat.allocate_block()?;
    dir::init_block(fat, block)?;
    let entry = DirEntry::new_dir(name, block, now)?;
    dir::insert_entry(fat, parent.first_block, &entry)?;
    debug!(
        "created directory {name:?} at block {block} under block {}",
        parent.first_block
    );
    Ok(DirRef {
        first_block: block,
        block_count: entry.block_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testimg;

    fn names(fat: &Fat<'_>, at: DirRef) -> Vec<String> {
        dir::entries(fat, at.first_block)
            .unwrap()
            .into_iter()
            .map(|entry| entry.name)
            .collect()
    }

    #[test]
    fn split_paths() {
        assert_eq!(split_parent("/a/b/name"), ("/a/b", "name"));
        assert_eq!(split_parent("/name"), ("/", "name"));
        assert_eq!(split_parent("name"), ("/", "name"));
        assert_eq!(split_parent("a/name"), ("a", "name"));
        let parts: Vec<&str> = components("//a///b/").collect();
        assert_eq!(parts, ["a", "b"]);
    }

    #[test]
    fn root_resolves_to_itself() {
        let dev = testimg::mem_image(&testimg::small_geometry());
        let fat = Fat::new(&dev, Superblock::read(&dev).unwrap());
        let root = DirRef::root(fat.superblock());
        assert_eq!(resolve(&fat, "").unwrap(), root);
        assert_eq!(resolve(&fat, "/").unwrap(), root);
        assert_eq!(root.block_count, 2);
    }

    #[test]
    fn lookup_miss_is_not_found() {
        let dev = testimg::mem_image(&testimg::small_geometry());
        let fat = Fat::new(&dev, Superblock::read(&dev).unwrap());
        resolve_or_create(&fat, "/a", Timestamp::default()).unwrap();
        match resolve(&fat, "/a/x/y") {
            Err(FsError::NotFound(what)) => assert_eq!(what, "/a/x"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn create_builds_missing_levels_once() {
        let dev = testimg::mem_image(&testimg::small_geometry());
        let fat = Fat::new(&dev, Superblock::read(&dev).unwrap());
        let created = resolve_or_create(&fat, "/a/b", Timestamp::default()).unwrap();
        assert_eq!(resolve(&fat, "a/b").unwrap(), created);
        let again = resolve_or_create(&fat, "/a/b", Timestamp::default()).unwrap();
        assert_eq!(again, created);
        let root = DirRef::root(fat.superblock());
        assert_eq!(names(&fat, root), ["a"]);
        let a = resolve(&fat, "/a").unwrap();
        assert_eq!(names(&fat, a), ["b"]);
        assert!(names(&fat, created).is_empty());
    }

    #[test]
    fn create_keeps_existing_siblings() {
        let dev = testimg::mem_image(&testimg::small_geometry());
        let fat = Fat::new(&dev, Superblock::read(&dev).unwrap());
        resolve_or_create(&fat, "/a/b", Timestamp::default()).unwrap();
        let b = resolve(&fat, "/a/b").unwrap();
        resolve_or_create(&fat, "/a/c/d", Timestamp::default()).unwrap();
        let a = resolve(&fat, "/a").unwrap();
        assert_eq!(names(&fat, a), ["b", "c"]);
        assert_eq!(resolve(&fat, "/a/b").unwrap(), b);
        assert!(resolve(&fat, "/a/c/d").is_ok());
    }

    #[test]
    fn files_do_not_satisfy_directory_components() {
        let dev = testimg::mem_image(&testimg::small_geometry());
        let fat = Fat::new(&dev, Superblock::read(&dev).unwrap());
        let file = DirEntry::new_file("docs", 30, 1, 1, Timestamp::default()).unwrap();
        dir::insert_entry(&fat, 2, &file).unwrap();
        assert!(resolve(&fat, "/docs").unwrap_err().is_not_found());
    }

    #[test]
    fn create_fails_when_blocks_run_out() {
        let dev = testimg::mem_image(&testimg::tiny_geometry());
        let fat = Fat::new(&dev, Superblock::read(&dev).unwrap());
        while fat.allocate_block().is_ok() {}
        let err = resolve_or_create(&fat, "/new", Timestamp::default()).unwrap_err();
        assert!(matches!(err, FsError::AllocationExhausted));
        let root = DirRef::root(fat.superblock());
        assert!(names(&fat, root).is_empty());
    }

    #[test]
    fn create_rejects_trailing_space_components() {
        let dev = testimg::mem_image(&testimg::small_geometry());
        let fat = Fat::new(&dev, Superblock::read(&dev).unwrap());
        let before = dev.snapshot();
        let err = resolve_or_create(&fat, "/a /b", Timestamp::default()).unwrap_err();
        assert!(matches!(err, FsError::InvalidName(_)));
        assert_eq!(dev.snapshot(), before);
    }

    #[test]
    fn create_rejects_dot_components() {
        let dev = testimg::mem_image(&testimg::small_geometry());
        let fat = Fat::new(&dev, Superblock::read(&dev).unwrap());
        let before = fat.stats().unwrap();
        let err = resolve_or_create(&fat, "/a/../b", Timestamp::default()).unwrap_err();
        assert!(matches!(err, FsError::InvalidName(_)));
        assert_eq!(fat.stats().unwrap().allocated, before.allocated + 1);
    }
}
