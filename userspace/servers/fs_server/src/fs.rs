/// Filesystem facade: the user-level operations.
///
/// `FileSystem` owns the disk, the in-memory FAT and the working directory
/// cache. Mutating operations run inside `transaction`, which persists the
/// FAT on success and rolls the in-memory table back on failure. All
/// directory writes go through `commit_dir`, which keeps the cache equal to
/// the disk whenever the written block is the working directory.

use alloc::string::String;
use alloc::vec::Vec;

use fs_api_types::{AccessRights, FsError, FsResult, BLOCK_COUNT, PARENT_NAME, ROOT_BLOCK};

use crate::block::BlockDev;
use crate::dir::{self, DirBlock, DirEntry, Name};
use crate::fat::Fat;
use crate::file;
use crate::path::{self, Resolved};

pub struct FileSystem<D: BlockDev> {
    disk:      D,
    fat:       Fat,
    cwd:       DirBlock,
    cwd_block: u16,
}

impl<D: BlockDev> FileSystem<D> {
    /// Open the filesystem stored on `disk`, formatting it first if block 0
    /// does not hold a valid FAT.
    pub fn mount(mut disk: D) -> FsResult<Self> {
        match Fat::load(&mut disk)? {
            Some(fat) => {
                let cwd = DirBlock::load(&mut disk, ROOT_BLOCK)?;
                log::info!("fs: mounted, {} blocks free", fat.free_count());
                Ok(FileSystem { disk, fat, cwd, cwd_block: ROOT_BLOCK })
            }
            None => {
                log::warn!("fs: no valid FAT on disk, formatting");
                Self::open_formatted(disk)
            }
        }
    }

    /// Format `disk` unconditionally and open it.
    pub fn open_formatted(disk: D) -> FsResult<Self> {
        let mut fs = FileSystem { disk, fat: Fat::new(), cwd: DirBlock::new(), cwd_block: ROOT_BLOCK };
        fs.format()?;
        Ok(fs)
    }

    /// Reset the FAT, write an empty root directory and make it current.
    pub fn format(&mut self) -> FsResult<()> {
        self.fat = Fat::new();
        self.cwd_block = ROOT_BLOCK;
        self.commit_dir(ROOT_BLOCK, &DirBlock::new())?;
        self.fat.persist(&mut self.disk)?;
        log::info!("fs: formatted, {} blocks free", self.fat.free_count());
        Ok(())
    }

    /// Create a file at `path` holding `data`.
    pub fn create(&mut self, path: &str, data: &[u8]) -> FsResult<()> {
        self.transaction(|fs| {
            let mut parent = fs.resolve_parent(path)?;
            fs.check_new_entry(&parent)?;
            let size = u32::try_from(data.len()).map_err(|_| FsError::DiskFull)?;
            let first = file::write_chain(&mut fs.disk, &mut fs.fat, data)?;
            parent.dir.insert(DirEntry::file(parent.leaf, first, size)?)?;
            fs.commit_dir(parent.block, &parent.dir)
        })
    }

    /// Contents of the file at `path`.
    pub fn cat(&mut self, path: &str) -> FsResult<Vec<u8>> {
        let (resolved, slot) = self.resolve_file(path)?;
        let entry = resolved.dir.get(slot);
        if !entry.rights.can_read() {
            return Err(FsError::PermissionDenied);
        }
        file::read_chain(&mut self.disk, &self.fat, entry.first_block, entry.size)
    }

    /// Entries of the working directory, without `..`.
    pub fn ls(&self) -> Vec<DirEntry> {
        self.cwd.children().cloned().collect()
    }

    /// The entry `path` names.
    pub fn stat(&mut self, path: &str) -> FsResult<DirEntry> {
        let resolved = self.resolve(path)?;
        Ok(resolved.dir.get(resolved.slot()?).clone())
    }

    /// Copy the file `src` to `dst`. The copy gets its own chain and keeps
    /// the source's access rights.
    pub fn cp(&mut self, src: &str, dst: &str) -> FsResult<()> {
        self.transaction(|fs| {
            let (from, slot) = fs.resolve_file(src)?;
            let mut copy = from.dir.get(slot).clone();
            if !copy.rights.can_read() {
                return Err(FsError::PermissionDenied);
            }
            let (mut to, block, name) = fs.destination(dst, &copy.name)?;
            if to.is_full() {
                return Err(FsError::DirectoryFull);
            }
            let data = file::read_chain(&mut fs.disk, &fs.fat, copy.first_block, copy.size)?;
            copy.first_block = file::write_chain(&mut fs.disk, &mut fs.fat, &data)?;
            copy.name = name;
            to.insert(copy)?;
            fs.commit_dir(block, &to)
        })
    }

    /// Rename the file `src`, or move it into another directory. The chain is
    /// reused as is.
    pub fn mv(&mut self, src: &str, dst: &str) -> FsResult<()> {
        self.transaction(|fs| {
            let (mut from, slot) = fs.resolve_file(src)?;
            let mut entry = from.dir.get(slot).clone();
            let (mut to, block, name) = fs.destination(dst, &entry.name)?;
            if block == from.block {
                from.dir.get_mut(slot).name = name;
                return fs.commit_dir(from.block, &from.dir);
            }
            entry.name = name;
            to.insert(entry)?;
            from.dir.remove(slot);
            fs.commit_dir(block, &to)?;
            fs.commit_dir(from.block, &from.dir)
        })
    }

    /// Remove a file or an empty directory and free its chain.
    pub fn rm(&mut self, path: &str) -> FsResult<()> {
        self.transaction(|fs| {
            let mut resolved = fs.resolve(path)?;
            if resolved.leaf.is_empty() || resolved.leaf == PARENT_NAME {
                return Err(FsError::InvalidName);
            }
            let slot = resolved.slot()?;
            let entry = resolved.dir.get(slot).clone();
            if entry.is_dir() {
                if entry.first_block == fs.cwd_block {
                    return Err(FsError::DirectoryInUse);
                }
                if !DirBlock::load(&mut fs.disk, entry.first_block)?.has_no_children() {
                    return Err(FsError::DirectoryNotEmpty);
                }
            }
            fs.fat.free_chain(entry.first_block)?;
            resolved.dir.remove(slot);
            fs.commit_dir(resolved.block, &resolved.dir)
        })
    }

    /// Append the contents of file `src` to the end of file `dst`.
    pub fn append(&mut self, src: &str, dst: &str) -> FsResult<()> {
        self.transaction(|fs| {
            let (from, src_slot) = fs.resolve_file(src)?;
            let source = from.dir.get(src_slot);
            let (mut to, dst_slot) = fs.resolve_file(dst)?;
            if !source.rights.can_read() || !to.dir.get(dst_slot).rights.can_write() {
                return Err(FsError::PermissionDenied);
            }
            let data = file::read_chain(&mut fs.disk, &fs.fat, source.first_block, source.size)?;
            let target = to.dir.get_mut(dst_slot);
            target.size =
                file::append_chain(&mut fs.disk, &mut fs.fat, target.first_block, target.size, &data)?;
            fs.commit_dir(to.block, &to.dir)
        })
    }

    /// Create an empty directory at `path`.
    pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
        self.transaction(|fs| {
            let mut parent = fs.resolve_parent(path)?;
            fs.check_new_entry(&parent)?;
            let block = fs.fat.allocate_chain(0)?;
            fs.commit_dir(block, &DirBlock::with_parent(parent.block))?;
            parent.dir.insert(DirEntry::directory(parent.leaf, block)?)?;
            fs.commit_dir(parent.block, &parent.dir)
        })
    }

    /// Make the directory at `path` the working directory.
    pub fn cd(&mut self, path: &str) -> FsResult<()> {
        let resolved = self.resolve(path)?;
        let (dir, block) = if resolved.leaf.is_empty() {
            (resolved.dir, resolved.block)
        } else {
            let entry = resolved.dir.get(resolved.slot()?);
            if !entry.is_dir() {
                return Err(FsError::NotADirectory);
            }
            let block = entry.first_block;
            (DirBlock::load(&mut self.disk, block)?, block)
        };
        self.cwd = dir;
        self.cwd_block = block;
        log::debug!("fs: working directory is block {block}");
        Ok(())
    }

    /// Absolute path of the working directory, rebuilt by following `..`
    /// links up to the root.
    pub fn pwd(&mut self) -> FsResult<String> {
        let mut names: Vec<Name> = Vec::new();
        let mut block = self.cwd_block;
        let mut dir = self.cwd.clone();
        while block != ROOT_BLOCK {
            if names.len() == BLOCK_COUNT {
                return Err(FsError::Corrupt { block, reason: "parent links form a cycle" });
            }
            let parent_block = dir
                .find(PARENT_NAME)
                .map(|slot| dir.get(slot).first_block)
                .ok_or(FsError::Corrupt { block, reason: "directory has no parent link" })?;
            let parent = DirBlock::load(&mut self.disk, parent_block)?;
            names.push(parent.child_dir_at(block, parent_block)?.name.clone());
            block = parent_block;
            dir = parent;
        }

        if names.is_empty() {
            return Ok(String::from("/"));
        }
        let mut path = String::new();
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        Ok(path)
    }

    /// Replace the access rights of the entry at `path` with the integer
    /// `rights`. Any value that parses is stored.
    pub fn chmod(&mut self, rights: &str, path: &str) -> FsResult<()> {
        let rights: u8 = rights.trim().parse().map_err(|_| FsError::InvalidRights)?;
        self.transaction(|fs| {
            let mut resolved = fs.resolve(path)?;
            if resolved.leaf.is_empty() || resolved.leaf == PARENT_NAME {
                return Err(FsError::InvalidName);
            }
            let slot = resolved.slot()?;
            resolved.dir.get_mut(slot).rights = AccessRights::from_bits_retain(rights);
            fs.commit_dir(resolved.block, &resolved.dir)
        })
    }

    pub fn current_block(&self) -> u16 {
        self.cwd_block
    }

    pub fn cwd(&self) -> &DirBlock {
        &self.cwd
    }

    pub fn fat(&self) -> &Fat {
        &self.fat
    }

    pub fn into_disk(self) -> D {
        self.disk
    }

    // ─── Private helpers ───────────────────────────────────────────────────────

    fn resolve<'p>(&mut self, path: &'p str) -> FsResult<Resolved<'p>> {
        path::resolve(&mut self.disk, &self.cwd, self.cwd_block, path)
    }

    /// `resolve` for paths whose leaf is about to be created.
    fn resolve_parent<'p>(&mut self, path: &'p str) -> FsResult<Resolved<'p>> {
        self.resolve(path).map_err(|err| match err {
            FsError::NotFound => FsError::ParentNotFound,
            err => err,
        })
    }

    fn resolve_file<'p>(&mut self, path: &'p str) -> FsResult<(Resolved<'p>, usize)> {
        let resolved = self.resolve(path)?;
        if resolved.leaf.is_empty() {
            return Err(FsError::NotAFile);
        }
        let slot = resolved.slot()?;
        if !resolved.dir.get(slot).is_file() {
            return Err(FsError::NotAFile);
        }
        Ok((resolved, slot))
    }

    fn check_new_entry(&self, parent: &Resolved<'_>) -> FsResult<()> {
        dir::validate_name(parent.leaf)?;
        if parent.dir.find(parent.leaf).is_some() {
            return Err(FsError::AlreadyExists);
        }
        if parent.dir.is_full() {
            return Err(FsError::DirectoryFull);
        }
        Ok(())
    }

    /// Directory, its block and the entry name that `cp`/`mv` target when
    /// copying or moving an entry called `name` to `dst`.
    ///
    /// An existing directory (including `/` and `..`) receives the entry
    /// under its current name; a free leaf names the new entry; an existing
    /// file is `AlreadyExists`.
    fn destination(&mut self, dst: &str, name: &str) -> FsResult<(DirBlock, u16, Name)> {
        let resolved = self.resolve(dst)?;
        let (dir, block, name) = if resolved.leaf.is_empty() {
            (resolved.dir, resolved.block, name)
        } else {
            match resolved.dir.find(resolved.leaf) {
                None if resolved.leaf == PARENT_NAME => return Err(FsError::NotFound),
                None => {
                    dir::validate_name(resolved.leaf)?;
                    (resolved.dir, resolved.block, resolved.leaf)
                }
                Some(slot) if resolved.dir.get(slot).is_dir() => {
                    let block = resolved.dir.get(slot).first_block;
                    (DirBlock::load(&mut self.disk, block)?, block, name)
                }
                Some(_) => return Err(FsError::AlreadyExists),
            }
        };
        if dir.find(name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        Ok((dir, block, dir::make_name(name)?))
    }

    /// Write a directory block, refreshing the working directory cache when
    /// it mirrors that block.
    fn commit_dir(&mut self, block: u16, dir: &DirBlock) -> FsResult<()> {
        self.disk.write(block, &dir.encode())?;
        if block == self.cwd_block {
            self.cwd = dir.clone();
        }
        log::trace!("fs: committed directory block {block}");
        Ok(())
    }

    /// Run a mutating operation. On success the FAT is persisted; on failure
    /// the in-memory FAT is restored and the working directory re-read.
    fn transaction<T>(&mut self, op: impl FnOnce(&mut Self) -> FsResult<T>) -> FsResult<T> {
        let snapshot = self.fat.clone();
        let result = op(self).and_then(|value| {
            self.fat.persist(&mut self.disk)?;
            Ok(value)
        });
        if let Err(err) = &result {
            self.fat = snapshot;
            if err.is_fatal() {
                log::error!("fs: operation aborted: {err}");
                if let Ok(dir) = DirBlock::load(&mut self.disk, self.cwd_block) {
                    self.cwd = dir;
                }
            } else {
                log::debug!("fs: operation failed: {err}");
            }
        }
        result
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemDisk;
    use crate::fat::FatEntry;
    use fs_api_types::{BLOCK_SIZE, DIR_ENTRIES, FAT_ENTRIES};
    use std::collections::HashSet;

    fn fresh() -> FileSystem<MemDisk> {
        FileSystem::open_formatted(MemDisk::new()).unwrap()
    }

    fn listing(fs: &FileSystem<MemDisk>) -> Vec<std::string::String> {
        let mut names: Vec<_> = fs.ls().iter().map(|e| e.name.to_string()).collect();
        names.sort();
        names
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    // ── create / cat ─────────────────────────────────────────────────────────

    #[test]
    fn create_then_cat() {
        let mut fs = fresh();
        fs.create("/f", b"hello\n").unwrap();
        assert_eq!(fs.cat("/f").unwrap(), b"hello\n");
        assert_eq!(fs.cat("f").unwrap(), b"hello\n");
    }

    #[test]
    fn create_then_cat_multi_block() {
        let mut fs = fresh();
        let data = pattern(5 * BLOCK_SIZE + 123);
        fs.create("big", &data).unwrap();
        assert_eq!(fs.cat("big").unwrap(), data);
        assert_eq!(fs.stat("big").unwrap().size as usize, data.len());
    }

    #[test]
    fn create_empty_file() {
        let mut fs = fresh();
        fs.create("empty", b"").unwrap();
        assert!(fs.cat("empty").unwrap().is_empty());
    }

    #[test]
    fn create_grants_read_write() {
        let mut fs = fresh();
        fs.create("f", b"x").unwrap();
        assert_eq!(fs.stat("f").unwrap().rights, AccessRights::read_write());
    }

    #[test]
    fn create_errors() {
        let mut fs = fresh();
        fs.create("f", b"x").unwrap();
        assert_eq!(fs.create("f", b"y"), Err(FsError::AlreadyExists));
        assert_eq!(fs.create("/nope/g", b"y"), Err(FsError::ParentNotFound));
        assert_eq!(fs.create("f/g", b"y"), Err(FsError::NotADirectory));
        assert_eq!(fs.create("/", b"y"), Err(FsError::InvalidName));
        assert_eq!(fs.create(&"n".repeat(56), b"y"), Err(FsError::NameTooLong));
        fs.create(&"n".repeat(55), b"y").unwrap();
    }

    #[test]
    fn sixty_fifth_create_is_directory_full() {
        let mut fs = fresh();
        for i in 0..DIR_ENTRIES {
            fs.create(&format!("f{i}"), b"").unwrap();
        }
        let free = fs.fat().free_count();
        assert_eq!(fs.create("f64", b""), Err(FsError::DirectoryFull));
        assert_eq!(fs.fat().free_count(), free);
    }

    #[test]
    fn subdirectory_holds_63_children() {
        let mut fs = fresh();
        fs.mkdir("d").unwrap();
        for i in 0..DIR_ENTRIES - 1 {
            fs.create(&format!("d/f{i}"), b"").unwrap();
        }
        assert_eq!(fs.create("d/last", b""), Err(FsError::DirectoryFull));
        assert_eq!(fs.mkdir("d/sub"), Err(FsError::DirectoryFull));
    }

    #[test]
    fn cat_errors() {
        let mut fs = fresh();
        fs.mkdir("d").unwrap();
        assert_eq!(fs.cat("missing"), Err(FsError::NotFound));
        assert_eq!(fs.cat("d"), Err(FsError::NotAFile));
        assert_eq!(fs.cat("/"), Err(FsError::NotAFile));
    }

    // ── example scenario ─────────────────────────────────────────────────────

    #[test]
    fn copy_survives_removal_of_original() {
        let mut fs = fresh();
        fs.create("/f", b"hello\n").unwrap();
        fs.cp("/f", "/g").unwrap();
        fs.rm("/f").unwrap();
        assert_eq!(fs.cat("/g").unwrap(), b"hello\n");
        assert_eq!(fs.cat("/f"), Err(FsError::NotFound));
    }

    // ── rm / compaction / chains ─────────────────────────────────────────────

    #[test]
    fn rm_compacts_and_keeps_other_entries() {
        let mut fs = fresh();
        for name in ["a", "b", "c", "d"] {
            fs.create(name, name.as_bytes()).unwrap();
        }
        let before: HashSet<_> = fs
            .ls()
            .into_iter()
            .filter(|e| e.name != "b")
            .map(|e| (e.name.to_string(), e.first_block))
            .collect();
        fs.rm("b").unwrap();
        let after: HashSet<_> = fs
            .ls()
            .into_iter()
            .map(|e| (e.name.to_string(), e.first_block))
            .collect();
        assert_eq!(fs.cwd().len(), 3);
        assert_eq!(after, before);
        assert_eq!(fs.cat("c").unwrap(), b"c");
        assert_eq!(fs.cat("d").unwrap(), b"d");
    }

    #[test]
    fn chains_are_disjoint_and_reused() {
        let mut fs = fresh();
        fs.create("a", &pattern(2 * BLOCK_SIZE)).unwrap();
        fs.create("b", &pattern(3 * BLOCK_SIZE + 1)).unwrap();
        fs.mkdir("d").unwrap();
        fs.create("d/c", &pattern(10)).unwrap();

        let mut seen = HashSet::new();
        for path in ["a", "b", "d", "d/c"] {
            let entry = fs.stat(path).unwrap();
            for block in fs.fat().chain(entry.first_block).unwrap() {
                assert!(seen.insert(block), "block {block} owned twice");
            }
        }

        let b_first = fs.stat("b").unwrap().first_block;
        let b_blocks = fs.fat().chain(b_first).unwrap();
        fs.rm("b").unwrap();
        for &block in &b_blocks {
            assert_eq!(fs.fat().get(block), FatEntry::Free);
        }
        fs.create("e", b"x").unwrap();
        assert_eq!(fs.stat("e").unwrap().first_block, b_blocks[0]);
    }

    #[test]
    fn rm_errors() {
        let mut fs = fresh();
        fs.mkdir("d").unwrap();
        fs.create("d/f", b"x").unwrap();
        assert_eq!(fs.rm("missing"), Err(FsError::NotFound));
        assert_eq!(fs.rm("d"), Err(FsError::DirectoryNotEmpty));
        assert_eq!(fs.rm("/"), Err(FsError::InvalidName));
        fs.cd("d").unwrap();
        assert_eq!(fs.rm(".."), Err(FsError::InvalidName));
        assert_eq!(fs.rm("/d"), Err(FsError::DirectoryInUse));
    }

    #[test]
    fn rm_empty_directory_frees_its_block() {
        let mut fs = fresh();
        fs.mkdir("d").unwrap();
        let block = fs.stat("d").unwrap().first_block;
        fs.rm("d").unwrap();
        assert_eq!(fs.fat().get(block), FatEntry::Free);
        assert!(fs.ls().is_empty());
    }

    // ── rights ───────────────────────────────────────────────────────────────

    #[test]
    fn chmod_controls_read_access() {
        let mut fs = fresh();
        fs.create("f", b"secret").unwrap();
        fs.chmod("2", "f").unwrap();
        assert_eq!(fs.cat("f"), Err(FsError::PermissionDenied));
        fs.chmod("3", "f").unwrap();
        assert_eq!(fs.cat("f"), Err(FsError::PermissionDenied));
        fs.chmod("4", "f").unwrap();
        assert_eq!(fs.cat("f").unwrap(), b"secret");
        fs.chmod("7", "f").unwrap();
        assert_eq!(fs.cat("f").unwrap(), b"secret");
    }

    #[test]
    fn chmod_errors() {
        let mut fs = fresh();
        fs.create("f", b"x").unwrap();
        assert_eq!(fs.chmod("rw", "f"), Err(FsError::InvalidRights));
        assert_eq!(fs.chmod("4", "g"), Err(FsError::NotFound));
        assert_eq!(fs.chmod("4", "/"), Err(FsError::InvalidName));
        fs.chmod("9", "f").unwrap();
        assert_eq!(fs.stat("f").unwrap().rights.bits(), 9);
    }

    #[test]
    fn cp_requires_read() {
        let mut fs = fresh();
        fs.create("f", b"x").unwrap();
        fs.chmod("2", "f").unwrap();
        assert_eq!(fs.cp("f", "g"), Err(FsError::PermissionDenied));
        assert_eq!(fs.stat("g"), Err(FsError::NotFound));
    }

    #[test]
    fn append_checks_both_rights() {
        let mut fs = fresh();
        fs.create("src", b"a").unwrap();
        fs.create("dst", b"b").unwrap();
        fs.chmod("2", "src").unwrap();
        assert_eq!(fs.append("src", "dst"), Err(FsError::PermissionDenied));
        fs.chmod("6", "src").unwrap();
        fs.chmod("4", "dst").unwrap();
        assert_eq!(fs.append("src", "dst"), Err(FsError::PermissionDenied));
        fs.chmod("2", "dst").unwrap();
        fs.append("src", "dst").unwrap();
        fs.chmod("6", "dst").unwrap();
        assert_eq!(fs.cat("dst").unwrap(), b"ba");
    }

    // ── directories ──────────────────────────────────────────────────────────

    #[test]
    fn pwd_follows_parent_links() {
        let mut fs = fresh();
        assert_eq!(fs.pwd().unwrap(), "/");
        fs.mkdir("/a").unwrap();
        fs.cd("/a").unwrap();
        fs.mkdir("b").unwrap();
        fs.cd("b").unwrap();
        assert_eq!(fs.pwd().unwrap(), "/a/b");
        fs.cd("..").unwrap();
        assert_eq!(fs.pwd().unwrap(), "/a");
        fs.cd("b/../..").unwrap();
        assert_eq!(fs.pwd().unwrap(), "/");
    }

    #[test]
    fn mkdir_seeds_parent_link() {
        let mut fs = fresh();
        fs.mkdir("a").unwrap();
        fs.mkdir("a/b").unwrap();
        let a = fs.stat("a").unwrap();
        fs.cd("a/b").unwrap();
        let link = fs.cwd().get(0).clone();
        assert!(link.is_parent_link());
        assert_eq!(link.first_block, a.first_block);
        assert!(fs.ls().is_empty());
    }

    #[test]
    fn mkdir_errors() {
        let mut fs = fresh();
        fs.mkdir("a").unwrap();
        assert_eq!(fs.mkdir("a"), Err(FsError::AlreadyExists));
        assert_eq!(fs.mkdir("x/y"), Err(FsError::ParentNotFound));
        fs.create("f", b"").unwrap();
        assert_eq!(fs.mkdir("f"), Err(FsError::AlreadyExists));
    }

    #[test]
    fn cd_errors() {
        let mut fs = fresh();
        fs.create("f", b"").unwrap();
        assert_eq!(fs.cd("f"), Err(FsError::NotADirectory));
        assert_eq!(fs.cd("missing"), Err(FsError::NotFound));
        assert_eq!(fs.cd(".."), Err(FsError::NotFound));
        assert_eq!(fs.current_block(), ROOT_BLOCK);
    }

    #[test]
    fn writes_to_working_directory_refresh_cache() {
        let mut fs = fresh();
        fs.mkdir("a").unwrap();
        fs.cd("a").unwrap();
        fs.create("/a/x", b"1").unwrap();
        assert_eq!(listing(&fs), ["x"]);
        fs.mkdir("sub").unwrap();
        fs.mv("/a/x", "/a/sub").unwrap();
        assert_eq!(listing(&fs), ["sub"]);
        fs.cp("sub/x", "..").unwrap();
        fs.mv("/x", "/a/y").unwrap();
        assert_eq!(listing(&fs), ["sub", "y"]);
    }

    // ── cp / mv ──────────────────────────────────────────────────────────────

    #[test]
    fn cp_makes_independent_chain() {
        let mut fs = fresh();
        fs.create("f", &pattern(BLOCK_SIZE + 5)).unwrap();
        fs.cp("f", "g").unwrap();
        let f = fs.stat("f").unwrap();
        let g = fs.stat("g").unwrap();
        assert_ne!(f.first_block, g.first_block);
        fs.append("f", "f").unwrap();
        assert_eq!(fs.cat("g").unwrap(), pattern(BLOCK_SIZE + 5));
    }

    #[test]
    fn cp_into_directory_keeps_name() {
        let mut fs = fresh();
        fs.mkdir("d").unwrap();
        fs.create("f", b"data").unwrap();
        fs.cp("f", "d").unwrap();
        assert_eq!(fs.cat("d/f").unwrap(), b"data");
        assert_eq!(fs.cp("f", "d"), Err(FsError::AlreadyExists));
        assert_eq!(fs.cp("f", "/d/"), Err(FsError::AlreadyExists));
    }

    #[test]
    fn cp_errors() {
        let mut fs = fresh();
        fs.create("f", b"x").unwrap();
        fs.create("g", b"y").unwrap();
        fs.mkdir("d").unwrap();
        assert_eq!(fs.cp("missing", "h"), Err(FsError::NotFound));
        assert_eq!(fs.cp("d", "h"), Err(FsError::NotAFile));
        assert_eq!(fs.cp("f", "g"), Err(FsError::AlreadyExists));
        assert_eq!(fs.cp("f", "nope/h"), Err(FsError::NotFound));
        assert_eq!(fs.cat("g").unwrap(), b"y");
    }

    #[test]
    fn mv_renames_in_place() {
        let mut fs = fresh();
        fs.create("a", b"1").unwrap();
        fs.create("b", b"2").unwrap();
        let first = fs.stat("a").unwrap().first_block;
        fs.mv("a", "c").unwrap();
        assert_eq!(listing(&fs), ["b", "c"]);
        assert_eq!(fs.stat("c").unwrap().first_block, first);
        assert_eq!(fs.cat("c").unwrap(), b"1");
    }

    #[test]
    fn mv_into_directory() {
        let mut fs = fresh();
        fs.mkdir("d").unwrap();
        fs.create("f", b"moved").unwrap();
        let free = fs.fat().free_count();
        fs.mv("f", "d").unwrap();
        assert_eq!(fs.fat().free_count(), free);
        assert_eq!(listing(&fs), ["d"]);
        assert_eq!(fs.cat("d/f").unwrap(), b"moved");
        fs.mv("d/f", "/g").unwrap();
        assert_eq!(fs.cat("g").unwrap(), b"moved");
        fs.mv("g", "d/h").unwrap();
        assert_eq!(fs.cat("/d/h").unwrap(), b"moved");
    }

    #[test]
    fn cp_and_mv_into_full_directory() {
        let mut fs = fresh();
        fs.mkdir("d").unwrap();
        for i in 0..DIR_ENTRIES - 1 {
            fs.create(&format!("d/f{i}"), b"").unwrap();
        }
        fs.create("x", b"payload").unwrap();
        let free = fs.fat().free_count();
        assert_eq!(fs.cp("x", "d"), Err(FsError::DirectoryFull));
        assert_eq!(fs.mv("x", "d"), Err(FsError::DirectoryFull));
        assert_eq!(fs.mv("x", "d/y"), Err(FsError::DirectoryFull));
        assert_eq!(fs.fat().free_count(), free);
        assert_eq!(fs.cat("x").unwrap(), b"payload");
    }

    #[test]
    fn parent_of_root_is_not_a_destination() {
        let mut fs = fresh();
        fs.create("f", b"x").unwrap();
        assert_eq!(fs.cd(".."), Err(FsError::NotFound));
        assert_eq!(fs.cp("f", ".."), Err(FsError::NotFound));
        assert_eq!(fs.mv("f", "/.."), Err(FsError::NotFound));
        assert_eq!(listing(&fs), ["f"]);
    }

    #[test]
    fn mv_errors() {
        let mut fs = fresh();
        fs.create("f", b"x").unwrap();
        fs.create("g", b"y").unwrap();
        fs.mkdir("d").unwrap();
        fs.create("d/f", b"z").unwrap();
        assert_eq!(fs.mv("missing", "h"), Err(FsError::NotFound));
        assert_eq!(fs.mv("d", "e"), Err(FsError::NotAFile));
        assert_eq!(fs.mv("f", "g"), Err(FsError::AlreadyExists));
        assert_eq!(fs.mv("f", "d"), Err(FsError::AlreadyExists));
        assert_eq!(fs.mv("f", "/"), Err(FsError::AlreadyExists));
        assert_eq!(fs.cat("f").unwrap(), b"x");
    }

    // ── append ───────────────────────────────────────────────────────────────

    #[test]
    fn append_extends_destination() {
        let mut fs = fresh();
        fs.create("a", b"hello ").unwrap();
        fs.create("b", b"world\n").unwrap();
        fs.append("b", "a").unwrap();
        assert_eq!(fs.cat("a").unwrap(), b"hello world\n");
        assert_eq!(fs.cat("b").unwrap(), b"world\n");
        assert_eq!(fs.stat("a").unwrap().size, 12);
    }

    #[test]
    fn append_file_to_itself() {
        let mut fs = fresh();
        let data = pattern(BLOCK_SIZE - 1);
        fs.create("f", &data).unwrap();
        fs.append("f", "f").unwrap();
        let mut expected = data.clone();
        expected.extend_from_slice(&data);
        assert_eq!(fs.cat("f").unwrap(), expected);
        let first = fs.stat("f").unwrap().first_block;
        assert_eq!(fs.fat().chain(first).unwrap().len(), 2);
    }

    #[test]
    fn append_errors() {
        let mut fs = fresh();
        fs.create("f", b"x").unwrap();
        fs.mkdir("d").unwrap();
        assert_eq!(fs.append("f", "missing"), Err(FsError::NotFound));
        assert_eq!(fs.append("d", "f"), Err(FsError::NotAFile));
        assert_eq!(fs.append("f", "d"), Err(FsError::NotAFile));
    }

    // ── disk full / persistence / corruption ─────────────────────────────────

    #[test]
    fn disk_full_leaves_state_unchanged() {
        let mut fs = fresh();
        let free = fs.fat().free_count();
        fs.create("big", &pattern((free - 1) * BLOCK_SIZE)).unwrap();
        assert_eq!(fs.fat().free_count(), 1);
        assert_eq!(fs.create("more", &pattern(BLOCK_SIZE + 1)), Err(FsError::DiskFull));
        assert_eq!(fs.cp("big", "copy"), Err(FsError::DiskFull));
        assert_eq!(fs.append("big", "big"), Err(FsError::DiskFull));
        assert_eq!(fs.fat().free_count(), 1);
        assert_eq!(listing(&fs), ["big"]);
        fs.mkdir("d").unwrap();
        assert_eq!(fs.mkdir("e"), Err(FsError::DiskFull));
        assert_eq!(fs.create("f", b""), Err(FsError::DiskFull));
        assert_eq!(fs.fat().free_count(), 0);
    }

    #[test]
    fn mount_restores_saved_filesystem() {
        let mut fs = fresh();
        fs.mkdir("d").unwrap();
        fs.create("d/f", b"persisted").unwrap();
        fs.cd("d").unwrap();
        let disk = fs.into_disk();

        let mut fs = FileSystem::mount(disk).unwrap();
        assert_eq!(fs.current_block(), ROOT_BLOCK);
        assert_eq!(fs.cat("d/f").unwrap(), b"persisted");
        assert_eq!(fs.fat().free_count(), FAT_ENTRIES - 4);
    }

    #[test]
    fn mount_formats_blank_disk() {
        let mut fs = FileSystem::mount(MemDisk::new()).unwrap();
        assert!(fs.ls().is_empty());
        assert_eq!(fs.pwd().unwrap(), "/");
        assert_eq!(fs.fat().free_count(), FAT_ENTRIES - 2);
    }

    #[test]
    fn format_wipes_everything() {
        let mut fs = fresh();
        fs.mkdir("d").unwrap();
        fs.cd("d").unwrap();
        fs.format().unwrap();
        assert_eq!(fs.current_block(), ROOT_BLOCK);
        assert!(fs.ls().is_empty());
        assert_eq!(fs.fat().free_count(), FAT_ENTRIES - 2);
    }

    #[test]
    fn chain_cycle_is_fatal_and_changes_nothing() {
        let mut fs = fresh();
        fs.create("f", &pattern(2 * BLOCK_SIZE)).unwrap();
        let mut image = fs.into_disk().into_image();
        // FAT entry 3 (second block of f) points back at block 2
        image[6..8].copy_from_slice(&2u16.to_le_bytes());

        let mut fs = FileSystem::mount(MemDisk::from_image(image)).unwrap();
        let err = fs.cat("f").unwrap_err();
        assert!(err.is_fatal());
        let err = fs.rm("f").unwrap_err();
        assert!(matches!(err, FsError::Corrupt { .. }));
        assert_eq!(listing(&fs), ["f"]);
        assert_eq!(fs.fat().get(2), FatEntry::Next(3));
    }

    #[test]
    fn pwd_reports_ambiguous_parent_entry() {
        let mut fs = fresh();
        fs.mkdir("a").unwrap();
        let a = fs.stat("a").unwrap().first_block;
        let mut disk = fs.into_disk();
        let mut root = DirBlock::load(&mut disk, ROOT_BLOCK).unwrap();
        root.insert(DirEntry::directory("alias", a).unwrap()).unwrap();
        disk.write(ROOT_BLOCK, &root.encode()).unwrap();

        let mut fs = FileSystem::mount(disk).unwrap();
        fs.cd("a").unwrap();
        assert!(matches!(fs.pwd(), Err(FsError::Corrupt { .. })));
    }
}
