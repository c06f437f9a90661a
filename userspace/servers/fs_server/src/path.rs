/// Path resolution.
///
/// Every operation funnels its path arguments through `resolve`, which walks
/// all components but the last and hands the last one back unresolved. The
/// caller decides whether that leaf is something to create, look up, or
/// match, so "parent missing" and "name free" stay distinguishable.

use alloc::vec::Vec;

use fs_api_types::{FsError, FsResult, ROOT_BLOCK};

use crate::block::BlockDev;
use crate::dir::DirBlock;

/// A path split into its walk and its leaf.
#[derive(Debug, PartialEq, Eq)]
pub struct PathSpec<'p> {
    pub absolute: bool,
    pub parents:  Vec<&'p str>,
    /// Empty when the path names a directory itself (`/`, `a/..`).
    pub leaf:     &'p str,
}

/// Split `path` on `/`. Empty components and `.` are dropped, so `a//b/`
/// and `./a/b` both split as `["a"] + "b"`.
pub fn split(path: &str) -> PathSpec<'_> {
    let absolute = path.starts_with('/');
    let mut parents: Vec<&str> = path
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    let leaf = parents.pop().unwrap_or("");
    PathSpec { absolute, parents, leaf }
}

/// The directory a path's leaf lives in.
pub struct Resolved<'p> {
    pub dir:   DirBlock,
    pub block: u16,
    pub leaf:  &'p str,
}

impl Resolved<'_> {
    /// Slot of the leaf in `dir`.
    pub fn slot(&self) -> FsResult<usize> {
        self.dir.find(self.leaf).ok_or(FsError::NotFound)
    }
}

/// Resolve `path` starting from `cwd` (stored at block `cwd_block`), or from
/// the root when the path is absolute.
///
/// Each walked component must name a directory entry, `..` included; a file
/// in the way is `NotADirectory` and a missing name is `NotFound`.
pub fn resolve<'p, D: BlockDev>(
    disk: &mut D,
    cwd: &DirBlock,
    cwd_block: u16,
    path: &'p str,
) -> FsResult<Resolved<'p>> {
    let spec = split(path);
    let (mut dir, mut block) = if spec.absolute {
        (DirBlock::load(disk, ROOT_BLOCK)?, ROOT_BLOCK)
    } else {
        (cwd.clone(), cwd_block)
    };

    for component in spec.parents {
        let slot = dir.find(component).ok_or(FsError::NotFound)?;
        let entry = dir.get(slot);
        if !entry.is_dir() {
            return Err(FsError::NotADirectory);
        }
        block = entry.first_block;
        dir = DirBlock::load(disk, block)?;
        log::trace!("path: {component} -> block {block}");
    }

    Ok(Resolved { dir, block, leaf: spec.leaf })
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
