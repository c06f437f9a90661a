/// Directory blocks and their entries.
///
/// A directory is exactly one block of 64 fixed-size slots. Non-root
/// directories keep a `..` entry pointing at their parent in slot 0.
///
/// Slot layout (64 bytes, little-endian):
///
/// | offset | size | field          |
/// |--------|------|----------------|
/// | 0      | 56   | name, NUL-padded |
/// | 56     | 4    | size           |
/// | 60     | 2    | first block    |
/// | 62     | 1    | kind           |
/// | 63     | 1    | access rights  |

use fs_api_types::{
    AccessRights, Block, EntryKind, FsError, FsResult, BLOCK_SIZE, DIR_ENTRIES, DIR_ENTRY_SIZE,
    MAX_NAME_LEN, NAME_FIELD_LEN, PARENT_NAME,
};

use crate::block::BlockDev;

const SIZE_OFFSET:   usize = NAME_FIELD_LEN;
const FIRST_OFFSET:  usize = SIZE_OFFSET + 4;
const KIND_OFFSET:   usize = FIRST_OFFSET + 2;
const RIGHTS_OFFSET: usize = KIND_OFFSET + 1;

pub type Name = heapless::String<MAX_NAME_LEN>;

/// Check that `name` can be stored as a single directory entry name.
pub fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name == "." || name == PARENT_NAME || name.contains(['/', '\0']) {
        return Err(FsError::InvalidName);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}

/// Copy `name` into fixed-capacity storage.
pub fn make_name(name: &str) -> FsResult<Name> {
    let mut out = Name::new();
    out.push_str(name).map_err(|_| FsError::NameTooLong)?;
    Ok(out)
}

// ─── Directory entry ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name:        Name,
    pub kind:        EntryKind,
    pub rights:      AccessRights,
    pub size:        u32,
    pub first_block: u16,
}

impl DirEntry {
    pub const fn empty() -> Self {
        DirEntry {
            name: Name::new(),
            kind: EntryKind::Empty,
            rights: AccessRights::empty(),
            size: 0,
            first_block: 0,
        }
    }

    pub fn file(name: &str, first_block: u16, size: u32) -> FsResult<Self> {
        Ok(DirEntry {
            name: make_name(name)?,
            kind: EntryKind::File,
            rights: AccessRights::read_write(),
            size,
            first_block,
        })
    }

    pub fn directory(name: &str, first_block: u16) -> FsResult<Self> {
        Ok(DirEntry {
            name: make_name(name)?,
            kind: EntryKind::Directory,
            rights: AccessRights::read_write(),
            size: 0,
            first_block,
        })
    }

    /// The synthetic `..` link stored in slot 0 of every non-root directory.
    pub fn parent_link(parent: u16) -> Self {
        let mut name = Name::new();
        // ".." always fits
        let _ = name.push_str(PARENT_NAME);
        DirEntry {
            name,
            kind: EntryKind::Directory,
            rights: AccessRights::read_write(),
            size: 0,
            first_block: parent,
        }
    }

    pub fn is_empty(&self) -> bool { self.kind == EntryKind::Empty }
    pub fn is_file(&self) -> bool { self.kind == EntryKind::File }
    pub fn is_dir(&self) -> bool { self.kind == EntryKind::Directory }

    pub fn is_parent_link(&self) -> bool {
        self.is_dir() && self.name == PARENT_NAME
    }

    fn encode(&self, raw: &mut [u8]) {
        raw.fill(0);
        if self.is_empty() {
            return;
        }
        raw[..self.name.len()].copy_from_slice(self.name.as_bytes());
        raw[SIZE_OFFSET..FIRST_OFFSET].copy_from_slice(&self.size.to_le_bytes());
        raw[FIRST_OFFSET..KIND_OFFSET].copy_from_slice(&self.first_block.to_le_bytes());
        raw[KIND_OFFSET] = self.kind.into();
        raw[RIGHTS_OFFSET] = self.rights.bits();
    }

    fn decode(raw: &[u8], block: u16) -> FsResult<Self> {
        let kind = EntryKind::try_from(raw[KIND_OFFSET])
            .map_err(|_| FsError::Corrupt { block, reason: "unknown directory entry kind" })?;
        if kind == EntryKind::Empty {
            return Ok(Self::empty());
        }
        let name_len = raw[..NAME_FIELD_LEN]
            .iter()
            .position(|&b| b == 0)
            .ok_or(FsError::Corrupt { block, reason: "unterminated entry name" })?;
        let name = core::str::from_utf8(&raw[..name_len])
            .map_err(|_| FsError::Corrupt { block, reason: "entry name is not UTF-8" })?;
        Ok(DirEntry {
            name: make_name(name)?,
            kind,
            rights: AccessRights::from_bits_retain(raw[RIGHTS_OFFSET]),
            size: u32::from_le_bytes([
                raw[SIZE_OFFSET],
                raw[SIZE_OFFSET + 1],
                raw[SIZE_OFFSET + 2],
                raw[SIZE_OFFSET + 3],
            ]),
            first_block: u16::from_le_bytes([raw[FIRST_OFFSET], raw[FIRST_OFFSET + 1]]),
        })
    }
}

// ─── Directory block ───────────────────────────────────────────────────────────

/// The 64 slots of one directory. Occupied slots are kept dense at the front:
/// inserts take the first empty slot and removals move the last occupied
/// slot into the hole, so entry order is not stable across removals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirBlock {
    entries: [DirEntry; DIR_ENTRIES],
}

impl DirBlock {
    /// An empty directory with no `..` link; only the root looks like this.
    pub fn new() -> Self {
        DirBlock { entries: core::array::from_fn(|_| DirEntry::empty()) }
    }

    pub fn with_parent(parent: u16) -> Self {
        let mut dir = Self::new();
        dir.entries[0] = DirEntry::parent_link(parent);
        dir
    }

    /// `index` is only used to locate corruption reports.
    pub fn decode(block: &Block, index: u16) -> FsResult<Self> {
        let mut dir = Self::new();
        for (entry, raw) in dir.entries.iter_mut().zip(block.chunks_exact(DIR_ENTRY_SIZE)) {
            *entry = DirEntry::decode(raw, index)?;
        }
        Ok(dir)
    }

    pub fn encode(&self) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        for (entry, raw) in self.entries.iter().zip(block.chunks_exact_mut(DIR_ENTRY_SIZE)) {
            entry.encode(raw);
        }
        block
    }

    pub fn load<D: BlockDev>(disk: &mut D, index: u16) -> FsResult<Self> {
        let mut block = [0u8; BLOCK_SIZE];
        disk.read(index, &mut block)?;
        Self::decode(&block, index)
    }

    pub fn get(&self, slot: usize) -> &DirEntry {
        &self.entries[slot]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut DirEntry {
        &mut self.entries[slot]
    }

    /// Occupied slots, `..` included.
    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| !e.is_empty())
    }

    /// Occupied slots a listing shows: everything but `..`.
    pub fn children(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries().filter(|e| !e.is_parent_link())
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_full(&self) -> bool {
        self.len() == DIR_ENTRIES
    }

    /// True when nothing but the `..` link is left.
    pub fn has_no_children(&self) -> bool {
        self.children().next().is_none()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| !e.is_empty() && e.name == name)
    }

    /// Put `entry` in the first empty slot and return that slot.
    pub fn insert(&mut self, entry: DirEntry) -> FsResult<usize> {
        if self.find(&entry.name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let slot = self
            .entries
            .iter()
            .position(DirEntry::is_empty)
            .ok_or(FsError::DirectoryFull)?;
        self.entries[slot] = entry;
        Ok(slot)
    }

    /// Remove the entry in `slot`, filling the hole with the last occupied
    /// slot, and return the removed entry.
    pub fn remove(&mut self, slot: usize) -> DirEntry {
        let last = self
            .entries
            .iter()
            .rposition(|e| !e.is_empty())
            .unwrap_or(slot);
        let removed = core::mem::replace(&mut self.entries[slot], DirEntry::empty());
        if last != slot {
            self.entries.swap(slot, last);
        }
        removed
    }

    /// Find the one child directory whose chain starts at `block`.
    ///
    /// `here` is this directory's own block, used in corruption reports. Two
    /// entries sharing a block would make the name ambiguous, so that is
    /// reported as corruption too.
    pub fn child_dir_at(&self, block: u16, here: u16) -> FsResult<&DirEntry> {
        let mut matches = self
            .children()
            .filter(|e| e.is_dir() && e.first_block == block);
        let found = matches
            .next()
            .ok_or(FsError::Corrupt { block: here, reason: "directory missing from its parent" })?;
        if matches.next().is_some() {
            log::error!("dir: block {here} links block {block} more than once");
            return Err(FsError::Corrupt { block: here, reason: "directory linked more than once" });
        }
        Ok(found)
    }
}

impl Default for DirBlock {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
