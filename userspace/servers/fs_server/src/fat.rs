/// File Allocation Table.
///
/// In-memory mirror of block 0. Entry `i` says what follows block `i` in its
/// chain. On disk each entry is a little-endian `u16`; the two sentinels sit
/// above every valid block index so a link can never be mistaken for one.

use alloc::vec::Vec;

use fs_api_types::{Block, FsError, FsResult, BLOCK_SIZE, FAT_BLOCK, FAT_ENTRIES, ROOT_BLOCK};

use crate::block::BlockDev;

const FAT_FREE: u16 = 0xFFFE;
const FAT_EOC:  u16 = 0xFFFF;

/// First block handed out by the allocator; 0 and 1 are the FAT and root.
const FIRST_DATA_BLOCK: u16 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FatEntry {
    Free,
    EndOfChain,
    Next(u16),
}

impl FatEntry {
    fn encode(self) -> u16 {
        match self {
            FatEntry::Free => FAT_FREE,
            FatEntry::EndOfChain => FAT_EOC,
            FatEntry::Next(n) => n,
        }
    }

    fn decode(raw: u16) -> Option<Self> {
        match raw {
            FAT_FREE => Some(FatEntry::Free),
            FAT_EOC => Some(FatEntry::EndOfChain),
            n if n >= FIRST_DATA_BLOCK && (n as usize) < FAT_ENTRIES => Some(FatEntry::Next(n)),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Fat {
    entries: [FatEntry; FAT_ENTRIES],
}

impl Fat {
    /// A freshly formatted table: only the FAT and root blocks are in use.
    pub fn new() -> Self {
        let mut entries = [FatEntry::Free; FAT_ENTRIES];
        entries[FAT_BLOCK as usize] = FatEntry::EndOfChain;
        entries[ROOT_BLOCK as usize] = FatEntry::EndOfChain;
        Fat { entries }
    }

    /// Decode a FAT block. Returns `None` when the bytes are not a table this
    /// crate wrote, e.g. an all-zero disk.
    pub fn decode(block: &Block) -> Option<Self> {
        let mut entries = [FatEntry::Free; FAT_ENTRIES];
        for (entry, raw) in entries.iter_mut().zip(block.chunks_exact(2)) {
            *entry = FatEntry::decode(u16::from_le_bytes([raw[0], raw[1]]))?;
        }
        let reserved_ok = entries[FAT_BLOCK as usize] == FatEntry::EndOfChain
            && entries[ROOT_BLOCK as usize] == FatEntry::EndOfChain;
        reserved_ok.then_some(Fat { entries })
    }

    pub fn encode(&self) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        for (entry, raw) in self.entries.iter().zip(block.chunks_exact_mut(2)) {
            raw.copy_from_slice(&entry.encode().to_le_bytes());
        }
        block
    }

    pub fn load<D: BlockDev>(disk: &mut D) -> FsResult<Option<Self>> {
        let mut block = [0u8; BLOCK_SIZE];
        disk.read(FAT_BLOCK, &mut block)?;
        Ok(Self::decode(&block))
    }

    pub fn persist<D: BlockDev>(&self, disk: &mut D) -> FsResult<()> {
        disk.write(FAT_BLOCK, &self.encode())
    }

    pub fn get(&self, block: u16) -> FatEntry {
        self.entries[block as usize]
    }

    pub fn free_count(&self) -> usize {
        self.entries.iter().filter(|e| **e == FatEntry::Free).count()
    }

    /// Number of blocks a chain holding `len` bytes occupies. Every chain has
    /// at least one block, so an empty file still owns a valid head.
    pub fn blocks_for(len: usize) -> usize {
        len.div_ceil(BLOCK_SIZE).max(1)
    }

    /// Allocate `count` free blocks first-fit in ascending order and link them
    /// in that order, the last one terminating the chain.
    ///
    /// The table is untouched on `DiskFull`.
    pub fn allocate(&mut self, count: usize) -> FsResult<Vec<u16>> {
        let blocks: Vec<u16> = (FIRST_DATA_BLOCK..FAT_ENTRIES as u16)
            .filter(|&b| self.entries[b as usize] == FatEntry::Free)
            .take(count)
            .collect();
        if blocks.len() < count {
            log::debug!("fat: need {count} blocks, only {} free", blocks.len());
            return Err(FsError::DiskFull);
        }
        for pair in blocks.windows(2) {
            self.entries[pair[0] as usize] = FatEntry::Next(pair[1]);
        }
        if let Some(&last) = blocks.last() {
            self.entries[last as usize] = FatEntry::EndOfChain;
        }
        log::trace!("fat: allocated {blocks:?}");
        Ok(blocks)
    }

    /// Allocate a chain large enough for `len` bytes; returns its head.
    pub fn allocate_chain(&mut self, len: usize) -> FsResult<u16> {
        let blocks = self.allocate(Self::blocks_for(len))?;
        Ok(blocks[0])
    }

    /// Allocate `count` more blocks and hang them off `last`, which must
    /// currently end its chain.
    pub fn extend(&mut self, last: u16, count: usize) -> FsResult<Vec<u16>> {
        if self.entries[last as usize] != FatEntry::EndOfChain {
            return Err(FsError::Corrupt { block: last, reason: "extending a block that does not end its chain" });
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        let blocks = self.allocate(count)?;
        self.entries[last as usize] = FatEntry::Next(blocks[0]);
        Ok(blocks)
    }

    /// Walk the chain starting at `first` and return its blocks in order.
    ///
    /// A free block inside the chain or a chain longer than the disk (a cycle)
    /// is reported as corruption rather than followed.
    pub fn chain(&self, first: u16) -> FsResult<Vec<u16>> {
        if first as usize >= FAT_ENTRIES {
            return Err(FsError::Corrupt { block: first, reason: "chain head out of range" });
        }
        let mut blocks = Vec::new();
        let mut cur = first;
        loop {
            if blocks.len() == FAT_ENTRIES {
                log::error!("fat: chain starting at {first} loops");
                return Err(FsError::Corrupt { block: cur, reason: "chain forms a cycle" });
            }
            blocks.push(cur);
            match self.entries[cur as usize] {
                FatEntry::EndOfChain => return Ok(blocks),
                FatEntry::Next(next) => cur = next,
                FatEntry::Free => {
                    log::error!("fat: chain starting at {first} runs into free block {cur}");
                    return Err(FsError::Corrupt { block: cur, reason: "free block inside a chain" });
                }
            }
        }
    }

    /// Mark every block of the chain at `first` free. Returns how many blocks
    /// were released. Nothing is freed if the chain is corrupt.
    pub fn free_chain(&mut self, first: u16) -> FsResult<usize> {
        if first < FIRST_DATA_BLOCK {
            return Err(FsError::Corrupt { block: first, reason: "freeing a reserved block" });
        }
        let blocks = self.chain(first)?;
        for &b in &blocks {
            self.entries[b as usize] = FatEntry::Free;
        }
        log::trace!("fat: freed {blocks:?}");
        Ok(blocks.len())
    }

    #[cfg(test)]
    pub(crate) fn link(&mut self, from: u16, to: FatEntry) {
        self.entries[from as usize] = to;
    }
}

impl Default for Fat {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemDisk;

    #[test]
    fn new_table_reserves_fat_and_root() {
        let fat = Fat::new();
        assert_eq!(fat.get(0), FatEntry::EndOfChain);
        assert_eq!(fat.get(1), FatEntry::EndOfChain);
        assert_eq!(fat.get(2), FatEntry::Free);
        assert_eq!(fat.free_count(), FAT_ENTRIES - 2);
    }

    #[test]
    fn zeroed_block_is_not_a_table() {
        assert!(Fat::decode(&[0u8; BLOCK_SIZE]).is_none());
    }

    #[test]
    fn persist_then_load() {
        let mut disk = MemDisk::new();
        let mut fat = Fat::new();
        fat.allocate(3).unwrap();
        fat.persist(&mut disk).unwrap();
        let loaded = Fat::load(&mut disk).unwrap().unwrap();
        assert_eq!(loaded.get(2), FatEntry::Next(3));
        assert_eq!(loaded.get(3), FatEntry::Next(4));
        assert_eq!(loaded.get(4), FatEntry::EndOfChain);
        assert_eq!(loaded.free_count(), FAT_ENTRIES - 5);
    }

    #[test]
    fn decode_rejects_out_of_range_link() {
        let mut block = Fat::new().encode();
        block[4..6].copy_from_slice(&(FAT_ENTRIES as u16).to_le_bytes());
        assert!(Fat::decode(&block).is_none());
    }

    #[test]
    fn blocks_for_lengths() {
        assert_eq!(Fat::blocks_for(0), 1);
        assert_eq!(Fat::blocks_for(1), 1);
        assert_eq!(Fat::blocks_for(BLOCK_SIZE), 1);
        assert_eq!(Fat::blocks_for(BLOCK_SIZE + 1), 2);
    }

    #[test]
    fn allocation_is_first_fit_ascending() {
        let mut fat = Fat::new();
        let a = fat.allocate(2).unwrap();
        let b = fat.allocate(1).unwrap();
        assert_eq!(a, [2, 3]);
        assert_eq!(b, [4]);
        fat.free_chain(2).unwrap();
        let c = fat.allocate(3).unwrap();
        assert_eq!(c, [2, 3, 5]);
        assert_eq!(fat.chain(2).unwrap(), [2, 3, 5]);
    }

    #[test]
    fn disk_full_leaves_table_untouched() {
        let mut fat = Fat::new();
        fat.allocate(FAT_ENTRIES - 4).unwrap();
        let before = fat.encode();
        assert_eq!(fat.allocate(3), Err(FsError::DiskFull));
        assert_eq!(fat.encode(), before);
        assert_eq!(fat.allocate(2).unwrap().len(), 2);
        assert_eq!(fat.allocate_chain(0), Err(FsError::DiskFull));
    }

    #[test]
    fn free_chain_releases_every_block() {
        let mut fat = Fat::new();
        let head = fat.allocate_chain(3 * BLOCK_SIZE).unwrap();
        assert_eq!(fat.free_chain(head), Ok(3));
        assert_eq!(fat.free_count(), FAT_ENTRIES - 2);
    }

    #[test]
    fn free_chain_refuses_reserved_blocks() {
        let mut fat = Fat::new();
        assert!(matches!(fat.free_chain(1), Err(FsError::Corrupt { .. })));
        assert_eq!(fat.get(1), FatEntry::EndOfChain);
    }

    #[test]
    fn cycle_is_reported_not_followed() {
        let mut fat = Fat::new();
        fat.allocate(3).unwrap();
        fat.link(4, FatEntry::Next(2));
        assert!(matches!(fat.chain(2), Err(FsError::Corrupt { .. })));
        assert!(matches!(fat.free_chain(2), Err(FsError::Corrupt { .. })));
        assert_eq!(fat.get(3), FatEntry::Next(4));
    }

    #[test]
    fn free_block_inside_chain_is_corruption() {
        let mut fat = Fat::new();
        fat.allocate(3).unwrap();
        fat.link(3, FatEntry::Free);
        assert_eq!(
            fat.chain(2),
            Err(FsError::Corrupt { block: 3, reason: "free block inside a chain" })
        );
    }

    #[test]
    fn extend_links_new_blocks() {
        let mut fat = Fat::new();
        let head = fat.allocate_chain(1).unwrap();
        fat.allocate(1).unwrap();
        let more = fat.extend(head, 2).unwrap();
        assert_eq!(more, [4, 5]);
        assert_eq!(fat.chain(head).unwrap(), [2, 4, 5]);
        assert!(matches!(fat.extend(head, 1), Err(FsError::Corrupt { .. })));
    }
}
