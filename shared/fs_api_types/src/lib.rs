#![no_std]

#[cfg(test)]
extern crate std;

pub mod fs;

pub use fs::{AccessRights, Command, EntryKind, FsError, FsResult};

// Disk geometry
pub const BLOCK_SIZE: usize = 4096;
/// One FAT block holds this many 16-bit entries, which also bounds the disk size.
pub const FAT_ENTRIES: usize = BLOCK_SIZE / 2;
pub const BLOCK_COUNT: usize = FAT_ENTRIES;

pub const FAT_BLOCK:  u16 = 0;
pub const ROOT_BLOCK: u16 = 1;

// Directory layout
pub const DIR_ENTRIES:     usize = 64;
pub const DIR_ENTRY_SIZE:  usize = BLOCK_SIZE / DIR_ENTRIES;
pub const NAME_FIELD_LEN:  usize = 56;
/// Longest storable name; the name field keeps one byte for the NUL terminator.
pub const MAX_NAME_LEN:    usize = NAME_FIELD_LEN - 1;

pub const PARENT_NAME: &str = "..";

pub type Block = [u8; BLOCK_SIZE];
