// Library crate root — the block-allocation and directory-resolution engine.
// No_std (with alloc) unless testing or building the host tool with `std`.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod block;
pub mod dir;
pub mod fat;
pub mod file;
pub mod fs;
pub mod path;
#[cfg(feature = "std")]
pub mod server;

pub use block::{BlockDev, MemDisk};
pub use dir::{DirBlock, DirEntry};
pub use fat::{Fat, FatEntry};
pub use fs::FileSystem;
