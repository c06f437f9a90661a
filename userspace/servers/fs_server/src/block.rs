/// Block device abstraction.
///
/// Every block is `BLOCK_SIZE` bytes and addressed by its 16-bit index, the
/// same width as a FAT entry. All disk I/O in this crate goes through
/// `BlockDev`, so the engine runs unchanged on the in-memory `MemDisk` used
/// by the tests and on the host image file used by the `fs_server` binary.

use alloc::vec;
use alloc::vec::Vec;

use fs_api_types::{Block, FsError, FsResult, BLOCK_COUNT, BLOCK_SIZE};

pub trait BlockDev {
    fn read(&mut self, index: u16, buf: &mut Block) -> FsResult<()>;
    fn write(&mut self, index: u16, buf: &Block) -> FsResult<()>;
}

impl<D: BlockDev + ?Sized> BlockDev for &mut D {
    fn read(&mut self, index: u16, buf: &mut Block) -> FsResult<()> {
        (**self).read(index, buf)
    }
    fn write(&mut self, index: u16, buf: &Block) -> FsResult<()> {
        (**self).write(index, buf)
    }
}

// ─── In-memory disk ────────────────────────────────────────────────────────────

/// A zero-filled disk of `BLOCK_COUNT` blocks backed by a `Vec<u8>`.
pub struct MemDisk(Vec<u8>);

impl MemDisk {
    pub fn new() -> Self {
        MemDisk(vec![0u8; BLOCK_COUNT * BLOCK_SIZE])
    }

    /// Wrap an existing image. Short images are zero-extended.
    pub fn from_image(mut image: Vec<u8>) -> Self {
        image.resize(BLOCK_COUNT * BLOCK_SIZE, 0);
        MemDisk(image)
    }

    pub fn image(&self) -> &[u8] {
        &self.0
    }

    pub fn into_image(self) -> Vec<u8> {
        self.0
    }

    fn range(&self, index: u16) -> FsResult<core::ops::Range<usize>> {
        let off = index as usize * BLOCK_SIZE;
        if off + BLOCK_SIZE > self.0.len() {
            return Err(FsError::Io { block: index });
        }
        Ok(off..off + BLOCK_SIZE)
    }
}

impl Default for MemDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDev for MemDisk {
    fn read(&mut self, index: u16, buf: &mut Block) -> FsResult<()> {
        let range = self.range(index)?;
        buf.copy_from_slice(&self.0[range]);
        Ok(())
    }

    fn write(&mut self, index: u16, buf: &Block) -> FsResult<()> {
        let range = self.range(index)?;
        self.0[range].copy_from_slice(buf);
        Ok(())
    }
}

// ─── Host image file ───────────────────────────────────────────────────────────

#[cfg(feature = "std")]
pub use file_disk::FileDisk;

#[cfg(feature = "std")]
mod file_disk {
    use std::fs::{File, OpenOptions};
    use std::io::{self, Read, Seek, SeekFrom, Write};
    use std::path::Path;

    use fs_api_types::{Block, FsError, FsResult, BLOCK_COUNT, BLOCK_SIZE};

    use super::BlockDev;

    /// Disk image stored in a regular host file, created and sized on open.
    pub struct FileDisk {
        file: File,
    }

    impl FileDisk {
        pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path.as_ref())?;
            let want = (BLOCK_COUNT * BLOCK_SIZE) as u64;
            if file.metadata()?.len() < want {
                file.set_len(want)?;
            }
            Ok(FileDisk { file })
        }

        fn seek(&mut self, index: u16) -> io::Result<()> {
            if index as usize >= BLOCK_COUNT {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "block index out of range"));
            }
            self.file.seek(SeekFrom::Start(index as u64 * BLOCK_SIZE as u64))?;
            Ok(())
        }
    }

    impl BlockDev for FileDisk {
        fn read(&mut self, index: u16, buf: &mut Block) -> FsResult<()> {
            self.seek(index)
                .and_then(|()| self.file.read_exact(buf))
                .map_err(|err| {
                    log::error!("disk: read of block {index} failed: {err}");
                    FsError::Io { block: index }
                })
        }

        fn write(&mut self, index: u16, buf: &Block) -> FsResult<()> {
            self.seek(index)
                .and_then(|()| self.file.write_all(buf))
                .map_err(|err| {
                    log::error!("disk: write of block {index} failed: {err}");
                    FsError::Io { block: index }
                })
        }
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
