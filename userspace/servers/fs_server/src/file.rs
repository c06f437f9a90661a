/// Chunked file I/O on top of FAT chains.
///
/// File contents are stored verbatim, one `BLOCK_SIZE` chunk per block. The
/// tail of the last block is padding; the entry's `size` is the only record
/// of where the data ends.

use alloc::vec::Vec;

use fs_api_types::{FsError, FsResult, BLOCK_SIZE};

use crate::block::BlockDev;
use crate::fat::Fat;

/// Store `data` in a freshly allocated chain and return its head.
///
/// All blocks are allocated before the first write, so `DiskFull` leaves
/// both the table and the disk as they were.
pub fn write_chain<D: BlockDev>(disk: &mut D, fat: &mut Fat, data: &[u8]) -> FsResult<u16> {
    let blocks = fat.allocate(Fat::blocks_for(data.len()))?;
    write_blocks(disk, &blocks, data)?;
    log::debug!("file: wrote {} bytes to chain at {}", data.len(), blocks[0]);
    Ok(blocks[0])
}

/// Read the chain at `first` and trim the result to `size` bytes.
pub fn read_chain<D: BlockDev>(disk: &mut D, fat: &Fat, first: u16, size: u32) -> FsResult<Vec<u8>> {
    let size = size as usize;
    let blocks = fat.chain(first)?;
    if blocks.len() * BLOCK_SIZE < size {
        return Err(FsError::Corrupt { block: first, reason: "chain shorter than file size" });
    }
    let mut out = Vec::with_capacity(size);
    let mut buf = [0u8; BLOCK_SIZE];
    for &block in &blocks {
        let remaining = size - out.len();
        if remaining == 0 {
            break;
        }
        disk.read(block, &mut buf)?;
        out.extend_from_slice(&buf[..remaining.min(BLOCK_SIZE)]);
    }
    Ok(out)
}

/// Append `data` to the file whose chain starts at `first` and currently
/// holds `size` bytes. Free space in the last block is used first; only the
/// overflow gets new blocks. Returns the new size.
pub fn append_chain<D: BlockDev>(
    disk: &mut D,
    fat: &mut Fat,
    first: u16,
    size: u32,
    data: &[u8],
) -> FsResult<u32> {
    let new_size = u32::try_from(size as usize + data.len()).map_err(|_| FsError::DiskFull)?;
    let blocks = fat.chain(first)?;
    if blocks.len() != Fat::blocks_for(size as usize) {
        return Err(FsError::Corrupt { block: first, reason: "chain length does not match file size" });
    }
    let last = *blocks.last().ok_or(FsError::Corrupt { block: first, reason: "empty chain" })?;

    let used = size as usize - (blocks.len() - 1) * BLOCK_SIZE;
    let head = data.len().min(BLOCK_SIZE - used);
    let (head, overflow) = data.split_at(head);

    // Claim the overflow blocks before touching the disk.
    let extra = fat.extend(last, overflow.len().div_ceil(BLOCK_SIZE))?;

    if !head.is_empty() {
        let mut buf = [0u8; BLOCK_SIZE];
        disk.read(last, &mut buf)?;
        buf[used..used + head.len()].copy_from_slice(head);
        disk.write(last, &buf)?;
    }
    write_blocks(disk, &extra, overflow)?;

    log::debug!(
        "file: appended {} bytes to chain at {first} ({} new blocks)",
        data.len(),
        extra.len()
    );
    Ok(new_size)
}

fn write_blocks<D: BlockDev>(disk: &mut D, blocks: &[u16], data: &[u8]) -> FsResult<()> {
    for (i, &block) in blocks.iter().enumerate() {
        let start = (i * BLOCK_SIZE).min(data.len());
        let end = (start + BLOCK_SIZE).min(data.len());
        let mut buf = [0u8; BLOCK_SIZE];
        buf[..end - start].copy_from_slice(&data[start..end]);
        disk.write(block, &buf)?;
    }
    Ok(())
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
