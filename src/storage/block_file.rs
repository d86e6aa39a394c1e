//! # Block File I/O
//!
//! Random-access reads and writes of fixed-size blocks in the single
//! database file. Block `i` lives at byte offset `HEADER_SIZE + i *
//! block_size`; the header occupies bytes `0..HEADER_SIZE`.
//!
//! The interface is copy-based (seek + read/write into caller buffers)
//! with no buffering of its own beyond the OS page cache and no file
//! locking. Callers pass the block size explicitly because a resize
//! operation works with two block sizes at once while it rewrites the
//! file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};

use crate::config::HEADER_SIZE;
use crate::storage::FileHeader;
use zerocopy::IntoBytes;

#[derive(Debug)]
pub struct BlockFile {
    file: File,
    path: PathBuf,
}

impl BlockFile {
    /// Opens `path` read-write, creating it when absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_len(&self) -> Result<u64> {
        let meta = self
            .file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", self.path.display()))?;
        Ok(meta.len())
    }

    /// Reads up to `HEADER_SIZE` bytes from the start of the file,
    /// returning how many were actually available.
    pub fn read_header_bytes(&mut self, buf: &mut [u8; HEADER_SIZE]) -> Result<usize> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut filled = 0;
        while filled < HEADER_SIZE {
            let n = self.file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Overwrites bytes `0..HEADER_SIZE` with `header`.
    pub fn write_header(&mut self, header: &FileHeader) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file
            .write_all(header.as_bytes())
            .wrap_err_with(|| format!("failed to write header to '{}'", self.path.display()))
    }

    /// Reads block `i` into `buf`, which must be exactly `block_size` long.
    pub fn read_block(&mut self, block: u64, block_size: u64, buf: &mut [u8]) -> Result<()> {
        ensure!(
            buf.len() as u64 == block_size,
            "block buffer is {} bytes, block size is {}",
            buf.len(),
            block_size
        );
        self.file.seek(SeekFrom::Start(block_offset(block, block_size)))?;
        self.file
            .read_exact(buf)
            .wrap_err_with(|| format!("failed to read block {} from '{}'", block, self.path.display()))
    }

    /// Reads `count` consecutive blocks starting at `first` into `buf`,
    /// resizing it to `count * block_size`. One syscall per run; the scan
    /// engine uses this to batch out-of-core reads.
    pub fn read_block_run(
        &mut self,
        first: u64,
        count: usize,
        block_size: u64,
        buf: &mut Vec<u8>,
    ) -> Result<()> {
        buf.resize(count * block_size as usize, 0);
        self.file.seek(SeekFrom::Start(block_offset(first, block_size)))?;
        self.file.read_exact(buf).wrap_err_with(|| {
            format!(
                "failed to read blocks {}..{} from '{}'",
                first,
                first + count as u64,
                self.path.display()
            )
        })
    }

    /// Writes one encoded block at index `block`. `data` must be exactly
    /// `block_size` long.
    pub fn write_block(&mut self, block: u64, block_size: u64, data: &[u8]) -> Result<()> {
        ensure!(
            data.len() as u64 == block_size,
            "encoded block is {} bytes, block size is {}",
            data.len(),
            block_size
        );
        self.file.seek(SeekFrom::Start(block_offset(block, block_size)))?;
        self.file
            .write_all(data)
            .wrap_err_with(|| format!("failed to write block {} to '{}'", block, self.path.display()))
    }

    /// Shrinks or grows the file to hold exactly `blocks` blocks.
    pub fn truncate_to(&mut self, blocks: u64, block_size: u64) -> Result<()> {
        let len = HEADER_SIZE as u64 + blocks * block_size;
        self.file
            .set_len(len)
            .wrap_err_with(|| format!("failed to truncate '{}' to {} bytes", self.path.display(), len))
    }

    pub fn sync(&self) -> Result<()> {
        self.file
            .sync_all()
            .wrap_err_with(|| format!("failed to sync '{}'", self.path.display()))
    }
}

#[inline]
fn block_offset(block: u64, block_size: u64) -> u64 {
    HEADER_SIZE as u64 + block * block_size
}
