//! File digest used by the file-source capability.

use anyhow::{Context, Result};
use blake3::Hasher;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use crate::utils::config::HashingConsts;

/// Blake3 digest of a file as lowercase hex. `size` picks the read strategy: files above
/// [`HashingConsts::HASH_MMAP_THRESHOLD`] are memory-mapped, smaller ones streamed.
pub fn hash_file_hex(path: &Path, size: u64) -> Result<String> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Hasher::new();

    if size > HashingConsts::HASH_MMAP_THRESHOLD {
        // SAFETY: the map is read-only and dropped before returning. A file truncated by
        // another process while mapped can fault; sources are not expected to change mid-run.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("mmap {}", path.display()))?;
        hasher.update(&mmap);
    } else {
        let mut reader = BufReader::with_capacity(HashingConsts::HASH_READ_CHUNK_SIZE, file);
        io::copy(&mut reader, &mut hasher).with_context(|| format!("read {}", path.display()))?;
    }

    Ok(hasher.finalize().to_hex().to_string())
}
