//! File hashing utilities

use anyhow::{Context, Result};
use blake3::Hasher;
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::utils::config::HashingConsts;

/// Hash a file with blake3. Uses memory-mapped I/O for files above threshold, reads in
/// `chunk_size` chunks otherwise.
pub fn hash_file(path: &Path, size: u64, chunk_size: usize) -> Result<[u8; 32]> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Hasher::new();

    if size > HashingConsts::HASH_MMAP_THRESHOLD {
        // Memory-mapped I/O for large files (Blake3 already uses SIMD internally)
        let mmap = unsafe { Mmap::map(&file)? };
        hasher.update(&mmap);
    } else {
        let chunk_size = chunk_size.max(HashingConsts::MIN_READ_CHUNK_SIZE);
        let mut reader = std::io::BufReader::with_capacity(chunk_size, file);
        let mut buffer = vec![0u8; chunk_size];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
    }

    Ok(*hasher.finalize().as_bytes())
}

/// Lowercase hex of a 32-byte hash.
pub fn hash_hex(hash: &[u8; 32]) -> String {
    blake3::Hash::from_bytes(*hash).to_hex().to_string()
}
