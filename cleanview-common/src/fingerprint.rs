//! Fast content fingerprint for media files
//!
//! Hashing a multi-gigabyte video on every project load is too slow, so the
//! fingerprint covers the file size plus three 64 KiB samples (head, middle,
//! tail). It detects re-encodes and replacements, not single-byte edits.

use crate::Result;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Bytes sampled at each of the three positions
pub const SAMPLE_SIZE: u64 = 64 * 1024;

/// Compute the fast fingerprint of a file as lowercase hex SHA-256
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    let mut hasher = Sha256::new();
    hasher.update(size.to_le_bytes());

    let offsets: Vec<u64> = if size <= SAMPLE_SIZE * 3 {
        vec![0]
    } else {
        vec![0, size / 2 - SAMPLE_SIZE / 2, size - SAMPLE_SIZE]
    };
    let sample_len = if offsets.len() == 1 { size } else { SAMPLE_SIZE };

    let mut buffer = vec![0u8; sample_len as usize];
    for offset in offsets {
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buffer)?;
        hasher.update(&buffer);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
