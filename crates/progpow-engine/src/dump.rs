//! On-disk cache dumps: memory-mapped files with a two-word magic header.
//!
//! Dumps are a cache of a cache — never authoritative. Every failure here
//! is recoverable: the caller regenerates the file or falls back to an
//! in-memory artifact.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use log::debug;
use memmap2::{Mmap, MmapOptions};
use thiserror::Error;

use crate::params::{seed_hash, EPOCH_LENGTH};

/// Data structure revision, part of the dump file name.
pub const ALGORITHM_REVISION: u32 = 1;

/// Sanity-check prefix of every dump file, stored in host byte order.
pub const DUMP_MAGIC: [u32; 2] = [0xbadd_cafe, 0xfee1_dead];

const MAGIC_BYTES: usize = 8;

/// Errors raised while loading or creating a cache dump.
#[derive(Debug, Error)]
pub enum DumpError {
    /// The file did not start with the expected magic words.
    #[error("invalid dump magic")]
    InvalidMagic,

    /// The file length does not match the epoch's cache size; trailing or
    /// missing bytes are not permitted.
    #[error("unexpected dump length: expected {expected} bytes, got {got}")]
    UnexpectedLength {
        /// Expected file length in bytes, magic included.
        expected: u64,
        /// Actual file length in bytes.
        got: u64,
    },

    /// The mapped region was not word-aligned.
    #[error("cache dump is not word-aligned")]
    Misaligned,

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A read-only memory-mapped cache dump.
///
/// The mapping is released on drop; the borrow checker ties every word view
/// to the dump's lifetime, so readers can never outlive the mapping.
pub struct CacheDump {
    mmap: Mmap,
    _file: File,
}

impl CacheDump {
    /// Cache words with the magic prefix stripped.
    ///
    /// Alignment and length were validated when the dump was opened.
    pub fn words(&self) -> &[u32] {
        bytemuck::cast_slice(&self.mmap[MAGIC_BYTES..])
    }
}

/// Dump file path for a seed: `cache-R{rev}-{seed8hex}{suffix}`, where the
/// suffix is empty on little-endian hosts and `.be` on big-endian ones.
pub fn dump_path(dir: &Path, seed: &[u8; 32]) -> PathBuf {
    let suffix = if cfg!(target_endian = "little") {
        ""
    } else {
        ".be"
    };
    dir.join(format!(
        "cache-R{ALGORITHM_REVISION}-{}{suffix}",
        hex::encode(&seed[..8])
    ))
}

/// Memory-maps an existing dump read-only, validating its magic and length.
///
/// `size` is the expected cache payload in bytes, excluding the magic.
pub fn memory_map(path: &Path, size: u64, lock: bool) -> Result<CacheDump, DumpError> {
    let file = File::open(path)?;
    // SAFETY: the mapping is read-only and private to this handle; dump
    // files are replaced by atomic rename, never truncated in place.
    let mmap = unsafe { MmapOptions::new().map(&file)? };

    let expected = MAGIC_BYTES as u64 + size;
    if mmap.len() as u64 != expected {
        return Err(DumpError::UnexpectedLength {
            expected,
            got: mmap.len() as u64,
        });
    }
    let words: &[u32] = bytemuck::try_cast_slice(&mmap[..]).map_err(|_| DumpError::Misaligned)?;
    if words[..2] != DUMP_MAGIC {
        return Err(DumpError::InvalidMagic);
    }
    if lock {
        lock_pages(&mmap)?;
    }
    Ok(CacheDump { mmap, _file: file })
}

/// Creates a dump at `path` and maps it back read-only.
///
/// Writes go to a temporary sibling file: truncate to the full size, map
/// read-write, write the magic, run the generator over the remaining words,
/// unmap, then atomically rename into place.
pub fn memory_map_and_generate(
    path: &Path,
    size: u64,
    lock: bool,
    generator: impl FnOnce(&mut [u32]),
) -> Result<CacheDump, DumpError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut temp = path.as_os_str().to_os_string();
    temp.push(format!(".{:08x}", rand::random::<u32>()));
    let temp = PathBuf::from(temp);

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp)?;
    file.set_len(MAGIC_BYTES as u64 + size)?;

    // SAFETY: the temporary file is exclusive to this call until the final
    // rename; nothing else maps or resizes it.
    let mut mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    {
        let words: &mut [u32] =
            bytemuck::try_cast_slice_mut(&mut mmap[..]).map_err(|_| DumpError::Misaligned)?;
        words[..2].copy_from_slice(&DUMP_MAGIC);
        generator(&mut words[2..]);
    }
    mmap.flush()?;
    drop(mmap);
    drop(file);

    fs::rename(&temp, path)?;
    memory_map(path, size, lock)
}

/// Deletes dumps for epochs at or below `epoch - keep` from `dir`.
pub fn remove_stale_dumps(dir: &Path, epoch: u64, keep: usize) {
    let Some(mut stale) = epoch.checked_sub(keep as u64) else {
        return;
    };
    loop {
        let path = dump_path(dir, &seed_hash(stale * EPOCH_LENGTH + 1));
        if fs::remove_file(&path).is_ok() {
            debug!("removed stale cache dump {}", path.display());
        }
        if stale == 0 {
            break;
        }
        stale -= 1;
    }
}

#[cfg(unix)]
fn lock_pages(mmap: &Mmap) -> Result<(), DumpError> {
    mmap.lock()?;
    Ok(())
}

#[cfg(not(unix))]
fn lock_pages(_mmap: &Mmap) -> Result<(), DumpError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    const SIZE: u64 = 1024;

    fn fill(words: &mut [u32]) {
        for (i, w) in words.iter_mut().enumerate() {
            *w = i as u32 ^ 0xdead_beef;
        }
    }

    #[test]
    fn roundtrip_preserves_words() {
        let dir = tempdir().unwrap();
        let path = dump_path(dir.path(), &[0u8; 32]);

        let dump = memory_map_and_generate(&path, SIZE, false, fill).unwrap();
        let mut expected = vec![0u32; SIZE as usize / 4];
        fill(&mut expected);
        assert_eq!(dump.words(), &expected[..]);
        drop(dump);

        // Reopen from disk, magic stripped again.
        let dump = memory_map(&path, SIZE, false).unwrap();
        assert_eq!(dump.words(), &expected[..]);
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache-R1-bad");
        let mut file = File::create(&path).unwrap();
        file.write_all(&vec![0u8; MAGIC_BYTES + SIZE as usize]).unwrap();
        drop(file);

        assert!(matches!(
            memory_map(&path, SIZE, false),
            Err(DumpError::InvalidMagic)
        ));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let dir = tempdir().unwrap();
        let path = dump_path(dir.path(), &[1u8; 32]);
        memory_map_and_generate(&path, SIZE, false, fill).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0u8; 4]).unwrap();
        drop(file);

        assert!(matches!(
            memory_map(&path, SIZE, false),
            Err(DumpError::UnexpectedLength { .. })
        ));
    }

    #[test]
    fn generator_receives_the_payload_words_only() {
        let dir = tempdir().unwrap();
        let path = dump_path(dir.path(), &[2u8; 32]);
        // The magic prefix is written by the dump layer, not the generator.
        let dump = memory_map_and_generate(&path, SIZE, false, |words| {
            assert_eq!(words.len(), SIZE as usize / 4);
        })
        .unwrap();
        drop(dump);
        assert!(path.exists());
    }

    #[test]
    fn stale_dumps_are_removed_downwards() {
        let dir = tempdir().unwrap();
        let mut paths = Vec::new();
        for e in 0u64..3 {
            let path = dump_path(dir.path(), &seed_hash(e * EPOCH_LENGTH + 1));
            memory_map_and_generate(&path, SIZE, false, fill).unwrap();
            paths.push(path);
        }

        remove_stale_dumps(dir.path(), 2, 1);
        assert!(!paths[0].exists());
        assert!(!paths[1].exists());
        assert!(paths[2].exists());
    }
}
