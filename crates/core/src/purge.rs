//! Page-cache eviction.
//!
//! A purge asks the kernel to drop the cached pages of a file with
//! `posix_fadvise(POSIX_FADV_DONTNEED)`. Dirty pages are not written back first,
//! so they survive the advice and are dropped on a later cycle once flushed.

use regex::Regex;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const FALLBACK_PAGE_SIZE: u64 = 4096;

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to evict pages of {}: {source}", .path.display())]
    Advise {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("page cache eviction is not supported on this platform")]
    Unsupported,
    #[error("failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Totals for one purge call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub files: u64,
    pub bytes: u64,
    /// Entries skipped because they could not be read or purged.
    pub failed: u64,
}

impl PurgeStats {
    fn merge(&mut self, other: PurgeStats) {
        self.files += other.files;
        self.bytes += other.bytes;
        self.failed += other.failed;
    }
}

/// The eviction primitives a scheduler drives.
///
/// Both calls block for as long as the throttle requires; callers on an async
/// runtime should run them on a blocking thread.
pub trait PurgeEngine: Send + Sync {
    /// Recursively purge every regular file under `root` whose file name matches `filter`.
    fn walk_and_purge(
        &self,
        root: &Path,
        filter: &Regex,
        rate: u64,
        verbose: bool,
    ) -> Result<PurgeStats, PurgeError>;

    /// Purge the first `size` bytes of one regular file.
    fn purge_file(
        &self,
        path: &Path,
        size: u64,
        rate: u64,
        verbose: bool,
    ) -> Result<PurgeStats, PurgeError>;
}

/// Production engine backed by `posix_fadvise`.
#[derive(Clone, Debug)]
pub struct FadvisePurger {
    page_size: u64,
    pause: Duration,
}

impl Default for FadvisePurger {
    fn default() -> Self {
        Self::new()
    }
}

impl FadvisePurger {
    pub fn new() -> Self {
        Self {
            page_size: page_size(),
            pause: Duration::from_secs(1),
        }
    }

    /// Override the pause between throttled chunks (one second by default).
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }
}

impl PurgeEngine for FadvisePurger {
    fn walk_and_purge(
        &self,
        root: &Path,
        filter: &Regex,
        rate: u64,
        verbose: bool,
    ) -> Result<PurgeStats, PurgeError> {
        if !cfg!(target_os = "linux") {
            return Err(PurgeError::Unsupported);
        }

        let mut stats = PurgeStats::default();

        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) if e.depth() == 0 => {
                    return Err(PurgeError::Walk {
                        path: root.to_path_buf(),
                        source: e,
                    })
                }
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                    stats.failed += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            if !filter.is_match(&entry.file_name().to_string_lossy()) {
                continue;
            }

            // Re-stat: the file may have changed since the directory was read.
            let size = match entry.metadata() {
                Ok(m) => m.len(),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping file");
                    stats.failed += 1;
                    continue;
                }
            };

            match self.purge_file(entry.path(), size, rate, verbose) {
                Ok(s) => stats.merge(s),
                Err(e) => {
                    warn!(error = %e, "purge failed");
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    fn purge_file(
        &self,
        path: &Path,
        size: u64,
        rate: u64,
        verbose: bool,
    ) -> Result<PurgeStats, PurgeError> {
        if !cfg!(target_os = "linux") {
            return Err(PurgeError::Unsupported);
        }

        let file = File::open(path).map_err(|source| PurgeError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        for (i, (offset, len)) in chunk_plan(size, rate, self.page_size).enumerate() {
            if i > 0 && !self.pause.is_zero() {
                std::thread::sleep(self.pause);
            }
            fadvise_dontneed(&file, offset, len).map_err(|source| PurgeError::Advise {
                path: path.to_path_buf(),
                source,
            })?;
        }

        if verbose {
            info!(path = %path.display(), bytes = size, "purged");
        } else {
            debug!(path = %path.display(), bytes = size, "purged");
        }

        Ok(PurgeStats {
            files: 1,
            bytes: size,
            failed: 0,
        })
    }
}

/// Split `size` bytes into `(offset, len)` chunks of `rate` pages each.
///
/// `rate == 0` yields the whole range at once. An empty file yields nothing.
pub fn chunk_plan(size: u64, rate: u64, page_size: u64) -> ChunkPlan {
    let step = if rate == 0 {
        size
    } else {
        rate.saturating_mul(page_size.max(1))
    };
    ChunkPlan {
        offset: 0,
        size,
        step,
    }
}

#[derive(Clone, Debug)]
pub struct ChunkPlan {
    offset: u64,
    size: u64,
    step: u64,
}

impl Iterator for ChunkPlan {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.size || self.step == 0 {
            return None;
        }
        let len = self.step.min(self.size - self.offset);
        let chunk = (self.offset, len);
        self.offset += len;
        Some(chunk)
    }
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
fn page_size() -> u64 {
    // SAFETY: sysconf has no memory-safety preconditions.
    let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if n > 0 {
        n as u64
    } else {
        FALLBACK_PAGE_SIZE
    }
}

#[cfg(not(target_os = "linux"))]
fn page_size() -> u64 {
    FALLBACK_PAGE_SIZE
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
fn fadvise_dontneed(file: &File, offset: u64, len: u64) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let offset = libc::off_t::try_from(offset)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))?;
    let len = libc::off_t::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length out of range"))?;

    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let ret =
        unsafe { libc::posix_fadvise(file.as_raw_fd(), offset, len, libc::POSIX_FADV_DONTNEED) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(ret))
    }
}

#[cfg(not(target_os = "linux"))]
fn fadvise_dontneed(_file: &File, _offset: u64, _len: u64) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "page cache eviction requires posix_fadvise",
    ))
}
