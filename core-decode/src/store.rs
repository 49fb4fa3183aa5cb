//! # Backing Store
//!
//! A fixed-capacity logical file that the host fills from the front while
//! the decode engine reads it from arbitrary offsets.
//!
//! ## Model
//!
//! The store tracks four cursors over `[0, capacity]`:
//!
//! - `write_pos`: end of the contiguous bytes ingested so far
//! - `read_pos`: where the next read starts
//! - `last_request_offset`: start of the range most recently requested from
//!   the host
//! - `capacity`: declared size of the logical file
//!
//! Bytes in `[last_request_offset, write_pos)` are held locally. A seek that
//! lands in `[last_request_offset, write_pos]` is a cache hit and just moves
//! `read_pos`. Any other seek is a cache miss: all cursors collapse onto the
//! target, the host is asked exactly once to deliver bytes from there, and
//! the seek reports failure so the engine does not read immediately.
//!
//! Bytes are persisted in a scratch file rather than in memory.

use crate::error::{DecodeError, Result};
use crate::scratch;

use bridge_traits::host::RangeRequester;
use core_runtime::logging::strip_path;

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace, warn};

/// Reference point of a store seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute offset.
    Start(u64),
    /// Relative to `read_pos`.
    Current(i64),
    /// Relative to `capacity`.
    End(i64),
    /// Query the logical size; no cursor moves.
    Size,
}

/// Errors raised by [`BackingStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// No unread bytes at the read cursor.
    #[error("No data available at offset {0}")]
    Unavailable(u64),

    /// The seek target is not held locally; the host has been asked for it.
    #[error("Offset {0} is not cached, requested from host")]
    CacheMiss(u64),

    /// The seek target lies outside the logical file.
    #[error("Seek target {0} is outside the file")]
    InvalidSeek(i128),

    /// `write` was called with no bytes.
    #[error("Cannot write an empty buffer")]
    EmptyWrite,

    /// The scratch file has already been removed.
    #[error("Scratch file is closed")]
    Closed,

    #[error("Scratch file I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<StoreError> for io::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => e,
            StoreError::Unavailable(_) | StoreError::CacheMiss(_) => {
                io::Error::new(io::ErrorKind::WouldBlock, err)
            }
            StoreError::InvalidSeek(_) | StoreError::EmptyWrite => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            StoreError::Closed => io::Error::new(io::ErrorKind::NotConnected, err),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Append-and-random-read byte cache over a scratch file.
pub struct BackingStore {
    file: Option<File>,
    path: PathBuf,
    capacity: u64,
    write_pos: u64,
    read_pos: u64,
    last_request_offset: u64,
    requester: Option<Box<dyn RangeRequester>>,
    removed: bool,
}

impl fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackingStore")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("write_pos", &self.write_pos)
            .field("read_pos", &self.read_pos)
            .field("last_request_offset", &self.last_request_offset)
            .field("requester", &self.requester.as_ref().map(|_| "RangeRequester { ... }"))
            .finish()
    }
}

impl BackingStore {
    /// Creates an empty store of `capacity` bytes with a new scratch file
    /// in `dir`.
    pub fn create(dir: &Path, capacity: u64) -> Result<Self> {
        let (file, path) = scratch::create_in(dir).map_err(|source| DecodeError::OpenFile {
            path: dir.display().to_string(),
            source,
        })?;

        debug!(
            file = strip_path(&path.to_string_lossy()),
            capacity, "Created backing store"
        );

        Ok(Self {
            file: Some(file),
            path,
            capacity,
            write_pos: 0,
            read_pos: 0,
            last_request_offset: 0,
            requester: None,
            removed: false,
        })
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn write_pos(&self) -> u64 {
        self.write_pos
    }

    pub fn read_pos(&self) -> u64 {
        self.read_pos
    }

    pub fn last_request_offset(&self) -> u64 {
        self.last_request_offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes ingested but not yet read.
    pub fn unread(&self) -> u64 {
        self.write_pos - self.read_pos
    }

    /// Whether ingestion has reached the end of the logical file.
    pub fn is_complete(&self) -> bool {
        self.write_pos >= self.capacity
    }

    /// Whether the read cursor has consumed the whole logical file.
    pub fn at_end(&self) -> bool {
        self.read_pos >= self.capacity
    }

    /// Installs the callback used to report cache misses.
    pub fn attach_requester(&mut self, requester: Box<dyn RangeRequester>) {
        self.requester = Some(requester);
    }

    pub fn detach_requester(&mut self) -> Option<Box<dyn RangeRequester>> {
        self.requester.take()
    }

    pub fn has_requester(&self) -> bool {
        self.requester.is_some()
    }

    /// Appends `data` at `write_pos`, truncated to the remaining capacity.
    ///
    /// Returns the number of bytes stored, `0` once the store is full.
    pub fn write(&mut self, data: &[u8]) -> StoreResult<usize> {
        if data.is_empty() {
            return Err(StoreError::EmptyWrite);
        }

        let room = self.capacity - self.write_pos;
        if room == 0 {
            trace!(len = data.len(), "Store full, dropping data");
            return Ok(0);
        }

        let len = (data.len() as u64).min(room) as usize;
        let offset = self.write_pos;
        let file = self.file.as_mut().ok_or(StoreError::Closed)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&data[..len])?;

        self.write_pos += len as u64;
        trace!(offset, len, write_pos = self.write_pos, "Ingested data");
        Ok(len)
    }

    /// Reads up to `buf.len()` unread bytes starting at `read_pos`.
    pub fn read(&mut self, buf: &mut [u8]) -> StoreResult<usize> {
        let available = self.unread();
        if available == 0 {
            return Err(StoreError::Unavailable(self.read_pos));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let len = (buf.len() as u64).min(available) as usize;
        let offset = self.read_pos;
        let file = self.file.as_mut().ok_or(StoreError::Closed)?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf[..len])?;

        self.read_pos += len as u64;
        Ok(len)
    }

    /// Moves the read cursor, requesting data from the host on a miss.
    ///
    /// Returns the new absolute position on a hit and the logical size for
    /// [`Whence::Size`]. A miss returns [`StoreError::CacheMiss`] after the
    /// host has been notified exactly once.
    pub fn seek(&mut self, whence: Whence) -> StoreResult<u64> {
        let target = match whence {
            Whence::Size => return Ok(self.capacity),
            Whence::Start(offset) => offset as i128,
            Whence::Current(delta) => self.read_pos as i128 + delta as i128,
            Whence::End(delta) => self.capacity as i128 + delta as i128,
        };

        if target < 0 || target > self.capacity as i128 {
            warn!(offset = %target, capacity = self.capacity, "Seek outside file");
            return Err(StoreError::InvalidSeek(target));
        }

        let pos = target as u64;
        if pos >= self.last_request_offset && pos <= self.write_pos {
            self.read_pos = pos;
            trace!(pos, "Store seek hit");
            return Ok(pos);
        }

        self.last_request_offset = pos;
        self.read_pos = pos;
        self.write_pos = pos;

        match self.requester.as_mut() {
            Some(requester) => {
                debug!(offset = pos, "Cache miss, requesting range from host");
                requester.request_range(pos);
            }
            None => warn!(offset = pos, "Cache miss with no range requester attached"),
        }

        Err(StoreError::CacheMiss(pos))
    }

    /// Closes and deletes the scratch file. Further reads and writes fail
    /// with [`StoreError::Closed`].
    ///
    /// A failed removal is retried by the next call and on drop.
    pub fn remove_scratch(&mut self) -> StoreResult<()> {
        if self.removed {
            return Ok(());
        }
        self.file = None;
        scratch::remove(&self.path)?;
        self.removed = true;
        debug!(file = strip_path(&self.path.to_string_lossy()), "Removed scratch file");
        Ok(())
    }
}

impl Drop for BackingStore {
    fn drop(&mut self) {
        if let Err(e) = self.remove_scratch() {
            warn!(error = %e, "Failed to remove scratch file");
        }
    }
}
