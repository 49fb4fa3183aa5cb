//! # Engine I/O Adapter
//!
//! Presents the [`BackingStore`] to a decode engine as a pull-based,
//! seekable byte source (`Read + BufRead + Seek`).
//!
//! Reads go through a fixed transfer buffer allocated once when the adapter
//! is created. Store conditions that mean "not yet" (no unread bytes, a
//! cache miss) surface as [`io::ErrorKind::WouldBlock`] so the engine gives
//! up on the current operation without treating the file as truncated. A
//! complete file that has been read to the end reports EOF (`Ok(0)`).

use crate::store::{BackingStore, StoreError, Whence};

use std::cell::RefCell;
use std::fmt;
use std::io::{self, BufRead, Read, Seek, SeekFrom};
use std::rc::Rc;

/// Random-access reader over a shared [`BackingStore`].
pub struct IoAdapter {
    store: Rc<RefCell<BackingStore>>,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
}

impl fmt::Debug for IoAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoAdapter")
            .field("buffer_size", &self.buf.len())
            .field("pos", &self.pos)
            .field("filled", &self.filled)
            .finish()
    }
}

impl IoAdapter {
    /// Creates an adapter with a transfer buffer of `buffer_size` bytes.
    pub fn new(store: Rc<RefCell<BackingStore>>, buffer_size: usize) -> Self {
        Self {
            store,
            buf: vec![0u8; buffer_size.max(1)].into_boxed_slice(),
            pos: 0,
            filled: 0,
        }
    }

    /// Total size of the logical file.
    pub fn byte_len(&self) -> u64 {
        self.store.borrow().capacity()
    }

    pub fn buffer_size(&self) -> usize {
        self.buf.len()
    }

    /// Bytes held in the transfer buffer but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.filled - self.pos
    }

    fn discard_buffer(&mut self) {
        self.pos = 0;
        self.filled = 0;
    }
}

impl Read for IoAdapter {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        // Large reads with nothing buffered bypass the transfer buffer
        if self.pos >= self.filled && out.len() >= self.buf.len() {
            self.discard_buffer();
            let mut store = self.store.borrow_mut();
            if store.at_end() {
                return Ok(0);
            }
            return Ok(store.read(out)?);
        }

        let n = {
            let available = self.fill_buf()?;
            let n = available.len().min(out.len());
            out[..n].copy_from_slice(&available[..n]);
            n
        };
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for IoAdapter {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.filled {
            let n = {
                let mut store = self.store.borrow_mut();
                if store.at_end() {
                    0
                } else {
                    store.read(&mut self.buf)?
                }
            };
            self.pos = 0;
            self.filled = n;
        }
        Ok(&self.buf[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.filled);
    }
}

impl Seek for IoAdapter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (store_pos, capacity) = {
            let store = self.store.borrow();
            (store.read_pos(), store.capacity())
        };
        // The store cursor sits at the end of the buffered window
        let window_start = store_pos - self.filled as u64;
        let current = window_start + self.pos as u64;

        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(0) => return Ok(current),
            SeekFrom::Current(delta) => current as i128 + delta as i128,
            SeekFrom::End(delta) => capacity as i128 + delta as i128,
        };

        if self.filled > 0 && target >= window_start as i128 && target <= store_pos as i128 {
            self.pos = (target - window_start as i128) as usize;
            return Ok(target as u64);
        }

        // Rejected targets leave the buffered window intact
        if target < 0 || target > capacity as i128 {
            return Err(StoreError::InvalidSeek(target).into());
        }
        self.discard_buffer();
        let result = self.store.borrow_mut().seek(Whence::Start(target as u64));
        Ok(result?)
    }
}
