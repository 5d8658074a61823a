//! FIFO queue with disk-backed overflow.
//!
//! Elements beyond the in-memory cap are appended to a temporary file as
//! length-prefixed JSON records (u32 little-endian length, then the
//! payload), so spill files are portable across schema evolution and
//! process versions. Dequeue refills transparently from the file.
//!
//! Designed for fill-once-then-drain. Interleaved offers after a spill
//! keep strict FIFO by routing every subsequent offer to disk until the
//! file drains; the file is removed once empty and recreated on the next
//! overflow.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use trawl_core::Error;

/// Bounded-memory FIFO queue spilling overflow to a temp file.
pub struct DiskSpillQueue<T> {
    mem: VecDeque<T>,
    mem_capacity: usize,
    spill: Option<Spill>,
    disk_len: usize,
}

/// Write handle plus an independent sequential read handle on the same
/// backing file. The file is deleted when the handle drops.
struct Spill {
    file: NamedTempFile,
    reader: BufReader<File>,
}

impl<T: Serialize + DeserializeOwned> DiskSpillQueue<T> {
    pub fn new(mem_capacity: usize) -> Self {
        Self { mem: VecDeque::with_capacity(mem_capacity.min(1024)), mem_capacity, spill: None, disk_len: 0 }
    }

    /// Enqueue one element.
    ///
    /// Returns `Ok(true)` when accepted. Memory is used until the cap is
    /// hit; afterwards (and while any spilled element remains) elements
    /// go to the backing file.
    pub fn offer(&mut self, item: T) -> Result<bool, Error> {
        if self.disk_len == 0 && self.mem.len() < self.mem_capacity {
            self.mem.push_back(item);
            return Ok(true);
        }

        let spill = match &mut self.spill {
            Some(spill) => spill,
            None => {
                let file = NamedTempFile::new()?;
                let reader = BufReader::new(file.reopen()?);
                tracing::debug!(path = %file.path().display(), "queue spilling to disk");
                self.spill.insert(Spill { file, reader })
            }
        };

        let payload = serde_json::to_vec(&item)?;
        let writer = spill.file.as_file_mut();
        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(&payload)?;
        self.disk_len += 1;
        Ok(true)
    }

    /// Dequeue the oldest element, refilling from disk when the memory
    /// portion is empty.
    pub fn poll(&mut self) -> Result<Option<T>, Error> {
        if let Some(item) = self.mem.pop_front() {
            return Ok(Some(item));
        }

        if self.disk_len == 0 {
            return Ok(None);
        }

        let spill = self.spill.as_mut().ok_or_else(|| {
            Error::Io(std::io::Error::other("spill records tracked but backing file missing"))
        })?;

        let mut len_buf = [0u8; 4];
        spill.reader.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        spill.reader.read_exact(&mut payload)?;
        let item: T = serde_json::from_slice(&payload)?;

        self.disk_len -= 1;
        if self.disk_len == 0 {
            self.spill = None;
        }
        Ok(Some(item))
    }

    pub fn len(&self) -> usize {
        self.mem.len() + self.disk_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every element and the backing file.
    pub fn clear(&mut self) {
        self.mem.clear();
        self.spill = None;
        self.disk_len = 0;
    }
}
