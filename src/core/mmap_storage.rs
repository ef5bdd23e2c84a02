//! Memory-Mapped File Sink/Source
//!
//! Stream ditulis langsung ke region mmap, tanpa buffer perantara:
//! - Sink: file tumbuh dengan doubling, di-truncate ke panjang asli saat `finish`
//! - Source: file di-map read-only, decoder membaca langsung dari page cache

use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::Path;

use super::buffer::{ByteSink, SliceSource, DEFAULT_CAPACITY};
use crate::error::{PreserveError, PreserveResult};

/// Append-only sink yang di-back file mmap
pub struct MmapSink {
    file: File,
    mmap: MmapMut,
    capacity: usize,
    write_pos: usize,
}

impl MmapSink {
    /// Membuat (atau menimpa) file stream di `path`
    pub fn create<P: AsRef<Path>>(path: P) -> PreserveResult<Self> {
        Self::with_capacity(path, DEFAULT_CAPACITY)
    }

    /// # Arguments
    /// * `path` - Path ke file stream
    /// * `capacity` - Ukuran awal mapping dalam bytes
    pub fn with_capacity<P: AsRef<Path>>(path: P, capacity: usize) -> PreserveResult<Self> {
        let capacity = capacity.max(1).next_power_of_two();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(capacity as u64)?;

        // SAFETY: File dibuka read/write dan hanya dimiliki sink ini
        let mmap = unsafe { MmapOptions::new().len(capacity).map_mut(&file)? };

        Ok(Self {
            file,
            mmap,
            capacity,
            write_pos: 0,
        })
    }

    /// Perbesar file + remap sampai muat `needed` bytes
    fn grow(&mut self, needed: usize) -> PreserveResult<()> {
        let mut new_capacity = self.capacity;
        while new_capacity < needed {
            new_capacity = new_capacity
                .checked_mul(2)
                .ok_or(PreserveError::OutOfMemory)?;
        }

        self.mmap.flush()?;
        self.file.set_len(new_capacity as u64)?;
        // SAFETY: Mapping lama diganti, tidak ada slice yang masih meminjamnya
        self.mmap = unsafe { MmapOptions::new().len(new_capacity).map_mut(&self.file)? };
        self.capacity = new_capacity;

        tracing::trace!(capacity = new_capacity, "mmap sink grown");
        Ok(())
    }

    /// Bytes yang sudah ditulis
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..self.write_pos]
    }

    /// Flush ke disk dan truncate file ke panjang stream
    ///
    /// Returns panjang stream dalam bytes.
    pub fn finish(self) -> PreserveResult<usize> {
        let MmapSink {
            file,
            mmap,
            write_pos,
            ..
        } = self;

        mmap.flush()?;
        drop(mmap);
        file.set_len(write_pos as u64)?;
        file.sync_all()?;
        Ok(write_pos)
    }
}

impl ByteSink for MmapSink {
    #[inline]
    fn append(&mut self, bytes: &[u8]) -> PreserveResult<()> {
        let end = self
            .write_pos
            .checked_add(bytes.len())
            .ok_or(PreserveError::OutOfMemory)?;
        if end > self.capacity {
            self.grow(end)?;
        }

        self.mmap[self.write_pos..end].copy_from_slice(bytes);
        self.write_pos = end;
        Ok(())
    }

    #[inline(always)]
    fn written(&self) -> usize {
        self.write_pos
    }
}

/// Read-only mapping dari file stream
pub struct MmapSource {
    // File kosong tidak di-map
    mmap: Option<Mmap>,
}

impl MmapSource {
    pub fn open<P: AsRef<Path>>(path: P) -> PreserveResult<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: Caller tidak boleh memodifikasi file selama source hidup
            Some(unsafe { Mmap::map(&file)? })
        };

        Ok(Self { mmap })
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// Cursor zero-copy di atas mapping
    pub fn source(&self) -> SliceSource<'_> {
        SliceSource::new(self.as_bytes())
    }
}
