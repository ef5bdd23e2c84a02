//! Byte Sink / Byte Source
//!
//! Sink: append-only, tumbuh dengan doubling (mulai 128 bytes).
//! Source: cursor yang maju setiap `read`, zero-copy dari slice.

use crate::error::{PreserveError, PreserveResult};

/// Kapasitas awal sink
pub const DEFAULT_CAPACITY: usize = 128;

/// Tujuan tulis encoder
pub trait ByteSink {
    /// Append bytes di akhir sink
    fn append(&mut self, bytes: &[u8]) -> PreserveResult<()>;

    /// Jumlah bytes yang sudah ditulis
    fn written(&self) -> usize;
}

/// Sumber baca decoder
pub trait ByteSource {
    /// Baca tepat `n` bytes, atau `UnexpectedEndOfStream`
    fn read(&mut self, n: usize) -> PreserveResult<&[u8]>;

    /// Sisa bytes yang belum dibaca
    fn remaining(&self) -> usize;

    #[inline]
    fn read_u8(&mut self) -> PreserveResult<u8> {
        Ok(self.read(1)?[0])
    }

    #[inline]
    fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

/// Growable in-memory sink
///
/// Alokasi gagal dilaporkan sebagai `OutOfMemory`, bukan abort.
/// Alokasi pertama ditunda sampai `append` pertama.
#[derive(Debug)]
pub struct VecSink {
    buffer: Vec<u8>,
    initial_capacity: usize,
}

impl Default for VecSink {
    fn default() -> Self {
        Self::new()
    }
}

impl VecSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::new(),
            initial_capacity: capacity.max(1),
        }
    }

    /// Reset untuk reuse tanpa realokasi
    #[inline(always)]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// Pastikan ada ruang untuk `len` bytes lagi, doubling seperlunya
    fn grow_for(&mut self, len: usize) -> PreserveResult<()> {
        let needed = self
            .buffer
            .len()
            .checked_add(len)
            .ok_or(PreserveError::OutOfMemory)?;
        if needed <= self.buffer.capacity() {
            return Ok(());
        }

        let mut new_cap = self.buffer.capacity().max(self.initial_capacity);
        while new_cap < needed {
            new_cap = new_cap.checked_mul(2).ok_or(PreserveError::OutOfMemory)?;
        }
        self.buffer.try_reserve_exact(new_cap - self.buffer.len())?;
        Ok(())
    }
}

impl ByteSink for VecSink {
    #[inline]
    fn append(&mut self, bytes: &[u8]) -> PreserveResult<()> {
        self.grow_for(bytes.len())?;
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    #[inline(always)]
    fn written(&self) -> usize {
        self.buffer.len()
    }
}

/// Zero-copy source di atas slice
pub struct SliceSource<'a> {
    buffer: &'a [u8],
    read_pos: usize,
}

impl<'a> SliceSource<'a> {
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            read_pos: 0,
        }
    }

    /// Posisi cursor saat ini
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.read_pos
    }
}

impl<'a> ByteSource for SliceSource<'a> {
    #[inline]
    fn read(&mut self, n: usize) -> PreserveResult<&[u8]> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(PreserveError::UnexpectedEndOfStream {
                needed: n,
                remaining,
            });
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.buffer[start..self.read_pos])
    }

    #[inline(always)]
    fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_grows_by_doubling() {
        let mut sink = VecSink::new();
        sink.append(&[7u8; 100]).unwrap();
        sink.append(&[8u8; 100]).unwrap();

        assert_eq!(sink.written(), 200);
        assert!(sink.buffer.capacity() >= 256);
        assert_eq!(sink.as_bytes()[99], 7);
        assert_eq!(sink.as_bytes()[100], 8);
    }

    #[test]
    fn test_sink_honours_initial_capacity() {
        let mut sink = VecSink::with_capacity(16);
        assert_eq!(sink.buffer.capacity(), 0);

        sink.append(&[1u8; 10]).unwrap();
        assert_eq!(sink.buffer.capacity(), 16);
        sink.append(&[2u8; 10]).unwrap();
        assert_eq!(sink.buffer.capacity(), 32);
    }

    #[test]
    fn test_sink_growth_overflow_is_out_of_memory() {
        let mut sink = VecSink::new();
        sink.append(b"x").unwrap();

        // len + n overflow
        assert!(matches!(sink.grow_for(usize::MAX), Err(PreserveError::OutOfMemory)));
        // doubling overflow sebelum mencapai kebutuhan
        assert!(matches!(
            sink.grow_for(usize::MAX - 10),
            Err(PreserveError::OutOfMemory)
        ));
        // sink tetap utuh setelah gagal
        assert_eq!(sink.as_bytes(), b"x");
        sink.append(b"y").unwrap();
        assert_eq!(sink.as_bytes(), b"xy");
    }

    #[test]
    fn test_sink_reset() {
        let mut sink = VecSink::new();
        sink.append(b"First").unwrap();
        sink.reset();
        sink.append(b"Second").unwrap();
        assert_eq!(sink.as_bytes(), b"Second");
    }

    #[test]
    fn test_source_reads_and_advances() {
        let data = b"Hello, preserve!";
        let mut src = SliceSource::new(data);

        assert_eq!(src.read(5).unwrap(), b"Hello");
        assert_eq!(src.read_u8().unwrap(), b',');
        assert_eq!(src.position(), 6);
        assert_eq!(src.remaining(), 10);
    }

    #[test]
    fn test_source_short_read() {
        let mut src = SliceSource::new(&[1, 2, 3]);
        src.read(2).unwrap();

        match src.read(4) {
            Err(PreserveError::UnexpectedEndOfStream { needed, remaining }) => {
                assert_eq!(needed, 4);
                assert_eq!(remaining, 1);
            }
            other => panic!("unexpected result: {:?}", other.map(|b| b.to_vec())),
        }
        // cursor tidak bergerak setelah gagal
        assert_eq!(src.remaining(), 1);
    }
}
