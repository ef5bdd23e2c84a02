//! Endianness Normalizer
//!
//! Semua field multi-byte di wire memakai little-endian, apapun byte order
//! CPU host. Konversi = byte reversal jika host big-endian, no-op jika tidak.

use crate::error::{PreserveError, PreserveResult};

/// Byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order target saat ini
    #[inline(always)]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

/// Byte order kanonik di wire
pub const WIRE_ORDER: ByteOrder = ByteOrder::Little;

/// Satu word numerik (maks 8 bytes) tanpa alokasi heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word {
    buf: [u8; 8],
    len: usize,
}

impl Word {
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.len
    }
}

#[inline(always)]
fn check_width(width: usize) -> PreserveResult<()> {
    match width {
        1 | 2 | 4 | 8 => Ok(()),
        other => Err(PreserveError::InvalidWidth(other)),
    }
}

/// Konverter host order <-> wire order
///
/// Host order bisa dipaksa (`with_host_order`) untuk mensimulasikan
/// host big-endian di mesin little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    host: ByteOrder,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::native()
    }
}

impl Normalizer {
    pub const fn native() -> Self {
        Self {
            host: ByteOrder::native(),
        }
    }

    pub const fn with_host_order(host: ByteOrder) -> Self {
        Self { host }
    }

    #[inline(always)]
    pub fn host_order(&self) -> ByteOrder {
        self.host
    }

    #[inline(always)]
    fn convert(&self, bytes: &[u8]) -> PreserveResult<Word> {
        check_width(bytes.len())?;
        let mut word = Word {
            buf: [0u8; 8],
            len: bytes.len(),
        };
        word.buf[..bytes.len()].copy_from_slice(bytes);
        if self.host != WIRE_ORDER {
            word.buf[..bytes.len()].reverse();
        }
        Ok(word)
    }

    /// Host order -> wire order
    #[inline(always)]
    pub fn to_wire(&self, bytes: &[u8]) -> PreserveResult<Word> {
        self.convert(bytes)
    }

    /// Wire order -> host order
    #[inline(always)]
    pub fn from_wire(&self, bytes: &[u8]) -> PreserveResult<Word> {
        self.convert(bytes)
    }

    /// Representasi host-order dari `width` byte terendah `value`
    #[inline(always)]
    pub fn host_bytes(&self, value: u64, width: usize) -> PreserveResult<Word> {
        check_width(width)?;
        let mut word = Word {
            buf: [0u8; 8],
            len: width,
        };
        match self.host {
            ByteOrder::Little => word.buf[..width].copy_from_slice(&value.to_le_bytes()[..width]),
            ByteOrder::Big => word.buf[..width].copy_from_slice(&value.to_be_bytes()[8 - width..]),
        }
        Ok(word)
    }

    /// Kebalikan `host_bytes`: zero-extend ke u64
    #[inline(always)]
    pub fn host_value(&self, bytes: &[u8]) -> PreserveResult<u64> {
        let width = bytes.len();
        check_width(width)?;
        let mut full = [0u8; 8];
        Ok(match self.host {
            ByteOrder::Little => {
                full[..width].copy_from_slice(bytes);
                u64::from_le_bytes(full)
            }
            ByteOrder::Big => {
                full[8 - width..].copy_from_slice(bytes);
                u64::from_be_bytes(full)
            }
        })
    }

    /// Encode unsigned value langsung ke wire bytes
    #[inline(always)]
    pub fn encode_uint(&self, value: u64, width: usize) -> PreserveResult<Word> {
        let host = self.host_bytes(value, width)?;
        self.to_wire(host.as_bytes())
    }

    /// Decode wire bytes langsung ke unsigned value
    #[inline(always)]
    pub fn decode_uint(&self, wire: &[u8]) -> PreserveResult<u64> {
        let host = self.from_wire(wire)?;
        self.host_value(host.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_is_little_endian() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let n = Normalizer::with_host_order(order);
            let wire = n.encode_uint(0x0102_0304, 4).unwrap();
            assert_eq!(wire.as_bytes(), &[0x04, 0x03, 0x02, 0x01]);
            assert_eq!(n.decode_uint(wire.as_bytes()).unwrap(), 0x0102_0304);
        }
    }

    #[test]
    fn test_big_host_reverses() {
        let n = Normalizer::with_host_order(ByteOrder::Big);
        let wire = n.to_wire(&[0xAA, 0xBB]).unwrap();
        assert_eq!(wire.as_bytes(), &[0xBB, 0xAA]);

        let n = Normalizer::with_host_order(ByteOrder::Little);
        let wire = n.to_wire(&[0xAA, 0xBB]).unwrap();
        assert_eq!(wire.as_bytes(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_single_byte_untouched() {
        let n = Normalizer::with_host_order(ByteOrder::Big);
        assert_eq!(n.from_wire(&[0x7F]).unwrap().as_bytes(), &[0x7F]);
    }

    #[test]
    fn test_invalid_width() {
        let n = Normalizer::native();
        assert!(matches!(
            n.to_wire(&[1, 2, 3]),
            Err(PreserveError::InvalidWidth(3))
        ));
        assert!(matches!(
            n.from_wire(&[0u8; 16]),
            Err(PreserveError::InvalidWidth(16))
        ));
        assert!(matches!(
            n.host_bytes(1, 0),
            Err(PreserveError::InvalidWidth(0))
        ));
    }
}
