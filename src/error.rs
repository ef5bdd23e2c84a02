//! Error types untuk encode/decode pass
//!
//! Setiap error membatalkan seluruh pass. Tidak ada partial result,
//! tidak ada retry internal.

use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// Semua kondisi gagal yang bisa muncul saat encode atau decode
#[derive(Debug, Error)]
pub enum PreserveError {
    /// Alokasi buffer gagal
    #[error("out of memory")]
    OutOfMemory,

    /// Byte pertama stream bukan magic byte
    #[error("bad magic byte: expected 0x{expected:02X}, found {found}")]
    BadMagic { expected: u8, found: String },

    /// Control byte atau payload tidak valid
    #[error("malformed stream: {0}")]
    MalformedStream(String),

    /// Stream habis sebelum payload selesai dibaca
    #[error("unexpected end of stream: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEndOfStream { needed: usize, remaining: usize },

    /// Back-reference ke id yang belum pernah didefinisikan
    #[error("unknown {kind} reference: id {id}")]
    UnknownReference { kind: &'static str, id: u64 },

    /// Id sudah terdaftar untuk kind yang sama
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: u64 },

    /// Native function tidak terdaftar di host saat encode
    #[error("native function is not registered with the host")]
    UnsupportedNative,

    /// Nama native function tidak dikenal host saat decode
    #[error("unknown native function: {0:?}")]
    UnknownNativeFunction(String),

    /// Tidak ada handler untuk type tag userdata ini
    #[error("no userdata handler for type tag {0:?}")]
    UnsupportedUserdata(String),

    /// Width numerik selain 1/2/4/8
    #[error("invalid width: {0} bytes")]
    InvalidWidth(usize),

    /// Nesting lebih dalam dari `CodecConfig::max_depth`
    #[error("nesting depth limit of {0} exceeded")]
    DepthLimitExceeded(usize),

    /// Panjang atau jumlah entry tidak muat di field 4-byte
    #[error("{what} of {len} does not fit in a 4-byte length field")]
    LengthOverflow { what: &'static str, len: usize },

    /// Error dari file-backed sink/source
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<TryReserveError> for PreserveError {
    fn from(_: TryReserveError) -> Self {
        PreserveError::OutOfMemory
    }
}

impl PreserveError {
    /// Shorthand untuk `MalformedStream`
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        PreserveError::MalformedStream(msg.into())
    }
}

pub type PreserveResult<T> = Result<T, PreserveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_reserve_maps_to_oom() {
        let mut v: Vec<u8> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        assert!(matches!(PreserveError::from(err), PreserveError::OutOfMemory));
    }

    #[test]
    fn test_display_messages() {
        let err = PreserveError::UnknownReference { kind: "table", id: 7 };
        assert_eq!(err.to_string(), "unknown table reference: id 7");

        let err = PreserveError::InvalidWidth(3);
        assert_eq!(err.to_string(), "invalid width: 3 bytes");
    }
}
