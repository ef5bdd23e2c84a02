//! Core module: Byte Sink/Source untuk encoder dan decoder
//!
//! Prinsip desain:
//! - Append-only: sink hanya tumbuh, tidak pernah seek
//! - Zero-Copy: source membaca langsung dari slice atau mmap
//! - Fallible allocation: pertumbuhan buffer gagal = `OutOfMemory`

mod buffer;
mod mmap_storage;

pub use buffer::{ByteSink, ByteSource, SliceSource, VecSink, DEFAULT_CAPACITY};
pub use mmap_storage::{MmapSink, MmapSource};
