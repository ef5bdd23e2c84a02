//! Protocol Layer: Graph Encoding dengan Identity Tracking
//!
//! Prinsip desain:
//! - Satu control byte per value: type + 3 flag + width selector
//! - Reference kinds di-encode sekali, sisanya back-reference
//! - Wire order little-endian, independen dari CPU host

mod control;
mod decoder;
mod encoder;
mod endian;
mod registry;
mod wire;

pub use control::{decode_control, encode_control, Control, ValueType, Width};
pub use decoder::{restore, restore_with, Decoder};
pub use encoder::{preserve, preserve_with, Encoder};
pub use endian::{ByteOrder, Normalizer, Word, WIRE_ORDER};
pub use registry::{IdentityRegistry, ObjectRegistry, RefKind};
pub use wire::{LENGTH_WIDTH, MAGIC, MAX_LENGTH};
