//! Wire Format
//!
//! Layout stream:
//! ┌──────────────┬───────────────────────────────────────┐
//! │ MAGIC (0xA7) │ VALUE VALUE ... (nol atau lebih)      │
//! └──────────────┴───────────────────────────────────────┘
//!
//! VALUE := CONTROL (1 byte) PAYLOAD
//!
//! Payload per value (`id` = unsigned dengan width dari size selector,
//! `u32` = field tetap 4 bytes, semua little-endian):
//!
//! | Value            | Payload                                         |
//! |------------------|-------------------------------------------------|
//! | nil / boolean    | -                                               |
//! | integer          | width bytes (1/2/4 zero-extend, 8 = i64)        |
//! | float            | 8 bytes IEEE-754 (4 bytes diterima saat decode) |
//! | back-reference   | id                                              |
//! | string baru      | id u32:len bytes                                |
//! | table baru       | id u32:count (key value)*                       |
//! | closure baru     | id u32:len code u32:n value*                    |
//! | native baru      | id u32:len name                                 |
//! | userdata baru    | id u32:len tag u32:len payload                  |

use super::control::Width;

/// Byte pertama setiap stream
pub const MAGIC: u8 = 0xA7;

/// Width field panjang/jumlah (string length, entry count, dst)
pub const LENGTH_WIDTH: Width = Width::W4;

/// Panjang maksimum yang muat di field panjang
pub const MAX_LENGTH: usize = u32::MAX as usize;
