//! Control Byte Codec
//!
//! Layout (MSB -> LSB):
//! ┌─────────┬──────┬──────┬──────┬────────┐
//! │ type: 3 │ opt1 │ opt2 │ opt3 │ size:2 │
//! └─────────┴──────┴──────┴──────┴────────┘
//!
//! size selector {0,1,2,3} -> width {1,2,4,8} bytes.

use crate::error::{PreserveError, PreserveResult};

/// Tipe value di control byte
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Nil = 0,
    Boolean = 1,
    Number = 2,
    String = 3,
    Table = 4,
    Function = 5,
    Userdata = 6,
}

impl ValueType {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Nil),
            1 => Some(Self::Boolean),
            2 => Some(Self::Number),
            3 => Some(Self::String),
            4 => Some(Self::Table),
            5 => Some(Self::Function),
            6 => Some(Self::Userdata),
            _ => None,
        }
    }
}

/// Width numerik yang bisa dinyatakan size selector
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Width {
    W1 = 0,
    W2 = 1,
    W4 = 2,
    W8 = 3,
}

impl Width {
    #[inline(always)]
    pub fn from_selector(sel: u8) -> Self {
        match sel & 0x3 {
            0 => Width::W1,
            1 => Width::W2,
            2 => Width::W4,
            _ => Width::W8,
        }
    }

    pub fn from_bytes(bytes: usize) -> PreserveResult<Self> {
        match bytes {
            1 => Ok(Width::W1),
            2 => Ok(Width::W2),
            4 => Ok(Width::W4),
            8 => Ok(Width::W8),
            other => Err(PreserveError::InvalidWidth(other)),
        }
    }

    #[inline(always)]
    pub fn selector(self) -> u8 {
        self as u8
    }

    #[inline(always)]
    pub fn bytes(self) -> usize {
        1 << (self as u8)
    }

    /// Width terkecil yang memuat unsigned value
    #[inline(always)]
    pub fn for_unsigned(v: u64) -> Self {
        if v <= u8::MAX as u64 {
            Width::W1
        } else if v <= u16::MAX as u64 {
            Width::W2
        } else if v <= u32::MAX as u64 {
            Width::W4
        } else {
            Width::W8
        }
    }
}

/// Control byte yang sudah di-unpack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub ty: ValueType,
    pub opt1: bool,
    pub opt2: bool,
    pub opt3: bool,
    pub width: Width,
}

impl Control {
    #[inline(always)]
    pub fn new(ty: ValueType) -> Self {
        Self {
            ty,
            opt1: false,
            opt2: false,
            opt3: false,
            width: Width::W1,
        }
    }

    #[inline(always)]
    pub fn opt1(mut self, on: bool) -> Self {
        self.opt1 = on;
        self
    }

    #[inline(always)]
    pub fn opt2(mut self, on: bool) -> Self {
        self.opt2 = on;
        self
    }

    #[inline(always)]
    pub fn width(mut self, width: Width) -> Self {
        self.width = width;
        self
    }

    #[inline(always)]
    pub fn pack(&self) -> u8 {
        ((self.ty as u8) << 5)
            | ((self.opt1 as u8) << 4)
            | ((self.opt2 as u8) << 3)
            | ((self.opt3 as u8) << 2)
            | self.width.selector()
    }

    #[inline(always)]
    pub fn unpack(byte: u8) -> PreserveResult<Self> {
        let raw_type = (byte >> 5) & 0x7;
        let ty = ValueType::from_u8(raw_type).ok_or_else(|| {
            PreserveError::malformed(format!(
                "control byte 0x{:02X} has reserved type {}",
                byte, raw_type
            ))
        })?;

        Ok(Self {
            ty,
            opt1: (byte >> 4) & 0x1 == 1,
            opt2: (byte >> 3) & 0x1 == 1,
            opt3: (byte >> 2) & 0x1 == 1,
            width: Width::from_selector(byte),
        })
    }

    /// opt1 = back-reference untuk semua reference kinds
    #[inline(always)]
    pub fn is_back_reference(&self) -> bool {
        self.opt1
    }
}

/// Pack control byte. `width` dalam bytes (1/2/4/8).
pub fn encode_control(
    ty: ValueType,
    opt1: bool,
    opt2: bool,
    opt3: bool,
    width: usize,
) -> PreserveResult<u8> {
    let width = Width::from_bytes(width)?;
    Ok(Control {
        ty,
        opt1,
        opt2,
        opt3,
        width,
    }
    .pack())
}

/// Unpack control byte menjadi (type, opt1, opt2, opt3, width dalam bytes)
pub fn decode_control(byte: u8) -> PreserveResult<(ValueType, bool, bool, bool, usize)> {
    let c = Control::unpack(byte)?;
    Ok((c.ty, c.opt1, c.opt2, c.opt3, c.width.bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_layout() {
        // Table (4) back-ref, width 2: 100 1 0 0 01
        let byte = encode_control(ValueType::Table, true, false, false, 2).unwrap();
        assert_eq!(byte, 0b1001_0001);

        // Function native closure flag di opt2, width 8
        let byte = encode_control(ValueType::Function, false, true, false, 8).unwrap();
        assert_eq!(byte, 0b1010_1011);

        assert_eq!(Control::new(ValueType::Nil).pack(), 0);
    }

    #[test]
    fn test_decode_every_valid_byte() {
        for byte in 0u8..=0xDF {
            let (ty, o1, o2, o3, w) = decode_control(byte).unwrap();
            assert_eq!(encode_control(ty, o1, o2, o3, w).unwrap(), byte);
        }
    }

    #[test]
    fn test_reserved_type_rejected() {
        for byte in 0xE0u8..=0xFF {
            assert!(matches!(
                decode_control(byte),
                Err(PreserveError::MalformedStream(_))
            ));
        }
    }

    #[test]
    fn test_encode_invalid_width() {
        assert!(matches!(
            encode_control(ValueType::Number, true, false, false, 3),
            Err(PreserveError::InvalidWidth(3))
        ));
    }

    #[test]
    fn test_width_for_unsigned() {
        assert_eq!(Width::for_unsigned(0), Width::W1);
        assert_eq!(Width::for_unsigned(200), Width::W1);
        assert_eq!(Width::for_unsigned(256), Width::W2);
        assert_eq!(Width::for_unsigned(70_000), Width::W4);
        assert_eq!(Width::for_unsigned(u64::MAX), Width::W8);
        assert_eq!(Width::W8.bytes(), 8);
    }
}
