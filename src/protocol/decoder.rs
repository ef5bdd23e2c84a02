//! Value Decoder
//!
//! Kebalikan encoder. Object baru didaftarkan ke registry SEBELUM child-nya
//! di-decode, sehingga child yang menunjuk balik ke ancestor (cycle)
//! langsung ter-resolve ke object yang sama.

use tracing::{debug, trace};

use super::control::{Control, ValueType, Width};
use super::encoder::report;
use super::endian::Normalizer;
use super::registry::{ObjectRegistry, RefKind};
use super::wire::{LENGTH_WIDTH, MAGIC};
use crate::config::CodecConfig;
use crate::core::{ByteSource, SliceSource};
use crate::error::{PreserveError, PreserveResult};
use crate::host::Host;
use crate::value::{Closure, ClosureRef, Function, Str, TableRef, UserdataRef, Value};

/// Decoder untuk satu pass
pub struct Decoder<'h, R: ByteSource> {
    source: R,
    host: &'h Host,
    registry: ObjectRegistry<Value>,
    normalizer: Normalizer,
    config: CodecConfig,
    depth: usize,
    values: usize,
}

impl<'h, R: ByteSource> Decoder<'h, R> {
    /// Membuat decoder dan memvalidasi magic byte
    pub fn new(source: R, host: &'h Host) -> PreserveResult<Self> {
        Self::with_config(source, host, CodecConfig::default())
    }

    pub fn with_config(mut source: R, host: &'h Host, config: CodecConfig) -> PreserveResult<Self> {
        let found = match source.read_u8() {
            Ok(byte) if byte == MAGIC => None,
            Ok(byte) => Some(format!("0x{:02X}", byte)),
            Err(_) => Some("end of stream".to_string()),
        };
        if let Some(found) = found {
            let err = PreserveError::BadMagic {
                expected: MAGIC,
                found,
            };
            return Err(report(host, &config, err));
        }

        Ok(Self {
            source,
            host,
            registry: ObjectRegistry::new(),
            normalizer: Normalizer::native(),
            config,
            depth: 0,
            values: 0,
        })
    }

    /// Paksa host byte order (simulasi host big/little-endian)
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Masih ada value di stream?
    pub fn has_more(&self) -> bool {
        !self.source.is_exhausted()
    }

    /// Decode satu top-level value
    pub fn decode(&mut self) -> PreserveResult<Value> {
        self.depth = 0;
        match self.decode_value() {
            Ok(value) => {
                self.values += 1;
                Ok(value)
            }
            Err(err) => Err(report(self.host, &self.config, err)),
        }
    }

    /// Decode sampai stream habis
    pub fn decode_all(mut self) -> PreserveResult<Vec<Value>> {
        let mut values = Vec::new();
        while self.has_more() {
            values.push(self.decode()?);
        }
        debug!(
            values = self.values,
            tables = self.registry.count(RefKind::Table),
            strings = self.registry.count(RefKind::String),
            "decode pass complete"
        );
        Ok(values)
    }

    fn decode_value(&mut self) -> PreserveResult<Value> {
        let control = Control::unpack(self.source.read_u8()?)?;

        match control.ty {
            ValueType::Nil => Ok(Value::Nil),
            ValueType::Boolean => Ok(Value::Boolean(control.opt1)),
            ValueType::Number => self.decode_number(control),
            ValueType::String => {
                let id = self.read_uint(control.width)?;
                if control.is_back_reference() {
                    return self.resolve(RefKind::String, id);
                }
                let len = self.read_len()?;
                let s = Value::String(Str::new(self.source.read(len)?));
                self.register(RefKind::String, id, s)
            }
            ValueType::Table => {
                let id = self.read_uint(control.width)?;
                if control.is_back_reference() {
                    return self.resolve(RefKind::Table, id);
                }
                self.decode_table(id)
            }
            ValueType::Function => {
                let kind = if control.opt2 {
                    RefKind::Native
                } else {
                    RefKind::Closure
                };
                let id = self.read_uint(control.width)?;
                if control.is_back_reference() {
                    return self.resolve(kind, id);
                }
                match kind {
                    RefKind::Native => self.decode_native(id),
                    _ => self.decode_closure(id),
                }
            }
            ValueType::Userdata => {
                let id = self.read_uint(control.width)?;
                if control.is_back_reference() {
                    return self.resolve(RefKind::Userdata, id);
                }
                self.decode_userdata(id)
            }
        }
    }

    fn decode_number(&mut self, control: Control) -> PreserveResult<Value> {
        let raw = self.read_uint(control.width)?;
        if control.opt1 {
            // Width 1/2/4 sudah zero-extended; width 8 = two's complement
            return Ok(Value::integer(raw as i64));
        }

        match control.width {
            Width::W8 => Ok(Value::float(f64::from_bits(raw))),
            Width::W4 => Ok(Value::float(f32::from_bits(raw as u32) as f64)),
            other => Err(PreserveError::malformed(format!(
                "float with {}-byte width",
                other.bytes()
            ))),
        }
    }

    fn decode_table(&mut self, id: u64) -> PreserveResult<Value> {
        let table = TableRef::new();
        // Register dulu, baru decode isi: kunci cycle safety
        self.register(RefKind::Table, id, Value::Table(table.clone()))?;

        let count = self.read_len()?;
        self.descend()?;
        for _ in 0..count {
            let key = self.decode_value()?;
            let value = self.decode_value()?;
            // Duplicate key: last write wins
            if !table.set(key, value) {
                return Err(PreserveError::malformed("table key is nil or NaN"));
            }
        }
        self.depth -= 1;

        Ok(Value::Table(table))
    }

    fn decode_closure(&mut self, id: u64) -> PreserveResult<Value> {
        let closure = ClosureRef::new(Closure::default());
        // Placeholder terdaftar sebelum upvalues di-decode
        let value = Value::Function(Function::Closure(closure.clone()));
        self.register(RefKind::Closure, id, value.clone())?;

        let code = self.read_blob()?.to_vec();
        let count = self.read_len()?;

        self.descend()?;
        let mut upvalues = Vec::new();
        for _ in 0..count {
            upvalues.push(self.decode_value()?);
        }
        self.depth -= 1;

        *closure.borrow_mut() = Closure { code, upvalues };
        Ok(value)
    }

    fn decode_native(&mut self, id: u64) -> PreserveResult<Value> {
        let host = self.host;
        let name = self.read_string("native function name")?;
        let handle = host
            .lookup_native_function(&name)
            .ok_or(PreserveError::UnknownNativeFunction(name))?;

        self.register(RefKind::Native, id, Value::native(handle))
    }

    fn decode_userdata(&mut self, id: u64) -> PreserveResult<Value> {
        let host = self.host;
        let tag = self.read_string("userdata tag")?;
        let handler = host
            .userdata_handler(&tag)
            .ok_or_else(|| PreserveError::UnsupportedUserdata(tag.clone()))?;

        let data = handler.decode(self.read_blob()?)?;
        self.register(RefKind::Userdata, id, Value::Userdata(UserdataRef::new(tag, data)))
    }

    fn register(&mut self, kind: RefKind, id: u64, value: Value) -> PreserveResult<Value> {
        trace!(kind = kind.name(), id, "register");
        self.registry.register(kind, id, value.clone())?;
        Ok(value)
    }

    fn resolve(&self, kind: RefKind, id: u64) -> PreserveResult<Value> {
        trace!(kind = kind.name(), id, "resolve back-reference");
        self.registry.resolve(kind, id)
    }

    #[inline(always)]
    fn read_uint(&mut self, width: Width) -> PreserveResult<u64> {
        let bytes = self.source.read(width.bytes())?;
        self.normalizer.decode_uint(bytes)
    }

    fn read_len(&mut self) -> PreserveResult<usize> {
        let len = self.read_uint(LENGTH_WIDTH)?;
        usize::try_from(len).map_err(|_| PreserveError::malformed(format!("length {} too large", len)))
    }

    fn read_blob(&mut self) -> PreserveResult<&[u8]> {
        let len = self.read_len()?;
        self.source.read(len)
    }

    fn read_string(&mut self, what: &str) -> PreserveResult<String> {
        let bytes = self.read_blob()?.to_vec();
        String::from_utf8(bytes)
            .map_err(|_| PreserveError::malformed(format!("{} is not valid UTF-8", what)))
    }

    fn descend(&mut self) -> PreserveResult<()> {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(PreserveError::DepthLimitExceeded(self.config.max_depth));
        }
        Ok(())
    }
}

/// Decode seluruh stream dari slice
pub fn restore(bytes: &[u8], host: &Host) -> PreserveResult<Vec<Value>> {
    restore_with(bytes, host, &CodecConfig::default())
}

pub fn restore_with(bytes: &[u8], host: &Host, config: &CodecConfig) -> PreserveResult<Vec<Value>> {
    Decoder::with_config(SliceSource::new(bytes), host, config.clone())?.decode_all()
}
