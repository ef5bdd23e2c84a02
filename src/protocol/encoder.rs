//! Value Encoder
//!
//! Rekursif atas graph value. Reference kinds dicek ke Identity Registry:
//! kunjungan pertama meng-assign id dan menulis isi, kunjungan berikutnya
//! hanya menulis back-reference (id saja).
//!
//! Registry hanya menyimpan alamat, jadi encoder memegang clone setiap
//! object yang sudah diberi id sampai `finish`. Tanpa itu alamat object
//! top-level yang sudah di-drop bisa dipakai ulang oleh allocator dan
//! object baru salah dianggap back-reference.
//!
//! Kedalaman rekursi dibatasi `CodecConfig::max_depth`. Table yang sangat
//! dalam tetap memakan stack host sampai batas itu.

use tracing::{debug, trace, warn};

use super::control::{Control, ValueType, Width};
use super::endian::Normalizer;
use super::registry::{IdentityRegistry, RefKind};
use super::wire::{LENGTH_WIDTH, MAGIC, MAX_LENGTH};
use crate::config::CodecConfig;
use crate::core::{ByteSink, VecSink};
use crate::error::{PreserveError, PreserveResult};
use crate::host::Host;
use crate::value::{Function, Number, Value};

/// Encoder untuk satu pass
///
/// Magic byte ditulis saat konstruksi. Setelah error, encoder harus dibuang:
/// stream dan registry-nya tidak lagi konsisten.
pub struct Encoder<'h, S: ByteSink> {
    sink: S,
    host: &'h Host,
    registry: IdentityRegistry,
    /// Object yang sudah punya id, ditahan supaya alamatnya tidak dipakai ulang
    pinned: Vec<Value>,
    normalizer: Normalizer,
    config: CodecConfig,
    depth: usize,
    values: usize,
}

impl<'h, S: ByteSink> Encoder<'h, S> {
    /// Membuat encoder dengan config default
    pub fn new(sink: S, host: &'h Host) -> PreserveResult<Self> {
        Self::with_config(sink, host, CodecConfig::default())
    }

    pub fn with_config(mut sink: S, host: &'h Host, config: CodecConfig) -> PreserveResult<Self> {
        if let Err(err) = sink.append(&[MAGIC]) {
            return Err(report(host, &config, err));
        }

        Ok(Self {
            sink,
            host,
            registry: IdentityRegistry::new(),
            pinned: Vec::new(),
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

    /// Encode satu top-level value ke stream
    pub fn encode(&mut self, value: &Value) -> PreserveResult<()> {
        self.depth = 0;
        match self.encode_value(value) {
            Ok(()) => {
                self.values += 1;
                Ok(())
            }
            Err(err) => Err(report(self.host, &self.config, err)),
        }
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    /// Bytes yang sudah ditulis (termasuk magic)
    pub fn written(&self) -> usize {
        self.sink.written()
    }

    /// Selesaikan pass, kembalikan sink. Registry dan object yang ditahan dibuang.
    pub fn finish(self) -> S {
        debug!(
            values = self.values,
            bytes = self.sink.written(),
            strings = self.registry.count(RefKind::String),
            tables = self.registry.count(RefKind::Table),
            "encode pass complete"
        );
        self.sink
    }

    fn encode_value(&mut self, value: &Value) -> PreserveResult<()> {
        match value {
            Value::Nil => self.write_control(Control::new(ValueType::Nil)),
            Value::Boolean(b) => self.write_control(Control::new(ValueType::Boolean).opt1(*b)),
            Value::Number(n) => self.encode_number(*n),
            Value::String(s) => {
                if self.begin_reference(
                    value,
                    ValueType::String,
                    RefKind::String,
                    s.identity(),
                    false,
                )? {
                    self.write_blob(s.as_bytes(), "string length")?;
                }
                Ok(())
            }
            Value::Table(t) => {
                if !self.begin_reference(
                    value,
                    ValueType::Table,
                    RefKind::Table,
                    t.identity(),
                    false,
                )? {
                    return Ok(());
                }
                // Snapshot: entry bisa menunjuk balik ke table ini
                let entries = t.entries();
                self.write_len(entries.len(), "table entry count")?;

                self.descend()?;
                for (key, val) in &entries {
                    self.encode_value(key)?;
                    self.encode_value(val)?;
                }
                self.depth -= 1;
                Ok(())
            }
            Value::Function(Function::Closure(c)) => {
                if !self.begin_reference(
                    value,
                    ValueType::Function,
                    RefKind::Closure,
                    c.identity(),
                    false,
                )? {
                    return Ok(());
                }
                let closure = c.borrow().clone();
                self.write_blob(&closure.code, "closure code length")?;
                self.write_len(closure.upvalues.len(), "closure upvalue count")?;

                self.descend()?;
                for upvalue in &closure.upvalues {
                    self.encode_value(upvalue)?;
                }
                self.depth -= 1;
                Ok(())
            }
            Value::Function(Function::Native(f)) => {
                let host = self.host;
                let identity = f.identity();
                let name = match self.registry.lookup(RefKind::Native, identity) {
                    Some(_) => None,
                    None => Some(
                        host.native_function_name(f)
                            .ok_or(PreserveError::UnsupportedNative)?,
                    ),
                };

                if self.begin_reference(
                    value,
                    ValueType::Function,
                    RefKind::Native,
                    identity,
                    true,
                )? {
                    if let Some(name) = name {
                        self.write_blob(name.as_bytes(), "native function name")?;
                    }
                }
                Ok(())
            }
            Value::Userdata(u) => {
                let host = self.host;
                let identity = u.identity();
                let handler = match self.registry.lookup(RefKind::Userdata, identity) {
                    Some(_) => None,
                    None => Some(
                        host.userdata_handler(u.tag())
                            .ok_or_else(|| PreserveError::UnsupportedUserdata(u.tag().to_string()))?,
                    ),
                };

                if self.begin_reference(
                    value,
                    ValueType::Userdata,
                    RefKind::Userdata,
                    identity,
                    false,
                )? {
                    if let Some(handler) = handler {
                        let mut payload = Vec::new();
                        handler.encode(&**u.inner().data(), &mut payload)?;
                        self.write_blob(u.tag().as_bytes(), "userdata tag")?;
                        self.write_blob(&payload, "userdata payload")?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Integer: width terkecil yang lossless (non-negatif zero-extend,
    /// negatif selalu 8 bytes). Float: selalu 8 bytes.
    fn encode_number(&mut self, n: Number) -> PreserveResult<()> {
        let (control, raw, width) = match n {
            Number::Integer(i) => {
                let width = if i >= 0 {
                    Width::for_unsigned(i as u64)
                } else {
                    Width::W8
                };
                (Control::new(ValueType::Number).opt1(true), i as u64, width)
            }
            Number::Float(f) => (Control::new(ValueType::Number), f.to_bits(), Width::W8),
        };

        self.write_control(control.width(width))?;
        self.write_uint(raw, width)
    }

    /// Back-reference jika identity sudah terdaftar, selain itu assign id
    /// baru dan tulis header "new". Returns `true` untuk object baru;
    /// caller lalu menulis isi object.
    fn begin_reference(
        &mut self,
        value: &Value,
        ty: ValueType,
        kind: RefKind,
        identity: usize,
        opt2: bool,
    ) -> PreserveResult<bool> {
        if let Some(id) = self.registry.lookup(kind, identity) {
            trace!(kind = kind.name(), id, "back-reference");
            self.write_header(Control::new(ty).opt1(true).opt2(opt2), id)?;
            return Ok(false);
        }

        // Assign sebelum recurse: child yang menunjuk balik akan jadi back-reference
        let id = self.registry.assign(kind, identity)?;
        self.pinned.push(value.clone());
        trace!(kind = kind.name(), id, "new reference");
        self.write_header(Control::new(ty).opt2(opt2), id)?;
        Ok(true)
    }

    fn write_header(&mut self, control: Control, id: u64) -> PreserveResult<()> {
        let width = Width::for_unsigned(id);
        self.write_control(control.width(width))?;
        self.write_uint(id, width)
    }

    #[inline(always)]
    fn write_control(&mut self, control: Control) -> PreserveResult<()> {
        self.sink.append(&[control.pack()])
    }

    #[inline(always)]
    fn write_uint(&mut self, value: u64, width: Width) -> PreserveResult<()> {
        let wire = self.normalizer.encode_uint(value, width.bytes())?;
        self.sink.append(wire.as_bytes())
    }

    fn write_len(&mut self, len: usize, what: &'static str) -> PreserveResult<()> {
        if len > MAX_LENGTH {
            return Err(PreserveError::LengthOverflow { what, len });
        }
        self.write_uint(len as u64, LENGTH_WIDTH)
    }

    /// Length-prefixed raw bytes, tanpa konversi endianness
    fn write_blob(&mut self, bytes: &[u8], what: &'static str) -> PreserveResult<()> {
        self.write_len(bytes.len(), what)?;
        self.sink.append(bytes)
    }

    fn descend(&mut self) -> PreserveResult<()> {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(PreserveError::DepthLimitExceeded(self.config.max_depth));
        }
        Ok(())
    }
}

/// Log error dan teruskan ke diagnostic sink host (advisory)
pub(crate) fn report(host: &Host, config: &CodecConfig, err: PreserveError) -> PreserveError {
    if config.report_errors {
        warn!(error = %err, "preserve pass aborted");
        host.report(&format!("preserve: {}", err));
    }
    err
}

/// Encode semua value ke satu stream (satu registry untuk seluruh stream)
pub fn preserve(values: &[Value], host: &Host) -> PreserveResult<Vec<u8>> {
    preserve_with(values, host, &CodecConfig::default())
}

pub fn preserve_with(values: &[Value], host: &Host, config: &CodecConfig) -> PreserveResult<Vec<u8>> {
    let sink = VecSink::with_capacity(config.initial_capacity);
    let mut encoder = Encoder::with_config(sink, host, config.clone())?;
    for value in values {
        encoder.encode(value)?;
    }
    Ok(encoder.finish().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{NativeFunction, TableRef, UserdataRef};

    fn encode_one(value: &Value) -> PreserveResult<Vec<u8>> {
        let mut host = Host::new();
        host.register_error_sink(|_| {});
        preserve(std::slice::from_ref(value), &host)
    }

    #[test]
    fn test_magic_first() {
        let bytes = preserve(&[], &Host::new()).unwrap();
        assert_eq!(bytes, vec![MAGIC]);
    }

    #[test]
    fn test_scalars_layout() {
        assert_eq!(encode_one(&Value::Nil).unwrap(), vec![MAGIC, 0x00]);
        assert_eq!(encode_one(&Value::from(true)).unwrap(), vec![MAGIC, 0b0011_0000]);
        assert_eq!(encode_one(&Value::from(false)).unwrap(), vec![MAGIC, 0b0010_0000]);
    }

    #[test]
    fn test_integer_widths() {
        // 200 -> 1 byte
        assert_eq!(encode_one(&Value::integer(200)).unwrap(), vec![MAGIC, 0b0101_0000, 200]);
        // 70000 -> 4 bytes little-endian
        assert_eq!(
            encode_one(&Value::integer(70_000)).unwrap(),
            vec![MAGIC, 0b0101_0010, 0x70, 0x11, 0x01, 0x00]
        );
        // negatif -> 8 bytes
        let bytes = encode_one(&Value::integer(-1)).unwrap();
        assert_eq!(bytes[1], 0b0101_0011);
        assert_eq!(&bytes[2..], &[0xFF; 8]);
    }

    #[test]
    fn test_float_always_eight_bytes() {
        let bytes = encode_one(&Value::float(3.14)).unwrap();
        assert_eq!(bytes[1], 0b0100_0011);
        assert_eq!(&bytes[2..], &3.14f64.to_le_bytes());

        let bytes = encode_one(&Value::float(2.0)).unwrap();
        assert_eq!(bytes.len(), 10);
    }

    #[test]
    fn test_string_then_back_reference() {
        let s = Value::string("hi");
        let table = TableRef::from_list(vec![s.clone(), s]);
        let bytes = encode_one(&Value::Table(table)).unwrap();

        assert_eq!(
            bytes,
            vec![
                MAGIC,
                0b1000_0000, 1, 2, 0, 0, 0, // table id 1, 2 entries
                0b0101_0000, 1, // key 1
                0b0110_0000, 1, 2, 0, 0, 0, b'h', b'i', // string id 1 baru
                0b0101_0000, 2, // key 2
                0b0111_0000, 1, // back-reference string 1
            ]
        );
    }

    #[test]
    fn test_equal_content_distinct_strings_not_shared() {
        let table = TableRef::from_list(vec![Value::string("ab"), Value::string("ab")]);
        let mut host = Host::new();
        host.register_error_sink(|_| {});

        let mut encoder = Encoder::new(VecSink::new(), &host).unwrap();
        encoder.encode(&Value::Table(table)).unwrap();
        assert_eq!(encoder.registry().count(RefKind::String), 2);
    }

    #[test]
    fn test_unregistered_native_fails() {
        let f = NativeFunction::new(|_| Vec::new());
        assert!(matches!(
            encode_one(&Value::native(f)),
            Err(PreserveError::UnsupportedNative)
        ));
    }

    #[test]
    fn test_userdata_without_handler_fails() {
        let u = UserdataRef::new("socket", Box::new(3u32));
        match encode_one(&Value::Userdata(u)) {
            Err(PreserveError::UnsupportedUserdata(tag)) => assert_eq!(tag, "socket"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_temporaries_across_calls_not_aliased() {
        let mut host = Host::new();
        host.register_error_sink(|_| {});
        let mut encoder = Encoder::new(VecSink::new(), &host).unwrap();

        // Value sementara langsung di-drop setelah encode
        encoder.encode(&Value::string("aaaa")).unwrap();
        encoder.encode(&Value::string("bbbb")).unwrap();
        assert_eq!(encoder.registry().count(RefKind::String), 2);

        let bytes = encoder.finish().into_inner();
        assert_eq!(
            bytes,
            vec![
                MAGIC,
                0b0110_0000, 1, 4, 0, 0, 0, b'a', b'a', b'a', b'a',
                0b0110_0000, 2, 4, 0, 0, 0, b'b', b'b', b'b', b'b',
            ]
        );
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_length_overflow() {
        let host = Host::new();
        let mut encoder = Encoder::new(VecSink::new(), &host).unwrap();

        match encoder.write_len(MAX_LENGTH + 1, "table entry count") {
            Err(PreserveError::LengthOverflow { what, len }) => {
                assert_eq!(what, "table entry count");
                assert_eq!(len, MAX_LENGTH + 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // tidak ada yang ditulis selain magic
        assert_eq!(encoder.written(), 1);
        assert!(encoder.write_len(MAX_LENGTH, "string length").is_ok());
    }

    #[test]
    fn test_depth_limit() {
        let root = TableRef::new();
        let mut cur = root.clone();
        for _ in 0..10 {
            let next = TableRef::new();
            cur.set(Value::integer(1), Value::Table(next.clone()));
            cur = next;
        }

        let mut host = Host::new();
        host.register_error_sink(|_| {});
        let config = CodecConfig {
            max_depth: 5,
            ..CodecConfig::default()
        };
        assert!(matches!(
            preserve_with(&[Value::Table(root)], &host, &config),
            Err(PreserveError::DepthLimitExceeded(5))
        ));
    }

    #[test]
    fn test_error_reported_to_sink() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::<String>::new()));
        let captured = seen.clone();
        let mut host = Host::new();
        host.register_error_sink(move |msg| captured.borrow_mut().push(msg.to_string()));

        let f = NativeFunction::new(|_| Vec::new());
        assert!(preserve(&[Value::native(f)], &host).is_err());
        assert_eq!(seen.borrow().len(), 1);
        assert!(seen.borrow()[0].contains("not registered"));
    }
}
