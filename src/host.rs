//! Host Embedding Interface
//!
//! Semua yang dibutuhkan codec dari host runtime:
//! - Diagnostic sink untuk pesan error (default: stdout)
//! - Tabel nama <-> native function
//! - Handler serialisasi per type tag userdata
//!
//! Host dimiliki caller dan dipinjam encoder/decoder; tidak ada state global.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::error::PreserveResult;
use crate::value::NativeFunction;

/// Serialisasi payload userdata untuk satu type tag
pub trait UserdataHandler {
    /// Tulis payload opaque ke `out`
    fn encode(&self, data: &dyn Any, out: &mut Vec<u8>) -> PreserveResult<()>;

    /// Rekonstruksi payload dari bytes yang ditulis `encode`
    fn decode(&self, bytes: &[u8]) -> PreserveResult<Box<dyn Any>>;
}

/// Diagnostic sink
pub type ErrorSink = Box<dyn Fn(&str)>;

fn default_error_sink(message: &str) {
    println!("{}", message);
}

/// Registry milik host yang dikonsumsi codec
pub struct Host {
    error_sink: ErrorSink,
    natives: HashMap<String, NativeFunction>,
    native_names: HashMap<usize, String>,
    userdata: HashMap<String, Box<dyn UserdataHandler>>,
}

impl Default for Host {
    fn default() -> Self {
        Self {
            error_sink: Box::new(default_error_sink),
            natives: HashMap::new(),
            native_names: HashMap::new(),
            userdata: HashMap::new(),
        }
    }
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ganti tujuan pesan diagnostic
    pub fn register_error_sink<F>(&mut self, sink: F)
    where
        F: Fn(&str) + 'static,
    {
        self.error_sink = Box::new(sink);
    }

    /// Kirim pesan ke diagnostic sink. Advisory saja.
    pub fn report(&self, message: &str) {
        (self.error_sink)(message);
    }

    /// Daftarkan native function dengan nama stabil.
    ///
    /// Nama yang sama menimpa registrasi sebelumnya. Handle lama tetap
    /// punya reverse entry selama masih terdaftar di nama lain.
    pub fn register_native_function(&mut self, name: impl Into<String>, handle: NativeFunction) {
        let name = name.into();
        if let Some(old) = self.natives.insert(name.clone(), handle.clone()) {
            self.unlink_name(&old, &name);
        }
        self.native_names.insert(handle.identity(), name);
    }

    /// Lepas reverse entry `handle -> name`, pindahkan ke nama lain jika ada
    fn unlink_name(&mut self, handle: &NativeFunction, name: &str) {
        let identity = handle.identity();
        if self.native_names.get(&identity).map(String::as_str) != Some(name) {
            return;
        }
        match self
            .natives
            .iter()
            .find(|(_, f)| f.ptr_eq(handle))
            .map(|(other, _)| other.clone())
        {
            Some(other) => {
                self.native_names.insert(identity, other);
            }
            None => {
                self.native_names.remove(&identity);
            }
        }
    }

    pub fn lookup_native_function(&self, name: &str) -> Option<NativeFunction> {
        self.natives.get(name).cloned()
    }

    /// Reverse lookup: nama untuk native function ini (per identitas)
    pub fn native_function_name(&self, handle: &NativeFunction) -> Option<&str> {
        self.native_names.get(&handle.identity()).map(String::as_str)
    }

    pub fn register_userdata_handler<H>(&mut self, type_tag: impl Into<String>, handler: H)
    where
        H: UserdataHandler + 'static,
    {
        self.userdata.insert(type_tag.into(), Box::new(handler));
    }

    pub fn userdata_handler(&self, type_tag: &str) -> Option<&dyn UserdataHandler> {
        self.userdata.get(type_tag).map(|h| h.as_ref())
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut natives: Vec<_> = self.natives.keys().collect();
        natives.sort();
        let mut userdata: Vec<_> = self.userdata.keys().collect();
        userdata.sort();
        f.debug_struct("Host")
            .field("natives", &natives)
            .field("userdata", &userdata)
            .finish()
    }
}
