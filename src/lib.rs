//! Preserve - Cycle-Safe Binary Codec untuk Runtime Value Graph
//!
//! Arsitektur:
//! - Identity Registry: shared/cyclic object di-encode sekali
//! - Control Byte: type, flag, dan width numerik dalam satu byte
//! - Portable: wire order little-endian di semua host
//! - Fallible: alokasi gagal = `OutOfMemory`, bukan abort
//!
//! ```
//! use preserve::{preserve, restore, Host, TableRef, Value};
//!
//! let host = Host::new();
//! let t = TableRef::new();
//! t.set(Value::from("self"), Value::Table(t.clone()));
//!
//! let bytes = preserve(&[Value::Table(t)], &host).unwrap();
//! let values = restore(&bytes, &host).unwrap();
//!
//! let back = values[0].as_table().unwrap();
//! assert!(back.get(&Value::from("self")).as_table().unwrap().ptr_eq(back));
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod host;
pub mod protocol;
pub mod value;

pub use config::CodecConfig;
pub use error::{PreserveError, PreserveResult};
pub use host::{Host, UserdataHandler};
pub use protocol::{preserve, preserve_with, restore, restore_with, Decoder, Encoder, MAGIC};
pub use value::{
    Closure, ClosureRef, Function, NativeFunction, Number, Str, Table, TableRef, UserdataRef,
    Value,
};
