//! Runtime Value Model
//!
//! Closed tagged variant untuk semua value kind yang bisa di-preserve.
//! Reference kinds (string, table, closure, native, userdata) memakai
//! shared allocation (`Rc`), identitasnya adalah alamat allocation itu.

mod table;

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

pub use table::{Table, TableRef};

/// Runtime value
#[derive(Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(Number),
    String(Str),
    Table(TableRef),
    Function(Function),
    Userdata(UserdataRef),
}

/// Angka: integer 64-bit atau float 64-bit
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    /// Raw equality: integral float sama dengan integer yang sama nilainya
    pub fn raw_eq(&self, other: &Number) -> bool {
        match (*self, *other) {
            (Number::Integer(a), Number::Integer(b)) => a == b,
            (Number::Float(a), Number::Float(b)) => a == b,
            (Number::Integer(i), Number::Float(f)) | (Number::Float(f), Number::Integer(i)) => {
                f.fract() == 0.0 && (i as f64) == f && (f as i64) == i
            }
        }
    }
}

/// Immutable byte string dengan identitas reference
#[derive(Clone)]
pub struct Str(Rc<[u8]>);

impl Str {
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Str(Rc::from(bytes.as_ref()))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Alamat allocation, dipakai sebagai identity
    #[inline]
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Str) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for Str {
    fn from(s: &str) -> Self {
        Str::new(s)
    }
}

/// Closure: code blob opaque + captured values
///
/// Struktur code blob adalah urusan host; codec hanya menyalinnya byte-for-byte.
#[derive(Debug, Clone, Default)]
pub struct Closure {
    pub code: Vec<u8>,
    pub upvalues: Vec<Value>,
}

/// Shared handle ke closure
#[derive(Clone)]
pub struct ClosureRef(Rc<RefCell<Closure>>);

impl ClosureRef {
    pub fn new(closure: Closure) -> Self {
        ClosureRef(Rc::new(RefCell::new(closure)))
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, Closure> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, Closure> {
        self.0.borrow_mut()
    }

    #[inline]
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ClosureRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ClosureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "closure: 0x{:x}", self.identity())
    }
}

/// Signature native function milik host
pub type NativeFn = dyn Fn(&[Value]) -> Vec<Value>;

/// Native/host function. Tidak punya body yang bisa diserialisasi,
/// hanya bisa di-preserve lewat nama yang terdaftar di host.
#[derive(Clone)]
pub struct NativeFunction(Rc<NativeFn>);

impl NativeFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Vec<Value> + 'static,
    {
        NativeFunction(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Vec<Value> {
        (self.0)(args)
    }

    #[inline]
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    #[inline]
    pub fn ptr_eq(&self, other: &NativeFunction) -> bool {
        self.identity() == other.identity()
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native: 0x{:x}", self.identity())
    }
}

/// Callable value
#[derive(Debug, Clone)]
pub enum Function {
    Closure(ClosureRef),
    Native(NativeFunction),
}

/// Opaque host object dengan type tag
pub struct Userdata {
    tag: String,
    data: RefCell<Box<dyn Any>>,
}

impl Userdata {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn data(&self) -> std::cell::Ref<'_, Box<dyn Any>> {
        self.data.borrow()
    }

    pub fn data_mut(&self) -> std::cell::RefMut<'_, Box<dyn Any>> {
        self.data.borrow_mut()
    }
}

/// Shared handle ke userdata
#[derive(Clone)]
pub struct UserdataRef(Rc<Userdata>);

impl UserdataRef {
    pub fn new(tag: impl Into<String>, data: Box<dyn Any>) -> Self {
        UserdataRef(Rc::new(Userdata {
            tag: tag.into(),
            data: RefCell::new(data),
        }))
    }

    pub fn tag(&self) -> &str {
        self.0.tag()
    }

    /// Downcast payload ke tipe konkret
    pub fn with<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let data = self.0.data();
        data.downcast_ref::<T>().map(f)
    }

    pub fn inner(&self) -> &Userdata {
        &self.0
    }

    #[inline]
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    #[inline]
    pub fn ptr_eq(&self, other: &UserdataRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for UserdataRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "userdata<{}>: 0x{:x}", self.tag(), self.identity())
    }
}

impl Value {
    pub fn integer(i: i64) -> Self {
        Value::Number(Number::Integer(i))
    }

    pub fn float(f: f64) -> Self {
        Value::Number(Number::Float(f))
    }

    pub fn string(s: impl AsRef<[u8]>) -> Self {
        Value::String(Str::new(s))
    }

    pub fn closure(code: Vec<u8>, upvalues: Vec<Value>) -> Self {
        Value::Function(Function::Closure(ClosureRef::new(Closure { code, upvalues })))
    }

    pub fn native(f: NativeFunction) -> Self {
        Value::Function(Function::Native(f))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Table(_) => "table",
            Value::Function(_) => "function",
            Value::Userdata(_) => "userdata",
        }
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Raw equality, dipakai untuk key lookup di table.
    ///
    /// Value types dibandingkan per nilai, string per isi,
    /// reference kinds lain per identitas.
    pub fn raw_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.raw_eq(b),
            (Value::String(a), Value::String(b)) => a.as_bytes() == b.as_bytes(),
            (Value::Table(a), Value::Table(b)) => a.ptr_eq(b),
            (Value::Function(Function::Closure(a)), Value::Function(Function::Closure(b))) => {
                a.ptr_eq(b)
            }
            (Value::Function(Function::Native(a)), Value::Function(Function::Native(b))) => {
                a.ptr_eq(b)
            }
            (Value::Userdata(a), Value::Userdata(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Structural equality yang aman terhadap cycle.
    ///
    /// Table dibandingkan entry-per-entry sesuai urutan. Pasangan table
    /// yang sedang dibandingkan dianggap sama saat ditemui lagi.
    /// Native function dibandingkan per identitas, userdata per type tag.
    pub fn deep_eq(&self, other: &Value) -> bool {
        let mut visiting = HashSet::new();
        deep_eq_inner(self, other, &mut visiting)
    }
}

fn deep_eq_inner(a: &Value, b: &Value, visiting: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Number(Number::Integer(x)), Value::Number(Number::Integer(y))) => x == y,
        (Value::Number(Number::Float(x)), Value::Number(Number::Float(y))) => {
            x.to_bits() == y.to_bits() || x == y
        }
        (Value::String(x), Value::String(y)) => x.as_bytes() == y.as_bytes(),
        (Value::Table(x), Value::Table(y)) => {
            if !visiting.insert((x.identity(), y.identity())) {
                return true;
            }
            let xs = x.entries();
            let ys = y.entries();
            xs.len() == ys.len()
                && xs.iter().zip(ys.iter()).all(|((xk, xv), (yk, yv))| {
                    deep_eq_inner(xk, yk, visiting) && deep_eq_inner(xv, yv, visiting)
                })
        }
        (Value::Function(Function::Closure(x)), Value::Function(Function::Closure(y))) => {
            if !visiting.insert((x.identity(), y.identity())) {
                return true;
            }
            let (xc, yc) = (x.borrow().clone(), y.borrow().clone());
            xc.code == yc.code
                && xc.upvalues.len() == yc.upvalues.len()
                && xc
                    .upvalues
                    .iter()
                    .zip(yc.upvalues.iter())
                    .all(|(u, v)| deep_eq_inner(u, v, visiting))
        }
        (Value::Function(Function::Native(x)), Value::Function(Function::Native(y))) => {
            x.ptr_eq(y)
        }
        (Value::Userdata(x), Value::Userdata(y)) => x.tag() == y.tag(),
        _ => false,
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(Number::Integer(i)) => write!(f, "{}", i),
            Value::Number(Number::Float(x)) => write!(f, "{:?}", x),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Table(t) => write!(f, "{:?}", t),
            Value::Function(Function::Closure(c)) => write!(f, "{:?}", c),
            Value::Function(Function::Native(n)) => write!(f, "{:?}", n),
            Value::Userdata(u) => write!(f, "{:?}", u),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<TableRef> for Value {
    fn from(t: TableRef) -> Self {
        Value::Table(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_identity_vs_content() {
        let a = Str::new("snapshot");
        let b = a.clone();
        let c = Str::new("snapshot");

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(Value::String(a).raw_eq(&Value::String(c)));
    }

    #[test]
    fn test_integral_float_raw_eq_integer() {
        assert!(Value::integer(3).raw_eq(&Value::float(3.0)));
        assert!(!Value::integer(3).raw_eq(&Value::float(3.5)));
        // deep_eq tetap membedakan variant
        assert!(!Value::integer(3).deep_eq(&Value::float(3.0)));
    }

    #[test]
    fn test_deep_eq_cyclic_tables() {
        let a = TableRef::new();
        a.set(Value::from("self"), Value::Table(a.clone()));
        let b = TableRef::new();
        b.set(Value::from("self"), Value::Table(b.clone()));

        assert!(Value::Table(a).deep_eq(&Value::Table(b)));
    }

    #[test]
    fn test_native_identity() {
        let f = NativeFunction::new(|args| args.to_vec());
        let g = f.clone();
        let h = NativeFunction::new(|args| args.to_vec());

        assert!(f.ptr_eq(&g));
        assert!(!f.ptr_eq(&h));
        assert_eq!(f.call(&[Value::integer(1)]).len(), 1);
    }

    #[test]
    fn test_userdata_downcast() {
        let u = UserdataRef::new("point", Box::new((3i32, 4i32)));
        assert_eq!(u.tag(), "point");
        assert_eq!(u.with(|p: &(i32, i32)| p.0 + p.1), Some(7));
        assert_eq!(u.with(|_: &String| ()), None);
    }
}
