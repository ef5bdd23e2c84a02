//! Associative table dengan urutan insertion
//!
//! Entry disimpan berurutan sesuai insertion sehingga encode lalu decode
//! menghasilkan urutan yang sama. Lookup lewat hash index (`IndexMap`)
//! dengan key yang dibandingkan per raw equality.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use super::{Function, Number, Value};

/// Key table: `Hash`/`Eq` konsisten dengan `Value::raw_eq`
#[derive(Clone)]
struct TableKey(Value);

impl PartialEq for TableKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.raw_eq(&other.0)
    }
}

impl Eq for TableKey {}

impl Hash for TableKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Nil => 0u8.hash(state),
            Value::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Number(n) => {
                2u8.hash(state);
                hash_number(*n, state);
            }
            Value::String(s) => {
                3u8.hash(state);
                s.as_bytes().hash(state);
            }
            Value::Table(t) => {
                4u8.hash(state);
                t.identity().hash(state);
            }
            Value::Function(Function::Closure(c)) => {
                5u8.hash(state);
                c.identity().hash(state);
            }
            Value::Function(Function::Native(f)) => {
                6u8.hash(state);
                f.identity().hash(state);
            }
            Value::Userdata(u) => {
                7u8.hash(state);
                u.identity().hash(state);
            }
        }
    }
}

/// Float integral di-hash sebagai integer supaya `1` dan `1.0` jatuh ke slot
/// yang sama (termasuk `-0.0`).
fn hash_number<H: Hasher>(n: Number, state: &mut H) {
    match n {
        Number::Integer(i) => i.hash(state),
        Number::Float(f) => {
            let i = f as i64;
            if f.fract() == 0.0 && (i as f64) == f {
                i.hash(state);
            } else {
                f.to_bits().hash(state);
            }
        }
    }
}

/// Isi table
#[derive(Default)]
pub struct Table {
    entries: IndexMap<TableKey, Value>,
}

/// Shared, mutable handle ke table. Clone berbagi table yang sama.
#[derive(Clone, Default)]
pub struct TableRef(Rc<RefCell<Table>>);

impl TableRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Membuat table dari pasangan key/value (last write wins)
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        let table = Self::new();
        for (k, v) in entries {
            table.set(k, v);
        }
        table
    }

    /// Membuat sequence 1..=n
    pub fn from_list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self::from_entries(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Value::integer(i as i64 + 1), v)),
        )
    }

    pub fn get(&self, key: &Value) -> Value {
        self.0
            .borrow()
            .entries
            .get(&TableKey(key.clone()))
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// Set key ke value. Value `Nil` menghapus entry.
    ///
    /// Returns `false` jika key tidak valid (nil atau NaN).
    pub fn set(&self, key: Value, value: Value) -> bool {
        match &key {
            Value::Nil => return false,
            Value::Number(Number::Float(f)) if f.is_nan() => return false,
            _ => {}
        }

        let mut table = self.0.borrow_mut();
        if value.is_nil() {
            // shift_remove menjaga urutan entry lain
            table.entries.shift_remove(&TableKey(key));
        } else {
            // insert pada key yang sudah ada tidak mengubah posisinya
            table.entries.insert(TableKey(key), value);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.0.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot entry saat ini (clone handle, bukan deep copy)
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0
            .borrow()
            .entries
            .iter()
            .map(|(k, v)| (k.0.clone(), v.clone()))
            .collect()
    }

    /// Kosongkan table. Berguna untuk memutus cycle `Rc` sebelum drop.
    pub fn clear(&self) {
        self.0.borrow_mut().entries.clear();
    }

    #[inline]
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    #[inline]
    pub fn ptr_eq(&self, other: &TableRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tidak recurse ke entry: table bisa berisi dirinya sendiri
        write!(f, "table: 0x{:x} ({} entries)", self.identity(), self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_overwrite() {
        let t = TableRef::new();
        assert!(t.set(Value::from("a"), Value::integer(1)));
        assert!(t.set(Value::from("a"), Value::integer(2)));

        assert_eq!(t.len(), 1);
        assert!(t.get(&Value::from("a")).deep_eq(&Value::integer(2)));
    }

    #[test]
    fn test_nil_value_removes_entry() {
        let t = TableRef::from_list(vec![Value::from(true), Value::from(false)]);
        t.set(Value::integer(1), Value::Nil);

        assert_eq!(t.len(), 1);
        assert!(t.get(&Value::integer(1)).is_nil());
    }

    #[test]
    fn test_rejects_nil_and_nan_keys() {
        let t = TableRef::new();
        assert!(!t.set(Value::Nil, Value::integer(1)));
        assert!(!t.set(Value::float(f64::NAN), Value::integer(1)));
        assert!(t.is_empty());
    }

    #[test]
    fn test_insertion_order_kept() {
        let t = TableRef::new();
        t.set(Value::from("z"), Value::integer(1));
        t.set(Value::from("a"), Value::integer(2));
        t.set(Value::from("m"), Value::integer(3));

        let keys: Vec<_> = t
            .entries()
            .into_iter()
            .map(|(k, _)| format!("{:?}", k))
            .collect();
        assert_eq!(keys, vec!["\"z\"", "\"a\"", "\"m\""]);
    }

    #[test]
    fn test_integral_float_key_matches_integer() {
        let t = TableRef::new();
        t.set(Value::integer(3), Value::from("three"));
        t.set(Value::float(3.0), Value::from("again"));
        t.set(Value::float(0.0), Value::from("zero"));

        assert_eq!(t.len(), 2);
        assert!(t.get(&Value::integer(3)).deep_eq(&Value::from("again")));
        assert!(t.get(&Value::float(-0.0)).deep_eq(&Value::from("zero")));
        assert!(t.get(&Value::float(3.5)).is_nil());
    }

    #[test]
    fn test_remove_keeps_order_of_rest() {
        let t = TableRef::from_list(vec![Value::from("a"), Value::from("b"), Value::from("c")]);
        t.set(Value::integer(2), Value::Nil);
        t.set(Value::integer(1), Value::from("A"));

        let values: Vec<_> = t.entries().into_iter().map(|(_, v)| format!("{:?}", v)).collect();
        assert_eq!(values, vec!["\"A\"", "\"c\""]);
    }

    #[test]
    fn test_large_table_lookup() {
        let t = TableRef::from_list((0..50_000).map(Value::integer));
        assert_eq!(t.len(), 50_000);
        assert!(t.get(&Value::integer(50_000)).deep_eq(&Value::integer(49_999)));
        assert!(t.get(&Value::float(1.0)).deep_eq(&Value::integer(0)));
    }

    #[test]
    fn test_table_key_by_identity() {
        let t = TableRef::new();
        let k1 = TableRef::new();
        let k2 = TableRef::new();
        t.set(Value::Table(k1.clone()), Value::integer(1));

        assert!(t.get(&Value::Table(k2)).is_nil());
        assert!(t.get(&Value::Table(k1)).deep_eq(&Value::integer(1)));
    }
}
