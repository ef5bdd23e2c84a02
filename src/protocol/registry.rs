//! Identity Registry
//!
//! Mapping identity <-> id per pass. Setiap reference kind punya id space
//! sendiri, dimulai dari 1 dan naik monoton sesuai urutan first visit.
//! Registry dibuat di awal pass dan dibuang di akhir pass.

use std::collections::HashMap;

use crate::error::{PreserveError, PreserveResult};

/// Reference kinds, masing-masing dengan id space terpisah
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    String,
    Table,
    Closure,
    Native,
    Userdata,
}

impl RefKind {
    pub const ALL: [RefKind; 5] = [
        RefKind::String,
        RefKind::Table,
        RefKind::Closure,
        RefKind::Native,
        RefKind::Userdata,
    ];

    #[inline(always)]
    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            RefKind::String => "string",
            RefKind::Table => "table",
            RefKind::Closure => "closure",
            RefKind::Native => "native function",
            RefKind::Userdata => "userdata",
        }
    }
}

/// Encode side: identity (alamat object) -> id
///
/// Hanya menyimpan alamat, tidak memegang ownership atas value. Owner registry
/// (encoder) wajib menahan object sampai pass selesai.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    seen: [HashMap<usize, u64>; 5],
    next: [u64; 5],
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn lookup(&self, kind: RefKind, identity: usize) -> Option<u64> {
        self.seen[kind.index()].get(&identity).copied()
    }

    /// Assign id baru. Caller harus `lookup` dulu.
    pub fn assign(&mut self, kind: RefKind, identity: usize) -> PreserveResult<u64> {
        let slot = kind.index();
        if let Some(&id) = self.seen[slot].get(&identity) {
            return Err(PreserveError::DuplicateId {
                kind: kind.name(),
                id,
            });
        }
        self.next[slot] += 1;
        let id = self.next[slot];
        self.seen[slot].insert(identity, id);
        Ok(id)
    }

    /// Jumlah id yang sudah di-assign untuk kind ini
    pub fn count(&self, kind: RefKind) -> u64 {
        self.next[kind.index()]
    }
}

/// Decode side: id -> object yang sudah dikonstruksi
#[derive(Debug)]
pub struct ObjectRegistry<T> {
    objects: [HashMap<u64, T>; 5],
}

impl<T> Default for ObjectRegistry<T> {
    fn default() -> Self {
        Self {
            objects: Default::default(),
        }
    }
}

impl<T: Clone> ObjectRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: RefKind, id: u64, object: T) -> PreserveResult<()> {
        let map = &mut self.objects[kind.index()];
        if map.contains_key(&id) {
            return Err(PreserveError::DuplicateId {
                kind: kind.name(),
                id,
            });
        }
        map.insert(id, object);
        Ok(())
    }

    /// Resolve back-reference. Forward reference = stream rusak.
    pub fn resolve(&self, kind: RefKind, id: u64) -> PreserveResult<T> {
        self.objects[kind.index()]
            .get(&id)
            .cloned()
            .ok_or(PreserveError::UnknownReference {
                kind: kind.name(),
                id,
            })
    }

    pub fn count(&self, kind: RefKind) -> usize {
        self.objects[kind.index()].len()
    }
}
