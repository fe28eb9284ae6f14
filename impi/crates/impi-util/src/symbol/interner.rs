//! String interner implementation backed by DashMap.
//!
//! Two maps are kept per table: a forward map (string → index) used by
//! [`StringTable::intern`] and a reverse map (index → string) used by
//! [`StringTable::resolve`]. Both directions are O(1); `resolve` is hot
//! in the interpreter (every `show`, every word-dictionary miss message)
//! so a linear scan is not acceptable.
//!
//! Interned strings are allocated once with `Box::leak` and live for
//! the process lifetime. Common word-dictionary names are pre-interned
//! when the table is first touched so that startup-heavy paths hit the
//! fast path immediately.

use std::hash::{Hash, Hasher};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU32, Ordering};

use ahash::AHasher;
use dashmap::DashMap;

use super::Symbol;

/// Global string table instance.
///
/// Initialized on first use; the built-in word names and the implicit
/// function-literal parameters are pre-interned.
pub static STRING_TABLE: LazyLock<StringTable> = LazyLock::new(|| {
    let table = StringTable::new();
    table.prefill_common();
    table
});

/// Names interned eagerly at table construction.
///
/// These are the built-in words the evaluator registers plus the
/// implicit `x`/`y`/`z` parameters; pre-interning keeps the first
/// evaluation of any program on the hash-hit fast path.
const COMMON_NAMES: &[&str] = &[
    "nil", "ok", "+", "-", "*", "%", "^", "min", "max", "<", ">", "<=", ">=", "=", "~=", "!", "tk",
    "rev", "len", "rd", "wr", "e?", "rm", "rln", "load", "echo", "show", "xmls", "get", "set",
    "put", "at", "keys", "vals", "ite", "while", "words", "part", "type?", "x", "y", "z", "[",
    "(", "{", "`[", "'[", ":[",
];

/// Thread-safe append-only string table.
pub struct StringTable {
    /// string hash → (string, table index).
    forward: DashMap<u64, (&'static str, u32)>,

    /// table index → string.
    reverse: DashMap<u32, &'static str>,

    /// Next free index.
    next_index: AtomicU32,
}

impl StringTable {
    fn new() -> Self {
        Self {
            forward: DashMap::with_capacity(128),
            reverse: DashMap::with_capacity(128),
            next_index: AtomicU32::new(0),
        }
    }

    fn prefill_common(&self) {
        for name in COMMON_NAMES {
            self.intern(name);
        }
    }

    /// Intern a string, returning its symbol.
    ///
    /// Hash collisions between distinct strings are resolved by probing
    /// with a fixed prime offset; the probe chain terminates because
    /// the table is append-only.
    pub fn intern(&self, string: &str) -> Symbol {
        const PROBE_PRIME: u64 = 0x9e37_79b9_7f4a_7c15;

        let mut hash = Self::hash_string(string);
        loop {
            if let Some(entry) = self.forward.get(&hash) {
                if entry.value().0 == string {
                    return Symbol::from_index(entry.value().1);
                }
                // Occupied by a different string; probe onward.
                hash = hash.wrapping_add(PROBE_PRIME);
                continue;
            }

            match self.forward.entry(hash) {
                dashmap::mapref::entry::Entry::Occupied(entry) => {
                    // Raced with another thread on this slot.
                    if entry.get().0 == string {
                        return Symbol::from_index(entry.get().1);
                    }
                    hash = hash.wrapping_add(PROBE_PRIME);
                }
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    let interned: &'static str = Box::leak(string.to_string().into_boxed_str());
                    let idx = self.next_index.fetch_add(1, Ordering::Relaxed);
                    entry.insert((interned, idx));
                    self.reverse.insert(idx, interned);
                    return Symbol::from_index(idx);
                }
            }
        }
    }

    /// Look up the string for a symbol.
    pub fn resolve(&self, symbol: Symbol) -> Option<&'static str> {
        self.reverse.get(&symbol.as_u32()).map(|e| *e.value())
    }

    /// Number of distinct interned strings.
    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    /// True when nothing beyond the pre-filled names has been interned.
    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    #[inline]
    fn hash_string(string: &str) -> u64 {
        let mut hasher = AHasher::default();
        string.hash(&mut hasher);
        hasher.finish()
    }
}
