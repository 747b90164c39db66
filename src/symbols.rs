//! # Symbol Interner
//!
//! Translates string literals to small integer ids and back. Modeled in the
//! reference as a pair of injected callbacks (spec.md §9, Design Notes);
//! rulr instead attaches a [`SymbolTable`] directly to the [`crate::engine::Engine`]
//! as the Design Note recommends, while keeping the same inject-override
//! shape (`set_symbol_table`) available for callers that need to share an
//! external string pool.

use std::collections::HashMap;

/// Growable, insertion-ordered name table. Symbol ids are allocation-order
/// dependent (spec.md §5, Ordering guarantees) so replaying the same
/// sequence of `intern` calls always reproduces the same ids.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    names: Vec<String>,
    ids: HashMap<String, i32>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Intern `s`, returning its id. Repeated interning of the same string
    /// returns the same id.
    pub fn intern(&mut self, s: &str) -> i32 {
        if let Some(&id) = self.ids.get(s) {
            return id;
        }
        let id = i32::try_from(self.names.len()).expect("symbol table exhausted 2^31 entries");
        self.names.push(s.to_string());
        self.ids.insert(s.to_string(), id);
        id
    }

    /// Look up the string for a previously interned id.
    #[must_use]
    pub fn lookup(&self, id: i32) -> Option<&str> {
        usize::try_from(id).ok().and_then(|i| self.names.get(i)).map(String::as_str)
    }

    /// Look up the id for a string without interning it.
    #[must_use]
    pub fn find(&self, s: &str) -> Option<i32> {
        self.ids.get(s).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
