//! Scoped symbol tables.
use std::collections::BTreeMap;

use smol_str::SmolStr;

use crate::{
    constants::MAX_INT,
    error::{JackError, JackResult},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Declared type, either a primitive or a class name.
    pub ty: SmolStr,
    pub kind: StorageKind,
    /// Running index within the symbol's kind.
    pub index: u16,
}

/// Where a variable lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StorageKind {
    /// Class level, shared by all instances.
    Static,
    /// Class level, one per instance.
    Field,
    /// Subroutine parameter.
    Argument,
    /// Subroutine local variable.
    Local,
}

impl StorageKind {
    const COUNT: usize = 4;

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

/// Symbols declared in one scope, either a class or a subroutine.
///
/// The compiler keeps two of these alive at once, and probes the
/// subroutine scope before the class scope.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<SmolStr, Symbol>,
    /// Next index for each storage kind.
    counts: [u16; StorageKind::COUNT],
}

impl SymbolTable {
    /// Clear all symbols and restart every index at zero.
    pub fn reset(&mut self) {
        self.symbols.clear();
        self.counts = [0; StorageKind::COUNT];
    }

    /// Declare a new symbol, assigning it the next index of its kind.
    ///
    /// # Errors
    ///
    /// Returns [`JackError::DuplicateSymbol`] if the name is already
    /// declared in this scope, and [`JackError::InvalidArgument`] once a
    /// kind's count would pass [`MAX_INT`].
    pub fn define(&mut self, name: &str, ty: &str, kind: StorageKind) -> JackResult<&Symbol> {
        if self.symbols.contains_key(name) {
            return Err(JackError::DuplicateSymbol(SmolStr::new(name)));
        }

        let counter = &mut self.counts[kind.slot()];
        let index = *counter;
        // Counts are emitted as constants, so they must stay in range.
        *counter = index
            .checked_add(1)
            .filter(|count| *count <= MAX_INT)
            .ok_or_else(|| {
                JackError::InvalidArgument(format!(
                    "too many {kind:?} variables, at most {MAX_INT} are allowed"
                ))
            })?;

        let symbol = self.symbols.entry(SmolStr::new(name)).or_insert(Symbol {
            ty: SmolStr::new(ty),
            kind,
            index,
        });

        Ok(symbol)
    }

    #[inline]
    pub fn get_symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Storage kind of the named symbol, `None` when not declared here.
    #[inline]
    pub fn kind_of(&self, name: &str) -> Option<StorageKind> {
        self.get_symbol(name).map(|symbol| symbol.kind)
    }

    pub fn type_of(&self, name: &str) -> JackResult<&str> {
        self.get_symbol(name)
            .map(|symbol| symbol.ty.as_str())
            .ok_or_else(|| JackError::UnknownSymbol(SmolStr::new(name)))
    }

    pub fn index_of(&self, name: &str) -> JackResult<u16> {
        self.get_symbol(name)
            .map(|symbol| symbol.index)
            .ok_or_else(|| JackError::UnknownSymbol(SmolStr::new(name)))
    }

    /// Number of symbols of the given kind declared so far.
    #[inline]
    pub fn count_of(&self, kind: StorageKind) -> u16 {
        self.counts[kind.slot()]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_indices_per_kind() {
        let mut table = SymbolTable::default();
        table.define("a", "int", StorageKind::Local).unwrap();
        table.define("p", "Point", StorageKind::Argument).unwrap();
        table.define("b", "boolean", StorageKind::Local).unwrap();
        table.define("c", "char", StorageKind::Local).unwrap();

        assert_eq!(table.index_of("a").unwrap(), 0);
        assert_eq!(table.index_of("b").unwrap(), 1);
        assert_eq!(table.index_of("c").unwrap(), 2);
        assert_eq!(table.index_of("p").unwrap(), 0);

        assert_eq!(table.count_of(StorageKind::Local), 3);
        assert_eq!(table.count_of(StorageKind::Argument), 1);
        assert_eq!(table.count_of(StorageKind::Field), 0);
        assert_eq!(table.type_of("p").unwrap(), "Point");
    }

    #[test]
    fn test_unknown_symbol() {
        let table = SymbolTable::default();
        assert_eq!(table.kind_of("missing"), None);
        assert!(matches!(table.type_of("missing"), Err(JackError::UnknownSymbol(_))));
        assert!(matches!(table.index_of("missing"), Err(JackError::UnknownSymbol(_))));
    }

    #[test]
    fn test_duplicate_symbol() {
        let mut table = SymbolTable::default();
        table.define("x", "int", StorageKind::Field).unwrap();

        let err = table.define("x", "char", StorageKind::Static).unwrap_err();
        assert!(matches!(err, JackError::DuplicateSymbol(name) if name == "x"));

        // Rejected definitions don't consume an index.
        assert_eq!(table.count_of(StorageKind::Static), 0);
        assert_eq!(table.kind_of("x"), Some(StorageKind::Field));
    }

    #[test]
    fn test_kind_count_limit() {
        let mut table = SymbolTable::default();
        table.counts[StorageKind::Local.slot()] = MAX_INT - 1;

        let symbol = table.define("last", "int", StorageKind::Local).unwrap();
        assert_eq!(symbol.index, MAX_INT - 1);
        assert_eq!(table.count_of(StorageKind::Local), MAX_INT);

        let err = table.define("overflow", "int", StorageKind::Local).unwrap_err();
        assert!(matches!(err, JackError::InvalidArgument(_)));
        assert_eq!(table.count_of(StorageKind::Local), MAX_INT);
        assert_eq!(table.kind_of("overflow"), None);

        // Other kinds keep their own budget.
        table.define("arg", "int", StorageKind::Argument).unwrap();
    }

    #[test]
    fn test_reset() {
        let mut table = SymbolTable::default();
        table.define("x", "int", StorageKind::Local).unwrap();
        table.define("y", "int", StorageKind::Argument).unwrap();
        table.reset();

        assert_eq!(table.kind_of("x"), None);
        assert_eq!(table.count_of(StorageKind::Local), 0);
        assert_eq!(table.count_of(StorageKind::Argument), 0);

        let symbol = table.define("z", "int", StorageKind::Local).unwrap();
        assert_eq!(symbol.index, 0);
    }
}
