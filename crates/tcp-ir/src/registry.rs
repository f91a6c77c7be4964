//! Explicit list of dialects a pass may introduce.

use std::collections::BTreeSet;

use crate::symbol::Symbol;

/// Set of dialect names that must be loaded before a conversion runs.
///
/// Passes build one of these up front and hand it to the driver through
/// `ConversionConfig`, which loads it into the `IrContext`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DialectRegistry {
    dialects: BTreeSet<Symbol>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dialect: Symbol) -> Self {
        self.dialects.insert(dialect);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.dialects.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.dialects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialects.is_empty()
    }
}

impl FromIterator<Symbol> for DialectRegistry {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        Self {
            dialects: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IrContext;

    #[test]
    fn loading_registry_makes_dialects_available() {
        let registry = DialectRegistry::new()
            .with(Symbol::new("scf"))
            .with(Symbol::new("linalg"))
            .with(Symbol::new("scf"));
        assert_eq!(registry.len(), 2);

        let mut ctx = IrContext::new();
        assert!(!ctx.is_dialect_loaded(Symbol::new("scf")));
        ctx.load_dialects(&registry);
        assert!(ctx.is_dialect_loaded(Symbol::new("scf")));
        assert!(ctx.is_dialect_loaded(Symbol::new("linalg")));
        assert!(!ctx.is_dialect_loaded(Symbol::new("memref")));
    }
}
