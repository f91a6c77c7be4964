//! Interned names for dialects, operations and attribute keys.

use std::sync::LazyLock;

use lasso::{Rodeo, Spur};
use parking_lot::RwLock;

static INTERNER: LazyLock<RwLock<Rodeo>> = LazyLock::new(|| RwLock::new(Rodeo::default()));

/// A 4-byte interned string.
///
/// Equality and hashing compare the key only, so dialect/op name checks in
/// patterns never touch the string data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Spur);

impl Symbol {
    /// Intern a static string.
    pub fn new(text: &'static str) -> Self {
        if let Some(spur) = INTERNER.read().get(text) {
            return Symbol(spur);
        }
        Symbol(INTERNER.write().get_or_intern_static(text))
    }

    /// Intern a runtime string. Prefer [`Symbol::new`] for literals.
    pub fn from_dynamic(text: &str) -> Self {
        if let Some(spur) = INTERNER.read().get(text) {
            return Symbol(spur);
        }
        Symbol(INTERNER.write().get_or_intern(text))
    }

    /// Run `f` on the symbol's text without allocating.
    ///
    /// `read_recursive` keeps nested symbol formatting inside `f` deadlock-free.
    pub fn with_str<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        let interner = INTERNER.read_recursive();
        f(interner.resolve(&self.0))
    }
}

impl From<&'static str> for Symbol {
    fn from(text: &'static str) -> Self {
        Symbol::new(text)
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.with_str(|s| s == other)
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self.with_str(|s| s == *other)
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.with_str(|s| f.write_str(s))
    }
}

/// Declare accessor functions for frequently used symbols.
///
/// ```
/// tcp_ir::symbols! {
///     ATTR_VALUE => "value",
/// }
/// assert_eq!(ATTR_VALUE(), "value");
/// ```
#[macro_export]
macro_rules! symbols {
    ($($(#[$attr:meta])* $name:ident => $text:literal),* $(,)?) => {
        $(
            $(#[$attr])*
            #[allow(non_snake_case)]
            #[inline]
            pub fn $name() -> $crate::Symbol {
                $crate::Symbol::new($text)
            }
        )*
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_and_dynamic_intern_to_same_key() {
        let a = Symbol::new("broadcast_to");
        let b = Symbol::from_dynamic(&String::from("broadcast_to"));
        assert_eq!(a, b);
        assert_eq!(a, "broadcast_to");
        assert_eq!(a.to_string(), "broadcast_to");
    }

    #[test]
    fn distinct_text_distinct_symbol() {
        assert_ne!(Symbol::new("memref"), Symbol::new("tensor"));
    }
}
