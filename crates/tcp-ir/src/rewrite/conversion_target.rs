//! Legality rules for dialect conversion.

use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;

use crate::context::IrContext;
use crate::refs::{OpRef, RegionRef};
use crate::symbol::Symbol;
use crate::walk::{self, WalkAction};

/// Answer of a legality lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegalityCheck {
    Legal,
    Illegal,
    /// No rule mentions the op.
    Unknown,
}

/// How strictly [`ConversionTarget::verify`] treats ops without a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConversionMode {
    /// Only ops answered `Illegal` must be gone.
    #[default]
    Partial,
    /// `Unknown` ops are failures too.
    Full,
}

type DynamicCheckFn = dyn Fn(&IrContext, OpRef) -> Option<LegalityCheck>;

/// Legal and illegal vocabulary of a conversion.
///
/// Resolution order:
/// 1. dynamic checks (first `Some` wins)
/// 2. op rules
/// 3. dialect rules
/// 4. `Unknown`
#[derive(Default)]
pub struct ConversionTarget {
    legal_dialects: HashSet<Symbol>,
    illegal_dialects: HashSet<Symbol>,
    legal_ops: HashSet<(Symbol, Symbol)>,
    illegal_ops: HashSet<(Symbol, Symbol)>,
    dynamic_checks: Vec<Box<DynamicCheckFn>>,
}

impl ConversionTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_legal_dialect(&mut self, dialect: Symbol) -> &mut Self {
        self.legal_dialects.insert(dialect);
        self
    }

    pub fn add_illegal_dialect(&mut self, dialect: Symbol) -> &mut Self {
        self.illegal_dialects.insert(dialect);
        self
    }

    pub fn add_legal_op(&mut self, dialect: Symbol, name: Symbol) -> &mut Self {
        self.legal_ops.insert((dialect, name));
        self
    }

    pub fn add_illegal_op(&mut self, dialect: Symbol, name: Symbol) -> &mut Self {
        self.illegal_ops.insert((dialect, name));
        self
    }

    pub fn add_dynamic_check(
        &mut self,
        f: impl Fn(&IrContext, OpRef) -> Option<LegalityCheck> + 'static,
    ) -> &mut Self {
        self.dynamic_checks.push(Box::new(f));
        self
    }

    pub fn legality(&self, ctx: &IrContext, op: OpRef) -> LegalityCheck {
        if let Some(answer) = self.dynamic_checks.iter().find_map(|check| check(ctx, op)) {
            return answer;
        }

        let data = ctx.op(op);
        let key = (data.dialect, data.name);
        if self.legal_ops.contains(&key) {
            return LegalityCheck::Legal;
        }
        if self.illegal_ops.contains(&key) {
            return LegalityCheck::Illegal;
        }
        if self.legal_dialects.contains(&data.dialect) {
            return LegalityCheck::Legal;
        }
        if self.illegal_dialects.contains(&data.dialect) {
            return LegalityCheck::Illegal;
        }
        LegalityCheck::Unknown
    }

    /// Whether `op` must be rewritten under `mode`.
    pub fn must_convert(&self, ctx: &IrContext, op: OpRef, mode: ConversionMode) -> bool {
        match self.legality(ctx, op) {
            LegalityCheck::Legal => false,
            LegalityCheck::Illegal => true,
            LegalityCheck::Unknown => mode == ConversionMode::Full,
        }
    }

    /// Every op under `region` that violates the target under `mode`.
    pub fn verify(
        &self,
        ctx: &IrContext,
        region: RegionRef,
        mode: ConversionMode,
    ) -> Vec<IllegalOp> {
        let mut illegal = Vec::new();
        let _ = walk::walk_region::<()>(ctx, region, &mut |op| {
            if self.must_convert(ctx, op, mode) {
                let data = ctx.op(op);
                illegal.push(IllegalOp {
                    op,
                    dialect: data.dialect,
                    name: data.name,
                    legality: self.legality(ctx, op),
                });
            }
            ControlFlow::Continue(WalkAction::Advance)
        });
        illegal
    }
}

/// An op left behind by a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalOp {
    pub op: OpRef,
    pub dialect: Symbol,
    pub name: Symbol,
    pub legality: LegalityCheck,
}

impl fmt::Display for IllegalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({})", self.dialect, self.name, self.op)?;
        if self.legality == LegalityCheck::Unknown {
            f.write_str(" [no legality rule]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperationDataBuilder;

    fn op(ctx: &mut IrContext, dialect: &'static str, name: &'static str) -> OpRef {
        let loc = ctx.file_location("file:///target.tcp");
        OperationDataBuilder::new(loc, Symbol::new(dialect), Symbol::new(name)).create(ctx)
    }

    #[test]
    fn op_rules_override_dialect_rules() {
        let mut ctx = IrContext::new();
        let get_extent = op(&mut ctx, "shape", "get_extent");
        let const_shape = op(&mut ctx, "shape", "const_shape");
        let load = op(&mut ctx, "memref", "load");
        let other = op(&mut ctx, "test", "other");

        let mut target = ConversionTarget::new();
        target
            .add_illegal_dialect(Symbol::new("shape"))
            .add_legal_op(Symbol::new("shape"), Symbol::new("get_extent"))
            .add_legal_dialect(Symbol::new("memref"));

        assert_eq!(target.legality(&ctx, get_extent), LegalityCheck::Legal);
        assert_eq!(target.legality(&ctx, const_shape), LegalityCheck::Illegal);
        assert_eq!(target.legality(&ctx, load), LegalityCheck::Legal);
        assert_eq!(target.legality(&ctx, other), LegalityCheck::Unknown);
    }

    #[test]
    fn dynamic_check_wins() {
        let mut ctx = IrContext::new();
        let load = op(&mut ctx, "memref", "load");
        let mut target = ConversionTarget::new();
        target
            .add_legal_dialect(Symbol::new("memref"))
            .add_dynamic_check(|ctx, op| {
                (ctx.op(op).name == "load").then_some(LegalityCheck::Illegal)
            });
        assert_eq!(target.legality(&ctx, load), LegalityCheck::Illegal);
    }

    #[test]
    fn full_mode_rejects_unknown() {
        let mut ctx = IrContext::new();
        let other = op(&mut ctx, "test", "other");
        let target = ConversionTarget::new();
        assert!(!target.must_convert(&ctx, other, ConversionMode::Partial));
        assert!(target.must_convert(&ctx, other, ConversionMode::Full));
    }
}
