//! Mutation recording for patterns.

use crate::context::IrContext;
use crate::location::Location;
use crate::refs::{BlockRef, OpRef, ValueRef};
use crate::rewrite::type_converter::TypeConverter;

pub(crate) struct Mutations {
    pub(crate) prefix_ops: Vec<OpRef>,
    pub(crate) replacement: Option<OpRef>,
    pub(crate) erase_values: Option<Vec<ValueRef>>,
}

/// Records the ops a pattern builds and how the matched op is replaced.
///
/// Nothing touches the matched op's block until the applicator commits.
pub struct PatternRewriter<'a> {
    type_converter: &'a TypeConverter,
    prefix_ops: Vec<OpRef>,
    replacement: Option<OpRef>,
    erase_values: Option<Vec<ValueRef>>,
}

impl<'a> PatternRewriter<'a> {
    pub fn new(type_converter: &'a TypeConverter) -> Self {
        Self {
            type_converter,
            prefix_ops: Vec::new(),
            replacement: None,
            erase_values: None,
        }
    }

    pub fn type_converter(&self) -> &'a TypeConverter {
        self.type_converter
    }

    /// Insert a detached op before the matched op. Calls accumulate in order.
    pub fn insert_op(&mut self, op: OpRef) {
        self.prefix_ops.push(op);
    }

    /// Replace the matched op by `new_op`, mapping results 1:1 by index.
    pub fn replace_op(&mut self, new_op: OpRef) {
        debug_assert!(
            self.replacement.is_none() && self.erase_values.is_none(),
            "replace_op called after replace_op or erase_op"
        );
        self.replacement = Some(new_op);
    }

    /// Erase the matched op, mapping its results to `values`.
    pub fn erase_op(&mut self, values: Vec<ValueRef>) {
        debug_assert!(
            self.replacement.is_none() && self.erase_values.is_none(),
            "erase_op called after replace_op or erase_op"
        );
        self.erase_values = Some(values);
    }

    /// Get `value` in the converted type, inserting cast ops as needed.
    ///
    /// Values whose type needs no conversion come back unchanged. `None`
    /// means the type converts but no materialization could be built.
    pub fn materialize(
        &mut self,
        ctx: &mut IrContext,
        location: Location,
        value: ValueRef,
    ) -> Option<ValueRef> {
        let converter = self.type_converter;
        let from = ctx.value_ty(value);
        let Some(to) = converter.convert_type(ctx, from) else {
            return Some(value);
        };
        let result = converter.materialize(ctx, location, value, from, to)?;
        self.prefix_ops.extend(result.ops);
        Some(result.value)
    }

    /// Ops recorded so far, in insertion order.
    pub fn recorded_ops(&self) -> impl Iterator<Item = OpRef> + '_ {
        self.prefix_ops.iter().copied().chain(self.replacement)
    }

    pub(crate) fn has_mutations(&self) -> bool {
        !self.prefix_ops.is_empty() || self.replacement.is_some() || self.erase_values.is_some()
    }

    pub(crate) fn commits(&self) -> bool {
        self.replacement.is_some() || self.erase_values.is_some()
    }

    /// Drop every recorded op, users before producers.
    pub(crate) fn discard(self, ctx: &mut IrContext) {
        for op in self.replacement.into_iter().chain(self.prefix_ops.into_iter().rev()) {
            ctx.discard_op(op);
        }
    }

    pub(crate) fn take_mutations(self) -> Mutations {
        Mutations {
            prefix_ops: self.prefix_ops,
            replacement: self.replacement,
            erase_values: self.erase_values,
        }
    }
}

/// Commit a pattern's mutations around `original`, which must sit in `block`.
pub(crate) fn apply_mutations(
    ctx: &mut IrContext,
    block: BlockRef,
    original: OpRef,
    mutations: Mutations,
) {
    for op in mutations.prefix_ops {
        ctx.insert_op_before(block, original, op);
    }

    let old_results: Vec<ValueRef> = ctx.op_results(original).to_vec();
    let new_values: Vec<ValueRef> = match (mutations.replacement, mutations.erase_values) {
        (Some(new_op), _) => {
            ctx.insert_op_before(block, original, new_op);
            ctx.op_results(new_op).to_vec()
        }
        (None, Some(values)) => values,
        (None, None) => return,
    };
    debug_assert_eq!(
        old_results.len(),
        new_values.len(),
        "result count mismatch ({} vs {})",
        old_results.len(),
        new_values.len()
    );
    for (old, new) in old_results.into_iter().zip(new_values) {
        ctx.replace_all_uses(old, new);
    }

    ctx.remove_op_from_block(block, original);
    ctx.remove_op(original);
}
