//! Fixpoint driver for rewrite patterns.
//!
//! Each iteration snapshots block op lists, visits nested regions before
//! their parent op, and applies at most one pattern per op. Ops detached
//! by an earlier rewrite in the same iteration are skipped.

use std::ops::ControlFlow;

use derive_more::{Display, Error};
use tracing::{debug, trace, warn};

use super::conversion_target::{ConversionMode, ConversionTarget, IllegalOp};
use super::pattern::RewritePattern;
use super::rewriter::{self, PatternRewriter};
use super::type_converter::TypeConverter;
use crate::context::IrContext;
use crate::ops::full_name;
use crate::refs::{BlockRef, OpRef, RegionRef};
use crate::registry::DialectRegistry;
use crate::symbol::Symbol;
use crate::walk::{self, WalkAction};

/// Driver setup passed alongside the target.
#[derive(Clone, Debug)]
pub struct ConversionConfig {
    /// Dialects the patterns may introduce; loaded before the first iteration.
    pub dependent_dialects: DialectRegistry,
    pub mode: ConversionMode,
    pub max_iterations: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dependent_dialects: DialectRegistry::new(),
            mode: ConversionMode::Partial,
            max_iterations: 10,
        }
    }
}

/// Statistics of a driver run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyResult {
    pub iterations: usize,
    pub total_changes: usize,
    /// The last iteration changed nothing.
    pub reached_fixpoint: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum ConversionFailure {
    #[display("{} operation(s) failed to legalize: {}", ops.len(), list(ops))]
    IllegalOpsRemain { ops: Vec<IllegalOp> },
    #[display("no fixpoint after {iterations} iteration(s); still illegal: {}", list(remaining))]
    IterationLimit {
        iterations: usize,
        remaining: Vec<IllegalOp>,
    },
    #[display("`{op}` belongs to dialect `{dialect}`, which was not declared as a dependency")]
    UnloadedDialect { dialect: Symbol, op: String },
}

fn list(ops: &[IllegalOp]) -> String {
    ops.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Applies a pattern set until nothing changes.
pub struct PatternApplicator {
    patterns: Vec<Box<dyn RewritePattern>>,
    type_converter: TypeConverter,
}

impl PatternApplicator {
    pub fn new(type_converter: TypeConverter) -> Self {
        Self {
            patterns: Vec::new(),
            type_converter,
        }
    }

    pub fn add_pattern(mut self, pattern: impl RewritePattern + 'static) -> Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    pub fn type_converter(&self) -> &TypeConverter {
        &self.type_converter
    }

    /// Load dependencies, rewrite everything under `root`, then check that
    /// nothing `target` rejects is left.
    pub fn apply_conversion(
        &self,
        ctx: &mut IrContext,
        root: OpRef,
        target: &ConversionTarget,
        config: &ConversionConfig,
    ) -> Result<ApplyResult, ConversionFailure> {
        ctx.load_dialects(&config.dependent_dialects);

        let result = self.apply_partial(ctx, root, config.max_iterations)?;

        let mut remaining = Vec::new();
        for &region in &ctx.op(root).regions {
            remaining.extend(target.verify(ctx, region, config.mode));
        }
        if remaining.is_empty() {
            return Ok(result);
        }
        warn!(
            remaining = remaining.len(),
            iterations = result.iterations,
            "conversion left illegal operations"
        );
        if result.reached_fixpoint {
            Err(ConversionFailure::IllegalOpsRemain { ops: remaining })
        } else {
            Err(ConversionFailure::IterationLimit {
                iterations: result.iterations,
                remaining,
            })
        }
    }

    /// Run the fixpoint without checking legality.
    pub fn apply_partial(
        &self,
        ctx: &mut IrContext,
        root: OpRef,
        max_iterations: usize,
    ) -> Result<ApplyResult, ConversionFailure> {
        let mut total_changes = 0;
        let mut iterations = 0;

        while iterations < max_iterations {
            iterations += 1;
            let mut changes = 0;
            let regions: Vec<RegionRef> = ctx.op(root).regions.to_vec();
            for region in regions {
                changes += self.visit_region(ctx, region)?;
            }
            total_changes += changes;
            debug!(iteration = iterations, changes, "rewrite iteration finished");
            if changes == 0 {
                return Ok(ApplyResult {
                    iterations,
                    total_changes,
                    reached_fixpoint: true,
                });
            }
        }

        Ok(ApplyResult {
            iterations,
            total_changes,
            reached_fixpoint: false,
        })
    }

    fn visit_region(
        &self,
        ctx: &mut IrContext,
        region: RegionRef,
    ) -> Result<usize, ConversionFailure> {
        let mut changes = 0;
        let blocks: Vec<BlockRef> = ctx.region(region).blocks.to_vec();
        for block in blocks {
            changes += self.visit_block(ctx, block)?;
        }
        Ok(changes)
    }

    fn visit_block(
        &self,
        ctx: &mut IrContext,
        block: BlockRef,
    ) -> Result<usize, ConversionFailure> {
        let mut changes = 0;
        let ops: Vec<OpRef> = ctx.block(block).ops.to_vec();

        for op in ops {
            if ctx.op(op).parent_block != Some(block) {
                continue;
            }

            let regions: Vec<RegionRef> = ctx.op(op).regions.to_vec();
            for region in regions {
                changes += self.visit_region(ctx, region)?;
            }
            if ctx.op(op).parent_block != Some(block) {
                continue;
            }

            trace!(op = %full_name(ctx, op), "visiting");
            for pattern in &self.patterns {
                let mut rw = PatternRewriter::new(&self.type_converter);
                let matched = pattern.match_and_rewrite(ctx, op, &mut rw);
                if !(matched && rw.commits()) {
                    if rw.has_mutations() {
                        debug!(pattern = pattern.name(), op = %full_name(ctx, op), "rolling back");
                    }
                    rw.discard(ctx);
                    continue;
                }
                if let Some(failure) = undeclared_dialect(ctx, &rw) {
                    rw.discard(ctx);
                    return Err(failure);
                }
                debug!(pattern = pattern.name(), op = %full_name(ctx, op), "applied");
                rewriter::apply_mutations(ctx, block, op, rw.take_mutations());
                changes += 1;
                break;
            }
        }

        Ok(changes)
    }
}

/// First recorded op, nested ones included, whose dialect is not loaded.
fn undeclared_dialect(ctx: &IrContext, rw: &PatternRewriter<'_>) -> Option<ConversionFailure> {
    let mut found = None;
    for op in rw.recorded_ops() {
        let flow = walk::walk_op(ctx, op, &mut |inner| {
            let dialect = ctx.op(inner).dialect;
            if ctx.is_dialect_loaded(dialect) {
                ControlFlow::Continue(WalkAction::Advance)
            } else {
                ControlFlow::Break(ConversionFailure::UnloadedDialect {
                    dialect,
                    op: full_name(ctx, inner),
                })
            }
        });
        if let ControlFlow::Break(failure) = flow {
            found = Some(failure);
            break;
        }
    }
    found
}
