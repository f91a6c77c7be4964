//! `IrContext`: owner of every operation, value, block and region.
//!
//! Operand and result-type lists are pool-backed `EntityList`s. The
//! context keeps a use-chain per value so that rewrites can replace all
//! uses of a result in place.

use std::collections::{BTreeMap, BTreeSet};

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::location::{Location, Span};
use crate::refs::*;
use crate::registry::DialectRegistry;
use crate::symbol::Symbol;
use crate::types::{Attribute, PathInterner, TypeInterner};

// ============================================================================
// Entity data
// ============================================================================

/// One use of a value: operand `operand_index` of `user`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: OpRef,
    pub operand_index: u32,
}

pub struct OperationData {
    pub location: Location,
    pub dialect: Symbol,
    pub name: Symbol,
    pub operands: EntityList<ValueRef>,
    pub results: EntityList<TypeRef>,
    pub attributes: BTreeMap<Symbol, Attribute>,
    pub regions: SmallVec<[RegionRef; 2]>,
    pub parent_block: Option<BlockRef>,
}

pub struct ValueData {
    pub def: ValueDef,
    pub ty: TypeRef,
}

#[derive(Clone, Debug)]
pub struct BlockArgData {
    pub ty: TypeRef,
}

pub struct BlockData {
    pub location: Location,
    pub args: Vec<BlockArgData>,
    pub ops: SmallVec<[OpRef; 8]>,
    pub parent_region: Option<RegionRef>,
}

pub struct RegionData {
    pub location: Location,
    pub blocks: SmallVec<[BlockRef; 2]>,
    pub parent_op: Option<OpRef>,
}

// ============================================================================
// IrContext
// ============================================================================

pub struct IrContext {
    ops: PrimaryMap<OpRef, OperationData>,
    values: PrimaryMap<ValueRef, ValueData>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    regions: PrimaryMap<RegionRef, RegionData>,

    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,
    result_values: SecondaryMap<OpRef, EntityList<ValueRef>>,
    block_arg_values: SecondaryMap<BlockRef, EntityList<ValueRef>>,
    /// Ops dropped by `discard_op`; their slots stay in the arena.
    discarded: SecondaryMap<OpRef, bool>,

    value_pool: ListPool<ValueRef>,
    type_pool: ListPool<TypeRef>,

    pub types: TypeInterner,
    pub paths: PathInterner,
    loaded_dialects: BTreeSet<Symbol>,
}

impl IrContext {
    pub fn new() -> Self {
        Self {
            ops: PrimaryMap::new(),
            values: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            regions: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            result_values: SecondaryMap::new(),
            block_arg_values: SecondaryMap::new(),
            discarded: SecondaryMap::new(),
            value_pool: ListPool::new(),
            type_pool: ListPool::new(),
            types: TypeInterner::new(),
            paths: PathInterner::new(),
            loaded_dialects: BTreeSet::new(),
        }
    }

    /// Location pointing at `path` with an empty span.
    pub fn file_location(&mut self, path: &str) -> Location {
        let path = self.paths.intern(path.to_owned());
        Location::new(path, Span::default())
    }

    // ========================================================================
    // Dialects
    // ========================================================================

    /// Make every dialect in `registry` available for op creation.
    pub fn load_dialects(&mut self, registry: &DialectRegistry) {
        self.loaded_dialects.extend(registry.iter());
    }

    pub fn is_dialect_loaded(&self, dialect: Symbol) -> bool {
        self.loaded_dialects.contains(&dialect)
    }

    // ========================================================================
    // Operation
    // ========================================================================

    /// Create a detached operation and allocate its result values.
    ///
    /// # Panics
    ///
    /// Panics if `data.parent_block` is set or a region already has an owner.
    pub fn create_op(&mut self, data: OperationData) -> OpRef {
        assert!(
            data.parent_block.is_none(),
            "create_op: new operations must be detached; attach with push_op",
        );
        let operands: SmallVec<[ValueRef; 8]> = data.operands.as_slice(&self.value_pool).into();
        let result_types: SmallVec<[TypeRef; 4]> = data.results.as_slice(&self.type_pool).into();
        let regions = data.regions.clone();

        let op = self.ops.push(data);

        for &r in &regions {
            if let Some(owner) = self.regions[r].parent_op {
                panic!("create_op: {r} already belongs to {owner}");
            }
            self.regions[r].parent_op = Some(op);
        }

        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].push(Use {
                user: op,
                operand_index: idx as u32,
            });
        }

        let mut results = EntityList::new();
        for (idx, &ty) in result_types.iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::OpResult(op, idx as u32),
                ty,
            });
            results.push(v, &mut self.value_pool);
        }
        self.result_values[op] = results;

        op
    }

    pub fn op(&self, op: OpRef) -> &OperationData {
        &self.ops[op]
    }

    pub fn op_operands(&self, op: OpRef) -> &[ValueRef] {
        self.ops[op].operands.as_slice(&self.value_pool)
    }

    pub fn op_result_types(&self, op: OpRef) -> &[TypeRef] {
        self.ops[op].results.as_slice(&self.type_pool)
    }

    pub fn op_result(&self, op: OpRef, index: u32) -> ValueRef {
        self.op_results(op)[index as usize]
    }

    pub fn op_results(&self, op: OpRef) -> &[ValueRef] {
        self.result_values[op].as_slice(&self.value_pool)
    }

    pub fn attr(&self, op: OpRef, key: Symbol) -> Option<&Attribute> {
        self.ops[op].attributes.get(&key)
    }

    /// Whether `op` was dropped by [`IrContext::discard_op`].
    pub fn is_discarded(&self, op: OpRef) -> bool {
        self.discarded[op]
    }

    /// Drop a detached operation whose results have no uses.
    ///
    /// # Panics
    ///
    /// Panics if the op is still in a block or one of its results is used.
    pub fn remove_op(&mut self, op: OpRef) {
        assert!(
            self.ops[op].parent_block.is_none(),
            "remove_op: {op} is still attached; call remove_op_from_block first",
        );
        for &val in self.result_values[op].as_slice(&self.value_pool) {
            assert!(
                self.uses[val].is_empty(),
                "remove_op: result {val} of {op} still has {} use(s)",
                self.uses[val].len()
            );
        }
        self.clear_operand_uses(op);
    }

    /// Drop a detached operation together with everything nested in its
    /// regions, regardless of remaining uses of its results.
    ///
    /// Used to roll back ops built by a rewrite that did not commit. Callers
    /// discard users before producers, or discard the whole set at once.
    pub fn discard_op(&mut self, op: OpRef) {
        if self.discarded[op] {
            return;
        }
        if let Some(block) = self.ops[op].parent_block {
            self.remove_op_from_block(block, op);
        }
        let regions = self.ops[op].regions.clone();
        for region in regions {
            let blocks = self.regions[region].blocks.clone();
            for block in blocks {
                let nested: SmallVec<[OpRef; 8]> = self.blocks[block].ops.clone();
                for &inner in nested.iter().rev() {
                    self.discard_op(inner);
                }
            }
        }
        self.clear_operand_uses(op);
        self.discarded[op] = true;
    }

    fn clear_operand_uses(&mut self, op: OpRef) {
        let operands: SmallVec<[ValueRef; 8]> = self.op_operands(op).into();
        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].retain(|u| !(u.user == op && u.operand_index == idx as u32));
        }
    }

    // ========================================================================
    // Value
    // ========================================================================

    pub fn value(&self, v: ValueRef) -> &ValueData {
        &self.values[v]
    }

    pub fn value_ty(&self, v: ValueRef) -> TypeRef {
        self.values[v].ty
    }

    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v].def
    }

    /// The operation defining `v`, if it is an op result.
    pub fn defining_op(&self, v: ValueRef) -> Option<OpRef> {
        match self.values[v].def {
            ValueDef::OpResult(op, _) => Some(op),
            ValueDef::BlockArg(..) => None,
        }
    }

    // ========================================================================
    // Block
    // ========================================================================

    pub fn create_block(&mut self, data: BlockData) -> BlockRef {
        let arg_types: SmallVec<[TypeRef; 4]> = data.args.iter().map(|a| a.ty).collect();
        let ops = data.ops.clone();
        let block = self.blocks.push(data);
        for op in ops {
            self.ops[op].parent_block = Some(block);
        }

        let mut args = EntityList::new();
        for (idx, ty) in arg_types.into_iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::BlockArg(block, idx as u32),
                ty,
            });
            args.push(v, &mut self.value_pool);
        }
        self.block_arg_values[block] = args;

        block
    }

    /// Create an empty block with one argument per type.
    pub fn create_block_with_args(
        &mut self,
        location: Location,
        arg_types: impl IntoIterator<Item = TypeRef>,
    ) -> BlockRef {
        self.create_block(BlockData {
            location,
            args: arg_types
                .into_iter()
                .map(|ty| BlockArgData { ty })
                .collect(),
            ops: SmallVec::new(),
            parent_region: None,
        })
    }

    pub fn block(&self, b: BlockRef) -> &BlockData {
        &self.blocks[b]
    }

    pub fn block_arg(&self, b: BlockRef, index: u32) -> ValueRef {
        self.block_args(b)[index as usize]
    }

    pub fn block_args(&self, b: BlockRef) -> &[ValueRef] {
        self.block_arg_values[b].as_slice(&self.value_pool)
    }

    /// Append `op` to `block`.
    ///
    /// # Panics
    ///
    /// Panics if `op` is already attached somewhere.
    pub fn push_op(&mut self, block: BlockRef, op: OpRef) {
        assert!(
            self.ops[op].parent_block.is_none(),
            "push_op: {op} is already attached to a block",
        );
        self.ops[op].parent_block = Some(block);
        self.blocks[block].ops.push(op);
    }

    /// Insert `op` right before `before` in `block`.
    ///
    /// # Panics
    ///
    /// Panics if `op` is attached or `before` is not in `block`.
    pub fn insert_op_before(&mut self, block: BlockRef, before: OpRef, op: OpRef) {
        assert!(
            self.ops[op].parent_block.is_none(),
            "insert_op_before: {op} is already attached to a block",
        );
        let ops = &mut self.blocks[block].ops;
        let pos = ops
            .iter()
            .position(|&o| o == before)
            .expect("insert_op_before: anchor op not found in block");
        ops.insert(pos, op);
        self.ops[op].parent_block = Some(block);
    }

    /// Unlink `op` from `block` without destroying it.
    pub fn remove_op_from_block(&mut self, block: BlockRef, op: OpRef) {
        self.blocks[block].ops.retain(|o| *o != op);
        if self.ops[op].parent_block == Some(block) {
            self.ops[op].parent_block = None;
        }
    }

    /// Unlink `op` from whatever block holds it.
    pub fn detach_op(&mut self, op: OpRef) {
        if let Some(block) = self.ops[op].parent_block {
            self.remove_op_from_block(block, op);
        }
    }

    // ========================================================================
    // Region
    // ========================================================================

    /// # Panics
    ///
    /// Panics if a block already belongs to another region.
    pub fn create_region(&mut self, data: RegionData) -> RegionRef {
        let blocks = data.blocks.clone();
        let region = self.regions.push(data);
        for b in blocks {
            if let Some(owner) = self.blocks[b].parent_region {
                panic!("create_region: {b} already belongs to {owner}");
            }
            self.blocks[b].parent_region = Some(region);
        }
        region
    }

    /// Wrap a single block into a new region.
    pub fn region_of_block(&mut self, location: Location, block: BlockRef) -> RegionRef {
        self.create_region(RegionData {
            location,
            blocks: smallvec::smallvec![block],
            parent_op: None,
        })
    }

    pub fn region(&self, r: RegionRef) -> &RegionData {
        &self.regions[r]
    }

    // ========================================================================
    // Use-chain
    // ========================================================================

    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }

    pub fn has_uses(&self, v: ValueRef) -> bool {
        !self.uses[v].is_empty()
    }

    /// Rewire every use of `old` to `new`.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) {
        if old == new {
            return;
        }
        let old_uses = std::mem::take(&mut self.uses[old]);
        for u in old_uses {
            let slice = self.ops[u.user].operands.as_mut_slice(&mut self.value_pool);
            debug_assert_eq!(slice[u.operand_index as usize], old);
            slice[u.operand_index as usize] = new;
            self.uses[new].push(u);
        }
    }
}

impl Default for IrContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// OperationDataBuilder
// ============================================================================

/// Collects operands and result types, then packs them into the context's
/// pools on [`OperationDataBuilder::build`].
pub struct OperationDataBuilder {
    location: Location,
    dialect: Symbol,
    name: Symbol,
    operands: SmallVec<[ValueRef; 8]>,
    results: SmallVec<[TypeRef; 2]>,
    attributes: BTreeMap<Symbol, Attribute>,
    regions: SmallVec<[RegionRef; 2]>,
}

impl OperationDataBuilder {
    pub fn new(location: Location, dialect: Symbol, name: Symbol) -> Self {
        Self {
            location,
            dialect,
            name,
            operands: SmallVec::new(),
            results: SmallVec::new(),
            attributes: BTreeMap::new(),
            regions: SmallVec::new(),
        }
    }

    pub fn operand(mut self, v: ValueRef) -> Self {
        self.operands.push(v);
        self
    }

    pub fn operands(mut self, vs: impl IntoIterator<Item = ValueRef>) -> Self {
        self.operands.extend(vs);
        self
    }

    pub fn result(mut self, ty: TypeRef) -> Self {
        self.results.push(ty);
        self
    }

    pub fn results(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.results.extend(tys);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: Attribute) -> Self {
        self.attributes.insert(key.into(), val);
        self
    }

    pub fn region(mut self, r: RegionRef) -> Self {
        self.regions.push(r);
        self
    }

    pub fn build(self, ctx: &mut IrContext) -> OperationData {
        let operands = EntityList::from_slice(&self.operands, &mut ctx.value_pool);
        let results = EntityList::from_slice(&self.results, &mut ctx.type_pool);
        OperationData {
            location: self.location,
            dialect: self.dialect,
            name: self.name,
            operands,
            results,
            attributes: self.attributes,
            regions: self.regions,
            parent_block: None,
        }
    }

    /// Build and create the operation in one step.
    pub fn create(self, ctx: &mut IrContext) -> OpRef {
        let data = self.build(ctx);
        ctx.create_op(data)
    }
}
