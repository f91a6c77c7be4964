//! Reference interpreter.
//!
//! Runs a `func.func` over both tensor-level ops (reference semantics) and
//! the buffer-level ops they lower to, so that a function can be executed
//! before and after a rewrite and the results compared. Elements are held
//! as `f64` whatever the declared element type.

use std::collections::HashMap;
use std::fmt;

use derive_more::{Display, Error};

use crate::context::IrContext;
use crate::dialect::{arith, core, func, linalg, memref, scf, shape, tcp};
use crate::ops::{DialectOp, full_name};
use crate::refs::{BlockRef, OpRef, ValueRef};
use crate::types::Attribute;

/// Handle to a buffer owned by an [`Interpreter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(usize);

#[derive(Clone, Debug, PartialEq)]
pub enum RtValue {
    Index(i64),
    Int(i64),
    Float(f64),
    Bool(bool),
    Shape(Vec<usize>),
    Buffer(BufferId),
}

impl RtValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            RtValue::Float(v) => Some(*v),
            RtValue::Int(v) | RtValue::Index(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// Dense row-major storage.
#[derive(Clone, Debug, PartialEq)]
pub struct Buffer {
    pub dims: Vec<usize>,
    pub data: Vec<f64>,
}

impl Buffer {
    pub fn new(dims: Vec<usize>, data: Vec<f64>) -> Self {
        debug_assert_eq!(dims.iter().product::<usize>(), data.len());
        Self { dims, data }
    }

    pub fn filled(dims: Vec<usize>, value: f64) -> Self {
        let len = dims.iter().product();
        Self {
            dims,
            data: vec![value; len],
        }
    }

    fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.dims.len() {
            return None;
        }
        let mut offset = 0;
        for (&i, &extent) in index.iter().zip(&self.dims) {
            if i >= extent {
                return None;
            }
            offset = offset * extent + i;
        }
        Some(offset)
    }

    pub fn get(&self, index: &[usize]) -> Option<f64> {
        self.offset(index).map(|o| self.data[o])
    }

    /// Row-major index tuple of flat position `flat`.
    pub fn unravel(dims: &[usize], mut flat: usize) -> Vec<usize> {
        let mut index = vec![0; dims.len()];
        for (slot, &extent) in index.iter_mut().zip(dims).rev() {
            *slot = flat % extent;
            flat /= extent;
        }
        index
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn nested(f: &mut fmt::Formatter<'_>, dims: &[usize], data: &[f64]) -> fmt::Result {
            let Some((&outer, inner)) = dims.split_first() else {
                return write!(f, "{}", data[0]);
            };
            let stride = inner.iter().product::<usize>();
            f.write_str("[")?;
            for i in 0..outer {
                if i > 0 {
                    f.write_str(", ")?;
                }
                nested(f, inner, &data[i * stride..(i + 1) * stride])?;
            }
            f.write_str("]")
        }
        nested(f, &self.dims, &self.data)
    }
}

#[derive(Clone, Debug, PartialEq, Display, Error)]
pub enum InterpError {
    #[display("no interpreter support for `{op}`")]
    UnsupportedOp { op: String },
    #[display("{value} used before definition")]
    UndefinedValue { value: ValueRef },
    #[display("`{op}` expected {expected}")]
    TypeMismatch { op: String, expected: &'static str },
    #[display("`{op}`: index {index:?} out of bounds for {dims:?}")]
    OutOfBounds {
        op: String,
        index: Vec<usize>,
        dims: Vec<usize>,
    },
    #[display("`{op}`: {detail}")]
    ShapeMismatch { op: String, detail: String },
    #[display("function takes {expected} argument(s), got {actual}")]
    ArityMismatch { expected: usize, actual: usize },
    #[display("function body ended without `func.return`")]
    MissingReturn,
}

enum Flow {
    Next,
    Yield,
    Return(Vec<RtValue>),
}

/// Executes functions against an arena of buffers.
pub struct Interpreter<'a> {
    ctx: &'a IrContext,
    env: HashMap<ValueRef, RtValue>,
    buffers: Vec<Buffer>,
}

impl<'a> Interpreter<'a> {
    pub fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            env: HashMap::new(),
            buffers: Vec::new(),
        }
    }

    /// Register an argument buffer.
    pub fn add_buffer(&mut self, buffer: Buffer) -> RtValue {
        self.buffers.push(buffer);
        RtValue::Buffer(BufferId(self.buffers.len() - 1))
    }

    pub fn buffer(&self, value: &RtValue) -> Option<&Buffer> {
        match value {
            RtValue::Buffer(id) => self.buffers.get(id.0),
            _ => None,
        }
    }

    pub fn call(
        &mut self,
        f: func::Func,
        args: Vec<RtValue>,
    ) -> Result<Vec<RtValue>, InterpError> {
        let ctx = self.ctx;
        let entry = f.entry_block(ctx);
        let params = ctx.block_args(entry);
        if params.len() != args.len() {
            return Err(InterpError::ArityMismatch {
                expected: params.len(),
                actual: args.len(),
            });
        }
        for (&param, arg) in params.iter().zip(args) {
            self.env.insert(param, arg);
        }
        match self.run_block(entry)? {
            Flow::Return(values) => Ok(values),
            Flow::Next | Flow::Yield => Err(InterpError::MissingReturn),
        }
    }

    fn run_block(&mut self, block: BlockRef) -> Result<Flow, InterpError> {
        let ctx = self.ctx;
        for &op in &ctx.block(block).ops {
            match self.step(op)? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    fn get(&self, v: ValueRef) -> Result<&RtValue, InterpError> {
        self.env
            .get(&v)
            .ok_or(InterpError::UndefinedValue { value: v })
    }

    fn operand(&self, op: OpRef, i: usize) -> Result<&RtValue, InterpError> {
        self.get(self.ctx.op_operands(op)[i])
    }

    fn index(&self, op: OpRef, i: usize) -> Result<usize, InterpError> {
        match self.operand(op, i)? {
            RtValue::Index(v) if *v >= 0 => Ok(*v as usize),
            _ => Err(self.mismatch(op, "a non-negative index")),
        }
    }

    fn scalar(&self, op: OpRef, i: usize) -> Result<f64, InterpError> {
        self.operand(op, i)?
            .as_f64()
            .ok_or_else(|| self.mismatch(op, "a scalar"))
    }

    fn buffer_id(&self, op: OpRef, i: usize) -> Result<BufferId, InterpError> {
        match self.operand(op, i)? {
            RtValue::Buffer(id) => Ok(*id),
            _ => Err(self.mismatch(op, "a tensor or buffer")),
        }
    }

    fn shape_value(&self, op: OpRef, i: usize) -> Result<Vec<usize>, InterpError> {
        match self.operand(op, i)? {
            RtValue::Shape(dims) => Ok(dims.clone()),
            _ => Err(self.mismatch(op, "a shape")),
        }
    }

    fn indices(&self, op: OpRef, from: usize) -> Result<Vec<usize>, InterpError> {
        (from..self.ctx.op_operands(op).len())
            .map(|i| self.index(op, i))
            .collect()
    }

    fn mismatch(&self, op: OpRef, expected: &'static str) -> InterpError {
        InterpError::TypeMismatch {
            op: full_name(self.ctx, op),
            expected,
        }
    }

    fn define(&mut self, op: OpRef, value: RtValue) {
        let result = self.ctx.op_result(op, 0);
        self.env.insert(result, value);
    }

    fn step(&mut self, op: OpRef) -> Result<Flow, InterpError> {
        let ctx = self.ctx;
        if let Ok(c) = arith::Constant::from_op(ctx, op) {
            let ty = ctx.value_ty(c.result(ctx));
            let value = match c.value(ctx) {
                Attribute::FloatBits(bits) => RtValue::Float(f64::from_bits(bits)),
                Attribute::Bool(b) => RtValue::Bool(b),
                Attribute::IntBits(v) if core::is_float(ctx, ty) => RtValue::Float(v as i64 as f64),
                Attribute::IntBits(v) if ctx.types.get(ty).name == "index" => {
                    RtValue::Index(v as i64)
                }
                Attribute::IntBits(v) if ctx.types.get(ty).name == "i1" => RtValue::Bool(v != 0),
                Attribute::IntBits(v) => RtValue::Int(v as i64),
                _ => return Err(self.mismatch(op, "a scalar constant")),
            };
            self.define(op, value);
        } else if arith::CmpEq::matches(ctx, op) || arith::CmpNe::matches(ctx, op) {
            let equal = self.scalar(op, 0)? == self.scalar(op, 1)?;
            self.define(op, RtValue::Bool(equal == arith::CmpEq::matches(ctx, op)));
        } else if arith::Select::matches(ctx, op) {
            let RtValue::Bool(cond) = *self.operand(op, 0)? else {
                return Err(self.mismatch(op, "an i1 condition"));
            };
            let picked = self.operand(op, if cond { 1 } else { 2 })?.clone();
            self.define(op, picked);
        } else if let Ok(dim) = shape::Dim::from_op(ctx, op) {
            let dims = &self.buffers[self.buffer_id(op, 0)?.0].dims;
            let extent = dim
                .index(ctx)
                .and_then(|i| dims.get(i as usize).copied())
                .ok_or_else(|| self.mismatch(op, "a dimension index within the rank"))?;
            self.define(op, RtValue::Index(extent as i64));
        } else if shape::FromExtents::matches(ctx, op) {
            let extents = self.indices(op, 0)?;
            self.define(op, RtValue::Shape(extents));
        } else if let Ok(c) = shape::ConstShape::from_op(ctx, op) {
            let extents = c
                .extents(ctx)
                .ok_or_else(|| self.mismatch(op, "an `extents` list"))?;
            self.define(op, RtValue::Shape(extents.into_iter().map(|e| e as usize).collect()));
        } else if shape::GetExtent::matches(ctx, op) {
            let dims = self.shape_value(op, 0)?;
            let i = self.index(op, 1)?;
            let extent = *dims.get(i).ok_or_else(|| InterpError::OutOfBounds {
                op: full_name(ctx, op),
                index: vec![i],
                dims: vec![dims.len()],
            })?;
            self.define(op, RtValue::Index(extent as i64));
        } else if let Ok(for_op) = scf::For::from_op(ctx, op) {
            let lower = self.index(op, 0)?;
            let upper = self.index(op, 1)?;
            let step = self.index(op, 2)?;
            if step == 0 {
                return Err(self.mismatch(op, "a positive step"));
            }
            let body = for_op.body(ctx);
            let iv = for_op.induction_var(ctx);
            for i in (lower..upper).step_by(step) {
                self.env.insert(iv, RtValue::Index(i as i64));
                if let Flow::Return(values) = self.run_block(body)? {
                    return Ok(Flow::Return(values));
                }
            }
        } else if scf::Yield::matches(ctx, op) {
            return Ok(Flow::Yield);
        } else if memref::Alloc::matches(ctx, op) {
            let dims = self.shape_value(op, 0)?;
            let value = self.add_buffer(Buffer::filled(dims, f64::NAN));
            self.define(op, value);
        } else if memref::Load::matches(ctx, op) {
            let id = self.buffer_id(op, 0)?;
            let index = self.indices(op, 1)?;
            let value = self.element(op, id, &index)?;
            self.define(op, RtValue::Float(value));
        } else if memref::Store::matches(ctx, op) {
            let value = self.scalar(op, 0)?;
            let id = self.buffer_id(op, 1)?;
            let index = self.indices(op, 2)?;
            let buffer = &self.buffers[id.0];
            let offset = buffer.offset(&index).ok_or_else(|| InterpError::OutOfBounds {
                op: full_name(ctx, op),
                index: index.clone(),
                dims: buffer.dims.clone(),
            })?;
            self.buffers[id.0].data[offset] = value;
        } else if memref::BufferCast::matches(ctx, op) {
            let id = self.buffer_id(op, 0)?;
            self.define(op, RtValue::Buffer(id));
        } else if linalg::Fill::matches(ctx, op) {
            let id = self.buffer_id(op, 0)?;
            let value = self.scalar(op, 1)?;
            self.buffers[id.0].data.fill(value);
        } else if linalg::Matmul::matches(ctx, op) {
            let lhs = self.buffer_id(op, 0)?;
            let rhs = self.buffer_id(op, 1)?;
            let out = self.buffer_id(op, 2)?;
            let product = self.product(op, lhs, rhs)?;
            let target = &mut self.buffers[out.0];
            if target.dims != product.dims {
                return Err(InterpError::ShapeMismatch {
                    op: full_name(ctx, op),
                    detail: format!("output is {:?}, product is {:?}", target.dims, product.dims),
                });
            }
            for (acc, p) in target.data.iter_mut().zip(product.data) {
                *acc += p;
            }
        } else if tcp::BroadcastTo::matches(ctx, op) {
            let input = self.buffer_id(op, 0)?;
            let dims = self.shape_value(op, 1)?;
            let result = self.broadcast(op, input, dims)?;
            let value = self.add_buffer(result);
            self.define(op, value);
        } else if tcp::Matmul::matches(ctx, op) {
            let (lhs, rhs) = (self.buffer_id(op, 0)?, self.buffer_id(op, 1)?);
            let result = self.product(op, lhs, rhs)?;
            let value = self.add_buffer(result);
            self.define(op, value);
        } else if func::Return::matches(ctx, op) {
            let values = ctx
                .op_operands(op)
                .iter()
                .map(|&v| self.get(v).cloned())
                .collect::<Result<_, _>>()?;
            return Ok(Flow::Return(values));
        } else {
            return Err(InterpError::UnsupportedOp {
                op: full_name(ctx, op),
            });
        }
        Ok(Flow::Next)
    }

    fn element(&self, op: OpRef, id: BufferId, index: &[usize]) -> Result<f64, InterpError> {
        let buffer = &self.buffers[id.0];
        buffer.get(index).ok_or_else(|| InterpError::OutOfBounds {
            op: full_name(self.ctx, op),
            index: index.to_vec(),
            dims: buffer.dims.clone(),
        })
    }

    /// NumPy broadcasting with trailing-dimension alignment.
    fn broadcast(
        &self,
        op: OpRef,
        input: BufferId,
        dims: Vec<usize>,
    ) -> Result<Buffer, InterpError> {
        let source = &self.buffers[input.0];
        let shape_error = || InterpError::ShapeMismatch {
            op: full_name(self.ctx, op),
            detail: format!("cannot broadcast {:?} to {:?}", source.dims, dims),
        };
        let rank_diff = dims
            .len()
            .checked_sub(source.dims.len())
            .ok_or_else(shape_error)?;
        for (j, &extent) in source.dims.iter().enumerate() {
            if extent != 1 && extent != dims[rank_diff + j] {
                return Err(shape_error());
            }
        }

        let len = dims.iter().product();
        let mut data = Vec::with_capacity(len);
        for flat in 0..len {
            let out_index = Buffer::unravel(&dims, flat);
            let in_index: Vec<usize> = source
                .dims
                .iter()
                .enumerate()
                .map(|(j, &extent)| if extent == 1 { 0 } else { out_index[rank_diff + j] })
                .collect();
            data.push(self.element(op, input, &in_index)?);
        }
        Ok(Buffer::new(dims, data))
    }

    fn product(&self, op: OpRef, lhs: BufferId, rhs: BufferId) -> Result<Buffer, InterpError> {
        let (a, b) = (&self.buffers[lhs.0], &self.buffers[rhs.0]);
        let (&[rows, k], &[k2, cols]) = (&a.dims[..], &b.dims[..]) else {
            return Err(self.mismatch(op, "rank-2 operands"));
        };
        if k != k2 {
            return Err(InterpError::ShapeMismatch {
                op: full_name(self.ctx, op),
                detail: format!("inner dimensions differ: {k} vs {k2}"),
            });
        }
        let mut data = vec![0.0; rows * cols];
        for r in 0..rows {
            for c in 0..cols {
                data[r * cols + c] = (0..k)
                    .map(|i| a.data[r * k + i] * b.data[i * cols + c])
                    .sum();
            }
        }
        Ok(Buffer::new(vec![rows, cols], data))
    }
}
