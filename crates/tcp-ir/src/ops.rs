//! Typed operation wrappers.

use derive_more::{Display, Error};

use crate::context::IrContext;
use crate::location::Location;
use crate::refs::{OpRef, ValueRef};
use crate::symbol::Symbol;

/// Failure to view a generic operation as a typed dialect op.
#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum ConversionError {
    #[display("expected `{expected}`, found `{actual}`")]
    WrongOperation {
        expected: &'static str,
        actual: String,
    },
    #[display("`{op}` expects {expected} operand(s), found {actual}")]
    WrongOperandCount {
        op: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// A `Copy` wrapper around an [`OpRef`] of one specific `dialect.name`.
pub trait DialectOp: Sized + Copy {
    const DIALECT_NAME: &'static str;
    const OP_NAME: &'static str;
    const FULL_NAME: &'static str;

    /// Wrap without checking. Use [`DialectOp::from_op`] on untrusted refs.
    fn wrap_unchecked(op: OpRef) -> Self;

    fn op_ref(&self) -> OpRef;

    fn matches(ctx: &IrContext, op: OpRef) -> bool {
        let data = ctx.op(op);
        data.dialect == Symbol::new(Self::DIALECT_NAME) && data.name == Symbol::new(Self::OP_NAME)
    }

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        if Self::matches(ctx, op) {
            Ok(Self::wrap_unchecked(op))
        } else {
            Err(ConversionError::WrongOperation {
                expected: Self::FULL_NAME,
                actual: full_name(ctx, op),
            })
        }
    }

    fn location(&self, ctx: &IrContext) -> Location {
        ctx.op(self.op_ref()).location
    }

    /// First result; panics on result-less ops.
    fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.op_ref(), 0)
    }
}

/// `dialect.name` of an operation.
pub fn full_name(ctx: &IrContext, op: OpRef) -> String {
    let data = ctx.op(op);
    format!("{}.{}", data.dialect, data.name)
}

/// Declare a typed wrapper struct for `dialect.op`.
///
/// ```ignore
/// define_op! {
///     /// `scf.yield`
///     pub struct Yield = "scf"."yield";
/// }
/// ```
#[macro_export]
macro_rules! define_op {
    ($(#[$meta:meta])* $vis:vis struct $name:ident = $dialect:literal . $op:literal;) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis struct $name($crate::OpRef);

        impl $crate::DialectOp for $name {
            const DIALECT_NAME: &'static str = $dialect;
            const OP_NAME: &'static str = $op;
            const FULL_NAME: &'static str = concat!($dialect, ".", $op);

            fn wrap_unchecked(op: $crate::OpRef) -> Self {
                Self(op)
            }

            fn op_ref(&self) -> $crate::OpRef {
                self.0
            }
        }
    };
}
