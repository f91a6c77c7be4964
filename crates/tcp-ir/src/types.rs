//! Attributes, type interning and shaped-type views.

use std::collections::{BTreeMap, HashMap};

use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;

use crate::location::Location;
use crate::refs::{PathRef, TypeRef};
use crate::symbol::Symbol;

// ============================================================================
// Attribute
// ============================================================================

/// Attribute payload attached to an operation or a type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    Unit,
    Bool(bool),
    /// Signless integer stored as raw bits.
    IntBits(u64),
    /// Float stored as `f64` bits.
    FloatBits(u64),
    String(String),
    Type(TypeRef),
    Symbol(Symbol),
    List(Vec<Attribute>),
    Location(Location),
}

impl Attribute {
    pub fn float(value: f64) -> Self {
        Attribute::FloatBits(value.to_bits())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Attribute::IntBits(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Attribute::FloatBits(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }
}

impl From<i64> for Attribute {
    fn from(value: i64) -> Self {
        Attribute::IntBits(value as u64)
    }
}

impl From<u64> for Attribute {
    fn from(value: u64) -> Self {
        Attribute::IntBits(value)
    }
}

impl From<bool> for Attribute {
    fn from(value: bool) -> Self {
        Attribute::Bool(value)
    }
}

impl From<Symbol> for Attribute {
    fn from(value: Symbol) -> Self {
        Attribute::Symbol(value)
    }
}

impl From<Vec<Attribute>> for Attribute {
    fn from(value: Vec<Attribute>) -> Self {
        Attribute::List(value)
    }
}

// ============================================================================
// TypeData
// ============================================================================

/// Structural description of an interned type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeData {
    pub dialect: Symbol,
    pub name: Symbol,
    pub params: SmallVec<[TypeRef; 4]>,
    pub attrs: BTreeMap<Symbol, Attribute>,
}

/// Fluent builder for [`TypeData`].
pub struct TypeDataBuilder {
    data: TypeData,
}

impl TypeDataBuilder {
    pub fn new(dialect: Symbol, name: Symbol) -> Self {
        Self {
            data: TypeData {
                dialect,
                name,
                params: SmallVec::new(),
                attrs: BTreeMap::new(),
            },
        }
    }

    pub fn param(mut self, ty: TypeRef) -> Self {
        self.data.params.push(ty);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: Attribute) -> Self {
        self.data.attrs.insert(key.into(), val);
        self
    }

    pub fn build(self) -> TypeData {
        self.data
    }
}

/// Deduplicating type interner: equal `TypeData` yields the same `TypeRef`.
#[derive(Default)]
pub struct TypeInterner {
    types: PrimaryMap<TypeRef, TypeData>,
    dedup: HashMap<TypeData, TypeRef>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, data: TypeData) -> TypeRef {
        if let Some(&existing) = self.dedup.get(&data) {
            return existing;
        }
        let r = self.types.push(data.clone());
        self.dedup.insert(data, r);
        r
    }

    pub fn get(&self, r: TypeRef) -> &TypeData {
        &self.types[r]
    }

    pub fn is(&self, r: TypeRef, dialect: Symbol, name: Symbol) -> bool {
        let data = &self.types[r];
        data.dialect == dialect && data.name == name
    }
}

/// Deduplicating interner for source paths.
#[derive(Default)]
pub struct PathInterner {
    paths: PrimaryMap<PathRef, String>,
    dedup: HashMap<String, PathRef>,
}

impl PathInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, path: String) -> PathRef {
        if let Some(&existing) = self.dedup.get(&path) {
            return existing;
        }
        let r = self.paths.push(path.clone());
        self.dedup.insert(path, r);
        r
    }

    pub fn get(&self, r: PathRef) -> &str {
        &self.paths[r]
    }
}

// ============================================================================
// Shaped types
// ============================================================================

crate::symbols! {
    CORE => "core",
    TENSOR => "tensor",
    MEMREF => "memref",
    ATTR_SHAPE => "shape",
}

/// One dimension of a tensor or buffer type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dim {
    Static(u64),
    Dynamic,
}

impl Dim {
    fn to_attr(self) -> Attribute {
        match self {
            Dim::Static(n) => Attribute::IntBits(n),
            Dim::Dynamic => Attribute::Unit,
        }
    }

    fn from_attr(attr: &Attribute) -> Option<Self> {
        match attr {
            Attribute::IntBits(n) => Some(Dim::Static(*n)),
            Attribute::Unit => Some(Dim::Dynamic),
            _ => None,
        }
    }
}

impl std::fmt::Display for Dim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dim::Static(n) => write!(f, "{n}"),
            Dim::Dynamic => f.write_str("?"),
        }
    }
}

/// Whether a shaped type has value or buffer semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapedKind {
    Tensor,
    MemRef,
}

/// Decoded view of a `core.tensor` or `core.memref` type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapedType {
    pub kind: ShapedKind,
    pub element: TypeRef,
    pub dims: SmallVec<[Dim; 4]>,
}

impl ShapedType {
    pub fn tensor(element: TypeRef, dims: impl IntoIterator<Item = Dim>) -> Self {
        Self {
            kind: ShapedKind::Tensor,
            element,
            dims: dims.into_iter().collect(),
        }
    }

    pub fn memref(element: TypeRef, dims: impl IntoIterator<Item = Dim>) -> Self {
        Self {
            kind: ShapedKind::MemRef,
            element,
            dims: dims.into_iter().collect(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Decode a type, returning `None` for anything that is not shaped.
    pub fn decode(types: &TypeInterner, ty: TypeRef) -> Option<Self> {
        let data = types.get(ty);
        if data.dialect != CORE() {
            return None;
        }
        let kind = if data.name == TENSOR() {
            ShapedKind::Tensor
        } else if data.name == MEMREF() {
            ShapedKind::MemRef
        } else {
            return None;
        };
        let element = *data.params.first()?;
        let dims = match data.attrs.get(&ATTR_SHAPE())? {
            Attribute::List(items) => items.iter().map(Dim::from_attr).collect::<Option<_>>()?,
            _ => return None,
        };
        Some(Self {
            kind,
            element,
            dims,
        })
    }

    /// Intern this shaped type.
    pub fn intern(&self, types: &mut TypeInterner) -> TypeRef {
        let name = match self.kind {
            ShapedKind::Tensor => TENSOR(),
            ShapedKind::MemRef => MEMREF(),
        };
        let dims = self.dims.iter().map(|d| d.to_attr()).collect();
        types.intern(
            TypeDataBuilder::new(CORE(), name)
                .param(self.element)
                .attr(ATTR_SHAPE(), Attribute::List(dims))
                .build(),
        )
    }
}
