//! Type descriptions derived once from a facet [`Shape`].
//!
//! The engine never looks at shapes directly. Everything it needs (field
//! order, kind tags, settability, embedding, annotations) is captured here
//! up front, so a [`Schema`] can be built once and reused for many passes.

use core::fmt;

use facet_core::{
    Def, Facet, Field, FieldAttribute, FieldFlags, NumericType, PrimitiveType, Shape, ShapeLayout,
    Type, UserType,
};

use crate::tag::{Annotation, field_annotation};

/// Bit width of an integer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    /// 8 bits
    W8,
    /// 16 bits
    W16,
    /// 32 bits
    W32,
    /// 64 bits
    W64,
    /// 128 bits
    W128,
    /// Machine width (`isize`/`usize`)
    Size,
}

impl IntWidth {
    fn from_shape(shape: &Shape) -> Option<Self> {
        if matches!(shape.type_identifier, "isize" | "usize") {
            return Some(IntWidth::Size);
        }
        let size = match shape.layout {
            ShapeLayout::Sized(layout) => layout.size(),
            ShapeLayout::Unsized => return None,
        };
        match size {
            1 => Some(IntWidth::W8),
            2 => Some(IntWidth::W16),
            4 => Some(IntWidth::W32),
            8 => Some(IntWidth::W64),
            16 => Some(IntWidth::W128),
            _ => None,
        }
    }

    /// Number of bits.
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
            IntWidth::W128 => 128,
            IntWidth::Size => usize::BITS,
        }
    }
}

/// Precision of a floating point kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    /// `f32`
    W32,
    /// `f64`
    W64,
}

/// The closed set of shapes the engine knows how to populate.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// `String`
    Text,
    /// `i8` through `i128`, and `isize`
    SignedInt {
        /// Declared width
        width: IntWidth,
    },
    /// `u8` through `u128`, and `usize`
    UnsignedInt {
        /// Declared width
        width: IntWidth,
    },
    /// `f32` and `f64`
    Float {
        /// Declared precision
        width: FloatWidth,
    },
    /// `bool`
    Bool,
    /// `Vec<T>`
    Sequence {
        /// Element kind
        elem: Box<TypeKind>,
    },
    /// `[T; N]`
    FixedSequence {
        /// Element kind
        elem: Box<TypeKind>,
        /// Declared capacity `N`
        len: usize,
    },
    /// `Option<T>`
    Optional {
        /// Referenced kind
        elem: Box<TypeKind>,
    },
    /// A struct, populated field by field
    Composite(Composite),
    /// Anything else. Only an error once a materialization reaches it.
    Unsupported {
        /// Display name of the offending type
        type_name: String,
    },
}

impl TypeKind {
    /// Describe `shape`.
    ///
    /// There is no recursion guard: a shape that contains itself through a
    /// `Vec` or `Option` recurses forever, just as materializing it would.
    pub fn for_shape(shape: &'static Shape) -> Self {
        match shape.def {
            Def::Option(option_def) => {
                return TypeKind::Optional {
                    elem: Box::new(Self::for_shape(option_def.t())),
                };
            }
            Def::List(list_def) => {
                return TypeKind::Sequence {
                    elem: Box::new(Self::for_shape(list_def.t())),
                };
            }
            Def::Array(array_def) => {
                return TypeKind::FixedSequence {
                    elem: Box::new(Self::for_shape(array_def.t())),
                    len: array_def.n,
                };
            }
            _ => {}
        }

        match shape.ty {
            Type::User(UserType::Struct(struct_def)) => {
                TypeKind::Composite(Composite::from_fields(shape, struct_def.fields))
            }
            Type::Primitive(PrimitiveType::Numeric(NumericType::Integer { signed })) => {
                match IntWidth::from_shape(shape) {
                    Some(width) if signed => TypeKind::SignedInt { width },
                    Some(width) => TypeKind::UnsignedInt { width },
                    None => TypeKind::unsupported(shape),
                }
            }
            Type::Primitive(PrimitiveType::Numeric(NumericType::Float)) => match shape.layout {
                ShapeLayout::Sized(layout) if layout.size() == 4 => TypeKind::Float {
                    width: FloatWidth::W32,
                },
                ShapeLayout::Sized(layout) if layout.size() == 8 => TypeKind::Float {
                    width: FloatWidth::W64,
                },
                _ => TypeKind::unsupported(shape),
            },
            _ if shape.type_identifier == "bool" => TypeKind::Bool,
            _ if shape.type_identifier == "String" => TypeKind::Text,
            _ => TypeKind::unsupported(shape),
        }
    }

    fn unsupported(shape: &Shape) -> Self {
        log::trace!("No coercion rule for shape {shape}");
        TypeKind::Unsupported {
            type_name: shape.to_string(),
        }
    }

    /// True for composites and optional references to composites, the kinds
    /// that may resolve to an empty value even in strict mode.
    pub fn is_composite_like(&self) -> bool {
        match self {
            TypeKind::Composite(_) => true,
            TypeKind::Optional { elem } => matches!(**elem, TypeKind::Composite(_)),
            _ => false,
        }
    }

    /// Short human readable name of the kind, used in error messages.
    pub fn type_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Text => write!(f, "String"),
            TypeKind::SignedInt { width: IntWidth::Size } => write!(f, "isize"),
            TypeKind::SignedInt { width } => write!(f, "i{}", width.bits()),
            TypeKind::UnsignedInt { width: IntWidth::Size } => write!(f, "usize"),
            TypeKind::UnsignedInt { width } => write!(f, "u{}", width.bits()),
            TypeKind::Float {
                width: FloatWidth::W32,
            } => write!(f, "f32"),
            TypeKind::Float {
                width: FloatWidth::W64,
            } => write!(f, "f64"),
            TypeKind::Bool => write!(f, "bool"),
            TypeKind::Sequence { elem } => write!(f, "Vec<{elem}>"),
            TypeKind::FixedSequence { elem, len } => write!(f, "[{elem}; {len}]"),
            TypeKind::Optional { elem } => write!(f, "Option<{elem}>"),
            TypeKind::Composite(composite) => write!(f, "{}", composite.type_name()),
            TypeKind::Unsupported { type_name } => write!(f, "{type_name}"),
        }
    }
}

/// How the engine treats a field of a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Resolved from the source and coerced into the field's kind.
    Leaf,
    /// `#[facet(flatten)]`: the field's own fields are promoted into the parent.
    Embedded,
    /// `#[facet(skip)]`: never written from the source, left at its default.
    Skipped,
}

/// One field of a [`Composite`].
#[derive(Debug, Clone)]
pub struct FieldSchema {
    index: usize,
    offset: usize,
    shape: &'static Shape,
    name: &'static str,
    role: FieldRole,
    annotation: Annotation,
    kind: TypeKind,
}

impl FieldSchema {
    fn from_field(index: usize, field: &'static Field) -> Self {
        let role = if field
            .attributes
            .contains(&FieldAttribute::Arbitrary("skip"))
        {
            FieldRole::Skipped
        } else if field.flags.contains(FieldFlags::FLATTEN) {
            FieldRole::Embedded
        } else {
            FieldRole::Leaf
        };

        let raw_annotation = field_annotation(field);
        let annotation = Annotation::parse(field.name, raw_annotation.as_deref());
        let shape = field.shape;

        // Skipped fields are never coerced, so there is no point describing them.
        let kind = match role {
            FieldRole::Skipped => TypeKind::Unsupported {
                type_name: shape.to_string(),
            },
            _ => TypeKind::for_shape(shape),
        };

        Self {
            index,
            offset: field.offset,
            shape,
            name: field.name,
            role,
            annotation,
            kind,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(
        index: usize,
        name: &'static str,
        role: FieldRole,
        annotation: Option<&str>,
        kind: TypeKind,
    ) -> Self {
        Self {
            index,
            offset: 0,
            shape: <() as Facet<'static>>::SHAPE,
            name,
            role,
            annotation: Annotation::parse(name, annotation),
            kind,
        }
    }

    /// Position of the field in its struct.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Byte offset of the field within its struct.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The field's declared shape.
    pub fn shape(&self) -> &'static Shape {
        self.shape
    }

    /// The identifier as declared.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// How the engine treats this field.
    pub fn role(&self) -> FieldRole {
        self.role
    }

    /// The parsed annotation (source name and default).
    pub fn annotation(&self) -> &Annotation {
        &self.annotation
    }

    /// Shorthand for `annotation().source_name()`.
    pub fn source_name(&self) -> &str {
        self.annotation.source_name()
    }

    /// The kind the resolved value is coerced into.
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }
}

impl PartialEq for FieldSchema {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.offset == other.offset
            && core::ptr::eq(self.shape, other.shape)
            && self.name == other.name
            && self.role == other.role
            && self.annotation == other.annotation
            && self.kind == other.kind
    }
}

/// A struct-like type and its fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    type_name: String,
    fields: Vec<FieldSchema>,
}

impl Composite {
    fn from_fields(shape: &Shape, fields: &'static [Field]) -> Self {
        log::trace!("Describing composite {shape} with {} fields", fields.len());
        Self {
            type_name: shape.to_string(),
            fields: fields
                .iter()
                .enumerate()
                .map(|(index, field)| FieldSchema::from_field(index, field))
                .collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(type_name: &str, fields: Vec<FieldSchema>) -> Self {
        Self {
            type_name: type_name.to_string(),
            fields,
        }
    }

    /// Display name of the struct.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Every declared field, including skipped and embedded ones.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Leaf fields with embedded composites expanded in place, in the order
    /// the engine visits them.
    pub fn leaves(&self) -> Vec<&FieldSchema> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a FieldSchema>) {
        for field in &self.fields {
            match (field.role, &field.kind) {
                (FieldRole::Embedded, TypeKind::Composite(inner)) => inner.collect_leaves(out),
                (FieldRole::Leaf, _) => out.push(field),
                _ => {}
            }
        }
    }
}

/// The full description of a destination type.
#[derive(Debug, Clone)]
pub struct Schema {
    shape: &'static Shape,
    root: TypeKind,
}

impl Schema {
    /// Describe `T`.
    pub fn of<'facet, T: Facet<'facet>>() -> Self {
        Self::for_shape(T::SHAPE)
    }

    /// Describe an arbitrary shape.
    pub fn for_shape(shape: &'static Shape) -> Self {
        Self {
            shape,
            root: TypeKind::for_shape(shape),
        }
    }

    /// The shape this schema was built from.
    pub fn shape(&self) -> &'static Shape {
        self.shape
    }

    /// The kind of the destination itself.
    pub fn root(&self) -> &TypeKind {
        &self.root
    }

    /// The root composite, looking through `Option`s. `None` if the
    /// destination is not struct-like and so cannot be materialized.
    pub fn composite(&self) -> Option<&Composite> {
        let mut kind = &self.root;
        loop {
            match kind {
                TypeKind::Optional { elem } => kind = elem,
                TypeKind::Composite(composite) => return Some(composite),
                _ => return None,
            }
        }
    }
}
