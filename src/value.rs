//! Decoded values, independent of any facet frame.
//!
//! The engine first decodes the whole destination into a [`Value`] tree and
//! only then writes it out. Failures therefore never leave a half-built frame
//! stack or a half-updated destination behind: a lenient failure becomes a
//! [`Slot::Default`] and a strict failure aborts before anything is written.

/// A fully decoded value for one frame.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Text(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    Isize(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    Usize(usize),
    F32(f32),
    F64(f64),
    Bool(bool),
    /// `Vec<T>` items, in order
    List(Vec<Value>),
    /// Leading elements of `[T; N]`; the rest are defaulted
    Array(Vec<Value>),
    /// `Some(T)`
    Some(Box<Value>),
    /// One slot per declared field, by field index
    Struct(Vec<Slot>),
}

/// What to put in one field of a struct.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    /// Leave the field alone. When the struct is freshly allocated there is
    /// nothing to leave, and the field gets its `Default` value.
    Keep,
    /// The field's `Default` value.
    Default,
    /// A decoded value.
    Set(Value),
}
