//! Writes a decoded [`Value`] tree into a `Partial`, or into an existing
//! destination in place.

use facet_core::{Def, Facet, Shape, ShapeLayout};
use facet_reflect::{HeapValue, Partial};

use crate::schema::{Composite, TypeKind};
use crate::value::{Slot, Value};
use crate::{EnvErrorKind, Result};

pub(crate) fn write_value<'facet>(partial: &mut Partial<'facet>, value: Value) -> Result<()> {
    match value {
        Value::Text(text) => {
            partial.set(text)?;
        }
        Value::I8(v) => {
            partial.set(v)?;
        }
        Value::I16(v) => {
            partial.set(v)?;
        }
        Value::I32(v) => {
            partial.set(v)?;
        }
        Value::I64(v) => {
            partial.set(v)?;
        }
        Value::I128(v) => {
            partial.set(v)?;
        }
        Value::Isize(v) => {
            partial.set(v)?;
        }
        Value::U8(v) => {
            partial.set(v)?;
        }
        Value::U16(v) => {
            partial.set(v)?;
        }
        Value::U32(v) => {
            partial.set(v)?;
        }
        Value::U64(v) => {
            partial.set(v)?;
        }
        Value::U128(v) => {
            partial.set(v)?;
        }
        Value::Usize(v) => {
            partial.set(v)?;
        }
        Value::F32(v) => {
            partial.set(v)?;
        }
        Value::F64(v) => {
            partial.set(v)?;
        }
        Value::Bool(v) => {
            partial.set(v)?;
        }
        Value::List(items) => write_list(partial, items)?,
        Value::Array(items) => write_array(partial, items)?,
        Value::Some(inner) => {
            log::trace!("Entering Some at {}", partial.path());
            partial.begin_some()?;
            write_value(partial, *inner)?;
            partial.end()?;
        }
        Value::Struct(slots) => write_struct(partial, slots)?,
    }
    Ok(())
}

fn write_list<'facet>(partial: &mut Partial<'facet>, items: Vec<Value>) -> Result<()> {
    log::trace!("Writing {} list items at {}", items.len(), partial.path());
    partial.begin_list()?;
    for item in items {
        partial.begin_list_item()?;
        write_value(partial, item)?;
        partial.end()?;
    }
    Ok(())
}

fn write_array<'facet>(partial: &mut Partial<'facet>, items: Vec<Value>) -> Result<()> {
    let capacity = match partial.shape().def {
        Def::Array(array_def) => array_def.n,
        _ => items.len(),
    };
    let present = items.len();
    log::trace!(
        "Writing {present} of {capacity} array elements at {}",
        partial.path()
    );

    for (idx, item) in items.into_iter().enumerate() {
        partial.begin_nth_element(idx)?;
        write_value(partial, item)?;
        partial.end()?;
    }
    for idx in present..capacity {
        partial.begin_nth_element(idx)?;
        partial.set_default()?;
        partial.end()?;
    }
    Ok(())
}

fn write_struct<'facet>(partial: &mut Partial<'facet>, slots: Vec<Slot>) -> Result<()> {
    for (idx, slot) in slots.into_iter().enumerate() {
        match slot {
            Slot::Keep | Slot::Default => {
                partial.set_nth_field_to_default(idx)?;
            }
            Slot::Set(value) => {
                partial.begin_nth_field(idx)?;
                write_value(partial, value)?;
                partial.end()?;
            }
        }
    }
    Ok(())
}

/// One field of the destination to overwrite, `offset` bytes from its start.
struct Patch {
    offset: usize,
    shape: &'static Shape,
    slot: Slot,
}

/// Overwrite the fields of `dest` that `value` assigns, leaving every
/// [`Slot::Keep`] field untouched.
///
/// Struct fields (nested and flattened) are updated field by field, the same
/// way the root is. Everything else is replaced as a whole. Each replacement
/// is fully built before `dest` is touched, so on error `dest` is unchanged.
pub(crate) fn write_in_place<'facet, T: Facet<'facet>>(
    dest: &mut T,
    root: &TypeKind,
    value: Value,
) -> Result<()> {
    let mut patches = Vec::new();
    match (root, value) {
        (TypeKind::Composite(composite), Value::Struct(slots)) => {
            collect_patches(composite, slots, 0, &mut patches)
        }
        (_, value) => patches.push(Patch {
            offset: 0,
            shape: T::SHAPE,
            slot: Slot::Set(value),
        }),
    }
    log::trace!("Patching {} fields of {}", patches.len(), T::SHAPE);

    let mut built = Vec::with_capacity(patches.len());
    for patch in patches {
        let size = match patch.shape.layout {
            ShapeLayout::Sized(layout) => layout.size(),
            ShapeLayout::Unsized => {
                return Err(EnvErrorKind::UnsupportedType {
                    type_name: patch.shape.to_string(),
                }
                .into());
            }
        };
        built.push((patch.offset, size, build_patch(patch)?));
    }

    let base = (dest as *mut T).cast::<u8>();
    for (offset, size, replacement) in built {
        let fresh = replacement.peek().data().as_byte_ptr().cast_mut();
        // SAFETY: `offset` and `size` describe a field of `T` (or `T` itself)
        // whose shape is the one `replacement` was built for, so both regions
        // hold a valid value of the same type. Distinct patches address
        // disjoint fields. After the swap `replacement` owns the previous
        // value and drops it.
        unsafe {
            core::ptr::swap_nonoverlapping(base.add(offset), fresh, size);
        }
    }
    Ok(())
}

fn collect_patches(composite: &Composite, slots: Vec<Slot>, base: usize, out: &mut Vec<Patch>) {
    for (field, slot) in composite.fields().iter().zip(slots) {
        let offset = base + field.offset();
        match (slot, field.kind()) {
            (Slot::Keep, _) => {}
            (Slot::Set(Value::Struct(inner_slots)), TypeKind::Composite(inner)) => {
                collect_patches(inner, inner_slots, offset, out)
            }
            (slot, _) => out.push(Patch {
                offset,
                shape: field.shape(),
                slot,
            }),
        }
    }
}

fn build_patch<'facet>(patch: Patch) -> Result<HeapValue<'facet>> {
    let mut partial = Partial::alloc_shape(patch.shape)?;
    match patch.slot {
        Slot::Set(value) => write_value(&mut partial, value)?,
        Slot::Keep | Slot::Default => {
            partial.set_default()?;
        }
    }
    Ok(partial.build()?)
}
