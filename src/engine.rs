//! The materialization engine: a recursive walk over a [`TypeKind`] that
//! resolves every leaf field against a source and coerces it.
//!
//! Strictness changes two things:
//!
//! - in strict mode an empty resolved value is an error, unless the field is
//!   a composite (or an `Option` of one), which instead recurses into its own
//!   fields;
//! - in strict mode the first coercion failure aborts the walk, while in
//!   lenient mode it only leaves that one field at its default.
//!
//! Every other failure (unsupported types, malformed embedding, an array that
//! is too small) aborts regardless of strictness, since it points at the
//! destination type rather than at the input.

use crate::schema::{Composite, FieldRole, FieldSchema, TypeKind};
use crate::scalar;
use crate::source::EnvSource;
use crate::tag::FieldTag;
use crate::value::{Slot, Value};
use crate::{EnvError, EnvErrorKind, Result};

/// Separates elements of `Vec<T>` and `[T; N]` values. There is no escaping:
/// an element can never contain a comma.
pub const SEQUENCE_DELIMITER: char = ',';

pub(crate) struct Engine<'s, S: ?Sized> {
    source: &'s S,
    strict: bool,
}

impl<'s, S: EnvSource + ?Sized> Engine<'s, S> {
    pub(crate) fn new(source: &'s S, strict: bool) -> Self {
        Self { source, strict }
    }

    /// Decode a destination of kind `root`, which must resolve to a composite
    /// once `Option`s are looked through.
    pub(crate) fn materialize(&self, root: &TypeKind) -> Result<Value> {
        log::trace!(
            "Entering `materialize` for {root} (strict: {})",
            self.strict
        );
        match root {
            TypeKind::Optional { elem } => Ok(Value::Some(Box::new(self.materialize(elem)?))),
            TypeKind::Composite(composite) => {
                Ok(Value::Struct(self.materialize_composite(composite)?))
            }
            other => Err(EnvErrorKind::UnsupportedType {
                type_name: other.type_name(),
            }
            .into()),
        }
    }

    fn materialize_composite(&self, composite: &Composite) -> Result<Vec<Slot>> {
        log::trace!("Materializing composite {}", composite.type_name());

        let mut slots = Vec::with_capacity(composite.fields().len());
        for field in composite.fields() {
            let slot = match field.role() {
                FieldRole::Skipped => {
                    log::trace!("Skipping field `{}`", field.name());
                    Slot::Keep
                }
                FieldRole::Embedded => self.materialize_embedded(field)?,
                FieldRole::Leaf => self.materialize_leaf(field)?,
            };
            slots.push(slot);
        }
        Ok(slots)
    }

    /// Embedded fields are structural: their failures always propagate.
    fn materialize_embedded(&self, field: &FieldSchema) -> Result<Slot> {
        match field.kind() {
            TypeKind::Composite(inner) => {
                log::trace!("Promoting fields of embedded `{}`", field.name());
                Ok(Slot::Set(Value::Struct(self.materialize_composite(inner)?)))
            }
            _ => Err(EnvErrorKind::NotWritable { field: field.name() }.into()),
        }
    }

    fn materialize_leaf(&self, field: &FieldSchema) -> Result<Slot> {
        let tag = FieldTag::resolve(field, self.source);
        self.check_empty(&tag, field.kind())?;

        match self.coerce(field.kind(), tag.resolved_value()) {
            Ok(value) => Ok(Slot::Set(value)),
            Err(err) if !self.strict && err.is_coercion_failure() => {
                log::debug!(
                    "Leaving `{}` at its default, `{}` did not coerce: {err}",
                    field.name(),
                    tag.source_name()
                );
                Ok(Slot::Default)
            }
            Err(err) => {
                log::debug!("Aborting at field `{}`: {err}", field.name());
                Err(err)
            }
        }
    }

    fn check_empty(&self, tag: &FieldTag, kind: &TypeKind) -> Result<()> {
        if !self.strict || !tag.resolved_value().is_empty() || kind.is_composite_like() {
            return Ok(());
        }
        Err(EnvErrorKind::EmptyValue {
            field: tag.field_name(),
            source_name: tag.source_name().to_string(),
        }
        .into())
    }

    /// Convert `raw` into a value of `kind`.
    fn coerce(&self, kind: &TypeKind, raw: &str) -> Result<Value> {
        match kind {
            TypeKind::Text => Ok(scalar::coerce_text(raw)),
            TypeKind::SignedInt { width } => scalar::coerce_signed(*width, raw),
            TypeKind::UnsignedInt { width } => scalar::coerce_unsigned(*width, raw),
            TypeKind::Float { width } => scalar::coerce_float(*width, raw),
            TypeKind::Bool => scalar::coerce_bool(raw),
            TypeKind::Sequence { elem } => {
                let items = self
                    .coerce_segments(elem, raw.split(SEQUENCE_DELIMITER))
                    .map_err(|err| err.wrap("sequence"))?;
                Ok(Value::List(items))
            }
            TypeKind::FixedSequence { elem, len } => {
                // An empty value has no segments, so `[T; 0]` accepts it.
                let segments: Vec<&str> = if raw.is_empty() {
                    Vec::new()
                } else {
                    raw.split(SEQUENCE_DELIMITER).collect()
                };
                if segments.len() > *len {
                    return Err(EnvErrorKind::ArrayOutOfRange {
                        len: segments.len(),
                        capacity: *len,
                    }
                    .into());
                }
                let items = self
                    .coerce_segments(elem, segments)
                    .map_err(|err| err.wrap("array"))?;
                Ok(Value::Array(items))
            }
            TypeKind::Optional { elem } => {
                let inner = self.coerce(elem, raw).map_err(|err| err.wrap("option"))?;
                Ok(Value::Some(Box::new(inner)))
            }
            TypeKind::Composite(composite) => {
                Ok(Value::Struct(self.materialize_composite(composite)?))
            }
            TypeKind::Unsupported { type_name } => Err(EnvErrorKind::UnsupportedType {
                type_name: type_name.clone(),
            }
            .into()),
        }
    }

    fn coerce_segments<'r>(
        &self,
        elem: &TypeKind,
        segments: impl IntoIterator<Item = &'r str>,
    ) -> Result<Vec<Value>> {
        segments
            .into_iter()
            .map(|segment| self.coerce(elem, segment))
            .collect::<core::result::Result<Vec<_>, EnvError>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSchema, IntWidth};
    use crate::source::MockEnv;

    fn composite(fields: Vec<FieldSchema>) -> TypeKind {
        TypeKind::Composite(Composite::new_for_test("Test", fields))
    }

    fn leaf(index: usize, name: &'static str, annotation: Option<&str>, kind: TypeKind) -> FieldSchema {
        FieldSchema::new_for_test(index, name, FieldRole::Leaf, annotation, kind)
    }

    const U32: TypeKind = TypeKind::UnsignedInt {
        width: IntWidth::W32,
    };

    #[test]
    fn malformed_embedding_is_not_writable() {
        let root = composite(vec![FieldSchema::new_for_test(
            0,
            "port",
            FieldRole::Embedded,
            None,
            U32,
        )]);
        let env = MockEnv::from_pairs([("PORT", "80")]);

        for strict in [false, true] {
            let err = Engine::new(&env, strict).materialize(&root).unwrap_err();
            assert!(
                matches!(err.kind(), EnvErrorKind::NotWritable { field: "port" }),
                "{err:?}"
            );
        }
    }

    #[test]
    fn lenient_failure_leaves_a_default_slot() {
        let root = composite(vec![
            leaf(0, "a", None, U32),
            leaf(1, "b", None, U32),
        ]);
        let env = MockEnv::from_pairs([("A", "abc"), ("B", "7")]);

        let value = Engine::new(&env, false).materialize(&root).unwrap();
        assert_eq!(
            value,
            Value::Struct(vec![Slot::Default, Slot::Set(Value::U32(7))])
        );
    }

    #[test]
    fn strict_failure_aborts() {
        let root = composite(vec![
            leaf(0, "a", None, U32),
            leaf(1, "b", None, U32),
        ]);
        let env = MockEnv::from_pairs([("A", "abc"), ("B", "7")]);

        let err = Engine::new(&env, true).materialize(&root).unwrap_err();
        assert!(err.is_coercion_failure());
    }

    #[test]
    fn array_overflow_is_fatal_even_when_lenient() {
        let root = composite(vec![leaf(
            0,
            "flags",
            Some("FLAGS"),
            TypeKind::FixedSequence {
                elem: Box::new(TypeKind::Bool),
                len: 2,
            },
        )]);
        let env = MockEnv::from_pairs([("FLAGS", "1,0,1")]);

        let err = Engine::new(&env, false).materialize(&root).unwrap_err();
        assert!(matches!(
            err.kind(),
            EnvErrorKind::ArrayOutOfRange {
                len: 3,
                capacity: 2
            }
        ));
    }

    #[test]
    fn skipped_fields_are_kept() {
        let root = composite(vec![
            FieldSchema::new_for_test(0, "token", FieldRole::Skipped, None, TypeKind::Text),
            leaf(1, "user", None, TypeKind::Text),
        ]);
        let env = MockEnv::from_pairs([("TOKEN", "hunter2"), ("USER", "root")]);

        let value = Engine::new(&env, true).materialize(&root).unwrap();
        assert_eq!(
            value,
            Value::Struct(vec![Slot::Keep, Slot::Set(Value::Text("root".into()))])
        );
    }

    #[test]
    fn empty_value_has_no_array_segments() {
        let root = composite(vec![leaf(
            0,
            "none",
            Some("NONE"),
            TypeKind::FixedSequence {
                elem: Box::new(U32),
                len: 0,
            },
        )]);
        let env = MockEnv::new();

        let value = Engine::new(&env, false).materialize(&root).unwrap();
        assert_eq!(value, Value::Struct(vec![Slot::Set(Value::Array(vec![]))]));
    }

    #[test]
    fn sequence_element_failure_is_wrapped() {
        let root = composite(vec![leaf(
            0,
            "ports",
            None,
            TypeKind::Sequence {
                elem: Box::new(U32),
            },
        )]);
        let env = MockEnv::from_pairs([("PORTS", "80,x")]);

        let err = Engine::new(&env, true).materialize(&root).unwrap_err();
        assert!(matches!(err.kind(), EnvErrorKind::Wrapped { context: "sequence", .. }));
        assert!(err.is_coercion_failure());
        assert!(err.to_string().starts_with("sequence: parse_u32: "));
    }

    #[test]
    fn unsupported_root() {
        let env = MockEnv::new();
        let err = Engine::new(&env, false)
            .materialize(&TypeKind::Bool)
            .unwrap_err();
        assert!(matches!(err.kind(), EnvErrorKind::UnsupportedType { type_name } if type_name == "bool"));
    }

    #[test]
    fn optional_root_wraps_composite() {
        let root = TypeKind::Optional {
            elem: Box::new(composite(vec![leaf(0, "name", Some("NAME,anon"), TypeKind::Text)])),
        };
        let env = MockEnv::new();

        let value = Engine::new(&env, true).materialize(&root).unwrap();
        assert_eq!(
            value,
            Value::Some(Box::new(Value::Struct(vec![Slot::Set(Value::Text(
                "anon".into()
            ))])))
        );
    }
}
