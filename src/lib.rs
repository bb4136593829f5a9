#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use std::{
    error::Error,
    fmt::{self, Display},
};

use facet_core::Facet;
use facet_reflect::{Partial, ReflectError};

mod engine;
mod scalar;
mod schema;
mod source;
mod tag;
mod value;
mod write;

pub use engine::SEQUENCE_DELIMITER;
pub use schema::{
    Composite, FieldRole, FieldSchema, FloatWidth, IntWidth, Schema, TypeKind,
};
pub use source::{EnvSource, MockEnv, StdEnv};
pub use tag::{ANNOTATION_SEPARATOR, Annotation, FieldTag};

use engine::Engine;

/// Error type for environment materialization.
#[derive(Debug)]
pub struct EnvError {
    kind: EnvErrorKind,
}

impl EnvError {
    /// Returns a reference to the error kind for detailed error inspection.
    pub fn kind(&self) -> &EnvErrorKind {
        &self.kind
    }

    /// True if this error is, or wraps, a failure to parse a raw string into
    /// a scalar. These are the only errors a lenient pass tolerates.
    pub fn is_coercion_failure(&self) -> bool {
        match &self.kind {
            EnvErrorKind::Coercion { .. } => true,
            EnvErrorKind::Wrapped { source, .. } => source.is_coercion_failure(),
            _ => false,
        }
    }

    /// The innermost error, looking through every [`EnvErrorKind::Wrapped`] layer.
    pub fn root_cause(&self) -> &EnvError {
        match &self.kind {
            EnvErrorKind::Wrapped { source, .. } => source.root_cause(),
            _ => self,
        }
    }

    pub(crate) fn wrap(self, context: &'static str) -> Self {
        EnvErrorKind::Wrapped {
            context,
            source: Box::new(self),
        }
        .into()
    }
}

impl Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> fmt::Result {
        let kind = &self.kind;
        write!(f, "{kind}")
    }
}

impl Error for EnvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            EnvErrorKind::Wrapped { source, .. } => Some(source.as_ref()),
            EnvErrorKind::Reflect(reflect_error) => Some(reflect_error),
            _ => None,
        }
    }
}

impl<K: Into<EnvErrorKind>> From<K> for EnvError {
    fn from(value: K) -> Self {
        let kind = value.into();
        EnvError { kind }
    }
}

/// Detailed classification of materialization errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum EnvErrorKind {
    /// The destination, or one of its fields, has a type with no coercion rule.
    UnsupportedType {
        /// Display name of the offending type.
        type_name: String,
    },
    /// Strict mode only: a leaf field resolved to an empty value.
    EmptyValue {
        /// The field identifier.
        field: &'static str,
        /// The name that was looked up.
        source_name: String,
    },
    /// A field cannot be assigned, e.g. `#[facet(flatten)]` on a non-struct.
    NotWritable {
        /// The field identifier.
        field: &'static str,
    },
    /// A fixed-size array received more segments than it has slots.
    ArrayOutOfRange {
        /// Number of comma separated segments supplied.
        len: usize,
        /// Declared capacity of the array.
        capacity: usize,
    },
    /// A raw string could not be parsed into the target scalar.
    Coercion {
        /// Name of the coercion attempted, e.g. `parse_i8`.
        target: &'static str,
        /// The raw string.
        value: String,
        /// What the parser reported.
        reason: String,
    },
    /// An error raised while coercing the inside of a container.
    Wrapped {
        /// The container coercion, e.g. `sequence`.
        context: &'static str,
        /// The underlying error.
        source: Box<EnvError>,
    },
    /// Error from the reflection system while writing the destination.
    Reflect(ReflectError),
}

impl Display for EnvErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvErrorKind::UnsupportedType { type_name } => {
                write!(f, "unsupported type: {type_name}")
            }
            EnvErrorKind::EmptyValue { field, source_name } => {
                write!(f, "empty value for field '{field}' (from '{source_name}')")
            }
            EnvErrorKind::NotWritable { field } => {
                write!(f, "field '{field}' is not writable")
            }
            EnvErrorKind::ArrayOutOfRange { len, capacity } => {
                write!(
                    f,
                    "array out of range: {len} values for an array of {capacity}"
                )
            }
            EnvErrorKind::Coercion {
                target,
                value,
                reason,
            } => write!(f, "{target}: cannot parse {value:?}: {reason}"),
            EnvErrorKind::Wrapped { context, source } => write!(f, "{context}: {source}"),
            EnvErrorKind::Reflect(reflect_error) => write!(f, "{reflect_error}"),
        }
    }
}

impl From<ReflectError> for EnvErrorKind {
    fn from(value: ReflectError) -> Self {
        Self::Reflect(value)
    }
}

type Result<T> = std::result::Result<T, EnvError>;

/// Materializes Facet types from an [`EnvSource`].
///
/// # Example
/// ```
/// # use facet::Facet;
/// # use facet_env::{Mapper, MockEnv};
/// #[derive(Facet, Debug, PartialEq)]
/// struct Server {
///     #[facet(env = "HOST,localhost")]
///     host: String,
///     port: u16,
/// }
///
/// # fn main() -> Result<(), facet_env::EnvError> {
/// let env = MockEnv::from_pairs([("PORT", "8080")]);
/// let server: Server = Mapper::new(&env).strict(true).materialize()?;
/// assert_eq!(server, Server { host: "localhost".into(), port: 8080 });
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Mapper<S> {
    source: S,
    strict: bool,
}

impl Default for Mapper<StdEnv> {
    fn default() -> Self {
        Self::new(StdEnv)
    }
}

impl<S: EnvSource> Mapper<S> {
    /// A lenient mapper reading from `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            strict: false,
        }
    }

    /// Switch between strict (fail-fast, no empty leaves) and lenient
    /// (best-effort) materialization.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Whether this mapper is strict.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The source values are read from.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Build a fresh `T` from the source.
    pub fn materialize<'facet, T: Facet<'facet>>(&self) -> Result<T> {
        let schema = Schema::of::<T>();
        self.materialize_with(&schema)
    }

    /// Build a fresh `T` using a schema built earlier with [`Schema::of`].
    ///
    /// The schema must describe `T`; a schema for another type surfaces as a
    /// [`EnvErrorKind::Reflect`] error. Skipped fields of a fresh value have
    /// nothing to keep, so they get their `Default` value.
    pub fn materialize_with<'facet, T: Facet<'facet>>(&self, schema: &Schema) -> Result<T> {
        log::trace!("Entering `materialize` for {}", schema.shape());

        let value = self.decode(schema)?;

        let mut typed_partial = Partial::alloc::<T>()?;
        write::write_value(typed_partial.inner_mut(), value)?;

        let boxed_value = typed_partial.build()?;
        log::trace!("Destination fully built");

        Ok(*boxed_value)
    }

    /// Populate `dest` from the source, in place.
    ///
    /// Only the fields the source assigns are overwritten. `#[facet(skip)]`
    /// fields keep whatever value they had, and need not implement `Default`.
    /// When materialization fails `dest` is left exactly as it was.
    pub fn map_into<'facet, T: Facet<'facet>>(&self, dest: &mut T) -> Result<()> {
        log::trace!("Entering `map_into` for {}", T::SHAPE);

        let schema = Schema::of::<T>();
        let value = self.decode(&schema)?;
        write::write_in_place(dest, schema.root(), value)?;

        log::trace!("Destination updated in place");
        Ok(())
    }

    fn decode(&self, schema: &Schema) -> Result<value::Value> {
        let value = Engine::new(&self.source, self.strict).materialize(schema.root())?;
        log::trace!("Source decoded");
        Ok(value)
    }
}

/// Populate `dest` from the process environment, best-effort.
///
/// A field whose value does not parse is left at its default instead of
/// failing the call. Unsupported field types and malformed embedding still
/// fail, since they are defects in `T` rather than in the environment.
pub fn map_config<'facet, T: Facet<'facet>>(dest: &mut T) -> Result<()> {
    Mapper::new(StdEnv).map_into(dest)
}

/// Populate `dest` from the process environment, strictly.
///
/// Every leaf field must resolve to a non-empty value (nested structs and
/// `Option`s of structs are exempt, their own fields are checked instead),
/// and the first failure of any kind aborts the call.
pub fn must_map_config<'facet, T: Facet<'facet>>(dest: &mut T) -> Result<()> {
    Mapper::new(StdEnv).strict(true).map_into(dest)
}

/// [`map_config`] with an explicit source.
pub fn map_config_from<'facet, T, S>(dest: &mut T, source: &S) -> Result<()>
where
    T: Facet<'facet>,
    S: EnvSource + ?Sized,
{
    Mapper::new(source).map_into(dest)
}

/// [`must_map_config`] with an explicit source.
pub fn must_map_config_from<'facet, T, S>(dest: &mut T, source: &S) -> Result<()>
where
    T: Facet<'facet>,
    S: EnvSource + ?Sized,
{
    Mapper::new(source).strict(true).map_into(dest)
}

/// Build a `T` from the process environment, best-effort.
pub fn from_env<'facet, T: Facet<'facet>>() -> Result<T> {
    Mapper::new(StdEnv).materialize()
}

/// Build a `T` from the process environment, strictly.
pub fn from_env_strict<'facet, T: Facet<'facet>>() -> Result<T> {
    Mapper::new(StdEnv).strict(true).materialize()
}
