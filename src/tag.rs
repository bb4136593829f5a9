//! Field annotations and their resolution against a source.
//!
//! An annotation looks like `NAME,default`. Only the first `,` separates the
//! name from the default, so defaults may contain commas themselves:
//! `SLICE_INT,1,2,3` has the name `SLICE_INT` and the default `1,2,3`.

use facet_core::{Field, FieldAttribute};

use crate::schema::FieldSchema;
use crate::source::{EnvSource, lookup};

/// Separates the source name from the default literal in an annotation.
pub const ANNOTATION_SEPARATOR: char = ',';

/// Name of the facet attribute carrying the annotation: `#[facet(env = "...")]`.
pub(crate) const ATTRIBUTE_NAME: &str = "env";

/// Source name and default literal derived from a field's annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    source_name: String,
    default_literal: String,
}

impl Annotation {
    /// Derive the source name and default for the field `identifier`.
    ///
    /// Without an annotation (or with an empty one) the source name is the
    /// identifier uppercased and there is no default. An annotation whose name
    /// segment is empty, like `,8080`, also falls back to the uppercased
    /// identifier while keeping its default.
    pub fn parse(identifier: &str, annotation: Option<&str>) -> Self {
        let Some(annotation) = annotation.filter(|a| !a.is_empty()) else {
            return Self {
                source_name: identifier.to_uppercase(),
                default_literal: String::new(),
            };
        };

        let (name, default) = match annotation.split_once(ANNOTATION_SEPARATOR) {
            Some((name, default)) => (name, default),
            None => (annotation, ""),
        };

        let source_name = if name.is_empty() {
            log::trace!("Empty source name in annotation of `{identifier}`, using identifier");
            identifier.to_uppercase()
        } else {
            name.to_string()
        };

        Self {
            source_name,
            default_literal: default.to_string(),
        }
    }

    /// The name looked up in the source.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The default literal, verbatim (untrimmed). Empty when none was declared.
    pub fn default_literal(&self) -> &str {
        &self.default_literal
    }
}

/// Read the raw `env` annotation string from a field's attributes, if any.
pub(crate) fn field_annotation(field: &Field) -> Option<String> {
    field.attributes.iter().find_map(|attr| {
        let FieldAttribute::Arbitrary(raw) = attr;
        let literal = parse_env_attribute(raw);
        let looks_like_env = raw
            .trim_start()
            .strip_prefix(ATTRIBUTE_NAME)
            .is_some_and(|rest| rest.trim_start().starts_with('='));
        if literal.is_none() && looks_like_env {
            log::debug!(
                "Ignoring attribute `{raw}` on field `{}`: expected `env = \"NAME,default\"`",
                field.name
            );
        }
        literal
    })
}

/// Extract the string literal from an arbitrary attribute of the form
/// `env = "..."` or `env = r#"..."#`. Anything else yields `None`.
fn parse_env_attribute(raw: &str) -> Option<String> {
    let rest = raw.trim().strip_prefix(ATTRIBUTE_NAME)?.trim_start();
    let rest = rest.strip_prefix('=')?.trim();

    if let Some(raw_literal) = rest.strip_prefix('r') {
        let hashes = raw_literal.len() - raw_literal.trim_start_matches('#').len();
        let fence = "#".repeat(hashes);
        let body = raw_literal
            .strip_prefix(fence.as_str())?
            .strip_prefix('"')?
            .strip_suffix(fence.as_str())?
            .strip_suffix('"')?;
        return Some(body.to_string());
    }

    let literal = rest.strip_prefix('"')?.strip_suffix('"')?;
    unescape(literal)
}

/// Undo Rust string escapes. `None` on a malformed `\u{..}`.
fn unescape(literal: &str) -> Option<String> {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let rest = chars.as_str().strip_prefix('{')?;
                let (hex, tail) = rest.split_once('}')?;
                let code = u32::from_str_radix(&hex.replace('_', ""), 16).ok()?;
                out.push(char::from_u32(code)?);
                chars = tail.chars();
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Some(out)
}

/// Remove surrounding spaces. Only `' '` is stripped; tabs and newlines are
/// considered part of the value.
pub(crate) fn trim_spaces(value: &str) -> &str {
    value.trim_matches(' ')
}

/// A field's annotation resolved against a source for one materialization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTag {
    field_name: &'static str,
    source_name: String,
    default_literal: String,
    resolved_value: String,
}

impl FieldTag {
    /// Resolve `field` against `source`.
    ///
    /// The looked-up value wins when it is non-empty, otherwise the default
    /// literal is used. Either way the result is trimmed of surrounding spaces.
    /// This never fails; the worst outcome is an empty value.
    pub fn resolve<S: EnvSource + ?Sized>(field: &FieldSchema, source: &S) -> Self {
        let annotation = field.annotation();
        let looked_up = lookup(source, annotation.source_name());
        let chosen = if looked_up.is_empty() {
            annotation.default_literal()
        } else {
            looked_up.as_str()
        };
        let resolved_value = trim_spaces(chosen).to_string();

        log::trace!(
            "Resolved field `{}` from `{}` to {:?}",
            field.name(),
            annotation.source_name(),
            resolved_value
        );

        Self {
            field_name: field.name(),
            source_name: annotation.source_name().to_string(),
            default_literal: annotation.default_literal().to_string(),
            resolved_value,
        }
    }

    /// The field identifier as declared.
    pub fn field_name(&self) -> &'static str {
        self.field_name
    }

    /// The name that was looked up.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The declared default literal, untrimmed.
    pub fn default_literal(&self) -> &str {
        &self.default_literal
    }

    /// The final trimmed value, possibly empty.
    pub fn resolved_value(&self) -> &str {
        &self.resolved_value
    }
}
