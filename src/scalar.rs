//! String → scalar coercions.

use core::fmt::Display;
use core::str::FromStr;

use crate::schema::{FloatWidth, IntWidth};
use crate::tag::trim_spaces;
use crate::value::Value;
use crate::{EnvError, EnvErrorKind, Result};

fn parse<T>(target: &'static str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>().map_err(|err| {
        EnvErrorKind::Coercion {
            target,
            value: raw.to_string(),
            reason: err.to_string(),
        }
        .into()
    })
}

pub(crate) fn coerce_text(raw: &str) -> Value {
    Value::Text(trim_spaces(raw).to_string())
}

pub(crate) fn coerce_signed(width: IntWidth, raw: &str) -> Result<Value> {
    Ok(match width {
        IntWidth::W8 => Value::I8(parse("parse_i8", raw)?),
        IntWidth::W16 => Value::I16(parse("parse_i16", raw)?),
        IntWidth::W32 => Value::I32(parse("parse_i32", raw)?),
        IntWidth::W64 => Value::I64(parse("parse_i64", raw)?),
        IntWidth::W128 => Value::I128(parse("parse_i128", raw)?),
        IntWidth::Size => Value::Isize(parse("parse_isize", raw)?),
    })
}

pub(crate) fn coerce_unsigned(width: IntWidth, raw: &str) -> Result<Value> {
    Ok(match width {
        IntWidth::W8 => Value::U8(parse("parse_u8", raw)?),
        IntWidth::W16 => Value::U16(parse("parse_u16", raw)?),
        IntWidth::W32 => Value::U32(parse("parse_u32", raw)?),
        IntWidth::W64 => Value::U64(parse("parse_u64", raw)?),
        IntWidth::W128 => Value::U128(parse("parse_u128", raw)?),
        IntWidth::Size => Value::Usize(parse("parse_usize", raw)?),
    })
}

pub(crate) fn coerce_float(width: FloatWidth, raw: &str) -> Result<Value> {
    match width {
        FloatWidth::W32 => {
            let value: f32 = parse("parse_f32", raw)?;
            check_float_range("parse_f32", raw, value.is_infinite())?;
            Ok(Value::F32(value))
        }
        FloatWidth::W64 => {
            let value: f64 = parse("parse_f64", raw)?;
            check_float_range("parse_f64", raw, value.is_infinite())?;
            Ok(Value::F64(value))
        }
    }
}

/// Rust's float parser saturates to infinity on overflow; a literal that
/// overflows the declared precision is a coercion failure instead. Spelled
/// out infinities (`inf`, `-Infinity`) are accepted.
fn check_float_range(target: &'static str, raw: &str, is_infinite: bool) -> Result<()> {
    if !is_infinite {
        return Ok(());
    }
    let unsigned = raw.trim_start_matches(['+', '-']);
    if unsigned
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("inf"))
    {
        return Ok(());
    }
    Err(EnvErrorKind::Coercion {
        target,
        value: raw.to_string(),
        reason: "value out of range".to_string(),
    }
    .into())
}

/// Accepts exactly `1 t T TRUE true True` and `0 f F FALSE false False`.
pub(crate) fn coerce_bool(raw: &str) -> Result<Value> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(Value::Bool(true)),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(Value::Bool(false)),
        _ => Err(EnvError::from(EnvErrorKind::Coercion {
            target: "parse_bool",
            value: raw.to_string(),
            reason: "invalid boolean literal".to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_widths_are_checked() {
        assert_eq!(coerce_signed(IntWidth::W8, "-128").unwrap(), Value::I8(-128));
        assert!(coerce_signed(IntWidth::W8, "128").is_err());
        assert_eq!(coerce_signed(IntWidth::W16, "+300").unwrap(), Value::I16(300));
        assert_eq!(
            coerce_signed(IntWidth::W64, "-9223372036854775808").unwrap(),
            Value::I64(i64::MIN)
        );
        assert_eq!(coerce_signed(IntWidth::Size, "42").unwrap(), Value::Isize(42));
    }

    #[test]
    fn unsigned_rejects_negative() {
        assert_eq!(coerce_unsigned(IntWidth::W8, "255").unwrap(), Value::U8(255));
        assert!(coerce_unsigned(IntWidth::W8, "256").is_err());
        assert!(coerce_unsigned(IntWidth::W32, "-1").is_err());
        assert_eq!(
            coerce_unsigned(IntWidth::W128, "340282366920938463463374607431768211455").unwrap(),
            Value::U128(u128::MAX)
        );
    }

    #[test]
    fn integers_are_not_trimmed() {
        let err = coerce_signed(IntWidth::W32, " 2").unwrap_err();
        assert!(err.is_coercion_failure());
        assert!(coerce_unsigned(IntWidth::W32, "").is_err());
    }

    #[test]
    fn coercion_error_names_the_target() {
        let err = coerce_signed(IntWidth::W16, "abc").unwrap_err();
        match err.kind() {
            EnvErrorKind::Coercion { target, value, .. } => {
                assert_eq!(*target, "parse_i16");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
        assert!(err.to_string().starts_with("parse_i16: "));
    }

    #[test]
    fn floats() {
        assert_eq!(coerce_float(FloatWidth::W64, "1.5").unwrap(), Value::F64(1.5));
        assert_eq!(coerce_float(FloatWidth::W32, "0.25").unwrap(), Value::F32(0.25));
        assert_eq!(
            coerce_float(FloatWidth::W64, "-inf").unwrap(),
            Value::F64(f64::NEG_INFINITY)
        );
        assert!(coerce_float(FloatWidth::W32, "1e39").is_err());
        assert!(coerce_float(FloatWidth::W64, "1e39").is_ok());
        assert!(coerce_float(FloatWidth::W64, "one").is_err());
    }

    #[test]
    fn bool_grammar() {
        for raw in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(coerce_bool(raw).unwrap(), Value::Bool(true), "{raw}");
        }
        for raw in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(coerce_bool(raw).unwrap(), Value::Bool(false), "{raw}");
        }
        for raw in ["yes", "no", "tRUE", "", " true"] {
            assert!(coerce_bool(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn text_is_trimmed() {
        assert_eq!(coerce_text("  Mariah Carey "), Value::Text("Mariah Carey".into()));
    }
}
