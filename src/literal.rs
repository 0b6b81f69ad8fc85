//! Typed literal coercion: raw field strings → typed graph literals.
//!
//! Coercion is a pure function of the raw value, the target [`LiteralKind`]
//! and the coercer's fixed UTC offset. Blank values are not coerced at all;
//! callers check [`is_blank`] first and treat blanks as "no value".

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, ValueFormatError};

/// Fixed rendering for date-time literals: millisecond precision plus an
/// explicit `±HH:MM` offset.
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

/// Primitive kind of a typed literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LiteralKind {
    String,
    Integer,
    Decimal,
    DateTime,
}

impl LiteralKind {
    /// XSD datatype IRI used when the literal is handed to the graph engine.
    pub fn datatype_iri(self) -> String {
        let local = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::DateTime => "dateTimeStamp",
        };
        format!("{XSD}{local}")
    }
}

impl std::fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Decimal => write!(f, "decimal"),
            Self::DateTime => write!(f, "date-time"),
        }
    }
}

/// A literal value tagged with its primitive kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedLiteral {
    String(String),
    Integer(i64),
    /// Held as `f64`: values beyond 15-17 significant digits lose precision
    /// and render in their nearest `f64` form.
    Decimal(f64),
    DateTime(DateTime<FixedOffset>),
}

impl TypedLiteral {
    /// The kind tag of this literal.
    pub fn kind(&self) -> LiteralKind {
        match self {
            Self::String(_) => LiteralKind::String,
            Self::Integer(_) => LiteralKind::Integer,
            Self::Decimal(_) => LiteralKind::Decimal,
            Self::DateTime(_) => LiteralKind::DateTime,
        }
    }

    /// Canonical lexical form.
    pub fn lexical(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Decimal(d) => d.to_string(),
            Self::DateTime(dt) => dt.format(DATE_TIME_FORMAT).to_string(),
        }
    }
}

impl std::fmt::Display for TypedLiteral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"^^{}", self.lexical(), self.kind())
    }
}

/// Whether a raw field value counts as absent.
pub fn is_blank(raw: Option<&str>) -> bool {
    raw.is_none_or(|v| v.trim().is_empty())
}

/// Converts raw strings into [`TypedLiteral`]s.
#[derive(Debug, Clone, Copy)]
pub struct LiteralCoercer {
    offset: FixedOffset,
}

impl LiteralCoercer {
    /// Coercer that anchors dates at midnight in the given UTC offset.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Build from an offset in minutes east of UTC.
    pub fn with_offset_minutes(minutes: i32) -> Result<Self, SchemaError> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::new)
            .ok_or(SchemaError::InvalidOffset { minutes })
    }

    /// The offset applied to date-time literals.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Coerce `raw` into a literal of `kind`.
    pub fn coerce(&self, raw: &str, kind: LiteralKind) -> Result<TypedLiteral, ValueFormatError> {
        let fail = |reason: String| ValueFormatError {
            kind,
            raw: raw.to_string(),
            reason,
        };

        match kind {
            LiteralKind::String => Ok(TypedLiteral::String(raw.to_string())),
            LiteralKind::Integer => raw
                .trim()
                .parse::<i64>()
                .map(TypedLiteral::Integer)
                .map_err(|e| fail(e.to_string())),
            LiteralKind::Decimal => {
                let value = raw.trim().parse::<f64>().map_err(|e| fail(e.to_string()))?;
                if !value.is_finite() {
                    return Err(fail("not a finite number".into()));
                }
                Ok(TypedLiteral::Decimal(value))
            }
            LiteralKind::DateTime => {
                let trimmed = raw.trim();
                let date_part = trimmed
                    .get(..10)
                    .ok_or_else(|| fail("expected a YYYY-MM-DD date prefix".into()))?;
                let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                    .map_err(|e| fail(format!("invalid calendar date: {e}")))?;
                let midnight = date.and_time(chrono::NaiveTime::MIN);
                let stamped = midnight
                    .and_local_timezone(self.offset)
                    .single()
                    .ok_or_else(|| fail("date is not representable at the configured offset".into()))?;
                Ok(TypedLiteral::DateTime(stamped))
            }
        }
    }
}

impl Default for LiteralCoercer {
    fn default() -> Self {
        Self::new(FixedOffset::east_opt(0).expect("zero offset is valid"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_parses_and_renders() {
        let c = LiteralCoercer::default();
        let lit = c.coerce("23.5", LiteralKind::Decimal).unwrap();
        assert_eq!(lit, TypedLiteral::Decimal(23.5));
        assert_eq!(lit.lexical(), "23.5");
    }

    #[test]
    fn decimal_rejects_garbage_and_non_finite() {
        let c = LiteralCoercer::default();
        let err = c.coerce("abc", LiteralKind::Decimal).unwrap_err();
        assert_eq!(err.raw, "abc");
        assert_eq!(err.kind, LiteralKind::Decimal);
        assert!(c.coerce("NaN", LiteralKind::Decimal).is_err());
        assert!(c.coerce("inf", LiteralKind::Decimal).is_err());
    }

    #[test]
    fn wide_decimal_renders_nearest_float() {
        let c = LiteralCoercer::default();
        let lit = c.coerce("12345678901234567890.125", LiteralKind::Decimal).unwrap();
        let TypedLiteral::Decimal(value) = lit else {
            panic!("expected a decimal");
        };
        assert_eq!(lit.lexical().parse::<f64>().unwrap(), value);
        assert_ne!(lit.lexical(), "12345678901234567890.125");
    }

    #[test]
    fn integer_trims_whitespace() {
        let c = LiteralCoercer::default();
        assert_eq!(
            c.coerce(" 42 ", LiteralKind::Integer).unwrap(),
            TypedLiteral::Integer(42)
        );
        assert!(c.coerce("4.2", LiteralKind::Integer).is_err());
    }

    #[test]
    fn date_time_normalized_to_midnight_with_offset() {
        let c = LiteralCoercer::default();
        let lit = c.coerce("2021-06-01", LiteralKind::DateTime).unwrap();
        assert_eq!(lit.lexical(), "2021-06-01T00:00:00.000+00:00");
    }

    #[test]
    fn date_time_ignores_trailing_precision() {
        let c = LiteralCoercer::default();
        let plain = c.coerce("2021-06-01", LiteralKind::DateTime).unwrap();
        let precise = c
            .coerce("2021-06-01 14:33:02.000", LiteralKind::DateTime)
            .unwrap();
        assert_eq!(plain, precise);
    }

    #[test]
    fn date_time_uses_configured_offset() {
        let c = LiteralCoercer::with_offset_minutes(60).unwrap();
        let lit = c.coerce("2021-06-01", LiteralKind::DateTime).unwrap();
        assert_eq!(lit.lexical(), "2021-06-01T00:00:00.000+01:00");
    }

    #[test]
    fn date_time_rejects_bad_dates() {
        let c = LiteralCoercer::default();
        assert!(c.coerce("2021-13-01", LiteralKind::DateTime).is_err());
        assert!(c.coerce("01/06/2021", LiteralKind::DateTime).is_err());
        assert!(c.coerce("2021-6-1", LiteralKind::DateTime).is_err());
    }

    #[test]
    fn string_passes_through_verbatim() {
        let c = LiteralCoercer::default();
        assert_eq!(
            c.coerce("  Gadus Morhua ", LiteralKind::String).unwrap(),
            TypedLiteral::String("  Gadus Morhua ".into())
        );
    }

    #[test]
    fn coercion_is_deterministic() {
        let c = LiteralCoercer::default();
        for kind in [
            LiteralKind::String,
            LiteralKind::Integer,
            LiteralKind::Decimal,
            LiteralKind::DateTime,
        ] {
            let a = c.coerce("2021-06-01", kind);
            let b = c.coerce("2021-06-01", kind);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(None));
        assert!(is_blank(Some("")));
        assert!(is_blank(Some("   ")));
        assert!(!is_blank(Some("0")));
    }

    #[test]
    fn out_of_range_offset_rejected() {
        assert!(LiteralCoercer::with_offset_minutes(24 * 60).is_err());
    }
}
