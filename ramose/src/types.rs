//! The Data-Type Registry: five named coercions from a possibly-empty
//! string to a typed value, plus a sentinel for empty/absent input so that
//! filtering and sorting never need to special-case nulls.
//!

use crate::Error;
use chrono::{NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

/// One of the five names a column or path parameter can declare.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DataType {
    Str,
    Int,
    Float,
    DateTime,
    Duration,
}

impl DataType {
    /// Parse a registry name (`str`, `int`, `float`, `datetime`,
    /// `duration`). Unknown names return `None`, matching spec.md §4.6's
    /// "unknown parameter types pass through untyped".
    ///
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "str" => Some(Self::Str),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "datetime" => Some(Self::DateTime),
            "duration" => Some(Self::Duration),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::DateTime => "datetime",
            Self::Duration => "duration",
        }
    }

    /// Coerce `input` (absent means the same as empty) through this type's
    /// registry entry.
    ///
    pub fn coerce(&self, input: Option<&str>) -> Result<TypedValue, Error> {
        let s = input.unwrap_or("");
        match self {
            Self::Str => Ok(TypedValue::Str(s.to_lowercase())),
            Self::Int => {
                if s.is_empty() {
                    Ok(TypedValue::Int(i64::MIN))
                } else {
                    map_error!(BadParameter, s.parse::<i64>()).map(TypedValue::Int)
                }
            }
            Self::Float => {
                if s.is_empty() {
                    Ok(TypedValue::Float(f64::MIN))
                } else {
                    map_error!(BadParameter, s.parse::<f64>()).map(TypedValue::Float)
                }
            }
            Self::DateTime => {
                if s.is_empty() {
                    Ok(TypedValue::DateTime(*MIN_DATETIME))
                } else {
                    parse_datetime(s).map(TypedValue::DateTime)
                }
            }
            Self::Duration => {
                let dur = if s.is_empty() {
                    parse_iso8601_duration("P2000Y")?
                } else {
                    parse_iso8601_duration(s)?
                };
                Ok(TypedValue::DateTime(*DURATION_EPOCH + dur))
            }
        }
    }
}

/// `0001-01-01T00:00:00`, the `datetime` sentinel for empty input.
///
pub fn min_datetime() -> NaiveDateTime {
    *MIN_DATETIME
}

lazy_static::lazy_static! {
    static ref MIN_DATETIME: NaiveDateTime =
        NaiveDateTime::parse_from_str("0001-01-01T00:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();

    /// `1983-01-15T00:00:00`, the epoch the `duration` coercion adds its
    /// parsed duration to, preserved verbatim from the original
    /// implementation per spec.md §4.2/§9 (it only affects relative
    /// ordering).
    static ref DURATION_EPOCH: NaiveDateTime =
        NaiveDateTime::parse_from_str("1983-01-15T00:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();
}

/// A value produced by one of the five registry coercions, tagged with the
/// variant that produced it. Comparisons only ever happen between values of
/// the same variant: the Executor always coerces a filter's right-hand side
/// through the left-hand column's own declared type (spec.md §4.5 item 2),
/// so a cross-variant comparison can only be an internal bug.
///
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    Str(String),
    Int(i64),
    Float(f64),
    DateTime(NaiveDateTime),
}

impl TypedValue {
    /// `self`'s own [`DataType`] tag.
    ///
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Str(_) => DataType::Str,
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::DateTime(_) => DataType::DateTime,
        }
    }

    /// Compare two values of the same variant. Panics on a variant mismatch
    /// — see the type's doc comment.
    ///
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            _ => panic!(
                "ramose: compared TypedValues of different data types ({:?} vs {:?})",
                self.data_type(),
                other.data_type(),
            ),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

/// Permissive ISO-8601/RFC-3339 datetime parsing. Tries a handful of
/// common shapes, from full RFC-3339 down to a bare date, mirroring the
/// original's use of a permissive datetime parser library.
///
fn parse_datetime(s: &str) -> Result<NaiveDateTime, Error> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d",
        "%Y-%m",
        "%Y",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
        if let Ok(d) = chrono::NaiveDate::parse_from_str(s, fmt) {
            return Ok(d.and_hms_opt(0, 0, 0).unwrap());
        }
    }
    // "%Y" and "%Y-%m" alone aren't valid NaiveDate formats either; pad them.
    if let Ok(year) = s.parse::<i32>() {
        if let Some(d) = chrono::NaiveDate::from_ymd_opt(year, 1, 1) {
            return Ok(d.and_hms_opt(0, 0, 0).unwrap());
        }
    }
    if let Some((y, m)) = s.split_once('-') {
        if let (Ok(year), Ok(month)) = (y.parse::<i32>(), m.parse::<u32>()) {
            if let Some(d) = chrono::NaiveDate::from_ymd_opt(year, month, 1) {
                return Ok(d.and_hms_opt(0, 0, 0).unwrap());
            }
        }
    }
    Err(Error::bad_parameter(format!("cannot parse datetime '{}'", s)))
}

/// Parse an ISO-8601 duration (`PnYnMnDTnHnMnS`) into a [`chrono::Duration`].
/// None of the crates in scope ship an ISO-8601 duration parser, so this is
/// a small hand-rolled grammar via `regex`, in the teacher's own idiom of
/// reaching for a `Regex` for ad hoc grammars (see `http/config.rs`'s
/// `MTIME`/`ROUTE_PARAM` patterns).
///
/// Calendar fields (years, months) are approximated as 365 and 30 days
/// respectively, which is adequate here since the duration is only ever
/// used, added to a fixed epoch, to produce a total order for sorting and
/// filtering — not for calendar-accurate arithmetic.
///
fn parse_iso8601_duration(s: &str) -> Result<chrono::Duration, Error> {
    let re = Regex::new(
        r"^P(?:(?P<years>\d+)Y)?(?:(?P<months>\d+)M)?(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+(?:\.\d+)?)S)?)?$",
    )
    .unwrap();
    let caps = re
        .captures(s)
        .ok_or_else(|| Error::bad_parameter(format!("cannot parse duration '{}'", s)))?;
    let field = |name: &str| -> i64 {
        caps.name(name)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(0)
    };
    let seconds_frac: f64 = caps
        .name("seconds")
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);

    let days = field("years") * 365 + field("months") * 30 + field("days");
    let mut total = chrono::Duration::days(days)
        + chrono::Duration::hours(field("hours"))
        + chrono::Duration::minutes(field("minutes"));
    total = total + chrono::Duration::milliseconds((seconds_frac * 1000.0).round() as i64);
    Ok(total)
}

/// Reinterpret a [`NaiveDateTime`] as `Utc` purely so it can be compared or
/// formatted through `chrono`'s `TimeZone`-generic helpers, matching the
/// spec's treatment of all timestamps as naive (no timezone conversion is
/// ever performed on request data).
///
#[allow(dead_code)]
fn as_utc(dt: NaiveDateTime) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_coercion_lowercases_and_defaults_empty() {
        assert_eq!(
            DataType::Str.coerce(Some("HeLLo")).unwrap(),
            TypedValue::Str("hello".to_string()),
        );
        assert_eq!(
            DataType::Str.coerce(None).unwrap(),
            TypedValue::Str(String::new()),
        );
    }

    #[test]
    fn int_coercion_sentinels_empty_to_minimum() {
        assert_eq!(DataType::Int.coerce(Some("")).unwrap(), TypedValue::Int(i64::MIN));
        assert_eq!(DataType::Int.coerce(Some("42")).unwrap(), TypedValue::Int(42));
        assert!(DataType::Int.coerce(Some("nope")).is_err());
    }

    #[test]
    fn datetime_sentinel_is_year_one() {
        assert_eq!(
            DataType::DateTime.coerce(Some("")).unwrap(),
            TypedValue::DateTime(min_datetime()),
        );
        let dt = DataType::DateTime.coerce(Some("2016-05-01")).unwrap();
        let later = DataType::DateTime.coerce(Some("2020-01-01")).unwrap();
        assert_eq!(dt.compare(&later), Ordering::Less);
    }

    #[test]
    fn duration_adds_to_fixed_epoch() {
        let d = DataType::Duration.coerce(Some("P1Y")).unwrap();
        if let TypedValue::DateTime(dt) = d {
            assert!(dt > *DURATION_EPOCH);
        } else {
            panic!("expected DateTime");
        }
    }

    #[test]
    fn comparing_mismatched_variants_panics() {
        let a = TypedValue::Str("x".to_string());
        let b = TypedValue::Int(1);
        let result = std::panic::catch_unwind(|| a.compare(&b));
        assert!(result.is_err());
    }
}
