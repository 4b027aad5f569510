// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use pg_bigdecimal::BigDecimal;
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// A parameter or column value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Decimal(BigDecimal),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Guid(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Text,
    Decimal,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    Guid,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Text => "text",
            ValueKind::Decimal => "decimal",
            ValueKind::Date => "date",
            ValueKind::Time => "time",
            ValueKind::DateTime => "datetime",
            ValueKind::DateTimeOffset => "datetimeoffset",
            ValueKind::Guid => "guid",
        };
        write!(f, "{name}")
    }
}

/// Widest magnitude, in digits on either side of the decimal point, accepted as a decimal.
/// Matches the largest declarable `numeric` precision.
const MAX_DECIMAL_DIGITS: i64 = 1000;

/// Digits before the decimal point, derived from the mantissa and scale without rescaling.
/// Zero or negative for magnitudes below one.
fn integer_digits(d: &BigDecimal) -> i64 {
    let (mantissa, scale) = d.as_bigint_and_exponent();
    let digits = mantissa.to_string().trim_start_matches('-').len() as i64;
    digits - scale
}

fn within_decimal_limits(d: &BigDecimal) -> bool {
    let (_, scale) = d.as_bigint_and_exponent();
    scale.abs() <= MAX_DECIMAL_DIGITS && integer_digits(d) <= MAX_DECIMAL_DIGITS
}

/// The whole part of a decimal as an integer, or `None` when it cannot fit in `i64`.
fn truncate_decimal(d: &BigDecimal) -> Option<i64> {
    match integer_digits(d) {
        digits if digits > 19 => None,
        digits if digits <= 0 => Some(0),
        _ => d.with_scale(0).to_string().parse().ok(),
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];
const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Text(_) => ValueKind::Text,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::DateTimeOffset(_) => ValueKind::DateTimeOffset,
            Value::Guid(_) => ValueKind::Guid,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value as an integer, used for range checks. Decimals truncate toward zero and text
    /// must parse as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Decimal(d) => truncate_decimal(d),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert to the given kind. `Null` converts to every kind; `None` means the value has no
    /// representation in `kind`.
    pub fn coerce(self, kind: ValueKind) -> Option<Value> {
        if self.is_null() || self.kind() == kind {
            return Some(self);
        }

        match (kind, self) {
            (ValueKind::Null, _) => None,
            (ValueKind::Text, other) => Some(Value::Text(other.to_string())),

            (ValueKind::Int, Value::Text(s)) => s.trim().parse().ok().map(Value::Int),
            (ValueKind::Int, Value::Decimal(d)) => {
                if !within_decimal_limits(&d) || integer_digits(&d) > 19 {
                    return None;
                }
                let whole = d.with_scale(0);
                if whole == d {
                    whole.to_string().parse().ok().map(Value::Int)
                } else {
                    None
                }
            }

            (ValueKind::Bool, Value::Text(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            (ValueKind::Bool, Value::Int(0)) => Some(Value::Bool(false)),
            (ValueKind::Bool, Value::Int(1)) => Some(Value::Bool(true)),

            (ValueKind::Decimal, Value::Int(i)) => Some(Value::Decimal(BigDecimal::from(i))),
            (ValueKind::Decimal, Value::Text(s)) => BigDecimal::from_str(s.trim())
                .ok()
                .filter(within_decimal_limits)
                .map(Value::Decimal),

            (ValueKind::Date, Value::Text(s)) => parse_date(s.trim()).map(Value::Date),
            (ValueKind::Date, Value::DateTime(dt)) => Some(Value::Date(dt.date())),
            (ValueKind::Date, Value::DateTimeOffset(dt)) => Some(Value::Date(dt.date_naive())),

            (ValueKind::Time, Value::Text(s)) => parse_time(s.trim()).map(Value::Time),
            (ValueKind::Time, Value::DateTime(dt)) => Some(Value::Time(dt.time())),

            (ValueKind::DateTime, Value::Text(s)) => {
                parse_date_time(s.trim()).map(Value::DateTime)
            }
            (ValueKind::DateTime, Value::Date(d)) => {
                Some(Value::DateTime(d.and_time(NaiveTime::MIN)))
            }
            (ValueKind::DateTime, Value::DateTimeOffset(dt)) => {
                Some(Value::DateTime(dt.naive_local()))
            }

            (ValueKind::DateTimeOffset, Value::Text(s)) => {
                parse_date_time_offset(s.trim()).map(Value::DateTimeOffset)
            }
            (ValueKind::DateTimeOffset, Value::DateTime(dt)) => {
                Some(Value::DateTimeOffset(dt.and_utc().into()))
            }

            (ValueKind::Guid, Value::Text(s)) => Uuid::parse_str(s.trim()).ok().map(Value::Guid),

            _ => None,
        }
    }

    /// A scalar from a JSON document. Arrays and objects have no value representation.
    pub fn from_json(json: serde_json::Value) -> Result<Value, String> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => BigDecimal::from_str(&n.to_string())
                    .map_err(|e| format!("Invalid number {n}: {e}"))
                    .and_then(|d| {
                        if within_decimal_limits(&d) {
                            Ok(Value::Decimal(d))
                        } else {
                            Err(format!("Number {n} is out of range"))
                        }
                    }),
            },
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Array(_) => Err("arrays are not supported".to_string()),
            serde_json::Value::Object(_) => Err("nested objects are not supported".to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Decimal(d) => {
                let text = d.to_string();
                serde_json::Number::from_str(&text)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::String(text))
            }
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| parse_date_time(s).map(|dt| dt.date()))
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(s, format).ok())
}

fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Offsets default to UTC when the text carries none.
fn parse_date_time_offset(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .or_else(|| parse_date_time(s).map(|dt| dt.and_utc().into()))
}

impl Display for Value {
    /// The textual form used for length and pattern checks.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            Value::DateTimeOffset(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Guid(g) => write!(f, "{g}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Typed extraction from a non-null [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

macro_rules! from_int_value {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::Int(i) => <$t>::try_from(*i).ok(),
                        _ => None,
                    }
                }
            }

            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

from_int_value!(i64, i32, i16, u8);

macro_rules! from_variant_value {
    ($($t:ty => $variant:ident),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }

            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

from_variant_value!(
    bool => Bool,
    String => Text,
    BigDecimal => Decimal,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    Uuid => Guid
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTimeOffset(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
