// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::str::FromStr;

use pg_bigdecimal::BigDecimal;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    backend::{BoundParameter, Direction, StorageType},
    data_type::DataType,
    error::ProcedureError,
    naming,
    value::{FromValue, Value, ValueKind},
};

/// Name of the implicit status parameter of a `PROCEDURE`.
pub const RETURN_VALUE: &str = "@RETURN_VALUE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterMode {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
    #[serde(rename = "INOUT")]
    InOut,
}

/// A routine parameter: catalog metadata plus the value bound for one invocation.
///
/// The metadata is fixed once the catalog is loaded; only the value changes, and only through
/// setters that check it against the declared type and constraints.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    ordinal_position: i32,
    parameter_mode: ParameterMode,
    #[serde(default, deserialize_with = "yes_no")]
    is_result: bool,
    parameter_name: String,
    data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    numeric_precision: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    numeric_scale: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    character_maximum_length: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_time_precision: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    numeric_minimum_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    numeric_maximum_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    regular_expression: Option<String>,
    is_nullable: bool,

    #[serde(skip)]
    pattern: Option<Regex>,
    #[serde(skip)]
    value: Value,
}

/// Accepts `"YES"`/`"NO"` as well as booleans.
fn yes_no<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(text) => match text.to_uppercase().as_str() {
            "YES" | "TRUE" => Ok(true),
            "NO" | "FALSE" => Ok(false),
            _ => Err(serde::de::Error::custom(format!(
                "expected YES or NO, got {text}"
            ))),
        },
    }
}

impl Parameter {
    pub fn new(name: impl Into<String>, data_type: DataType, mode: ParameterMode) -> Self {
        Self {
            ordinal_position: 0,
            parameter_mode: mode,
            is_result: false,
            parameter_name: name.into(),
            data_type,
            numeric_precision: None,
            numeric_scale: None,
            character_maximum_length: None,
            date_time_precision: None,
            numeric_minimum_value: None,
            numeric_maximum_value: None,
            regular_expression: None,
            is_nullable: true,
            pattern: None,
            value: Value::Null,
        }
    }

    /// The status slot prepended to every `PROCEDURE`.
    pub fn return_value() -> Self {
        Self {
            is_result: true,
            ..Self::new(RETURN_VALUE, DataType::Int, ParameterMode::InOut)
        }
    }

    pub fn with_ordinal_position(mut self, position: i32) -> Self {
        self.ordinal_position = position;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    pub fn with_max_length(mut self, length: i32) -> Self {
        self.character_maximum_length = Some(length);
        self
    }

    pub fn with_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.numeric_minimum_value = min;
        self.numeric_maximum_value = max;
        self
    }

    pub fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.numeric_precision = Some(precision);
        self.numeric_scale = Some(scale);
        self
    }

    pub fn with_date_time_precision(mut self, precision: u8) -> Self {
        self.date_time_precision = Some(precision);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Result<Self, ProcedureError> {
        self.regular_expression = Some(pattern.into());
        self.compile_pattern()?;
        Ok(self)
    }

    /// Compiles the declared regular expression, anchored so that it must match the whole value.
    pub(crate) fn compile_pattern(&mut self) -> Result<(), ProcedureError> {
        self.pattern = match &self.regular_expression {
            Some(pattern) if !pattern.is_empty() => Some(
                Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                    ProcedureError::CatalogLoad(format!(
                        "Invalid regular expression for {}: {e}",
                        self.parameter_name
                    ))
                })?,
            ),
            _ => None,
        };
        Ok(())
    }

    /// A copy of the metadata with no value bound.
    pub fn detached(&self) -> Self {
        Self {
            ordinal_position: self.ordinal_position,
            parameter_mode: self.parameter_mode,
            is_result: self.is_result,
            parameter_name: self.parameter_name.clone(),
            data_type: self.data_type.clone(),
            numeric_precision: self.numeric_precision,
            numeric_scale: self.numeric_scale,
            character_maximum_length: self.character_maximum_length,
            date_time_precision: self.date_time_precision,
            numeric_minimum_value: self.numeric_minimum_value,
            numeric_maximum_value: self.numeric_maximum_value,
            regular_expression: self.regular_expression.clone(),
            is_nullable: self.is_nullable,
            pattern: self.pattern.clone(),
            value: Value::Null,
        }
    }

    pub fn name(&self) -> &str {
        &self.parameter_name
    }

    /// The lowerCamelCase name used on the wire.
    pub fn json_name(&self) -> String {
        naming::to_json_name(&self.parameter_name)
    }

    pub fn ordinal_position(&self) -> i32 {
        self.ordinal_position
    }

    pub fn mode(&self) -> ParameterMode {
        self.parameter_mode
    }

    pub fn is_result(&self) -> bool {
        self.is_result
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    /// Whether a value is sent to the routine.
    pub fn accepts_input(&self) -> bool {
        !self.is_result && self.parameter_mode != ParameterMode::Out
    }

    /// Whether a value is read back after execution.
    pub fn returns_output(&self) -> bool {
        self.is_result || self.parameter_mode != ParameterMode::In
    }

    pub fn raw_value(&self) -> &Value {
        &self.value
    }

    /// The bound value as `T`; `Ok(None)` when null.
    pub fn value<T: FromValue>(&self) -> Result<Option<T>, ProcedureError> {
        if self.value.is_null() {
            return Ok(None);
        }

        T::from_value(&self.value)
            .map(Some)
            .ok_or_else(|| ProcedureError::TypeMismatch {
                parameter: self.parameter_name.clone(),
                expected: std::any::type_name::<T>().to_string(),
                actual: self.value.kind(),
            })
    }

    /// Binds a value whose kind must match the declared type.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<(), ProcedureError> {
        let value = value.into();
        let expected = self.expected_kind()?;

        if !value.is_null() && value.kind() != expected {
            return Err(self.type_mismatch(expected, &value));
        }

        self.store(value)
    }

    /// Binds a value after converting it to the declared type, e.g. the text `"42"` for an `int`
    /// parameter.
    pub fn set_untyped(&mut self, value: impl Into<Value>) -> Result<(), ProcedureError> {
        let value = value.into();
        let expected = self.expected_kind()?;

        let actual = value.kind();
        let coerced = value.clone().coerce(expected).ok_or_else(|| {
            // Well-formed numbers too wide for the declared type are out of range, not malformed
            if let Value::Text(text) = &value {
                let too_wide = match expected {
                    ValueKind::Int => is_integer_literal(text),
                    ValueKind::Decimal => BigDecimal::from_str(text.trim()).is_ok(),
                    _ => false,
                };
                if too_wide {
                    return ProcedureError::OutOfRange {
                        parameter: self.parameter_name.clone(),
                    };
                }
            }
            ProcedureError::TypeMismatch {
                parameter: self.parameter_name.clone(),
                expected: expected.to_string(),
                actual,
            }
        })?;

        self.store(coerced)
    }

    fn store(&mut self, value: Value) -> Result<(), ProcedureError> {
        self.check_width(&value)?;
        self.validate(&value)?;
        self.value = value;
        Ok(())
    }

    /// Values read back from the backend are stored as reported.
    pub(crate) fn store_output(&mut self, value: Value) {
        self.value = value;
    }

    fn expected_kind(&self) -> Result<ValueKind, ProcedureError> {
        self.data_type
            .value_kind()
            .ok_or_else(|| ProcedureError::UnsupportedDataType {
                parameter: self.parameter_name.clone(),
                data_type: self.data_type.to_string(),
            })
    }

    fn type_mismatch(&self, expected: ValueKind, value: &Value) -> ProcedureError {
        ProcedureError::TypeMismatch {
            parameter: self.parameter_name.clone(),
            expected: expected.to_string(),
            actual: value.kind(),
        }
    }

    fn check_width(&self, value: &Value) -> Result<(), ProcedureError> {
        match (self.data_type.integer_bounds(), value) {
            (Some((min, max)), Value::Int(i)) if *i < min || *i > max => {
                Err(ProcedureError::OutOfRange {
                    parameter: self.parameter_name.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Checks a value against the declared constraints, in order: nullability, length, range and
    /// pattern. The first failure is reported.
    pub fn validate(&self, value: &Value) -> Result<(), ProcedureError> {
        if value.is_null() {
            return if self.is_nullable {
                Ok(())
            } else {
                Err(ProcedureError::RequiredValueMissing {
                    parameter: self.parameter_name.clone(),
                })
            };
        }

        // Length and pattern checks apply to the textual form, rendered only when one applies
        let max_length = self.character_maximum_length.filter(|l| *l > 0);
        let text = if max_length.is_some() || self.pattern.is_some() {
            value.to_string()
        } else {
            String::new()
        };

        if let Some(max_length) = max_length {
            if text.chars().count() > max_length as usize {
                return Err(ProcedureError::ValueTooLong {
                    parameter: self.parameter_name.clone(),
                    max_length,
                });
            }
        }

        if self.numeric_minimum_value.is_some() || self.numeric_maximum_value.is_some() {
            let in_range = value.as_i64().is_some_and(|v| {
                self.numeric_minimum_value.is_none_or(|min| v >= min)
                    && self.numeric_maximum_value.is_none_or(|max| v <= max)
            });
            if !in_range {
                return Err(ProcedureError::OutOfRange {
                    parameter: self.parameter_name.clone(),
                });
            }
        }

        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(&text) {
                return Err(ProcedureError::PatternMismatch {
                    parameter: self.parameter_name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Re-checks the bound value.
    pub fn validate_bound(&self) -> Result<(), ProcedureError> {
        self.validate(&self.value)
    }

    pub fn to_backend_parameter(&self) -> Result<BoundParameter, ProcedureError> {
        let size = self
            .character_maximum_length
            .filter(|l| *l > 0)
            .map(|l| l as u32);
        let scale = self.date_time_precision.unwrap_or(7);

        let storage = match &self.data_type {
            DataType::BigInt => StorageType::BigInt,
            DataType::Int => StorageType::Int,
            DataType::SmallInt => StorageType::SmallInt,
            DataType::TinyInt => StorageType::TinyInt,
            DataType::Bit => StorageType::Bit,
            DataType::Char => StorageType::Char { size },
            DataType::VarChar => StorageType::VarChar { size },
            DataType::NChar => StorageType::NChar { size },
            DataType::NVarChar => StorageType::NVarChar { size },
            DataType::SmallDateTime => StorageType::SmallDateTime,
            DataType::Date => StorageType::Date,
            DataType::DateTime => StorageType::DateTime,
            DataType::DateTime2 => StorageType::DateTime2 { scale },
            DataType::Time => StorageType::Time { scale },
            DataType::DateTimeOffset => StorageType::DateTimeOffset { scale },
            DataType::Numeric | DataType::Decimal => StorageType::Decimal {
                precision: self.numeric_precision.unwrap_or(18),
                scale: self.numeric_scale.unwrap_or(0),
            },
            DataType::UniqueIdentifier => StorageType::UniqueIdentifier,
            DataType::Unsupported(name) => {
                return Err(ProcedureError::UnsupportedDataType {
                    parameter: self.parameter_name.clone(),
                    data_type: name.clone(),
                });
            }
        };

        let direction = if self.is_result {
            Direction::ReturnValue
        } else {
            match self.parameter_mode {
                ParameterMode::In => Direction::Input,
                ParameterMode::Out => Direction::ReturnValue,
                ParameterMode::InOut => Direction::Output,
            }
        };

        Ok(BoundParameter {
            name: self.parameter_name.clone(),
            storage,
            direction,
            value: Value::Null,
        })
    }
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text.trim().trim_start_matches(['-', '+']);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pg_bigdecimal::BigDecimal;

    use super::*;

    fn widget_id() -> Parameter {
        Parameter::new("@WIDGET_ID", DataType::Int, ParameterMode::In).with_nullable(false)
    }

    #[test]
    fn null_handling() {
        let mut required = widget_id();
        assert!(matches!(
            required.set_value(Value::Null),
            Err(ProcedureError::RequiredValueMissing { .. })
        ));

        let mut optional = widget_id().with_nullable(true);
        optional.set_value(Value::Null).unwrap();
        assert_eq!(optional.value::<i32>().unwrap(), None);
    }

    #[test]
    fn typed_set_checks_kind() {
        let mut param = widget_id();
        assert!(matches!(
            param.set_value("42"),
            Err(ProcedureError::TypeMismatch { .. })
        ));
        param.set_value(42).unwrap();
        assert_eq!(param.value::<i32>().unwrap(), Some(42));
        assert!(matches!(
            param.value::<String>(),
            Err(ProcedureError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn untyped_set_coerces() {
        let mut param = widget_id();
        param.set_untyped("42").unwrap();
        assert_eq!(param.raw_value(), &Value::Int(42));

        assert!(matches!(
            param.set_untyped("forty-two"),
            Err(ProcedureError::TypeMismatch { .. })
        ));
        assert!(matches!(
            param.set_untyped("99999999999"),
            Err(ProcedureError::OutOfRange { .. })
        ));
        assert!(matches!(
            param.set_untyped("99999999999999999999999"),
            Err(ProcedureError::OutOfRange { .. })
        ));
        // Failed sets leave the previous value in place
        assert_eq!(param.value::<i32>().unwrap(), Some(42));

        let mut tiny = Parameter::new("@LEVEL", DataType::TinyInt, ParameterMode::In);
        tiny.set_untyped("255").unwrap();
        assert!(matches!(
            tiny.set_untyped("256"),
            Err(ProcedureError::OutOfRange { .. })
        ));
        assert!(matches!(
            tiny.set_value(-1),
            Err(ProcedureError::OutOfRange { .. })
        ));
    }

    #[test]
    fn oversized_decimals_fail_fast() {
        let mut amount = Parameter::new("@AMOUNT", DataType::Decimal, ParameterMode::In);
        assert!(matches!(
            amount.set_untyped("1e50000000"),
            Err(ProcedureError::OutOfRange { .. })
        ));
        assert!(matches!(
            amount.set_untyped("1e-50000000"),
            Err(ProcedureError::OutOfRange { .. })
        ));
        assert!(matches!(
            amount.set_untyped("lots"),
            Err(ProcedureError::TypeMismatch { .. })
        ));
        amount.set_untyped("12.5").unwrap();

        // Range checks on a huge bound value do not expand its digits
        let capped = Parameter::new("@AMOUNT", DataType::Decimal, ParameterMode::In)
            .with_range(None, Some(100));
        assert!(matches!(
            capped.validate(&Value::Decimal(BigDecimal::from_str("1e400000").unwrap())),
            Err(ProcedureError::OutOfRange { .. })
        ));

        let mut count = Parameter::new("@COUNT", DataType::Int, ParameterMode::In);
        assert!(matches!(
            count.set_untyped("1e50000000"),
            Err(ProcedureError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn length() {
        let mut name = Parameter::new("@NAME", DataType::NVarChar, ParameterMode::In)
            .with_max_length(5);
        name.set_value("Bolts").unwrap();
        assert!(matches!(
            name.set_value("Bolts!"),
            Err(ProcedureError::ValueTooLong { max_length: 5, .. })
        ));
        // Characters, not bytes
        name.set_value("ñañañ").unwrap();

        let mut unbounded = Parameter::new("@NOTES", DataType::NVarChar, ParameterMode::In)
            .with_max_length(-1);
        unbounded.set_value("x".repeat(10_000)).unwrap();
    }

    #[test]
    fn range() {
        let mut quantity = Parameter::new("@QUANTITY", DataType::Int, ParameterMode::In)
            .with_range(Some(1), Some(10));
        quantity.set_value(1).unwrap();
        quantity.set_value(10).unwrap();
        assert!(matches!(
            quantity.set_value(0),
            Err(ProcedureError::OutOfRange { .. })
        ));
        assert!(matches!(
            quantity.set_value(11),
            Err(ProcedureError::OutOfRange { .. })
        ));

        let mut price = Parameter::new("@PRICE", DataType::Decimal, ParameterMode::In)
            .with_precision(10, 2)
            .with_range(None, Some(100));
        price
            .set_value(BigDecimal::from_str("100.99").unwrap())
            .unwrap();
        assert!(matches!(
            price.set_value(BigDecimal::from_str("101.5").unwrap()),
            Err(ProcedureError::OutOfRange { .. })
        ));

        // A range on a value with no integer form always fails
        let code = Parameter::new("@CODE", DataType::VarChar, ParameterMode::In)
            .with_range(Some(0), None);
        assert!(matches!(
            code.validate(&Value::Text("abc".into())),
            Err(ProcedureError::OutOfRange { .. })
        ));
        code.validate(&Value::Text("12".into())).unwrap();
    }

    #[test]
    fn pattern_is_a_full_match() {
        let mut sku = Parameter::new("@SKU", DataType::VarChar, ParameterMode::In)
            .with_pattern("[A-Z]{3}-[0-9]+")
            .unwrap();
        sku.set_value("ABC-123").unwrap();
        assert!(matches!(
            sku.set_value("xABC-123"),
            Err(ProcedureError::PatternMismatch { .. })
        ));
        assert!(matches!(
            sku.set_value("ABC-123x"),
            Err(ProcedureError::PatternMismatch { .. })
        ));

        let alternatives = Parameter::new("@COLOR", DataType::VarChar, ParameterMode::In)
            .with_pattern("red|blue")
            .unwrap();
        assert!(alternatives.validate(&Value::Text("redblue".into())).is_err());
        alternatives.validate(&Value::Text("blue".into())).unwrap();

        assert!(
            Parameter::new("@BAD", DataType::VarChar, ParameterMode::In)
                .with_pattern("(")
                .is_err()
        );
    }

    #[test]
    fn validation_order() {
        let param = Parameter::new("@CODE", DataType::VarChar, ParameterMode::In)
            .with_max_length(3)
            .with_pattern("[0-9]+")
            .unwrap();
        // Too long and not matching: length is reported first
        assert!(matches!(
            param.validate(&Value::Text("abcd".into())),
            Err(ProcedureError::ValueTooLong { .. })
        ));
    }

    #[test]
    fn backend_parameter() {
        let bound = Parameter::new("@NAME", DataType::NVarChar, ParameterMode::In)
            .with_max_length(50)
            .to_backend_parameter()
            .unwrap();
        assert_eq!(bound.storage, StorageType::NVarChar { size: Some(50) });
        assert_eq!(bound.direction, Direction::Input);

        let bound = Parameter::new("@TOTAL", DataType::Numeric, ParameterMode::InOut)
            .with_precision(12, 4)
            .to_backend_parameter()
            .unwrap();
        assert_eq!(
            bound.storage,
            StorageType::Decimal {
                precision: 12,
                scale: 4
            }
        );
        assert_eq!(bound.direction, Direction::Output);

        let bound = Parameter::new("@AT", DataType::DateTimeOffset, ParameterMode::Out)
            .with_date_time_precision(3)
            .to_backend_parameter()
            .unwrap();
        assert_eq!(bound.storage, StorageType::DateTimeOffset { scale: 3 });
        assert_eq!(bound.direction, Direction::ReturnValue);

        let bound = Parameter::return_value().to_backend_parameter().unwrap();
        assert_eq!(bound.direction, Direction::ReturnValue);
        assert_eq!(bound.value, Value::Null);

        let mut unsupported = Parameter::new(
            "@SHAPE",
            DataType::Unsupported("geography".into()),
            ParameterMode::In,
        );
        assert!(matches!(
            unsupported.to_backend_parameter(),
            Err(ProcedureError::UnsupportedDataType { .. })
        ));
        assert!(matches!(
            unsupported.set_untyped("POINT(1 2)"),
            Err(ProcedureError::UnsupportedDataType { .. })
        ));
    }

    #[test]
    fn catalog_form() {
        let param: Parameter = serde_json::from_value(serde_json::json!({
            "ordinalPosition": 1,
            "parameterMode": "IN",
            "isResult": "NO",
            "parameterName": "@WIDGET_ID",
            "dataType": "int",
            "numericPrecision": 10,
            "numericScale": 0,
            "isNullable": false
        }))
        .unwrap();
        assert_eq!(param.name(), "@WIDGET_ID");
        assert_eq!(param.json_name(), "widgetId");
        assert!(!param.is_result());
        assert!(!param.is_nullable());

        let result: Parameter = serde_json::from_value(serde_json::json!({
            "ordinalPosition": 0,
            "parameterMode": "OUT",
            "isResult": true,
            "parameterName": "",
            "dataType": "int",
            "isNullable": true
        }))
        .unwrap();
        assert!(result.is_result());
        assert!(!result.accepts_input());
    }

    #[test]
    fn detached_copy_has_no_value() {
        let mut param = widget_id();
        param.set_value(7).unwrap();
        let copy = param.detached();
        assert_eq!(copy.raw_value(), &Value::Null);
        assert_eq!(copy.name(), "@WIDGET_ID");
    }
}
