// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::value::ValueKind;

/// Declared type of a parameter as named by the catalog routine.
///
/// Names outside the supported set are kept as [`DataType::Unsupported`] so that the catalog
/// still loads; such parameters fail once a backend parameter is built for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    BigInt,
    Int,
    SmallInt,
    TinyInt,
    Bit,
    Char,
    VarChar,
    NChar,
    NVarChar,
    SmallDateTime,
    Date,
    DateTime,
    DateTime2,
    Time,
    DateTimeOffset,
    Numeric,
    Decimal,
    UniqueIdentifier,
    Unsupported(String),
}

impl DataType {
    pub fn as_str(&self) -> &str {
        match self {
            DataType::BigInt => "bigint",
            DataType::Int => "int",
            DataType::SmallInt => "smallint",
            DataType::TinyInt => "tinyint",
            DataType::Bit => "bit",
            DataType::Char => "char",
            DataType::VarChar => "varchar",
            DataType::NChar => "nchar",
            DataType::NVarChar => "nvarchar",
            DataType::SmallDateTime => "smalldatetime",
            DataType::Date => "date",
            DataType::DateTime => "datetime",
            DataType::DateTime2 => "datetime2",
            DataType::Time => "time",
            DataType::DateTimeOffset => "datetimeoffset",
            DataType::Numeric => "numeric",
            DataType::Decimal => "decimal",
            DataType::UniqueIdentifier => "uniqueidentifier",
            DataType::Unsupported(name) => name,
        }
    }

    /// The kind of value a parameter of this type holds. `None` for unsupported types.
    pub fn value_kind(&self) -> Option<ValueKind> {
        Some(match self {
            DataType::BigInt | DataType::Int | DataType::SmallInt | DataType::TinyInt => {
                ValueKind::Int
            }
            DataType::Bit => ValueKind::Bool,
            DataType::Char | DataType::VarChar | DataType::NChar | DataType::NVarChar => {
                ValueKind::Text
            }
            DataType::Date => ValueKind::Date,
            DataType::Time => ValueKind::Time,
            DataType::SmallDateTime | DataType::DateTime | DataType::DateTime2 => {
                ValueKind::DateTime
            }
            DataType::DateTimeOffset => ValueKind::DateTimeOffset,
            DataType::Numeric | DataType::Decimal => ValueKind::Decimal,
            DataType::UniqueIdentifier => ValueKind::Guid,
            DataType::Unsupported(_) => return None,
        })
    }

    /// Inclusive range representable by an integer type.
    pub fn integer_bounds(&self) -> Option<(i64, i64)> {
        match self {
            DataType::BigInt => Some((i64::MIN, i64::MAX)),
            DataType::Int => Some((i32::MIN.into(), i32::MAX.into())),
            DataType::SmallInt => Some((i16::MIN.into(), i16::MAX.into())),
            DataType::TinyInt => Some((0, 255)),
            _ => None,
        }
    }
}

impl From<String> for DataType {
    fn from(name: String) -> Self {
        match name.to_lowercase().as_str() {
            "bigint" => DataType::BigInt,
            "int" => DataType::Int,
            "smallint" => DataType::SmallInt,
            "tinyint" => DataType::TinyInt,
            "bit" => DataType::Bit,
            "char" => DataType::Char,
            "varchar" => DataType::VarChar,
            "nchar" => DataType::NChar,
            "nvarchar" => DataType::NVarChar,
            "smalldatetime" => DataType::SmallDateTime,
            "date" => DataType::Date,
            "datetime" => DataType::DateTime,
            "datetime2" => DataType::DateTime2,
            "time" => DataType::Time,
            "datetimeoffset" => DataType::DateTimeOffset,
            "numeric" => DataType::Numeric,
            "decimal" => DataType::Decimal,
            "uniqueidentifier" => DataType::UniqueIdentifier,
            _ => DataType::Unsupported(name),
        }
    }
}

impl From<DataType> for String {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::Unsupported(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
