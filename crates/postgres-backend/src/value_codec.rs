// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use bytes::BytesMut;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use pg_bigdecimal::{BigDecimal, PgNumeric};
use procedure_core::{BackendError, Value};
use tokio_postgres::{
    Row,
    types::{FromSql, IsNull, ToSql, Type, to_sql_checked},
};
use uuid::Uuid;

type BoxedError = Box<dyn std::error::Error + Sync + Send>;

/// A parameter value encoded for the type PostgreSQL expects at its placeholder.
#[derive(Debug)]
pub(crate) struct PgValue<'a>(pub &'a Value);

impl ToSql for PgValue<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(value) => value.to_sql(ty, out),
            Value::Int(value) => match *ty {
                Type::INT2 => i16::try_from(*value)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*value)?.to_sql(ty, out),
                Type::NUMERIC => numeric(BigDecimal::from(*value)).to_sql(ty, out),
                Type::BOOL => (*value != 0).to_sql(ty, out),
                _ => value.to_sql(ty, out),
            },
            Value::Text(value) => value.as_str().to_sql(ty, out),
            Value::Decimal(value) => numeric(value.clone()).to_sql(ty, out),
            Value::Date(value) => value.to_sql(ty, out),
            Value::Time(value) => value.to_sql(ty, out),
            Value::DateTime(value) => value.to_sql(ty, out),
            Value::DateTimeOffset(value) => value.to_sql(ty, out),
            Value::Guid(value) => value.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn numeric(value: BigDecimal) -> PgNumeric {
    PgNumeric { n: Some(value) }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, index: usize) -> Result<Option<T>, BackendError> {
    row.try_get::<_, Option<T>>(index)
        .map_err(|e| BackendError::Decode(format!("Column {index}: {e}")))
}

/// Reads column `index` of `row` as a [`Value`].
pub(crate) fn decode(row: &Row, index: usize) -> Result<Value, BackendError> {
    let ty = row
        .columns()
        .get(index)
        .map(|column| column.type_().clone())
        .ok_or_else(|| BackendError::Decode(format!("No column {index}")))?;

    let value = match ty {
        Type::BOOL => get::<bool>(row, index)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, index)?.map(|v| Value::Int(v.into())),
        Type::INT4 => get::<i32>(row, index)?.map(|v| Value::Int(v.into())),
        Type::INT8 => get::<i64>(row, index)?.map(Value::Int),
        Type::FLOAT4 => get::<f32>(row, index)?.map(|v| float(v.into())),
        Type::FLOAT8 => get::<f64>(row, index)?.map(float),
        Type::NUMERIC => get::<PgNumeric>(row, index)?.map(|v| match v.n {
            Some(n) => Value::Decimal(n),
            None => Value::Text("NaN".to_string()),
        }),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            get::<String>(row, index)?.map(Value::Text)
        }
        Type::JSON | Type::JSONB => {
            get::<serde_json::Value>(row, index)?.map(|v| Value::Text(v.to_string()))
        }
        Type::DATE => get::<NaiveDate>(row, index)?.map(Value::Date),
        Type::TIME => get::<NaiveTime>(row, index)?.map(Value::Time),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, index)?.map(Value::DateTime),
        Type::TIMESTAMPTZ => get::<DateTime<FixedOffset>>(row, index)?.map(Value::DateTimeOffset),
        Type::UUID => get::<Uuid>(row, index)?.map(Value::Guid),
        other => {
            return Err(BackendError::Decode(format!(
                "Unsupported column type {other}"
            )));
        }
    };

    Ok(value.unwrap_or(Value::Null))
}

fn float(value: f64) -> Value {
    value
        .to_string()
        .parse::<BigDecimal>()
        .map(Value::Decimal)
        .unwrap_or_else(|_| Value::Text(value.to_string()))
}
