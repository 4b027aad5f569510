// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use procedure_core::{CallDescriptor, StorageType};

/// The SQL for one routine invocation and which parameters feed its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CallStatement {
    pub sql: String,
    /// Indexes into the descriptor's parameters, in placeholder order (`$1`, `$2`, ...).
    pub inputs: Vec<usize>,
}

impl CallStatement {
    pub fn new(call: &CallDescriptor) -> Self {
        let mut inputs = vec![];
        let mut arguments = vec![];

        for (index, parameter) in call.parameters.iter().enumerate() {
            if !parameter.direction.is_input() {
                continue;
            }
            inputs.push(index);
            arguments.push(format!(
                "{} => ${}::{}",
                quote_identifier(&argument_name(&parameter.name)),
                inputs.len(),
                type_name(&parameter.storage)
            ));
        }

        let sql = format!(
            "SELECT * FROM {}.{}({})",
            quote_identifier(&call.schema),
            quote_identifier(&call.name),
            arguments.join(", ")
        );

        Self { sql, inputs }
    }
}

/// The routine argument (and result column) name of a parameter: `@WIDGET_ID` is `widget_id`.
pub(crate) fn argument_name(parameter_name: &str) -> String {
    let name = parameter_name.trim_start_matches('@').to_lowercase();
    if name.is_empty() {
        "return_value".to_string()
    } else {
        name
    }
}

/// Pairs each output parameter with the result column carrying its value, if any.
pub(crate) fn output_columns(call: &CallDescriptor, columns: &[&str]) -> Vec<(usize, Option<usize>)> {
    call.parameters
        .iter()
        .enumerate()
        .filter(|(_, parameter)| parameter.direction.is_output())
        .map(|(index, parameter)| {
            let column_name = argument_name(&parameter.name);
            (index, columns.iter().position(|column| *column == column_name))
        })
        .collect()
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

pub(crate) fn type_name(storage: &StorageType) -> &'static str {
    match storage {
        StorageType::BigInt => "int8",
        StorageType::Int => "int4",
        // No single-byte integer in PostgreSQL
        StorageType::SmallInt | StorageType::TinyInt => "int2",
        StorageType::Bit => "bool",
        StorageType::Char { .. } | StorageType::NChar { .. } => "bpchar",
        StorageType::VarChar { .. } | StorageType::NVarChar { .. } => "varchar",
        StorageType::SmallDateTime | StorageType::DateTime | StorageType::DateTime2 { .. } => {
            "timestamp"
        }
        StorageType::Date => "date",
        StorageType::Time { .. } => "time",
        StorageType::DateTimeOffset { .. } => "timestamptz",
        StorageType::Decimal { .. } => "numeric",
        StorageType::UniqueIdentifier => "uuid",
    }
}
