// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Conversions between backend names (`@WIDGET_ID`, `GET_widgets`) and wire names (`widgetId`,
//! `widgets`).

/// HTTP verbs that may prefix a REST-exposed routine name.
pub const VERB_PREFIXES: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];

/// Upper-cases the value, inserting `_` wherever an upper-case character follows a lower-case
/// one: `widgetId` becomes `WIDGET_ID`.
pub fn to_underscore(value: &str) -> String {
    let mut result = String::with_capacity(value.len() + 4);
    let mut previous_lower = false;

    for c in value.chars() {
        if previous_lower && c.is_uppercase() {
            result.push('_');
        }
        result.extend(c.to_uppercase());
        previous_lower = c.is_lowercase();
    }

    result
}

/// Drops underscores and lower-cases everything except the character following an underscore:
/// `WIDGET_ID` becomes `widgetId`. The first character is always lower-case.
pub fn to_camel(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut previous_underscore = true;

    for (index, c) in value.chars().enumerate() {
        if c == '_' {
            previous_underscore = true;
            continue;
        }

        if previous_underscore && index != 0 {
            result.extend(c.to_uppercase());
        } else {
            result.extend(c.to_lowercase());
        }
        previous_underscore = false;
    }

    result
}

/// `@WIDGET_ID` -> `widgetId`
pub fn to_json_name(value: &str) -> String {
    to_camel(value.strip_prefix('@').unwrap_or(value))
}

/// `widgetId` -> `@WIDGET_ID`
pub fn to_sql_name(value: &str) -> String {
    if value.starts_with('@') {
        to_underscore(value)
    } else {
        to_underscore(&format!("@{value}"))
    }
}

/// The endpoint name of a routine: `GET_widgets` -> `widgets`. Names without a verb prefix are
/// only camel-cased.
pub fn from_sql_procedure_name(value: &str) -> String {
    to_camel(strip_verb_prefix(value).map_or(value, |(_, rest)| rest))
}

/// Splits `GET_widgets` into `("GET", "widgets")`. Verbs are matched in upper case only.
pub fn strip_verb_prefix(value: &str) -> Option<(&'static str, &str)> {
    let (prefix, rest) = value.split_once('_')?;

    VERB_PREFIXES
        .iter()
        .find(|verb| **verb == prefix)
        .map(|verb| (*verb, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underscore() {
        assert_eq!(to_underscore("widgetId"), "WIDGET_ID");
        assert_eq!(to_underscore("@widgetId"), "@WIDGET_ID");
        assert_eq!(to_underscore("WIDGET_ID"), "WIDGET_ID");
        assert_eq!(to_underscore("GET_widgetColors"), "GET_WIDGET_COLORS");
        assert_eq!(to_underscore("aBC"), "A_BC");
        assert_eq!(to_underscore(""), "");
    }

    #[test]
    fn camel() {
        assert_eq!(to_camel("WIDGET_ID"), "widgetId");
        assert_eq!(to_camel("_WIDGET"), "Widget");
        assert_eq!(to_camel("WIDGET__ID_"), "widgetId");
        assert_eq!(to_camel("Widgets"), "widgets");
        assert_eq!(to_camel(""), "");
    }

    #[test]
    fn parameter_names() {
        assert_eq!(to_json_name("@WIDGET_ID"), "widgetId");
        assert_eq!(to_json_name("@RETURN_VALUE"), "returnValue");
        assert_eq!(to_sql_name("widgetId"), "@WIDGET_ID");
        assert_eq!(to_sql_name("@WIDGET_ID"), "@WIDGET_ID");
        assert_eq!(to_sql_name("color"), "@COLOR");
    }

    #[test]
    fn json_names_are_stable_through_sql_names() {
        for name in [
            "@WIDGET_ID",
            "@COLOR",
            "widgetId",
            "widget2Id",
            "@WIDGET_COLOR_ID",
            "messageResult",
            "x",
        ] {
            let json = to_json_name(name);
            assert_eq!(to_json_name(&to_sql_name(&json)), json, "{name}");
        }
    }

    #[test]
    fn procedure_names() {
        assert_eq!(from_sql_procedure_name("GET_widgets"), "widgets");
        assert_eq!(from_sql_procedure_name("DELETE_WIDGET_COLORS"), "widgetColors");
        assert_eq!(from_sql_procedure_name("post_widget"), "postWidget");
        assert_eq!(from_sql_procedure_name("widgets"), "widgets");
        assert_eq!(from_sql_procedure_name("LIST_WIDGETS"), "listWidgets");
    }

    #[test]
    fn verb_prefix() {
        assert_eq!(strip_verb_prefix("GET_widgets"), Some(("GET", "widgets")));
        assert_eq!(strip_verb_prefix("PUT_widget"), Some(("PUT", "widget")));
        assert_eq!(strip_verb_prefix("put_widget"), None);
        assert_eq!(strip_verb_prefix("get_widgets"), None);
        assert_eq!(strip_verb_prefix("Get_widgets"), None);
        assert_eq!(strip_verb_prefix("PATCH_widget"), None);
        assert_eq!(strip_verb_prefix("widgets"), None);
    }
}
