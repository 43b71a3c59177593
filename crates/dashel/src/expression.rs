// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! The restricted expression grammar used by derived columns:
//! `CAST(expr AS type)`, `REPLACE(expr, "search", "replacement")`,
//! column references, numeric/string literals, and binary division.
//!
//! Parsing is infallible: anything the grammar does not recognise falls
//! back to a plain token, which resolves as a column when the row has the
//! key and as a literal otherwise. Evaluation failures are values, not
//! panics; the data transformer maps them to null cells per row.

use chart_contracts::DataRow;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("value '{0}' is not numeric")]
    NonNumeric(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("numeric result is not finite")]
    NotFinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastTarget {
    Float,
    Int,
    Text,
}

impl CastTarget {
    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "float" | "double" | "decimal" | "number" => Some(CastTarget::Float),
            "int" | "integer" | "bigint" => Some(CastTarget::Int),
            "string" | "text" | "varchar" => Some(CastTarget::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Cast {
        inner: Box<Expression>,
        target: CastTarget,
    },
    Replace {
        inner: Box<Expression>,
        search: String,
        replacement: String,
    },
    Divide {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Column reference when the row has the key, literal otherwise.
    Token(String),
}

impl Expression {
    pub fn parse(input: &str) -> Self {
        parse_expr(input.trim())
    }

    pub fn evaluate(&self, row: &DataRow) -> std::result::Result<Value, EvalError> {
        match self {
            Expression::Token(token) => Ok(resolve_token(token, row)),
            Expression::Cast { inner, target } => {
                let value = inner.evaluate(row)?;
                match target {
                    CastTarget::Float => {
                        let n = coerce_f64(&value)
                            .ok_or_else(|| EvalError::NonNumeric(render_string(&value)))?;
                        number_value(n)
                    }
                    CastTarget::Int => {
                        let n = coerce_f64(&value)
                            .ok_or_else(|| EvalError::NonNumeric(render_string(&value)))?;
                        Ok(Value::from(n.trunc() as i64))
                    }
                    CastTarget::Text => Ok(Value::String(render_string(&value))),
                }
            }
            Expression::Replace {
                inner,
                search,
                replacement,
            } => {
                let value = inner.evaluate(row)?;
                Ok(Value::String(
                    render_string(&value).replace(search.as_str(), replacement),
                ))
            }
            Expression::Divide { left, right } => {
                let lhs = left.evaluate(row)?;
                let rhs = right.evaluate(row)?;
                let numerator =
                    coerce_f64(&lhs).ok_or_else(|| EvalError::NonNumeric(render_string(&lhs)))?;
                let denominator =
                    coerce_f64(&rhs).ok_or_else(|| EvalError::NonNumeric(render_string(&rhs)))?;
                if denominator == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                number_value(numerator / denominator)
            }
        }
    }
}

fn parse_expr(input: &str) -> Expression {
    let input = input.trim();
    if let Some(inner) = call_body(input, "CAST") {
        if let Some((expr, target)) = split_cast_body(inner) {
            return Expression::Cast {
                inner: Box::new(parse_expr(expr)),
                target,
            };
        }
    }
    if let Some(inner) = call_body(input, "REPLACE") {
        let args = split_top_level(inner, ',');
        if args.len() == 3 {
            return Expression::Replace {
                inner: Box::new(parse_expr(args[0])),
                search: unquote(args[1].trim()).to_string(),
                replacement: unquote(args[2].trim()).to_string(),
            };
        }
    }
    let segments = split_top_level(input, '/');
    if segments.len() > 1 {
        // Left-associative: a / b / c folds as (a / b) / c.
        let mut expr = parse_expr(segments[0]);
        for segment in &segments[1..] {
            expr = Expression::Divide {
                left: Box::new(expr),
                right: Box::new(parse_expr(segment)),
            };
        }
        return expr;
    }
    Expression::Token(unquote(input).to_string())
}

/// If `input` is exactly `NAME( ... )` (case-insensitive, balanced parens),
/// returns the body between the outer parentheses.
fn call_body<'a>(input: &'a str, name: &str) -> Option<&'a str> {
    if input.len() < name.len() + 2 || !input[..name.len()].eq_ignore_ascii_case(name) {
        return None;
    }
    let rest = &input[name.len()..];
    if !rest.starts_with('(') || !rest.ends_with(')') {
        return None;
    }
    let body = &rest[1..rest.len() - 1];
    // Reject e.g. `CAST(a) AS x (b)` where the first paren closes early.
    let mut depth = 0i32;
    for ch in body.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then_some(body)
}

/// Splits a CAST body on its last top-level ` AS ` keyword.
fn split_cast_body(body: &str) -> Option<(&str, CastTarget)> {
    let bytes = body.as_bytes();
    let mut depth = 0i32;
    let mut split_at = None;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {}
        }
        if depth == 0 && i + 4 <= bytes.len() && bytes[i..i + 4].eq_ignore_ascii_case(b" AS ") {
            split_at = Some(i);
        }
    }
    let at = split_at?;
    let target = CastTarget::from_label(&body[at + 4..])?;
    Some((&body[..at], target))
}

/// Splits on a separator, ignoring occurrences inside parentheses or
/// quoted strings. Returns a single segment when the separator never
/// appears at the top level.
fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '(' => depth += 1,
                ')' => depth -= 1,
                _ if ch == separator && depth == 0 => {
                    segments.push(&input[start..i]);
                    start = i + ch.len_utf8();
                }
                _ => {}
            },
        }
    }
    segments.push(&input[start..]);
    segments
}

fn unquote(input: &str) -> &str {
    let input = input.trim();
    if input.len() >= 2 {
        let bytes = input.as_bytes();
        if (bytes[0] == b'"' && bytes[input.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[input.len() - 1] == b'\'')
        {
            return &input[1..input.len() - 1];
        }
    }
    input
}

fn resolve_token(token: &str, row: &DataRow) -> Value {
    if let Some(value) = row.get(token) {
        return value.clone();
    }
    if let Ok(n) = token.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = token.parse::<f64>() {
        if n.is_finite() {
            return Value::from(n);
        }
    }
    Value::String(token.to_string())
}

fn number_value(n: f64) -> std::result::Result<Value, EvalError> {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or(EvalError::NotFinite)
}

/// Numeric coercion shared with the data transformer. Strings are trimmed
/// and stripped of currency/thousands punctuation before parsing; booleans
/// count as 0/1; null and non-scalars fail.
pub(crate) fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches(['$', '€', '£'])
                .chars()
                .filter(|c| *c != ',')
                .collect();
            cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// The string rendering used for comparisons, grouping keys, and REPLACE.
pub(crate) fn render_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> DataRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_column_lookup_beats_literal() {
        let r = row(&[("Sales", json!(42))]);
        assert_eq!(Expression::parse("Sales").evaluate(&r).unwrap(), json!(42));
        assert_eq!(
            Expression::parse("Revenue").evaluate(&r).unwrap(),
            json!("Revenue")
        );
        assert_eq!(Expression::parse("3.5").evaluate(&r).unwrap(), json!(3.5));
    }

    #[test]
    fn test_cast_to_int_truncates() {
        let r = row(&[("Price", json!("12.9"))]);
        let value = Expression::parse("CAST(Price AS int)").evaluate(&r).unwrap();
        assert_eq!(value, json!(12));
    }

    #[test]
    fn test_cast_non_numeric_fails() {
        let r = row(&[("Name", json!("widget"))]);
        assert_eq!(
            Expression::parse("CAST(Name AS float)").evaluate(&r),
            Err(EvalError::NonNumeric("widget".to_string()))
        );
    }

    #[test]
    fn test_replace_is_global() {
        let r = row(&[("Amount", json!("1,200,300"))]);
        let value = Expression::parse(r#"REPLACE(Amount, ",", "")"#)
            .evaluate(&r)
            .unwrap();
        assert_eq!(value, json!("1200300"));
    }

    #[test]
    fn test_nested_cast_replace_division() {
        let r = row(&[("Revenue", json!("$1,000")), ("Units", json!(8))]);
        let expr = Expression::parse(r#"CAST(REPLACE(Revenue, "$", "") AS float) / Units"#);
        assert_eq!(expr.evaluate(&r).unwrap(), json!(125.0));
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        let r = row(&[("Sales", json!(10)), ("Count", json!(0))]);
        assert_eq!(
            Expression::parse("Sales / Count").evaluate(&r),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn test_division_is_left_associative() {
        let r = DataRow::new();
        assert_eq!(
            Expression::parse("100 / 5 / 2").evaluate(&r).unwrap(),
            json!(10.0)
        );
    }

    #[test]
    fn test_slash_inside_quotes_is_not_division() {
        let r = row(&[("Path", json!("a/b"))]);
        let value = Expression::parse(r#"REPLACE(Path, "/", "-")"#).evaluate(&r).unwrap();
        assert_eq!(value, json!("a-b"));
    }

    #[test]
    fn test_malformed_call_degrades_to_literal() {
        let r = DataRow::new();
        let value = Expression::parse("CAST(x AS hologram)").evaluate(&r).unwrap();
        assert_eq!(value, json!("CAST(x AS hologram)"));
    }
}
