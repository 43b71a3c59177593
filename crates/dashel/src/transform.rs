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

//! Per-chart data transformation: derived columns, filters, grouped and
//! ungrouped aggregation, multi-key stable sort, and row limit, applied
//! strictly in that order. Pure apart from diagnostic logging.

use crate::expression::{coerce_f64, render_string, Expression};
use chart_contracts::{
    AggregateFunction, Aggregation, DataRow, DataTransformSpec, FilterCondition, FilterOperator,
    SortDirection,
};
use indexmap::IndexMap;
use itertools::Itertools;
use serde_json::Value;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Separator for composite group keys; control character so that column
/// values cannot collide with it.
const GROUP_KEY_SEPARATOR: char = '\u{1f}';

pub fn apply_transform(rows: &[DataRow], spec: &DataTransformSpec) -> Vec<DataRow> {
    let mut rows: Vec<DataRow> = rows.to_vec();

    for transform in &spec.column_transforms {
        let expression = Expression::parse(&transform.expression);
        let target = transform.target_column();
        let mut failures = 0usize;
        for row in &mut rows {
            let value = match expression.evaluate(row) {
                Ok(value) => value,
                Err(_) => {
                    failures += 1;
                    Value::Null
                }
            };
            row.insert(target.to_string(), value);
        }
        if failures > 0 {
            warn!(
                column = target,
                expression = %transform.expression,
                failures,
                "expression failed for some rows; cells set to null"
            );
        }
    }

    if !spec.filters.is_empty() {
        rows.retain(|row| spec.filters.iter().all(|filter| filter_matches(row, filter)));
    }

    if !spec.aggregations.is_empty() {
        rows = match &spec.group_by_columns {
            None => vec![aggregate_partition(&rows, &spec.aggregations, &[])],
            Some(group_columns) if group_columns.is_empty() => {
                vec![aggregate_partition(&rows, &spec.aggregations, &[])]
            }
            Some(group_columns) => {
                let mut partitions: IndexMap<String, Vec<DataRow>> = IndexMap::new();
                for row in rows {
                    let key = group_columns
                        .iter()
                        .map(|column| render_string(row.get(column).unwrap_or(&Value::Null)))
                        .join(&GROUP_KEY_SEPARATOR.to_string());
                    partitions.entry(key).or_default().push(row);
                }
                debug!(partitions = partitions.len(), "grouped aggregation");
                partitions
                    .into_values()
                    .map(|partition| {
                        aggregate_partition(&partition, &spec.aggregations, group_columns)
                    })
                    .collect()
            }
        };
    }

    if !spec.order_by.is_empty() {
        rows.sort_by(|a, b| {
            for key in &spec.order_by {
                let ordering = compare_cells(
                    a.get(&key.column).unwrap_or(&Value::Null),
                    b.get(&key.column).unwrap_or(&Value::Null),
                );
                let ordering = match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    if let Some(limit) = spec.limit {
        rows.truncate(limit);
    }

    rows
}

/// One aggregate row for a partition. Group-by column values are
/// re-attached from the partition's first row, preserving their original
/// scalar type.
fn aggregate_partition(
    partition: &[DataRow],
    aggregations: &[Aggregation],
    group_columns: &[String],
) -> DataRow {
    let mut out = DataRow::new();
    if let Some(first) = partition.first() {
        for column in group_columns {
            out.insert(
                column.clone(),
                first.get(column).cloned().unwrap_or(Value::Null),
            );
        }
    }
    for aggregation in aggregations {
        out.insert(
            aggregation.output_column(),
            compute_aggregate(partition, aggregation),
        );
    }
    out
}

fn compute_aggregate(partition: &[DataRow], aggregation: &Aggregation) -> Value {
    let cells = || {
        partition
            .iter()
            .map(|row| row.get(&aggregation.column).unwrap_or(&Value::Null))
    };
    // Numeric functions coerce and silently drop non-numeric cells.
    let numbers = || cells().filter_map(coerce_f64).collect::<Vec<f64>>();

    match aggregation.function {
        AggregateFunction::Count => Value::from(partition.len() as u64),
        AggregateFunction::Sum => number_or_null(numbers().iter().sum()),
        AggregateFunction::Avg => {
            let values = numbers();
            if values.is_empty() {
                Value::from(0.0)
            } else {
                number_or_null(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        AggregateFunction::Min => numbers()
            .into_iter()
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
            .map_or(Value::Null, number_or_null),
        AggregateFunction::Max => numbers()
            .into_iter()
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
            .map_or(Value::Null, number_or_null),
        AggregateFunction::CountDistinct => {
            let distinct = cells()
                .filter(|v| !v.is_null())
                .map(render_string)
                .unique()
                .count();
            Value::from(distinct as u64)
        }
        AggregateFunction::Median => percentile_of(&mut numbers(), 50.0),
        AggregateFunction::Percentile => {
            let rank = aggregation.percentile.unwrap_or(50.0).clamp(0.0, 100.0);
            percentile_of(&mut numbers(), rank)
        }
        AggregateFunction::Mode => mode_of(partition, &aggregation.column),
        AggregateFunction::Std | AggregateFunction::Variance => {
            let values = numbers();
            if values.is_empty() {
                return Value::Null;
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            // Population formula, not sample.
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            match aggregation.function {
                AggregateFunction::Variance => number_or_null(variance),
                _ => number_or_null(variance.sqrt()),
            }
        }
    }
}

/// Ascending sort with linear interpolation between ranks.
fn percentile_of(values: &mut [f64], rank: f64) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    if values.len() == 1 {
        return number_or_null(values[0]);
    }
    let position = rank / 100.0 * (values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return number_or_null(values[lower]);
    }
    let weight = position - lower as f64;
    number_or_null(values[lower] * (1.0 - weight) + values[upper] * weight)
}

/// Highest-frequency value; ties keep the first-seen one. Returns the
/// original scalar, not its string rendering.
fn mode_of(partition: &[DataRow], column: &str) -> Value {
    let mut counts: IndexMap<String, (Value, usize)> = IndexMap::new();
    for row in partition {
        let cell = row.get(column).unwrap_or(&Value::Null);
        if cell.is_null() {
            continue;
        }
        let entry = counts
            .entry(render_string(cell))
            .or_insert_with(|| (cell.clone(), 0));
        entry.1 += 1;
    }
    // Strictly-greater comparison in insertion order keeps the first-seen
    // value on tied frequencies.
    counts
        .into_values()
        .fold(None, |best: Option<(Value, usize)>, candidate| match best {
            Some((_, count)) if candidate.1 > count => Some(candidate),
            Some(best) => Some(best),
            None => Some(candidate),
        })
        .map_or(Value::Null, |(value, _)| value)
}

fn number_or_null(n: f64) -> Value {
    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
}

fn filter_matches(row: &DataRow, filter: &FilterCondition) -> bool {
    let cell = row.get(&filter.column).unwrap_or(&Value::Null);
    match filter.operator {
        FilterOperator::IsNull => cell.is_null(),
        FilterOperator::IsNotNull => !cell.is_null(),
        FilterOperator::Equals => loose_eq(cell, &filter.value),
        FilterOperator::NotEquals => !loose_eq(cell, &filter.value),
        FilterOperator::GreaterThan => match (coerce_f64(cell), coerce_f64(&filter.value)) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
        FilterOperator::LessThan => match (coerce_f64(cell), coerce_f64(&filter.value)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        },
        FilterOperator::Contains => {
            render_string(cell).contains(&render_string(&filter.value))
        }
        FilterOperator::NotContains => {
            !render_string(cell).contains(&render_string(&filter.value))
        }
        FilterOperator::In => in_set(cell, &filter.value),
        FilterOperator::NotIn => !in_set(cell, &filter.value),
    }
}

fn in_set(cell: &Value, candidates: &Value) -> bool {
    match candidates {
        Value::Array(items) => items.iter().any(|item| loose_eq(cell, item)),
        // A scalar set degenerates to equality.
        other => loose_eq(cell, other),
    }
}

/// Equality the way loosely typed upstream data expects it: numeric when
/// both sides coerce, string rendering otherwise.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return a.is_null() && b.is_null();
    }
    match (coerce_f64(a), coerce_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => render_string(a) == render_string(b),
    }
}

/// Numeric comparison when both cells coerce, lexical otherwise. Nulls
/// render as the empty string and therefore sort first ascending.
fn compare_cells(a: &Value, b: &Value) -> Ordering {
    match (coerce_f64(a), coerce_f64(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => render_string(a).cmp(&render_string(b)),
    }
}
