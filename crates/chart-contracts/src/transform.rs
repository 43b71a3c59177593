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

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    NotContains,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub column: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    CountDistinct,
    Median,
    Mode,
    Std,
    Variance,
    Percentile,
}

impl AggregateFunction {
    /// Label used to derive the output column name when no alias is given,
    /// e.g. `sum_Sales`.
    pub fn label(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Count => "count",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::CountDistinct => "count_distinct",
            AggregateFunction::Median => "median",
            AggregateFunction::Mode => "mode",
            AggregateFunction::Std => "std",
            AggregateFunction::Variance => "variance",
            AggregateFunction::Percentile => "percentile",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    /// May be empty for row-counting functions that need no input column.
    #[serde(default)]
    pub column: String,
    pub function: AggregateFunction,
    #[serde(default)]
    pub alias: Option<String>,
    /// Percentile rank in `[0, 100]`; only read by
    /// [`AggregateFunction::Percentile`].
    #[serde(default)]
    pub percentile: Option<f64>,
}

impl Aggregation {
    pub fn output_column(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            // A bare row count has no column to suffix with.
            None if self.column.is_empty() => self.function.label().to_string(),
            None => format!("{}_{}", self.function.label(), self.column),
        }
    }
}

/// A derived column: the expression is evaluated per row by the expression
/// engine and stored under `alias`, falling back to `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnTransform {
    pub name: String,
    pub expression: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl ColumnTransform {
    pub fn target_column(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// The full per-chart transform. Stages apply strictly in declaration
/// order: column transforms, filters, aggregation, sort, limit. Every
/// section defaults to a no-op when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataTransformSpec {
    #[serde(default)]
    pub column_transforms: Vec<ColumnTransform>,
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    #[serde(default)]
    pub group_by_columns: Option<Vec<String>>,
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
    #[serde(default)]
    pub order_by: Vec<SortKey>,
    #[serde(default)]
    pub limit: Option<usize>,
}
