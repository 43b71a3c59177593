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
use serde_json::{Map, Value};

/// The closed set of chart types the rendering collaborator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartType {
    SummaryCard,
    Bar,
    Line,
    Area,
    Pie,
    Scatter,
    Combo,
    Table,
    Heatmap,
    Funnel,
    Gauge,
    Radar,
}

impl ChartType {
    /// Lenient parse from upstream labels. Generated text is inconsistent
    /// about naming, so a handful of aliases are accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "summary-card" | "summary_card" | "scorecard" | "card" | "kpi" => {
                Some(ChartType::SummaryCard)
            }
            "bar" | "bar-chart" | "column" => Some(ChartType::Bar),
            "line" | "line-chart" => Some(ChartType::Line),
            "area" | "area-chart" => Some(ChartType::Area),
            "pie" | "donut" | "doughnut" => Some(ChartType::Pie),
            "scatter" | "scatter-plot" => Some(ChartType::Scatter),
            "combo" | "combined" => Some(ChartType::Combo),
            "table" | "data-table" | "detail-table" => Some(ChartType::Table),
            "heatmap" => Some(ChartType::Heatmap),
            "funnel" => Some(ChartType::Funnel),
            "gauge" => Some(ChartType::Gauge),
            "radar" => Some(ChartType::Radar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::SummaryCard => "summary-card",
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Area => "area",
            ChartType::Pie => "pie",
            ChartType::Scatter => "scatter",
            ChartType::Combo => "combo",
            ChartType::Table => "table",
            ChartType::Heatmap => "heatmap",
            ChartType::Funnel => "funnel",
            ChartType::Gauge => "gauge",
            ChartType::Radar => "radar",
        }
    }

    pub fn is_summary_card(&self) -> bool {
        matches!(self, ChartType::SummaryCard)
    }

    pub fn is_table(&self) -> bool {
        matches!(self, ChartType::Table)
    }

    /// Everything that is neither a summary card nor the detail table.
    pub fn is_visualization(&self) -> bool {
        !self.is_summary_card() && !self.is_table()
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" | "critical" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }
}

/// A raw, untrusted chart suggestion as decoded straight out of generated
/// text. The declared type is left as a free string and the data mapping as
/// loose JSON; promotion into a [`ChartSpec`] happens in the validator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartCandidate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", alias = "chartType", default)]
    pub chart_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data_mapping: Map<String, Value>,
    #[serde(default, alias = "confidence")]
    pub quality_score: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
}

/// Where a summary card gets its single number from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricSource {
    /// A plain column reference.
    Column(String),
    /// A derived value computed by the expression engine.
    Formula { expression: String, alias: String },
}

/// Per-chart-type data mapping. Each variant carries exactly the fields the
/// renderer needs for that type, so an incomplete mapping is unrepresentable
/// once a suggestion has passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DataMapping {
    SummaryCard {
        source: MetricSource,
    },
    Table {
        columns: Vec<String>,
        limit: usize,
    },
    /// Bar, line, and area charts: one category/time axis, any number of
    /// value series.
    CategorySeries {
        x_axis: String,
        series: Vec<String>,
    },
    Scatter {
        x_axis: String,
        y_axis: String,
    },
    Pie {
        category: String,
        values: Vec<String>,
    },
    Combo {
        x_axis: String,
        primary: String,
        secondary: Option<String>,
    },
    /// Extended chart types keep their mapping loose; validation only
    /// requires at least one non-empty key.
    Loose(Map<String, Value>),
}

impl DataMapping {
    /// The first numeric-bearing column this mapping references, if any.
    /// Scan order within a variant is fixed so fallback synthesis is
    /// deterministic.
    pub fn numeric_field(&self) -> Option<&str> {
        match self {
            DataMapping::SummaryCard {
                source: MetricSource::Column(metric),
            } => Some(metric),
            DataMapping::SummaryCard { .. } => None,
            DataMapping::CategorySeries { series, .. } => series.first().map(String::as_str),
            DataMapping::Scatter { y_axis, .. } => Some(y_axis),
            DataMapping::Pie { values, .. } => values.first().map(String::as_str),
            DataMapping::Combo { primary, .. } => Some(primary),
            DataMapping::Table { .. } | DataMapping::Loose(_) => None,
        }
    }

    /// The categorical-like column this mapping references, if any.
    pub fn categorical_field(&self) -> Option<&str> {
        match self {
            DataMapping::CategorySeries { x_axis, .. }
            | DataMapping::Scatter { x_axis, .. }
            | DataMapping::Combo { x_axis, .. } => Some(x_axis),
            DataMapping::Pie { category, .. } => Some(category),
            DataMapping::SummaryCard { .. }
            | DataMapping::Table { .. }
            | DataMapping::Loose(_) => None,
        }
    }

    /// Every column name this mapping references, in declaration order.
    /// Used when synthesizing the detail table.
    pub fn referenced_columns(&self) -> Vec<&str> {
        match self {
            DataMapping::SummaryCard { source } => match source {
                MetricSource::Column(metric) => vec![metric.as_str()],
                MetricSource::Formula { alias, .. } => vec![alias.as_str()],
            },
            DataMapping::Table { columns, .. } => {
                columns.iter().map(String::as_str).collect()
            }
            DataMapping::CategorySeries { x_axis, series } => {
                let mut cols = vec![x_axis.as_str()];
                cols.extend(series.iter().map(String::as_str));
                cols
            }
            DataMapping::Scatter { x_axis, y_axis } => vec![x_axis.as_str(), y_axis.as_str()],
            DataMapping::Pie { category, values } => {
                let mut cols = vec![category.as_str()];
                cols.extend(values.iter().map(String::as_str));
                cols
            }
            DataMapping::Combo {
                x_axis,
                primary,
                secondary,
            } => {
                let mut cols = vec![x_axis.as_str(), primary.as_str()];
                if let Some(secondary) = secondary {
                    cols.push(secondary.as_str());
                }
                cols
            }
            DataMapping::Loose(_) => Vec::new(),
        }
    }
}

/// A validated, render-ready chart specification. Immutable once built;
/// the rebalancer only ever produces new lists, never mutates in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub title: String,
    pub description: String,
    pub mapping: DataMapping,
    pub quality_score: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    /// True for charts manufactured by fallback synthesis rather than
    /// suggested upstream.
    #[serde(default)]
    pub synthesized: bool,
}
