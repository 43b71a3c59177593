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

//! Promotion of raw candidates into validated specs.
//!
//! Converting the loose `dataMapping` JSON into the typed [`DataMapping`]
//! variant *is* the completeness check: a candidate whose mapping cannot be
//! promoted is rejected, logged, and never reaches the rebalancer.

use chart_contracts::{ChartCandidate, ChartSpec, ChartType, DataMapping, MetricSource};
use serde_json::{Map, Value};
use tracing::debug;

/// Default row cap for tables that declare none.
const DEFAULT_TABLE_LIMIT: usize = 100;

/// Validates one candidate; `index` seeds the deterministic fallback id.
/// Returns `None` (after logging the reason) rather than an error: invalid
/// candidates are expected from generated text.
pub fn validate_candidate(candidate: &ChartCandidate, index: usize) -> Option<ChartSpec> {
    let Some(chart_type) = ChartType::from_label(&candidate.chart_type) else {
        debug!(
            declared = %candidate.chart_type,
            title = %candidate.title,
            "rejecting candidate with unknown chart type"
        );
        return None;
    };
    let mapping = match promote_mapping(chart_type, &candidate.data_mapping) {
        Ok(mapping) => mapping,
        Err(reason) => {
            debug!(
                chart_type = %chart_type,
                title = %candidate.title,
                %reason,
                "rejecting candidate with incomplete data mapping"
            );
            return None;
        }
    };
    let title = if candidate.title.trim().is_empty() {
        format!("Untitled {chart_type}")
    } else {
        candidate.title.clone()
    };
    Some(ChartSpec {
        id: candidate
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("chart-{index}")),
        chart_type,
        title,
        description: candidate.description.clone(),
        mapping,
        quality_score: candidate.quality_score.clamp(0.0, 1.0),
        reasoning: candidate.reasoning.clone(),
        tags: candidate.tags.clone(),
        priority: candidate.priority,
        synthesized: false,
    })
}

fn promote_mapping(
    chart_type: ChartType,
    mapping: &Map<String, Value>,
) -> std::result::Result<DataMapping, String> {
    match chart_type {
        ChartType::SummaryCard => {
            if let Some(metric) = get_str(mapping, "metric") {
                return Ok(DataMapping::SummaryCard {
                    source: MetricSource::Column(metric),
                });
            }
            match (get_str(mapping, "formula"), get_str(mapping, "formulaAlias")) {
                (Some(expression), Some(alias)) => Ok(DataMapping::SummaryCard {
                    source: MetricSource::Formula { expression, alias },
                }),
                _ => Err("needs a metric, or a formula with formulaAlias".to_string()),
            }
        }
        ChartType::Table => {
            let columns = get_str_list(mapping, "columns");
            let columns = if columns.is_empty() {
                get_str_list(mapping, "yAxis")
            } else {
                columns
            };
            if columns.is_empty() {
                return Err("needs a non-empty columns list or a yAxis".to_string());
            }
            Ok(DataMapping::Table {
                columns,
                limit: get_usize(mapping, "limit").unwrap_or(DEFAULT_TABLE_LIMIT),
            })
        }
        ChartType::Bar | ChartType::Line | ChartType::Area => {
            let x_axis = get_str(mapping, "xAxis")
                .or_else(|| get_str(mapping, "category"))
                .ok_or_else(|| "needs an xAxis or category".to_string())?;
            let mut series = get_str_list(mapping, "yAxis");
            if series.is_empty() {
                series = get_str_list(mapping, "values");
            }
            Ok(DataMapping::CategorySeries { x_axis, series })
        }
        ChartType::Scatter => {
            let x_axis =
                get_str(mapping, "xAxis").ok_or_else(|| "needs an xAxis".to_string())?;
            let y_axis = get_str_list(mapping, "yAxis")
                .into_iter()
                .next()
                .or_else(|| get_str_list(mapping, "values").into_iter().next())
                .ok_or_else(|| "needs a yAxis or values".to_string())?;
            Ok(DataMapping::Scatter { x_axis, y_axis })
        }
        ChartType::Pie => {
            let category =
                get_str(mapping, "category").ok_or_else(|| "needs a category".to_string())?;
            let mut values = get_str_list(mapping, "values");
            if values.is_empty() {
                values = get_str_list(mapping, "yAxis");
            }
            Ok(DataMapping::Pie { category, values })
        }
        ChartType::Combo => {
            let x_axis =
                get_str(mapping, "xAxis").ok_or_else(|| "needs an xAxis".to_string())?;
            let mut series = get_str_list(mapping, "yAxis");
            if series.is_empty() {
                series = series_columns(mapping);
            }
            let mut series = series.into_iter();
            let primary = series
                .next()
                .ok_or_else(|| "needs a yAxis or a series entry".to_string())?;
            Ok(DataMapping::Combo {
                x_axis,
                primary,
                secondary: series.next(),
            })
        }
        ChartType::Heatmap | ChartType::Funnel | ChartType::Gauge | ChartType::Radar => {
            if mapping.iter().any(|(_, v)| !value_is_empty(v)) {
                Ok(DataMapping::Loose(mapping.clone()))
            } else {
                Err("needs at least one non-empty mapping key".to_string())
            }
        }
    }
}

/// A non-empty trimmed string value under `key`.
fn get_str(mapping: &Map<String, Value>, key: &str) -> Option<String> {
    match mapping.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// A list of column names under `key`; a bare string reads as a singleton.
fn get_str_list(mapping: &Map<String, Value>, key: &str) -> Vec<String> {
    match mapping.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Series entries in a combo mapping: strings, or objects with a `column`.
fn series_columns(mapping: &Map<String, Value>) -> Vec<String> {
    let Some(Value::Array(entries)) = mapping.get("series") else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Object(obj) => get_str(obj, "column").or_else(|| get_str(obj, "field")),
            _ => None,
        })
        .collect()
}

fn get_usize(mapping: &Map<String, Value>, key: &str) -> Option<usize> {
    mapping.get(key).and_then(Value::as_u64).map(|n| n as usize)
}

fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(chart_type: &str, mapping: Value) -> ChartCandidate {
        ChartCandidate {
            chart_type: chart_type.to_string(),
            title: "t".to_string(),
            data_mapping: mapping.as_object().cloned().unwrap_or_default(),
            quality_score: 0.7,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_summary_card_mapping_rejected() {
        assert!(validate_candidate(&candidate("summary-card", json!({})), 0).is_none());
    }

    #[test]
    fn test_summary_card_metric_or_formula() {
        let by_metric = validate_candidate(
            &candidate("summary-card", json!({"metric": "Revenue"})),
            0,
        )
        .unwrap();
        assert_eq!(
            by_metric.mapping,
            DataMapping::SummaryCard {
                source: MetricSource::Column("Revenue".to_string())
            }
        );

        let by_formula = validate_candidate(
            &candidate(
                "summary-card",
                json!({"formula": "Revenue / Units", "formulaAlias": "unit_price"}),
            ),
            1,
        )
        .unwrap();
        assert!(matches!(
            by_formula.mapping,
            DataMapping::SummaryCard {
                source: MetricSource::Formula { .. }
            }
        ));

        // Formula without an alias is incomplete.
        assert!(validate_candidate(
            &candidate("summary-card", json!({"formula": "Revenue / Units"})),
            2
        )
        .is_none());
    }

    #[test]
    fn test_table_accepts_columns_or_y_axis() {
        let spec = validate_candidate(
            &candidate("table", json!({"yAxis": "Sales", "limit": 25})),
            0,
        )
        .unwrap();
        assert_eq!(
            spec.mapping,
            DataMapping::Table {
                columns: vec!["Sales".to_string()],
                limit: 25
            }
        );
        assert!(validate_candidate(&candidate("table", json!({"columns": []})), 1).is_none());
    }

    #[test]
    fn test_bar_needs_axis_or_category() {
        assert!(validate_candidate(&candidate("bar", json!({"yAxis": "Sales"})), 0).is_none());
        let spec =
            validate_candidate(&candidate("bar", json!({"category": "Region"})), 1).unwrap();
        assert_eq!(
            spec.mapping,
            DataMapping::CategorySeries {
                x_axis: "Region".to_string(),
                series: vec![]
            }
        );
    }

    #[test]
    fn test_scatter_needs_both_axes() {
        assert!(validate_candidate(&candidate("scatter", json!({"xAxis": "a"})), 0).is_none());
        let spec = validate_candidate(
            &candidate("scatter", json!({"xAxis": "a", "values": ["b"]})),
            1,
        )
        .unwrap();
        assert_eq!(
            spec.mapping,
            DataMapping::Scatter {
                x_axis: "a".to_string(),
                y_axis: "b".to_string()
            }
        );
    }

    #[test]
    fn test_combo_reads_series_objects() {
        let spec = validate_candidate(
            &candidate(
                "combo",
                json!({"xAxis": "Month", "series": [{"column": "Revenue"}, {"column": "Margin"}]}),
            ),
            0,
        )
        .unwrap();
        assert_eq!(
            spec.mapping,
            DataMapping::Combo {
                x_axis: "Month".to_string(),
                primary: "Revenue".to_string(),
                secondary: Some("Margin".to_string()),
            }
        );
    }

    #[test]
    fn test_extended_type_needs_any_key() {
        assert!(validate_candidate(&candidate("heatmap", json!({})), 0).is_none());
        assert!(validate_candidate(&candidate("heatmap", json!({"cells": ""})), 1).is_none());
        assert!(validate_candidate(&candidate("heatmap", json!({"cells": "Count"})), 2).is_some());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(validate_candidate(&candidate("hologram", json!({"xAxis": "a"})), 0).is_none());
    }

    #[test]
    fn test_quality_score_clamped_and_id_defaulted() {
        let mut raw = candidate("bar", json!({"xAxis": "Region"}));
        raw.quality_score = 7.5;
        let spec = validate_candidate(&raw, 4).unwrap();
        assert_eq!(spec.quality_score, 1.0);
        assert_eq!(spec.id, "chart-4");
        assert!(!spec.synthesized);
    }
}
