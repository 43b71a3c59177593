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

//! Fallback chart synthesis, invoked only when rebalancing runs short of a
//! category. Synthesized charts reuse columns already proven usable by
//! accepted specs; when no usable column exists, synthesis returns `None`
//! and callers stop padding instead of erroring.
//!
//! Column scans walk the accepted specs in list order and the first match
//! wins. That tie-break is deliberate and part of the determinism
//! contract, not an accident of iteration order.

use chart_contracts::{ChartSpec, ChartType, DataMapping, MetricSource, Priority};
use indexmap::IndexSet;
use tracing::debug;

/// Title pool for synthesized summary cards, cycled round-robin.
const CARD_TITLES: [&str; 6] = [
    "Key Metric",
    "Overall Total",
    "Average Value",
    "Record Count",
    "Peak Value",
    "Lowest Value",
];

/// Chart types cycled for synthesized visualizations.
const VIZ_TYPES: [ChartType; 4] = [ChartType::Bar, ChartType::Line, ChartType::Area, ChartType::Pie];

/// Column cap for the synthesized detail table.
const TABLE_COLUMN_CAP: usize = 10;
const TABLE_ROW_LIMIT: usize = 100;

#[derive(Debug)]
pub struct FallbackSynthesiser {
    card_counter: usize,
    viz_counter: usize,
    /// Index into [`VIZ_TYPES`] where the rotation starts, taken from the
    /// configured fallback chart type.
    viz_start: usize,
}

impl FallbackSynthesiser {
    pub fn new(fallback_chart_type: ChartType) -> Self {
        Self {
            card_counter: 0,
            viz_counter: 0,
            viz_start: VIZ_TYPES
                .iter()
                .position(|ty| *ty == fallback_chart_type)
                .unwrap_or(0),
        }
    }

    /// Synthesizes a summary card from the first numeric-bearing column in
    /// the accepted specs, or `None` when there is none.
    pub fn summary_card(&mut self, accepted: &[ChartSpec]) -> Option<ChartSpec> {
        let metric = accepted
            .iter()
            .find_map(|spec| spec.mapping.numeric_field())?
            .to_string();
        let title = CARD_TITLES[self.card_counter % CARD_TITLES.len()];
        self.card_counter += 1;
        debug!(metric = %metric, title, "synthesized fallback summary card");
        Some(ChartSpec {
            id: format!("fallback-card-{}", self.card_counter),
            chart_type: ChartType::SummaryCard,
            title: title.to_string(),
            description: format!("Automatically generated summary of {metric}"),
            mapping: DataMapping::SummaryCard {
                source: MetricSource::Column(metric),
            },
            quality_score: 0.0,
            reasoning: "Added to satisfy the summary card minimum".to_string(),
            tags: Vec::new(),
            priority: Priority::Low,
            synthesized: true,
        })
    }

    /// Synthesizes a visualization from the first categorical and first
    /// numeric column found in the accepted specs; `None` when either is
    /// missing.
    pub fn visualization(&mut self, accepted: &[ChartSpec]) -> Option<ChartSpec> {
        let category = accepted
            .iter()
            .find_map(|spec| spec.mapping.categorical_field())?
            .to_string();
        let value = accepted
            .iter()
            .find_map(|spec| spec.mapping.numeric_field())?
            .to_string();
        let chart_type = VIZ_TYPES[(self.viz_start + self.viz_counter) % VIZ_TYPES.len()];
        self.viz_counter += 1;
        debug!(%category, %value, %chart_type, "synthesized fallback visualization");
        let mapping = match chart_type {
            ChartType::Pie => DataMapping::Pie {
                category: category.clone(),
                values: vec![value.clone()],
            },
            _ => DataMapping::CategorySeries {
                x_axis: category.clone(),
                series: vec![value.clone()],
            },
        };
        Some(ChartSpec {
            id: format!("fallback-viz-{}", self.viz_counter),
            chart_type,
            title: format!("{value} by {category}"),
            description: format!("{chart_type} chart of {value} across {category}"),
            mapping,
            quality_score: 0.0,
            reasoning: "Added to satisfy the visualization minimum".to_string(),
            tags: Vec::new(),
            priority: Priority::Low,
            synthesized: true,
        })
    }

    /// Synthesizes the detail table from the union of columns referenced
    /// by the accepted specs. Never fails; an empty table is still valid.
    pub fn table(&self, accepted: &[ChartSpec]) -> ChartSpec {
        let mut columns: IndexSet<String> = IndexSet::new();
        'outer: for spec in accepted {
            for column in spec.mapping.referenced_columns() {
                columns.insert(column.to_string());
                if columns.len() >= TABLE_COLUMN_CAP {
                    break 'outer;
                }
            }
        }
        debug!(columns = columns.len(), "synthesized fallback table");
        ChartSpec {
            id: "fallback-table".to_string(),
            chart_type: ChartType::Table,
            title: "Data overview".to_string(),
            description: "Detail rows for the columns used across this dashboard".to_string(),
            mapping: DataMapping::Table {
                columns: columns.into_iter().collect(),
                limit: TABLE_ROW_LIMIT,
            },
            quality_score: 0.0,
            reasoning: "Added to satisfy the detail table requirement".to_string(),
            tags: Vec::new(),
            priority: Priority::Low,
            synthesized: true,
        }
    }
}
