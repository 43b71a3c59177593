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

//! Structural properties of rebalancing over generated chart pools.

use dashel::{
    check_layout_invariants, rebalance_charts, ChartSpec, ChartType, DataMapping, MetricSource,
    Priority, RebalanceOptions,
};
use proptest::prelude::*;

fn chart_type_strategy() -> impl Strategy<Value = ChartType> {
    prop_oneof![
        Just(ChartType::SummaryCard),
        Just(ChartType::Bar),
        Just(ChartType::Line),
        Just(ChartType::Area),
        Just(ChartType::Pie),
        Just(ChartType::Scatter),
        Just(ChartType::Table),
    ]
}

fn mapping_for(chart_type: ChartType, tag: usize) -> DataMapping {
    let category = format!("category_{}", tag % 3);
    let value = format!("value_{}", tag % 4);
    match chart_type {
        ChartType::SummaryCard => DataMapping::SummaryCard {
            source: MetricSource::Column(value),
        },
        ChartType::Table => DataMapping::Table {
            columns: vec![category, value],
            limit: 100,
        },
        ChartType::Pie => DataMapping::Pie {
            category,
            values: vec![value],
        },
        ChartType::Scatter => DataMapping::Scatter {
            x_axis: category,
            y_axis: value,
        },
        _ => DataMapping::CategorySeries {
            x_axis: category,
            series: vec![value],
        },
    }
}

fn spec_strategy() -> impl Strategy<Value = ChartSpec> {
    (chart_type_strategy(), 0usize..100, 0.0f64..=1.0).prop_map(|(chart_type, tag, quality)| {
        ChartSpec {
            id: format!("chart-{tag}"),
            chart_type,
            title: format!("{chart_type} {tag}"),
            description: String::new(),
            mapping: mapping_for(chart_type, tag),
            quality_score: quality,
            reasoning: String::new(),
            tags: Vec::new(),
            priority: Priority::Medium,
            synthesized: false,
        }
    })
}

proptest! {
    /// Rebalancing its own output changes nothing.
    #[test]
    fn rebalance_is_idempotent(pool in prop::collection::vec(spec_strategy(), 0..40)) {
        let options = RebalanceOptions::default();
        let once = rebalance_charts(pool, &options).unwrap();
        let twice = rebalance_charts(once.clone(), &options).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Any layout that reaches the target passes every structural check;
    /// shorter layouts are the tolerated shortfall case.
    #[test]
    fn full_layouts_satisfy_all_invariants(pool in prop::collection::vec(spec_strategy(), 0..40)) {
        let options = RebalanceOptions::default();
        let layout = rebalance_charts(pool, &options).unwrap();
        prop_assert!(layout.len() <= options.target_count);
        if layout.len() == options.target_count {
            let violations = check_layout_invariants(&layout, &options);
            prop_assert!(violations.is_empty(), "violations: {:?}", violations);
        }
    }

    /// Summary cards never appear after the first non-card slot.
    #[test]
    fn cards_stay_contiguous_at_the_front(pool in prop::collection::vec(spec_strategy(), 1..40)) {
        let options = RebalanceOptions::default();
        let layout = rebalance_charts(pool, &options).unwrap();
        let prefix = layout
            .iter()
            .take_while(|c| c.chart_type.is_summary_card())
            .count();
        prop_assert!(layout[prefix..].iter().all(|c| !c.chart_type.is_summary_card()));
    }

    /// At most one table, and if present it sits in the final slot.
    #[test]
    fn the_table_is_single_and_last(pool in prop::collection::vec(spec_strategy(), 1..40)) {
        let options = RebalanceOptions::default();
        let layout = rebalance_charts(pool, &options).unwrap();
        let tables = layout.iter().filter(|c| c.chart_type.is_table()).count();
        prop_assert!(tables <= 1);
        if tables == 1 {
            prop_assert!(layout.last().unwrap().chart_type.is_table());
        }
    }
}
