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

//! Layout rebalancing: a validated candidate pool goes in, an ordered,
//! fixed-composition chart list comes out. Summary cards first,
//! visualizations in the middle, one detail table last.
//!
//! All sorts are stable and descending by quality score, so equal-quality
//! candidates keep their incoming relative order and the whole pipeline is
//! deterministic for identical input. Shortfalls from exhausted fallback
//! synthesis are tolerated and left for [`check_layout_invariants`] to
//! report; the only hard error is invalid options.

use crate::error::Result;
use crate::synthesiser::FallbackSynthesiser;
use chart_contracts::{ChartSpec, RebalanceOptions};
use std::collections::HashMap;
use tracing::{debug, warn};

pub fn rebalance_charts(
    candidates: Vec<ChartSpec>,
    options: &RebalanceOptions,
) -> Result<Vec<ChartSpec>> {
    options.validate()?;

    let mut cards = Vec::new();
    let mut tables = Vec::new();
    let mut vizzes = Vec::new();
    for spec in candidates {
        if spec.chart_type.is_summary_card() {
            cards.push(spec);
        } else if spec.chart_type.is_table() {
            tables.push(spec);
        } else {
            vizzes.push(spec);
        }
    }
    sort_by_quality(&mut cards);
    sort_by_quality(&mut tables);
    sort_by_quality(&mut vizzes);

    let mut synth = FallbackSynthesiser::new(options.fallback_chart_type);

    // Scorecards: best real ones up to the maximum, padded to the minimum.
    let take = cards.len().min(options.max_scorecards);
    let mut scorecards: Vec<ChartSpec> = cards.drain(..take).collect();

    // Column source for card synthesis: the selection so far, then the
    // rest of the validated pool in quality order.
    let mut scan_pool: Vec<ChartSpec> = scorecards.clone();
    scan_pool.extend(vizzes.iter().cloned());
    scan_pool.extend(tables.iter().cloned());

    while scorecards.len() < options.min_scorecards {
        match synth.summary_card(&scan_pool) {
            Some(card) => scorecards.push(card),
            None => {
                warn!(
                    have = scorecards.len(),
                    want = options.min_scorecards,
                    "card synthesis exhausted; accepting a scorecard shortfall"
                );
                break;
            }
        }
    }

    // Exactly one table slot: best real table, else a synthesized one,
    // else the best remaining visualization promoted into the slot.
    let table_slot: Option<ChartSpec> = if !tables.is_empty() {
        Some(tables.remove(0))
    } else if options.require_table {
        Some(synth.table(&scan_pool))
    } else if !vizzes.is_empty() {
        Some(vizzes.remove(0))
    } else {
        None
    };
    let table_len = usize::from(table_slot.is_some());

    // Remaining slots go to the top-quality visualizations.
    let slots = options
        .target_count
        .saturating_sub(scorecards.len() + table_len);
    let take = vizzes.len().min(slots);
    let mut selected_vizzes: Vec<ChartSpec> = vizzes.drain(..take).collect();

    // Fill the remaining visualization slots (and in any case the
    // non-scorecard floor) with synthesized visualizations drawn from the
    // already-chosen specs.
    let viz_goal = slots.max(options.min_non_scorecards.saturating_sub(table_len));
    while selected_vizzes.len() < viz_goal {
        let mut chosen: Vec<ChartSpec> = scorecards.clone();
        chosen.extend(selected_vizzes.iter().cloned());
        chosen.extend(table_slot.iter().cloned());
        match synth.visualization(&chosen) {
            Some(viz) => selected_vizzes.push(viz),
            None => {
                warn!(
                    have = selected_vizzes.len(),
                    want = viz_goal,
                    "visualization synthesis exhausted; accepting a shortfall"
                );
                break;
            }
        }
    }

    // Layout invariant: scorecards, then visualizations, then the table.
    let mut layout = scorecards;
    layout.append(&mut selected_vizzes);
    let table_at_end = table_slot.is_some();
    if let Some(table) = table_slot {
        layout.push(table);
    }

    // Length correction. Too long: drop the lowest-quality visualizations
    // only, never scorecards or the table. Too short: pad with synthesized
    // summary cards just before the table, tolerating exhaustion.
    while layout.len() > options.target_count {
        let Some(lowest) = lowest_quality_viz(&layout) else {
            warn!(
                len = layout.len(),
                target = options.target_count,
                "layout over target but only scorecards and the table remain"
            );
            break;
        };
        layout.remove(lowest);
    }
    while layout.len() < options.target_count {
        let card_count = layout
            .iter()
            .filter(|c| c.chart_type.is_summary_card())
            .count();
        if card_count >= options.max_scorecards {
            warn!(
                len = layout.len(),
                target = options.target_count,
                "padding stopped at the scorecard maximum; returning a shorter layout"
            );
            break;
        }
        match synth.summary_card(&layout) {
            Some(card) => {
                let at = layout.len() - usize::from(table_at_end);
                layout.insert(at, card);
            }
            None => {
                warn!(
                    len = layout.len(),
                    target = options.target_count,
                    "padding exhausted; returning a shorter layout"
                );
                break;
            }
        }
    }

    debug!(charts = layout.len(), "rebalanced layout");
    Ok(layout)
}

/// Independent structural verification. Returns human-readable violations
/// instead of failing, so shortfall layouts can be rendered and reported.
pub fn check_layout_invariants(charts: &[ChartSpec], options: &RebalanceOptions) -> Vec<String> {
    let mut violations = Vec::new();

    if charts.len() != options.target_count {
        violations.push(format!(
            "chart count {} differs from target {} (delta {})",
            charts.len(),
            options.target_count,
            charts.len() as i64 - options.target_count as i64
        ));
    }

    let card_count = charts
        .iter()
        .filter(|c| c.chart_type.is_summary_card())
        .count();
    if card_count < options.min_scorecards || card_count > options.max_scorecards {
        violations.push(format!(
            "summary card count {} outside [{}, {}]",
            card_count, options.min_scorecards, options.max_scorecards
        ));
    }

    if options.require_table {
        let has_table = charts.iter().any(|c| c.chart_type.is_table());
        if !has_table {
            violations.push("required table is missing".to_string());
        } else if !charts.last().is_some_and(|c| c.chart_type.is_table()) {
            violations.push("table is not positioned last".to_string());
        }
    }

    let prefix = charts
        .iter()
        .take_while(|c| c.chart_type.is_summary_card())
        .count();
    if charts[prefix..]
        .iter()
        .any(|c| c.chart_type.is_summary_card())
    {
        violations.push("summary cards are not contiguous at the front".to_string());
    }

    violations
}

/// Stable descending sort; equal scores keep incoming order.
fn sort_by_quality(specs: &mut [ChartSpec]) {
    specs.sort_by(|a, b| {
        b.quality_score
            .partial_cmp(&a.quality_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Index of the lowest-quality visualization, preferring the later one on
/// ties so synthesized padding goes first.
fn lowest_quality_viz(layout: &[ChartSpec]) -> Option<usize> {
    let mut lowest: Option<(usize, f64)> = None;
    for (i, spec) in layout.iter().enumerate() {
        if !spec.chart_type.is_visualization() {
            continue;
        }
        match lowest {
            Some((_, score)) if spec.quality_score > score => {}
            _ => lowest = Some((i, spec.quality_score)),
        }
    }
    lowest.map(|(i, _)| i)
}

/// Upstream models repeat themselves; same type and title keeps only the
/// higher-quality candidate, at the first occurrence's position. Runs
/// before rebalancing, never on its output, so rebalancing a layout that
/// contains same-titled synthesized charts leaves them alone.
pub fn dedup_candidates(candidates: Vec<ChartSpec>) -> Vec<ChartSpec> {
    let mut kept: Vec<ChartSpec> = Vec::with_capacity(candidates.len());
    let mut seen: HashMap<(chart_contracts::ChartType, String), usize> = HashMap::new();
    for spec in candidates {
        let key = (spec.chart_type, spec.title.clone());
        match seen.get(&key) {
            Some(&at) => {
                if spec.quality_score > kept[at].quality_score {
                    debug!(title = %spec.title, "replacing duplicate with higher-quality candidate");
                    kept[at] = spec;
                } else {
                    debug!(title = %spec.title, "dropping duplicate candidate");
                }
            }
            None => {
                seen.insert(key, kept.len());
                kept.push(spec);
            }
        }
    }
    kept
}
