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

//! Turns an unreliable, free-form chart recommendation from a text
//! generation service into a dataset-backed, fixed-composition dashboard
//! layout, plus the per-chart data transformation needed to feed each
//! chart its rows.
//!
//! The pipeline is synchronous, in-memory, and deterministic: identical
//! input produces an identical layout. Untrusted input degrades (discard,
//! null, skip, log) rather than fails; only caller contract violations
//! return errors.

pub mod error;
pub mod expression;
pub mod rebalancer;
pub mod suggestion_parser;
pub mod synthesiser;
pub mod transform;
pub mod validator;

pub use chart_contracts::{
    ChartCandidate, ChartSpec, ChartType, ColumnProfile, ColumnType, DataMapping, DataRow,
    DataTransformSpec, MetricSource, Priority, RebalanceOptions,
};
pub use error::{DashelError, Result};
pub use expression::{EvalError, Expression};
pub use rebalancer::{check_layout_invariants, dedup_candidates, rebalance_charts};
pub use suggestion_parser::parse_suggestions;
pub use transform::apply_transform;
pub use validator::validate_candidate;

use tracing::debug;

/// Facade over the full pipeline: parse, validate, rebalance, and on
/// demand transform rows for one chart.
pub struct DashboardComposer {
    options: RebalanceOptions,
}

impl DashboardComposer {
    pub fn new() -> Self {
        Self {
            options: RebalanceOptions::default(),
        }
    }

    /// Options are checked up front so misuse surfaces at construction,
    /// not in the middle of composing a dashboard.
    pub fn with_options(options: RebalanceOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &RebalanceOptions {
        &self.options
    }

    /// The full path from raw generated text to a final layout.
    pub fn compose(&self, raw_text: &str) -> Result<Vec<ChartSpec>> {
        let candidates = parse_suggestions(raw_text);
        let validated: Vec<ChartSpec> = candidates
            .iter()
            .enumerate()
            .filter_map(|(index, candidate)| validate_candidate(candidate, index))
            .collect();
        debug!(
            candidates = candidates.len(),
            validated = validated.len(),
            "validated candidate pool"
        );
        rebalance_charts(dedup_candidates(validated), &self.options)
    }

    /// Row set for one chart, ready for the rendering collaborator.
    pub fn transform_rows(&self, rows: &[DataRow], spec: &DataTransformSpec) -> Vec<DataRow> {
        apply_transform(rows, spec)
    }

    /// Structural verification of a layout against this composer's
    /// options; violations are reported, never raised.
    pub fn verify(&self, charts: &[ChartSpec]) -> Vec<String> {
        check_layout_invariants(charts, &self.options)
    }

    /// Serialises a layout for handoff to the rendering collaborator.
    pub fn to_json(&self, charts: &[ChartSpec]) -> Result<String> {
        Ok(serde_json::to_string_pretty(charts)?)
    }
}

impl Default for DashboardComposer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_never_returns_a_blank_dashboard_error() {
        let composer = DashboardComposer::new();
        let layout = composer.compose("nothing useful in here").unwrap();
        // No usable columns anywhere: a shortfall, reported not raised.
        assert!(layout.len() <= composer.options().target_count);
        assert!(composer
            .verify(&layout)
            .iter()
            .any(|v| v.contains("differs from target")));
    }

    #[test]
    fn test_with_options_rejects_misuse() {
        let options = RebalanceOptions {
            target_count: 0,
            ..Default::default()
        };
        assert!(DashboardComposer::with_options(options).is_err());
    }
}
