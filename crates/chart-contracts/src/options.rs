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

use crate::suggestion::ChartType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid rebalance options are a caller contract violation, the one error
/// class in this core that is raised rather than degraded around.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    #[error("minScorecards ({min}) exceeds maxScorecards ({max})")]
    ScorecardBoundsInverted { min: usize, max: usize },
    #[error("targetCount must be at least 1")]
    ZeroTarget,
    #[error("targetCount ({target}) leaves no room for the required table")]
    NoRoomForTable { target: usize },
    #[error("fallbackChartType must be a visualization, got '{0}'")]
    NonVisualFallback(ChartType),
}

/// Layout composition knobs supplied by the embedding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceOptions {
    /// Exact number of charts in the final layout.
    pub target_count: usize,
    pub min_scorecards: usize,
    pub max_scorecards: usize,
    /// Minimum count of visualizations plus the table.
    pub min_non_scorecards: usize,
    pub require_table: bool,
    /// First chart type tried when synthesizing fallback visualizations.
    pub fallback_chart_type: ChartType,
}

impl Default for RebalanceOptions {
    fn default() -> Self {
        Self {
            target_count: 16,
            min_scorecards: 4,
            max_scorecards: 6,
            min_non_scorecards: 8,
            require_table: true,
            fallback_chart_type: ChartType::Bar,
        }
    }
}

impl RebalanceOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.min_scorecards > self.max_scorecards {
            return Err(OptionsError::ScorecardBoundsInverted {
                min: self.min_scorecards,
                max: self.max_scorecards,
            });
        }
        if self.target_count == 0 {
            return Err(OptionsError::ZeroTarget);
        }
        if self.require_table && self.target_count < 2 {
            return Err(OptionsError::NoRoomForTable {
                target: self.target_count,
            });
        }
        if !self.fallback_chart_type.is_visualization() {
            return Err(OptionsError::NonVisualFallback(self.fallback_chart_type));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert_eq!(RebalanceOptions::default().validate(), Ok(()));
    }

    #[test]
    fn test_inverted_scorecard_bounds_rejected() {
        let options = RebalanceOptions {
            min_scorecards: 7,
            max_scorecards: 6,
            ..Default::default()
        };
        assert_eq!(
            options.validate(),
            Err(OptionsError::ScorecardBoundsInverted { min: 7, max: 6 })
        );
    }

    #[test]
    fn test_table_fallback_type_rejected() {
        let options = RebalanceOptions {
            fallback_chart_type: ChartType::Table,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(OptionsError::NonVisualFallback(ChartType::Table))
        ));
    }
}
