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

use chart_contracts::OptionsError;
use thiserror::Error;

/// Errors surfaced to callers of this crate.
///
/// The untrusted-input paths (parsing, expression evaluation, validation,
/// fallback synthesis) degrade gracefully and never produce one of these;
/// they log and carry on. What remains is caller contract violations and
/// explicit serialisation of specs at the boundary.
#[derive(Error, Debug)]
pub enum DashelError {
    #[error("Rebalance options rejected: {0}")]
    Options(#[from] OptionsError),
    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DashelError>;

impl DashelError {
    pub fn category(&self) -> &'static str {
        match self {
            DashelError::Options(_) => "Options",
            DashelError::Serialisation(_) => "Serialisation",
        }
    }

    /// Options errors reflect a programming mistake in the embedding
    /// application and are not recoverable at runtime.
    pub fn is_recoverable(&self) -> bool {
        match self {
            DashelError::Options(_) => false,
            DashelError::Serialisation(_) => true,
        }
    }
}
