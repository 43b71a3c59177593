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

/// One row of tabular data: an open mapping from column name to scalar.
/// No shape is assumed beyond what the upstream schema declares.
pub type DataRow = Map<String, Value>;

/// Column type as reported by the schema-inference collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Categorical,
    Date,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnProfile {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.column_type, ColumnType::Numeric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_round_trips_camel_case() {
        let profile = ColumnProfile::new("unit_price", ColumnType::Numeric);
        assert!(profile.is_numeric());
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["columnType"], "numeric");
        let back: ColumnProfile = serde_json::from_value(json).unwrap();
        assert_eq!(back, profile);
    }
}
