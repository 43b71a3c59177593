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

//! Extraction of chart candidates from raw generated text.
//!
//! Two passes run independently over the same input and their results are
//! concatenated: a fenced-block pass that decodes JSON code fences, and a
//! marker-block pass that reads `BEGIN-CHART` / `END-CHART` regions of
//! `Key: Value` lines. Malformed blocks are discarded with a log line,
//! never an error; generated text is unreliable by nature.

use chart_contracts::{ChartCandidate, Priority};
use serde_json::{Map, Value};
use tracing::debug;

const BEGIN_MARKER: &str = "BEGIN-CHART";
const END_MARKER: &str = "END-CHART";

/// Confidence assigned to marker-block candidates, which carry no score of
/// their own.
const MARKER_BLOCK_CONFIDENCE: f64 = 0.5;

pub fn parse_suggestions(text: &str) -> Vec<ChartCandidate> {
    let mut candidates = parse_fenced_blocks(text);
    candidates.extend(parse_marker_blocks(text));
    debug!(count = candidates.len(), "extracted chart candidates");
    candidates
}

/// Pass one: every fenced code block whose content is valid JSON. A block
/// may hold a single candidate object, an array of candidates, or an
/// object wrapping a `"charts"` array.
fn parse_fenced_blocks(text: &str) -> Vec<ChartCandidate> {
    let mut candidates = Vec::new();
    for block in fenced_blocks(text) {
        match decode_block(block) {
            Some(mut decoded) => candidates.append(&mut decoded),
            None => {
                debug!(
                    snippet = %block.chars().take(80).collect::<String>(),
                    "discarding fenced block that is not chart JSON"
                );
            }
        }
    }
    candidates
}

/// Yields the content of each ``` fence in order, tolerating an info
/// string (```json) on the opening line. An unterminated fence is ignored.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_open = &rest[open + 3..];
        let content_start = match after_open.find('\n') {
            Some(newline) => newline + 1,
            None => break,
        };
        let content = &after_open[content_start..];
        match content.find("```") {
            Some(close) => {
                blocks.push(&content[..close]);
                rest = &content[close + 3..];
            }
            None => break,
        }
    }
    blocks
}

fn decode_block(block: &str) -> Option<Vec<ChartCandidate>> {
    let value: Value = serde_json::from_str(block.trim()).ok()?;
    let items: Vec<Value> = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("charts") {
            Some(Value::Array(items)) => items,
            Some(_) | None => vec![Value::Object(map)],
        },
        _ => return None,
    };
    let mut candidates = Vec::new();
    for item in items {
        match serde_json::from_value::<ChartCandidate>(item) {
            Ok(candidate) => candidates.push(candidate),
            Err(err) => debug!(error = %err, "discarding undecodable chart object"),
        }
    }
    Some(candidates)
}

/// Pass two: delimiter-bounded semi-structured blocks. Lines between the
/// markers are read as `Key: Value` pairs; unknown keys are ignored.
fn parse_marker_blocks(text: &str) -> Vec<ChartCandidate> {
    let mut candidates = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(BEGIN_MARKER) {
        let after_start = &rest[start + BEGIN_MARKER.len()..];
        let Some(end) = after_start.find(END_MARKER) else {
            debug!("ignoring unterminated marker block");
            break;
        };
        if let Some(candidate) = candidate_from_lines(&after_start[..end]) {
            candidates.push(candidate);
        }
        rest = &after_start[end + END_MARKER.len()..];
    }
    candidates
}

fn candidate_from_lines(block: &str) -> Option<ChartCandidate> {
    let mut chart_type = None;
    let mut title = String::new();
    let mut description = String::new();
    let mut priority = Priority::Medium;
    let mut columns: Vec<String> = Vec::new();
    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_lowercase().as_str() {
            "type" => chart_type = Some(value.to_string()),
            "title" => title = value.to_string(),
            "description" => description = value.to_string(),
            "priority" => priority = Priority::from_label(value),
            "columns" => {
                columns = value
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }
    let Some(chart_type) = chart_type else {
        debug!("discarding marker block without a Type line");
        return None;
    };
    Some(ChartCandidate {
        id: None,
        data_mapping: marker_mapping(&chart_type, &columns),
        chart_type,
        title,
        description,
        quality_score: MARKER_BLOCK_CONFIDENCE,
        reasoning: String::new(),
        tags: Vec::new(),
        priority,
    })
}

/// Builds a loose data mapping from a marker block's column list: the
/// metric for a summary card, the column list for a table, and a first
/// column x-axis with remaining y-axis series for everything else.
fn marker_mapping(chart_type: &str, columns: &[String]) -> Map<String, Value> {
    let mut mapping = Map::new();
    if columns.is_empty() {
        return mapping;
    }
    let lowered = chart_type.trim().to_lowercase();
    if matches!(lowered.as_str(), "summary-card" | "scorecard" | "card" | "kpi") {
        mapping.insert("metric".to_string(), Value::String(columns[0].clone()));
    } else if lowered == "table" {
        mapping.insert(
            "columns".to_string(),
            Value::Array(columns.iter().cloned().map(Value::String).collect()),
        );
    } else {
        mapping.insert("xAxis".to_string(), Value::String(columns[0].clone()));
        if columns.len() > 1 {
            mapping.insert(
                "yAxis".to_string(),
                Value::Array(columns[1..].iter().cloned().map(Value::String).collect()),
            );
        }
    }
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_object_and_array() {
        let text = r#"
Here are my recommendations.

```json
{"type": "bar", "title": "Sales by region", "dataMapping": {"xAxis": "Region", "yAxis": "Sales"}, "confidence": 0.9}
```

And a couple more:

```json
[{"type": "pie", "title": "Share", "dataMapping": {"category": "Region"}},
 {"type": "table", "title": "Detail", "dataMapping": {"columns": ["Region", "Sales"]}}]
```
"#;
        let candidates = parse_suggestions(text);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].chart_type, "bar");
        assert_eq!(candidates[2].chart_type, "table");
    }

    #[test]
    fn test_charts_wrapper_object() {
        let text = "```json\n{\"charts\": [{\"type\": \"line\", \"title\": \"Trend\", \"dataMapping\": {\"xAxis\": \"Month\"}}]}\n```";
        let candidates = parse_suggestions(text);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Trend");
    }

    #[test]
    fn test_malformed_block_is_discarded_not_fatal() {
        let text = "```json\n{\"type\": \"bar\", oops\n```\n```json\n{\"type\": \"line\", \"title\": \"ok\", \"dataMapping\": {\"xAxis\": \"Month\"}}\n```";
        let candidates = parse_suggestions(text);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].chart_type, "line");
    }

    #[test]
    fn test_marker_block_defaults() {
        let text = "preamble\nBEGIN-CHART\nType: bar\nTitle: Sales by region\nColumns: Region, Sales, Profit\nDescription: Regional splits\nEND-CHART\ntrailer";
        let candidates = parse_suggestions(text);
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.chart_type, "bar");
        assert!((c.quality_score - 0.5).abs() < f64::EPSILON);
        assert_eq!(c.priority, Priority::Medium);
        assert_eq!(c.data_mapping["xAxis"], "Region");
        assert_eq!(c.data_mapping["yAxis"], serde_json::json!(["Sales", "Profit"]));
    }

    #[test]
    fn test_marker_priority_line_is_lenient() {
        let text = "BEGIN-CHART\nType: bar\nTitle: Hot\nColumns: Region, Sales\nPriority: CRITICAL\nEND-CHART";
        let candidates = parse_suggestions(text);
        assert_eq!(candidates[0].priority, Priority::High);
    }

    #[test]
    fn test_marker_summary_card_maps_metric() {
        let text = "BEGIN-CHART\nType: summary-card\nTitle: Total revenue\nColumns: Revenue\nEND-CHART";
        let candidates = parse_suggestions(text);
        assert_eq!(candidates[0].data_mapping["metric"], "Revenue");
    }

    #[test]
    fn test_junk_input_yields_empty_list() {
        assert!(parse_suggestions("no charts to see here").is_empty());
        assert!(parse_suggestions("").is_empty());
        assert!(parse_suggestions("BEGIN-CHART\nType: bar").is_empty());
    }

    #[test]
    fn test_both_passes_concatenate_fenced_first() {
        let text = "BEGIN-CHART\nType: pie\nTitle: Mix\nColumns: Kind\nEND-CHART\n```json\n{\"type\": \"bar\", \"title\": \"B\", \"dataMapping\": {\"xAxis\": \"X\"}}\n```";
        let candidates = parse_suggestions(text);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].chart_type, "bar");
        assert_eq!(candidates[1].chart_type, "pie");
    }
}
