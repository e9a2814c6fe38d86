//! The per-query result record shipped back to the external service.
//!
//! Every field is always serialized: unset strings as `""`, unset sequences as
//! `[]`. Numbers are carried as fixed-precision text (`{:.6}`), matching what
//! the collecting side parses.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub sql: String,
    pub physical_plan: String,
    pub logical_plan: String,
    pub execution_time: String,
    pub tid: String,
    pub parser_time: String,
    pub http_time: String,

    /// Probe queries seen during planning, parallel to `card`.
    pub subquery: Vec<String>,
    pub card: Vec<String>,

    /// Names of resolved anchors, parallel to `anchor_times`.
    pub anchor_names: Vec<String>,
    pub anchor_times: Vec<String>,
}

/// Sequence lengths captured at finalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub subqueries: usize,
    pub cards: usize,
    pub anchor_names: usize,
    pub anchor_times: usize,
}

/// Render a number the way every numeric field of the record is rendered.
pub fn fixed(v: f64) -> String {
    format!("{:.6}", v)
}

impl TransferRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_subquery(&mut self, probe: impl Into<String>, card: f64) {
        self.subquery.push(probe.into());
        self.card.push(fixed(card));
    }

    pub fn push_anchor_time(&mut self, name: impl Into<String>, elapsed: Duration) {
        self.anchor_names.push(name.into());
        self.anchor_times.push(fixed(elapsed.as_secs_f64()));
    }

    pub fn counts(&self) -> RecordCounts {
        RecordCounts {
            subqueries: self.subquery.len(),
            cards: self.card.len(),
            anchor_names: self.anchor_names.len(),
            anchor_times: self.anchor_times.len(),
        }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_serializes_every_field() {
        let json: serde_json::Value =
            serde_json::from_str(&TransferRecord::new().to_json().unwrap()).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "sql",
            "physical_plan",
            "logical_plan",
            "execution_time",
            "tid",
            "parser_time",
            "http_time",
        ] {
            assert_eq!(obj[key], serde_json::Value::String(String::new()), "{key}");
        }
        for key in ["subquery", "card", "anchor_names", "anchor_times"] {
            assert_eq!(obj[key], serde_json::json!([]), "{key}");
        }
        assert_eq!(obj.len(), 11);
    }

    #[test]
    fn numbers_use_six_decimals() {
        let mut record = TransferRecord::new();
        record.push_subquery("select count(*) from t;", 100.0);
        record.push_anchor_time("CARD_REPLACE_ANCHOR", Duration::from_millis(1500));
        assert_eq!(record.card, vec!["100.000000"]);
        assert_eq!(record.anchor_times, vec!["1.500000"]);
        assert_eq!(
            record.counts(),
            RecordCounts {
                subqueries: 1,
                cards: 1,
                anchor_names: 1,
                anchor_times: 1
            }
        );
    }
}
