//! Directive extraction and per-kind anchor decoding.
//!
//! A directive is a JSON object embedded in a SQL comment:
//! ```text
//! /*pilotscope {"anchor": {...}, "port": 8888, "url": "localhost",
//!               "enableTerminate": true, "tid": "42"} pilotscope*/ select ...
//! ```
//! The JSON is the text between the two markers with exactly one delimiter
//! character dropped on each side.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use pilotscope_core::anchor::{AnchorKind, AnchorPayload, AnchorSet, AnchorState};
use pilotscope_core::config::PilotConfig;
use pilotscope_core::hash::hash_str;

use crate::error::DirectiveError;

/// Where the result record is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host without any `http://` prefix the client may have included.
    pub fn bare_host(&self) -> &str {
        self.host
            .strip_prefix("http://")
            .unwrap_or(&self.host)
            .trim_end_matches('/')
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.bare_host(), self.port)
    }
}

/// Everything the lifecycle needs from a decoded directive.
#[derive(Debug, Clone)]
pub struct ParsedDirective {
    /// Enabled anchors, one per kind.
    pub anchors: AnchorSet,
    /// Reserved kinds that were named but carry no behavior.
    pub reserved: Vec<AnchorKind>,
    /// `None` disables sending; both host and port must be present.
    pub endpoint: Option<Endpoint>,
    pub enable_terminate: bool,
    pub tid: Option<String>,
    /// Query text after the end marker.
    pub sql: String,
}

#[derive(Debug, Deserialize)]
struct Directive {
    #[serde(alias = "anchor", default)]
    anchors: Map<String, Value>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(alias = "url", default)]
    host: Option<String>,
    #[serde(rename = "enableTerminate")]
    enable_terminate: bool,
    #[serde(default)]
    tid: Option<Tid>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Tid {
    Text(String),
    Number(serde_json::Number),
}

impl Tid {
    fn into_text(self) -> String {
        match self {
            Tid::Text(s) => s,
            Tid::Number(n) => n.to_string(),
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

/// Body shared by the fetch-style anchors.
#[derive(Debug, Deserialize)]
struct FetchAnchorBody {
    #[serde(default = "enabled_by_default")]
    enable: bool,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CardReplaceAnchorBody {
    #[serde(default = "enabled_by_default")]
    enable: bool,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    subquery: Vec<String>,
    #[serde(default)]
    card: Vec<f64>,
}

/// Locate the directive JSON and the query text that follows it.
///
/// `Ok(None)` when either marker is absent: the query is not ours.
pub fn extract<'q>(
    query: &'q str,
    cfg: &PilotConfig,
) -> Result<Option<(&'q str, &'q str)>, DirectiveError> {
    let (Some(start), Some(end)) = (
        query.find(cfg.start_marker.as_str()),
        query.find(cfg.end_marker.as_str()),
    ) else {
        return Ok(None);
    };

    let json_from = start + cfg.start_marker.len() + 1;
    let json_to = end.saturating_sub(1);
    if json_to < json_from {
        return Err(DirectiveError::Markers(
            "end marker does not follow the start marker".into(),
        ));
    }
    let json = query
        .get(json_from..json_to)
        .ok_or_else(|| DirectiveError::Markers("markers must be delimited by one ASCII character".into()))?;
    let sql = query
        .get(end + cfg.end_marker.len()..)
        .unwrap_or_default()
        .trim();
    Ok(Some((json, sql)))
}

/// Parse the directive carried by `query`, if any.
///
/// Unknown anchor names are reported before any body is decoded, so a query
/// naming one never registers anything.
pub fn parse_directive(
    query: &str,
    cfg: &PilotConfig,
) -> Result<Option<ParsedDirective>, DirectiveError> {
    let Some((json, sql)) = extract(query, cfg)? else {
        return Ok(None);
    };
    debug!(fingerprint = %hash_str(json).short(), "directive found");

    let directive: Directive = serde_json::from_str(json)?;

    if let Some(name) = directive
        .anchors
        .keys()
        .find(|name| AnchorKind::from_name(name) == AnchorKind::Unknown)
    {
        return Err(DirectiveError::UnknownAnchor(name.clone()));
    }

    let mut anchors = AnchorSet::new();
    let mut reserved = Vec::new();
    for (key, body) in &directive.anchors {
        let kind = AnchorKind::from_name(key);
        if kind.is_reserved() {
            info!(anchor = %kind, "reserved anchor ignored");
            reserved.push(kind);
            continue;
        }
        match decode_anchor(kind, key, body)? {
            Some(state) => anchors.insert(state),
            None => debug!(anchor = %kind, "anchor disabled by directive"),
        }
    }

    let endpoint = match (directive.host, directive.port) {
        (Some(host), Some(port)) => Some(Endpoint::new(host, port)),
        _ => {
            info!("no destination in directive; result will not be sent");
            None
        }
    };

    Ok(Some(ParsedDirective {
        anchors,
        reserved,
        endpoint,
        enable_terminate: directive.enable_terminate,
        tid: directive.tid.map(Tid::into_text),
        sql: sql.to_string(),
    }))
}

/// Dispatch one anchor body to the decoder for its kind. `None` when the body
/// asks for the anchor to stay disabled.
fn decode_anchor(
    kind: AnchorKind,
    key: &str,
    body: &Value,
) -> Result<Option<AnchorState>, DirectiveError> {
    match kind {
        AnchorKind::SubqueryCardinalityFetch => decode_subquery_card_fetch(key, body),
        AnchorKind::CardinalityReplace => decode_card_replace(key, body),
        AnchorKind::ExecutionTimeFetch => decode_execution_time_fetch(key, body),
        AnchorKind::RecordFetch => decode_record_fetch(key, body),
        AnchorKind::PhysicalPlanFetch => decode_physical_plan_fetch(key, body),
        AnchorKind::CostAnchorHandler | AnchorKind::HintAnchorHandler => Ok(None),
        AnchorKind::Unknown => Err(DirectiveError::UnknownAnchor(key.to_string())),
    }
}

fn body_error(key: &str, e: serde_json::Error) -> DirectiveError {
    DirectiveError::Anchor {
        name: key.to_string(),
        reason: e.to_string(),
    }
}

fn decode_fetch(
    kind: AnchorKind,
    key: &str,
    body: &Value,
) -> Result<Option<AnchorState>, DirectiveError> {
    let body = FetchAnchorBody::deserialize(body).map_err(|e| body_error(key, e))?;
    if !body.enable {
        return Ok(None);
    }
    let name = body.name.unwrap_or_else(|| key.to_string());
    Ok(Some(AnchorState::new(kind, name, AnchorPayload::None)))
}

fn decode_subquery_card_fetch(key: &str, body: &Value) -> Result<Option<AnchorState>, DirectiveError> {
    decode_fetch(AnchorKind::SubqueryCardinalityFetch, key, body)
}

fn decode_execution_time_fetch(key: &str, body: &Value) -> Result<Option<AnchorState>, DirectiveError> {
    decode_fetch(AnchorKind::ExecutionTimeFetch, key, body)
}

fn decode_record_fetch(key: &str, body: &Value) -> Result<Option<AnchorState>, DirectiveError> {
    decode_fetch(AnchorKind::RecordFetch, key, body)
}

fn decode_physical_plan_fetch(key: &str, body: &Value) -> Result<Option<AnchorState>, DirectiveError> {
    decode_fetch(AnchorKind::PhysicalPlanFetch, key, body)
}

fn decode_card_replace(key: &str, body: &Value) -> Result<Option<AnchorState>, DirectiveError> {
    let body = CardReplaceAnchorBody::deserialize(body).map_err(|e| body_error(key, e))?;
    if body.subquery.len() != body.card.len() {
        return Err(DirectiveError::Anchor {
            name: key.to_string(),
            reason: format!(
                "{} subqueries but {} cardinalities",
                body.subquery.len(),
                body.card.len()
            ),
        });
    }
    if !body.enable {
        return Ok(None);
    }
    let name = body.name.unwrap_or_else(|| key.to_string());
    Ok(Some(AnchorState::new(
        AnchorKind::CardinalityReplace,
        name,
        AnchorPayload::CardReplace {
            subquery: body.subquery,
            card: body.card,
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> Result<Option<ParsedDirective>, DirectiveError> {
        parse_directive(query, &PilotConfig::default())
    }

    #[test]
    fn query_without_markers_is_inactive() {
        assert!(parse("select 1").unwrap().is_none());
        assert!(parse("/*pilotscope {} select 1").unwrap().is_none());
    }

    #[test]
    fn full_directive_decodes() {
        let q = r#"/*pilotscope {"anchor": {"CARD_REPLACE_ANCHOR": {"enable": true, "name": "CARD_REPLACE_ANCHOR", "subquery": ["select count(*) from t;"], "card": [100.0]}, "EXECUTION_TIME_FETCH_ANCHOR": {"enable": true}}, "port": 8888, "url": "localhost", "enableTerminate": false, "tid": "7"} pilotscope*/ select * from t"#;
        let parsed = parse(q).unwrap().unwrap();
        assert_eq!(parsed.anchors.len(), 2);
        assert_eq!(parsed.endpoint, Some(Endpoint::new("localhost", 8888)));
        assert!(!parsed.enable_terminate);
        assert_eq!(parsed.tid.as_deref(), Some("7"));
        assert_eq!(parsed.sql, "select * from t");

        let replace = parsed.anchors.get(AnchorKind::CardinalityReplace).unwrap();
        assert_eq!(
            replace.payload,
            AnchorPayload::CardReplace {
                subquery: vec!["select count(*) from t;".into()],
                card: vec![100.0],
            }
        );
        let exec = parsed.anchors.get(AnchorKind::ExecutionTimeFetch).unwrap();
        assert_eq!(exec.name, "EXECUTION_TIME_FETCH_ANCHOR");
    }

    #[test]
    fn canonical_keys_and_numeric_tid() {
        let q = r#"/*pilotscope {"anchors": {}, "host": "10.0.0.2", "port": 9000, "enableTerminate": true, "tid": 12} pilotscope*/ select 1"#;
        let parsed = parse(q).unwrap().unwrap();
        assert!(parsed.anchors.is_empty());
        assert_eq!(parsed.endpoint, Some(Endpoint::new("10.0.0.2", 9000)));
        assert_eq!(parsed.tid.as_deref(), Some("12"));
    }

    #[test]
    fn missing_port_disables_sending() {
        let q = r#"/*pilotscope {"anchor": {"RECORD_FETCH_ANCHOR": {}}, "url": "localhost", "enableTerminate": false} pilotscope*/ select 1"#;
        let parsed = parse(q).unwrap().unwrap();
        assert!(parsed.endpoint.is_none());
        assert!(parsed.anchors.is_enabled(AnchorKind::RecordFetch));
    }

    #[test]
    fn unknown_anchor_wins_over_malformed_body() {
        let q = r#"/*pilotscope {"anchor": {"AAA_BROKEN": 3, "CARD_REPLACE_ANCHOR": {"subquery": [], "card": [1.0]}}, "enableTerminate": false} pilotscope*/ select 1"#;
        assert!(matches!(
            parse(q),
            Err(DirectiveError::UnknownAnchor(name)) if name == "AAA_BROKEN"
        ));
    }

    #[test]
    fn unequal_card_replace_sequences_are_rejected() {
        let q = r#"/*pilotscope {"anchor": {"CARD_REPLACE_ANCHOR": {"subquery": ["a;", "b;"], "card": [1.0]}}, "enableTerminate": false} pilotscope*/ select 1"#;
        assert!(matches!(parse(q), Err(DirectiveError::Anchor { .. })));
    }

    #[test]
    fn reserved_and_disabled_anchors_are_not_registered() {
        let q = r#"/*pilotscope {"anchor": {"CostAnchorHandler": {}, "HintAnchorHandler": {}, "RECORD_FETCH_ANCHOR": {"enable": false}}, "enableTerminate": false} pilotscope*/ select 1"#;
        let parsed = parse(q).unwrap().unwrap();
        assert!(parsed.anchors.is_empty());
        assert_eq!(
            parsed.reserved,
            vec![AnchorKind::CostAnchorHandler, AnchorKind::HintAnchorHandler]
        );
    }

    #[test]
    fn malformed_json_and_missing_terminate_flag_fail() {
        assert!(matches!(
            parse("/*pilotscope {not json} pilotscope*/ select 1"),
            Err(DirectiveError::Json(_))
        ));
        assert!(matches!(
            parse(r#"/*pilotscope {"anchor": {}} pilotscope*/ select 1"#),
            Err(DirectiveError::Json(_))
        ));
    }

    #[test]
    fn reversed_markers_are_rejected() {
        assert!(matches!(
            parse("pilotscope*/ x /*pilotscope"),
            Err(DirectiveError::Markers(_))
        ));
    }

    #[test]
    fn endpoint_display_strips_scheme() {
        assert_eq!(Endpoint::new("http://localhost/", 8888).to_string(), "localhost:8888");
    }
}
