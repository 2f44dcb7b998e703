//! validate → filter → enrich → aggregate
//!
//! Each stage is a pure function of its input record (or record slice) and
//! the processor configuration.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use contracts::{
    BatchSummary, FilterOp, FilterRule, ProcessedRecord, ProcessorConfig, Record,
};
use serde_json::{Map, Value};

use crate::error::ProcessorError;

/// Allowed clock skew for ingestion timestamps
pub const MAX_FUTURE_SKEW_SECS: i64 = 5;

/// Epoch values above this are taken as milliseconds
const EPOCH_MILLIS_CUTOFF: f64 = 1e12;

/// Drop malformed records
pub fn validate(
    record: &Record,
    config: &ProcessorConfig,
    now: DateTime<Utc>,
) -> Result<(), ProcessorError> {
    let source = record.source();
    let fields = match record.payload() {
        Value::Object(map) if !map.is_empty() => map,
        Value::Object(_) => return Err(ProcessorError::validation(&**source, "empty payload")),
        other => {
            return Err(ProcessorError::validation(
                &**source,
                format!("payload is not an object: {}", kind_of(other)),
            ))
        }
    };

    if let Some(missing) = config
        .required_fields
        .iter()
        .find(|f| !fields.contains_key(f.as_str()))
    {
        return Err(ProcessorError::validation(
            &**source,
            format!("missing required field '{missing}'"),
        ));
    }

    for metric in &config.tracked_metrics {
        if let Some(value) = fields.get(metric) {
            if !value.as_f64().is_some_and(f64::is_finite) {
                return Err(ProcessorError::validation(
                    &**source,
                    format!("metric '{metric}' is not a finite number"),
                ));
            }
        }
    }

    if record.ingested_at() > now + chrono::Duration::seconds(MAX_FUTURE_SKEW_SECS) {
        return Err(ProcessorError::validation(
            &**source,
            "ingestion timestamp is in the future",
        ));
    }

    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A record survives iff every rule passes
pub fn filter(payload: &Value, rules: &[FilterRule]) -> bool {
    rules.iter().all(|rule| rule_matches(payload.get(&rule.field), rule))
}

fn rule_matches(field: Option<&Value>, rule: &FilterRule) -> bool {
    let Some(actual) = field else {
        // Missing field passes only "not equal"
        return rule.op == FilterOp::Ne;
    };
    match rule.op {
        FilterOp::Exists => true,
        FilterOp::Eq => values_equal(actual, &rule.value),
        FilterOp::Ne => !values_equal(actual, &rule.value),
        FilterOp::Gt => compare(actual, &rule.value, |a, b| a > b),
        FilterOp::Gte => compare(actual, &rule.value, |a, b| a >= b),
        FilterOp::Lt => compare(actual, &rule.value, |a, b| a < b),
        FilterOp::Lte => compare(actual, &rule.value, |a, b| a <= b),
        FilterOp::Contains => match (actual, &rule.value) {
            (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|v| values_equal(v, needle)),
            _ => false,
        },
    }
}

/// Numbers compare by value (1 == 1.0), everything else structurally
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(actual: &Value, operand: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_f64(), operand.as_f64()) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

/// Attach derived fields
///
/// Adds `_source`, `_source_kind`, `_ingested_at`, `_processed_at`,
/// `_event_time` (normalized `timestamp`, if present) and `event_score`.
pub fn enrich(
    record: Record,
    config: &ProcessorConfig,
    processed_at: DateTime<Utc>,
) -> Result<ProcessedRecord, ProcessorError> {
    let source = record.source().clone();
    let kind = record.kind();
    let key = record.key().map(str::to_string);
    let sequence = record.sequence();
    let ingested_at = record.ingested_at();

    let mut fields: Map<String, Value> = match record.into_payload() {
        Value::Object(map) => map,
        _ => return Err(ProcessorError::stage("enrich", "payload is not an object")),
    };

    if let Some(raw) = fields.get("timestamp") {
        let event_time = normalize_timestamp(raw).ok_or_else(|| {
            ProcessorError::stage("enrich", format!("unrecognized timestamp {raw}"))
        })?;
        fields.insert("_event_time".into(), Value::String(rfc3339(event_time)));
    }

    if let Some(value) = fields.get("value").and_then(Value::as_f64) {
        let score = value * config.score_multiplier;
        let number = serde_json::Number::from_f64(score).ok_or_else(|| {
            ProcessorError::stage("enrich", format!("event_score overflow for value {value}"))
        })?;
        fields.insert("event_score".into(), Value::Number(number));
    }

    fields.insert("_source".into(), Value::String(source.to_string()));
    fields.insert("_source_kind".into(), Value::String(kind.as_str().into()));
    fields.insert("_ingested_at".into(), Value::String(rfc3339(ingested_at)));
    fields.insert("_processed_at".into(), Value::String(rfc3339(processed_at)));

    Ok(ProcessedRecord {
        source,
        key,
        sequence,
        ingested_at,
        fields,
        anomalous: false,
    })
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Epoch seconds, epoch milliseconds or an RFC 3339 string
fn normalize_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            let millis = if secs.abs() >= EPOCH_MILLIS_CUTOFF {
                secs
            } else {
                secs * 1000.0
            };
            Utc.timestamp_millis_opt(millis as i64).single()
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}

/// Per-batch summaries over surviving records
pub fn aggregate(records: &[ProcessedRecord], metrics: &[String], summary: &mut BatchSummary) {
    for record in records {
        *summary
            .per_source
            .entry(record.source.to_string())
            .or_insert(0) += 1;
        for metric in metrics {
            if let Some(v) = record.number(metric) {
                summary.metrics.entry(metric.clone()).or_default().push(v);
            }
        }
    }
    summary.output_records += records.len();
}
