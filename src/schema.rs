use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Central data model shared by the collectors, the store and the publisher.
///
/// Flow:
/// - `LogicalEntity` comes from a symbol catalog
/// - the Item Fetcher turns it into a `FetchResult`
/// - the Collection Runner folds both into a `Document`
///   and its correlated `EventMessage`
///
/// DESIGN NOTES:
/// - Provider payloads stay opaque (`serde_json::Value`).
/// - Timestamps are taken once, when the document is built.
///

// ------------------------------------------------------------
// Logical entity
// ------------------------------------------------------------
//
// An upstream-addressable identity (ticker, currency pair,
// index code, ...). Read-only once listed.
//
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalEntity {
    /// Provider symbol, e.g. "AAPL", "EURUSD", "GSPC.INDX"
    pub symbol: String,

    /// Human readable display name
    pub name: String,
}

impl LogicalEntity {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }
}

/// Named sub-results of one entity fetch, keyed by logical field name.
pub type FetchResult = Map<String, Value>;

// ------------------------------------------------------------
// Document
// ------------------------------------------------------------
//
// The persisted record. Field names on the wire follow the
// collections already consumed downstream:
//
//   { symbol, name, date, payload, contentStr }
//
// IMPORTANT:
// - `captured_at` is fixed at construction, never at persistence.
// - The correlated message must be derived via `Document::event`
//   so both share the same instant.
//
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "symbol")]
    pub identity: String,

    pub name: String,

    #[serde(rename = "date")]
    pub captured_at: DateTime<Utc>,

    pub payload: FetchResult,

    #[serde(rename = "contentStr")]
    pub serialized_payload: String,
}

impl Document {
    /// Builds a document for `entity`, stamping the current instant.
    pub fn new(entity: &LogicalEntity, payload: FetchResult) -> anyhow::Result<Self> {
        Self::captured(entity, payload, Utc::now())
    }

    /// Builds a document with an explicit capture instant.
    pub fn captured(
        entity: &LogicalEntity,
        payload: FetchResult,
        captured_at: DateTime<Utc>,
    ) -> anyhow::Result<Self> {
        let serialized_payload = serde_json::to_string_pretty(&payload)?;

        Ok(Self {
            identity: entity.symbol.clone(),
            name: entity.name.clone(),
            captured_at,
            payload,
            serialized_payload,
        })
    }

    /// Derives the queue message for this document.
    ///
    /// The message id is `<identity>@<captured_at>` so consumers can
    /// correlate it with the stored record.
    pub fn event(&self, kind: &str) -> anyhow::Result<EventMessage> {
        Ok(EventMessage {
            id: EventMessage::id_for(&self.identity, self.captured_at),
            kind: kind.to_string(),
            value: serde_json::to_string(&self.payload)?,
        })
    }
}

// ------------------------------------------------------------
// Event message
// ------------------------------------------------------------
//
// Lightweight queue payload. One per document, and one per
// paginated feed record.
//
// NOTE:
// Id uniqueness is best-effort only.
//
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub value: String,
}

impl EventMessage {
    pub fn id_for(identity: &str, at: DateTime<Utc>) -> String {
        format!(
            "{}@{}",
            identity,
            at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }

    /// Message for a raw feed record that is not wrapped in a `Document`.
    pub fn for_record(
        identity: &str,
        kind: &str,
        at: DateTime<Utc>,
        record: &Value,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            id: Self::id_for(identity, at),
            kind: kind.to_string(),
            value: serde_json::to_string(record)?,
        })
    }
}

// ------------------------------------------------------------
// Normalized OHLC quote
// ------------------------------------------------------------
//
// Used by the historical series of forex pairs, commodities
// and indices. Numbers stay as provider JSON values so we do
// not introduce float rounding here.
//
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub date: Value,
    pub open: Value,
    pub high: Value,
    pub low: Value,
    pub close: Value,
    pub adj_close: Value,
    pub volume: Value,
}

impl Quote {
    /// Maps one provider row into a quote.
    ///
    /// Accepts both `adjClose` (FMP) and `adjusted_close` (EOD).
    pub fn from_row(row: &Value) -> Self {
        let field = |name: &str| row.get(name).cloned().unwrap_or(Value::Null);

        let adj_close = match row.get("adjClose") {
            Some(v) => v.clone(),
            None => field("adjusted_close"),
        };

        Self {
            date: field("date"),
            open: field("open"),
            high: field("high"),
            low: field("low"),
            close: field("close"),
            adj_close,
            volume: field("volume"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_id_carries_document_capture_instant() {
        let entity = LogicalEntity::new("AAPL", "Apple Inc.");
        let mut payload = FetchResult::new();
        payload.insert("quote".into(), json!({"price": 1.0}));

        let doc = Document::new(&entity, payload).unwrap();
        let msg = doc.event("ticker").unwrap();

        let (identity, stamp) = msg.id.split_once('@').unwrap();
        assert_eq!(identity, "AAPL");

        let parsed = DateTime::parse_from_rfc3339(stamp).unwrap().with_timezone(&Utc);
        assert_eq!(parsed.timestamp_millis(), doc.captured_at.timestamp_millis());
        assert_eq!(msg.kind, "ticker");
    }

    #[test]
    fn document_serializes_with_downstream_field_names() {
        let entity = LogicalEntity::new("EURUSD", "EUR/USD");
        let doc = Document::new(&entity, FetchResult::new()).unwrap();
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["symbol"], "EURUSD");
        assert_eq!(value["name"], "EUR/USD");
        assert!(value["date"].is_string());
        assert_eq!(value["contentStr"], "{}");
    }

    #[test]
    fn quote_accepts_both_adjusted_close_spellings() {
        let fmp = Quote::from_row(&json!({"date": "2024-01-02", "close": 1.1, "adjClose": 1.0}));
        let eod = Quote::from_row(&json!({"date": "2024-01-02", "close": 1.1, "adjusted_close": 0.9}));

        assert_eq!(fmp.adj_close, json!(1.0));
        assert_eq!(eod.adj_close, json!(0.9));
        assert_eq!(eod.volume, Value::Null);
    }
}
