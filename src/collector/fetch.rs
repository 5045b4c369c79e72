use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::provider::{FetchOutcome, Fetcher};
use crate::schema::{FetchResult, LogicalEntity, Quote};
use crate::util;

/// A request argument, rendered per entity.
#[derive(Debug, Clone)]
pub enum Arg {
    /// The entity symbol
    Symbol,

    /// Constant text
    Text(String),

    /// `YYYY-MM-DD`, N days before the fetch
    DaysAgo(i64),
}

impl Arg {
    pub fn text(value: impl Into<String>) -> Self {
        Arg::Text(value.into())
    }

    fn render(&self, entity: &LogicalEntity, now: DateTime<Utc>) -> String {
        match self {
            Arg::Symbol => entity.symbol.clone(),
            Arg::Text(t) => t.clone(),
            Arg::DaysAgo(days) => util::days_before(now, *days),
        }
    }
}

/// Ordering of a provider time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesOrder {
    NewestFirst,
    OldestFirst,
}

/// Keeps the `points` most recent entries of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub points: usize,
    pub order: SeriesOrder,
}

impl Window {
    pub fn new(points: usize, order: SeriesOrder) -> Self {
        Self { points, order }
    }

    pub fn apply(&self, mut items: Vec<Value>) -> Vec<Value> {
        if items.len() <= self.points {
            return items;
        }
        match self.order {
            SeriesOrder::NewestFirst => {
                items.truncate(self.points);
                items
            }
            SeriesOrder::OldestFirst => items.split_off(items.len() - self.points),
        }
    }
}

/// How a field payload is reshaped before it lands in the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Kept as returned
    Raw,

    /// Array (or `{"historical": [...]}`) windowed, rows untouched
    Series(Window),

    /// Like `Series`, rows normalized into `Quote`
    Quotes(Window),
}

impl Shape {
    /// Value used when the field has no data.
    fn neutral(&self) -> Value {
        match self {
            Shape::Raw => Value::Object(Map::new()),
            Shape::Series(_) | Shape::Quotes(_) => Value::Array(Vec::new()),
        }
    }

    fn apply(&self, data: Value) -> Value {
        match self {
            Shape::Raw => data,
            Shape::Series(window) => match series_rows(data) {
                Ok(rows) => Value::Array(window.apply(rows)),
                Err(other) => other,
            },
            Shape::Quotes(window) => {
                let rows = series_rows(data).unwrap_or_default();
                let quotes = rows
                    .iter()
                    .map(Quote::from_row)
                    .filter_map(|q| serde_json::to_value(q).ok())
                    .collect();
                Value::Array(window.apply(quotes))
            }
        }
    }
}

/// Extracts the rows of a series payload.
///
/// FMP wraps daily history as `{"symbol": .., "historical": [..]}`,
/// other endpoints return a bare array. Anything else is handed back.
fn series_rows(data: Value) -> Result<Vec<Value>, Value> {
    match data {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => match map.remove("historical") {
            Some(Value::Array(rows)) => Ok(rows),
            Some(other) => {
                map.insert("historical".into(), other);
                Err(Value::Object(map))
            }
            None => Err(Value::Object(map)),
        },
        other => Err(other),
    }
}

/// One provider read contributing one named field.
#[derive(Debug, Clone)]
pub struct FieldRequest {
    pub group: Option<&'static str>,
    pub name: &'static str,
    pub resource: &'static str,
    pub path: Vec<Arg>,
    pub query: Vec<(&'static str, Arg)>,
    pub shape: Shape,
}

impl FieldRequest {
    /// Field with the symbol as only path segment.
    pub fn new(name: &'static str, resource: &'static str) -> Self {
        Self {
            group: None,
            name,
            resource,
            path: vec![Arg::Symbol],
            query: Vec::new(),
            shape: Shape::Raw,
        }
    }

    pub fn in_group(mut self, group: &'static str) -> Self {
        self.group = Some(group);
        self
    }

    pub fn path(mut self, path: Vec<Arg>) -> Self {
        self.path = path;
        self
    }

    pub fn query(mut self, key: &'static str, value: Arg) -> Self {
        self.query.push((key, value));
        self
    }

    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }
}

/// The full set of reads for one kind of entity.
#[derive(Debug, Clone, Default)]
pub struct ItemPlan {
    pub fields: Vec<FieldRequest>,
}

impl ItemPlan {
    pub fn new(fields: Vec<FieldRequest>) -> Self {
        Self { fields }
    }

    /// Adds every field under `group`.
    pub fn group(mut self, group: &'static str, fields: Vec<FieldRequest>) -> Self {
        self.fields
            .extend(fields.into_iter().map(|f| f.in_group(group)));
        self
    }
}

/// Item Fetcher
///
/// Issues every read of the plan concurrently and assembles the
/// `FetchResult`.
///
/// GUARANTEES:
/// - never fails; a missing or failed field degrades to an empty
///   value (`{}` or `[]`) and the other fields are unaffected
/// - series are windowed to the configured number of points
///
/// LOGGING:
/// - `Empty` at debug level
/// - `Failed` at warn level (the request layer already logged the cause)
///
#[derive(Clone)]
pub struct ItemFetcher {
    fetcher: Arc<dyn Fetcher>,
    plan: Arc<ItemPlan>,
}

impl ItemFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>, plan: ItemPlan) -> Self {
        Self {
            fetcher,
            plan: Arc::new(plan),
        }
    }

    pub async fn fetch(&self, entity: &LogicalEntity) -> FetchResult {
        let now = Utc::now();

        let reads = self.plan.fields.iter().map(|field| async move {
            let path: Vec<String> = field.path.iter().map(|a| a.render(entity, now)).collect();
            let query: Vec<(String, String)> = field
                .query
                .iter()
                .map(|(k, a)| (k.to_string(), a.render(entity, now)))
                .collect();

            let outcome = self.fetcher.fetch(field.resource, &path, &query).await;
            (field, outcome)
        });

        let mut result = FetchResult::new();

        for (field, outcome) in join_all(reads).await {
            let value = match outcome {
                FetchOutcome::Data(data) => field.shape.apply(data),
                FetchOutcome::Empty => {
                    debug!(
                        "[{}] {}: no data for field {}",
                        self.fetcher.name(),
                        entity.symbol,
                        field.name
                    );
                    field.shape.neutral()
                }
                FetchOutcome::Failed(e) => {
                    warn!(
                        "[{}] {}: field {} degraded to empty: {}",
                        self.fetcher.name(),
                        entity.symbol,
                        field.name,
                        e
                    );
                    field.shape.neutral()
                }
            };

            match field.group {
                None => {
                    result.insert(field.name.to_string(), value);
                }
                Some(group) => {
                    let slot = result
                        .entry(group.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Some(map) = slot.as_object_mut() {
                        map.insert(field.name.to_string(), value);
                    }
                }
            }
        }

        result
    }
}
