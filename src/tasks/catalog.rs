use serde_json::Value;

use crate::config::CollectionConfig;
use crate::provider::{FetchError, FetchOutcome, Fetcher};
use crate::schema::LogicalEntity;

/// Where a source gets its entities from.
#[derive(Debug, Clone)]
pub enum Catalog {
    /// Provider endpoint returning `[{"symbol": .., "name": ..}, ...]`
    Remote(&'static str),

    /// Compiled-in list
    Fixed(Vec<LogicalEntity>),
}

impl Catalog {
    /// Lists every entity of the catalog.
    ///
    /// An empty remote list is `Ok(vec![])`; a failed call is an
    /// error so the job can be retried.
    pub async fn list(&self, fetcher: &dyn Fetcher) -> Result<Vec<LogicalEntity>, FetchError> {
        let resource = match self {
            Catalog::Fixed(entities) => return Ok(entities.clone()),
            Catalog::Remote(resource) => *resource,
        };

        match fetcher.fetch(resource, &[], &[]).await {
            FetchOutcome::Data(Value::Array(rows)) => Ok(rows.iter().filter_map(entity_of).collect()),
            FetchOutcome::Data(_) => Err(FetchError::Decode(format!(
                "{} did not return a list",
                resource
            ))),
            FetchOutcome::Empty => Ok(Vec::new()),
            FetchOutcome::Failed(e) => Err(e),
        }
    }
}

/// Catalog row -> entity. Rows without a symbol are skipped,
/// a missing name falls back to the symbol.
fn entity_of(row: &Value) -> Option<LogicalEntity> {
    let symbol = row.get("symbol")?.as_str()?.trim();
    if symbol.is_empty() {
        return None;
    }

    let name = row
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .unwrap_or(symbol);

    Some(LogicalEntity::new(symbol, name))
}

/// World indices served by the EOD provider.
pub fn world_indices() -> Vec<LogicalEntity> {
    [
        ("GSPC.INDX", "S & P 500"),
        ("DJI.INDX", "Dow Jones Industrial Average"),
        ("IXIC.INDX", "Nasdaq Composite Index"),
        ("FTSE.INDX", "FTSE 100 Index"),
        ("GDAXI.INDX", "DAX Index"),
        ("N225.INDX", "Nikkei 225 Index"),
        ("HSI.INDX", "Hang Seng Index"),
        ("FCHI.INDX", "CAC 40 Index"),
        ("STOXX50E.INDX", "Euro Stoxx 50 Index"),
        ("IBOV.INDX", "Bovespa Index"),
    ]
    .into_iter()
    .map(|(symbol, name)| LogicalEntity::new(symbol, name))
    .collect()
}

/// Per-source narrowing of a catalog.
///
/// - `symbols`: allow-list, empty = keep everything
/// - `limit`:   applied after the allow-list, in catalog order
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub symbols: Vec<String>,
    pub limit: Option<usize>,
}

impl Selection {
    pub fn apply(&self, mut entities: Vec<LogicalEntity>) -> Vec<LogicalEntity> {
        if !self.symbols.is_empty() {
            entities.retain(|e| self.symbols.iter().any(|s| s == &e.symbol));
        }
        if let Some(limit) = self.limit {
            entities.truncate(limit);
        }
        entities
    }
}

impl From<&CollectionConfig> for Selection {
    fn from(cfg: &CollectionConfig) -> Self {
        Self {
            symbols: cfg.symbols.clone(),
            limit: cfg.limit,
        }
    }
}
