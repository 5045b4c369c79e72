use std::sync::Arc;

use log::{info, warn};

use super::catalog::{Catalog, Selection};
use crate::collector::fetch::ItemFetcher;
use crate::collector::orchestrator::Job;
use crate::collector::runner::{CommitSink, run_collection};
use crate::provider::Fetcher;
use crate::schema::{Document, LogicalEntity};

/// Entity-based job: list a catalog, fetch every entity, commit
/// in batches.
///
/// Every entity-based source (stocks, crypto, forex, indices,
/// commodities, market summary) is one of these, differing only
/// by catalog, plan, sink and message kind.
///
/// FAILURE MODEL:
/// - catalog unavailable: the job fails (orchestrator retries it)
/// - empty selection: logged, job succeeds
/// - entity / commit failures: handled by the Collection Runner
///
pub struct CollectionJob {
    pub name: &'static str,

    /// Message `type` of every produced event
    pub kind: &'static str,

    pub catalog: Catalog,

    /// Provider used to list a remote catalog
    pub catalog_fetcher: Arc<dyn Fetcher>,

    pub selection: Selection,
    pub items: ItemFetcher,
    pub sink: CommitSink,
    pub batch_size: usize,
}

#[async_trait::async_trait]
impl Job for CollectionJob {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self) -> anyhow::Result<()> {
        let listed = self
            .catalog
            .list(self.catalog_fetcher.as_ref())
            .await
            .map_err(|e| anyhow::anyhow!("{}: symbol catalog unavailable: {}", self.name, e))?;

        let entities = self.selection.apply(listed);
        if entities.is_empty() {
            warn!("{}: no symbols found", self.name);
            return Ok(());
        }

        info!(
            "{}: processing {} symbols in batches of {}",
            self.name,
            entities.len(),
            self.batch_size
        );

        let (items, kind) = (&self.items, self.kind);
        let report = run_collection(&entities, self.batch_size, &self.sink, move |entity: LogicalEntity| async move {
            let payload = items.fetch(&entity).await;
            let doc = Document::new(&entity, payload)?;
            let msg = doc.event(kind)?;
            Ok::<_, anyhow::Error>((doc, msg))
        })
        .await;

        info!(
            "{}: {} documents committed, {} entities failed, {}/{} commits failed",
            self.name,
            report.committed,
            report.failed_entities,
            report.failed_commits,
            report.commits
        );

        Ok(())
    }
}
