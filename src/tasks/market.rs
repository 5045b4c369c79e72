//! Market summary: a single market-wide document per run.

use crate::collector::fetch::{Arg, FieldRequest, ItemPlan};
use crate::provider::resources as r;
use crate::schema::LogicalEntity;

pub const COLLECTION: &str = "marketSummary";
pub const KIND: &str = "market";

pub fn entity() -> LogicalEntity {
    LogicalEntity::new("market", "Market summary")
}

pub fn plan() -> ItemPlan {
    ItemPlan::default()
        .group(
            "performances",
            vec![
                market_wide("index", r::MARKET_INDEX),
                market_wide("sectorPEratio", r::SECTOR_PE_RATIO),
                market_wide("industryPEratio", r::INDUSTRY_PE_RATIO),
                market_wide("sectorPerformance", r::SECTOR_PERFORMANCE),
                market_wide("sectorHistorical", r::SECTOR_HISTORICAL_PERFORMANCE),
                market_wide("biggestGainers", r::BIGGEST_GAINERS),
                market_wide("biggestLosers", r::BIGGEST_LOSERS),
                market_wide("mostActives", r::MOST_ACTIVES),
            ],
        )
        .group(
            "socialSentiments",
            vec![
                sentiment("trendingBullish", r::SENTIMENT_TRENDING, "bullish"),
                sentiment("trendingBearish", r::SENTIMENT_TRENDING, "bearish"),
                sentiment("changesBullish", r::SENTIMENT_CHANGE, "bullish"),
                sentiment("changesBearish", r::SENTIMENT_CHANGE, "bearish"),
            ],
        )
}

fn market_wide(name: &'static str, resource: &'static str) -> FieldRequest {
    FieldRequest::new(name, resource).path(Vec::new())
}

fn sentiment(name: &'static str, resource: &'static str, mood: &str) -> FieldRequest {
    market_wide(name, resource)
        .query("type", Arg::text(mood))
        .query("source", Arg::text("stocktwits"))
}
