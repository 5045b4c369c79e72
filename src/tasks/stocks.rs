//! Stocks: one `ticker` document per listed company.
//!
//! The payload is split in seven groups fetched together:
//!
//!   general | analysis | valuation | historical
//!   upsAndDowns | revenues | statistics

use crate::collector::fetch::{Arg, FieldRequest, ItemPlan, SeriesOrder, Shape, Window};
use crate::provider::resources as r;

pub const COLLECTION: &str = "ticker";
pub const KIND: &str = "ticker";

/// Daily price points kept when not configured.
pub const DEFAULT_WINDOW: usize = 100;

const INDICATOR_TIMEFRAME: &str = "4hour";
const INDICATOR_PERIOD: &str = "10";

pub fn plan(window: Option<usize>) -> ItemPlan {
    let price = Shape::Series(Window::new(
        window.unwrap_or(DEFAULT_WINDOW),
        SeriesOrder::NewestFirst,
    ));

    ItemPlan::default()
        .group(
            "general",
            vec![
                FieldRequest::new("outlook", r::OUTLOOK),
                FieldRequest::new("stockPeers", r::STOCK_PEERS),
                FieldRequest::new("financials", r::FINANCIALS),
                FieldRequest::new("analystEstimates", r::ANALYST_ESTIMATES),
                FieldRequest::new("analystsRecommendations", r::ANALYST_RECOMMENDATIONS),
                by_query("priceTarget", r::PRICE_TARGET),
                by_query("priceTargetSummary", r::PRICE_TARGET_SUMMARY),
            ],
        )
        .group(
            "analysis",
            vec![
                FieldRequest::new("keyMetricsTTM", r::KEY_METRICS_TTM),
                FieldRequest::new("ratios", r::RATIOS_TTM),
                FieldRequest::new("cashflowGrowth", r::CASHFLOW_GROWTH),
                FieldRequest::new("incomeGrowth", r::INCOME_GROWTH),
                FieldRequest::new("balanceSheetGrowth", r::BALANCE_SHEET_GROWTH),
                FieldRequest::new("financialGrowth", r::FINANCIAL_GROWTH),
                FieldRequest::new("financialScore", r::FINANCIAL_SCORE),
                FieldRequest::new("ownerEarnings", r::OWNER_EARNINGS),
                FieldRequest::new("enterpriseValues", r::ENTERPRISE_VALUES),
            ],
        )
        .group(
            "valuation",
            vec![
                FieldRequest::new("discountedCashflow", r::DISCOUNTED_CASH_FLOW),
                FieldRequest::new("advancedDcf", r::ADVANCED_DCF),
                FieldRequest::new("leveredDcf", r::LEVERED_DCF),
                FieldRequest::new("companyRating", r::COMPANY_RATING),
            ],
        )
        .group(
            "historical",
            vec![
                FieldRequest::new("price", r::PRICE_HISTORICAL).shape(price),
                FieldRequest::new("marketCapitalization", r::MARKET_CAP_HISTORICAL),
                FieldRequest::new("dividends", r::DIVIDENDS_HISTORICAL),
                FieldRequest::new("splits", r::SPLITS_HISTORICAL),
                FieldRequest::new("rating", r::RATING_HISTORICAL),
                FieldRequest::new("socialSentiment", r::SOCIAL_SENTIMENT_HISTORICAL),
            ],
        )
        .group(
            "upsAndDowns",
            vec![
                FieldRequest::new("upgradeAndDowngrade", r::UPGRADES_DOWNGRADES),
                FieldRequest::new("upgradesAndDowngradesConsensus", r::UPGRADES_DOWNGRADES_CONSENSUS),
            ],
        )
        .group(
            "revenues",
            vec![
                by_query("revenueProductSegmentation", r::REVENUE_BY_PRODUCT),
                by_query("revenueGeoSegmentation", r::REVENUE_BY_LOCATION),
            ],
        )
        .group(
            "statistics",
            vec![
                indicator("simpleMovingAverage", "sma"),
                indicator("exponentialMovingAverage", "ema"),
                indicator("doubleEMA", "dema"),
                indicator("tripleEMA", "tema"),
                indicator("williams", "wema"),
                indicator("relativeStrengthIndex", "rsi"),
                indicator("averageDirectionalIndex", "adx"),
                indicator("standardDeviation", "standarddeviation"),
            ],
        )
}

/// Endpoints taking the symbol as query parameter.
fn by_query(name: &'static str, resource: &'static str) -> FieldRequest {
    FieldRequest::new(name, resource)
        .path(Vec::new())
        .query("symbol", Arg::Symbol)
}

/// `technical_indicator/4hour/<symbol>?period=10&type=<kind>`
fn indicator(name: &'static str, kind: &str) -> FieldRequest {
    FieldRequest::new(name, r::TECHNICAL_INDICATOR)
        .path(vec![Arg::text(INDICATOR_TIMEFRAME), Arg::Symbol])
        .query("period", Arg::text(INDICATOR_PERIOD))
        .query("type", Arg::text(kind))
}
