//! Endpoint catalog
//!
//! Resource paths relative to the provider base URL.
//! Grouped by the collector that uses them.

// ------------------------------------------------------------
// FMP: symbol catalogs
// ------------------------------------------------------------
pub const STOCK_LIST: &str = "v3/stock/list";
pub const CRYPTO_LIST: &str = "v3/symbol/available-cryptocurrencies";
pub const FOREX_LIST: &str = "v3/symbol/available-forex-currency-pairs";
pub const COMMODITY_LIST: &str = "v3/symbol/available-commodities";

// ------------------------------------------------------------
// FMP: company information
// ------------------------------------------------------------
pub const OUTLOOK: &str = "v4/company-outlook";
pub const STOCK_PEERS: &str = "v3/peers";
pub const FINANCIALS: &str = "v3/financial-statement-full-as-reported";
pub const ANALYST_ESTIMATES: &str = "v3/analyst-estimates";
pub const ANALYST_RECOMMENDATIONS: &str = "v3/analyst-stock-recommendations";
pub const PRICE_TARGET: &str = "v4/price-target";
pub const PRICE_TARGET_SUMMARY: &str = "v4/price-target-summary";

// ------------------------------------------------------------
// FMP: financial analysis
// ------------------------------------------------------------
pub const KEY_METRICS_TTM: &str = "v3/key-metrics-ttm";
pub const RATIOS_TTM: &str = "v3/ratios-ttm";
pub const CASHFLOW_GROWTH: &str = "v3/cashflow-growth";
pub const INCOME_GROWTH: &str = "v3/income-growth";
pub const BALANCE_SHEET_GROWTH: &str = "v3/balance-sheet-statement-growth";
pub const FINANCIAL_GROWTH: &str = "v3/financial-growth";
pub const FINANCIAL_SCORE: &str = "v4/score";
pub const OWNER_EARNINGS: &str = "v4/owner_earnings";
pub const ENTERPRISE_VALUES: &str = "v3/enterprise-values";

// ------------------------------------------------------------
// FMP: valuation
// ------------------------------------------------------------
pub const DISCOUNTED_CASH_FLOW: &str = "v3/discounted-cash-flow";
pub const ADVANCED_DCF: &str = "v4/advanced_discounted_cash_flow";
pub const LEVERED_DCF: &str = "v4/advanced_levered_discounted_cash_flow";
pub const COMPANY_RATING: &str = "v3/ratings";

// ------------------------------------------------------------
// FMP: history
// ------------------------------------------------------------
pub const PRICE_HISTORICAL: &str = "v3/historical-price-full";
pub const MARKET_CAP_HISTORICAL: &str = "v3/historical-market-capitalization";
pub const DIVIDENDS_HISTORICAL: &str = "v3/historical-price-full/stock_dividend";
pub const SPLITS_HISTORICAL: &str = "v3/historical-price-full/stock_split";
pub const RATING_HISTORICAL: &str = "v3/historical-rating";
pub const SOCIAL_SENTIMENT_HISTORICAL: &str = "v4/historical/social-sentiment";

// ------------------------------------------------------------
// FMP: analyst moves, segments, technicals
// ------------------------------------------------------------
pub const UPGRADES_DOWNGRADES: &str = "v4/upgrades-downgrades";
pub const UPGRADES_DOWNGRADES_CONSENSUS: &str = "v4/upgrades-downgrades-consensus";
pub const REVENUE_BY_PRODUCT: &str = "v4/revenue-product-segmentation";
pub const REVENUE_BY_LOCATION: &str = "v4/revenue-geographic-segmentation";
pub const TECHNICAL_INDICATOR: &str = "v3/technical_indicator";

// ------------------------------------------------------------
// FMP: quotes
// ------------------------------------------------------------
pub const QUOTE: &str = "v3/quote";

// ------------------------------------------------------------
// FMP: market wide
// ------------------------------------------------------------
pub const MARKET_INDEX: &str = "v3/quotes/index";
pub const SECTOR_PE_RATIO: &str = "v4/sector_price_earning_ratio";
pub const INDUSTRY_PE_RATIO: &str = "v4/industry_price_earning_ratio";
pub const SECTOR_PERFORMANCE: &str = "v3/sectors-performance";
pub const SECTOR_HISTORICAL_PERFORMANCE: &str = "v3/historical-sectors-performance";
pub const BIGGEST_GAINERS: &str = "v3/gainers";
pub const BIGGEST_LOSERS: &str = "v3/losers";
pub const MOST_ACTIVES: &str = "v3/actives";
pub const SENTIMENT_TRENDING: &str = "v4/social-sentiments/trending";
pub const SENTIMENT_CHANGE: &str = "v4/social-sentiments/change";

// ------------------------------------------------------------
// FMP: news feeds (paginated)
// ------------------------------------------------------------
pub const FMP_ARTICLES: &str = "v3/fmp/articles";
pub const GENERAL_NEWS: &str = "v4/general_news";
pub const PRESS_RELEASES: &str = "v3/press-releases";
pub const STOCK_NEWS: &str = "v3/stock_news";
pub const CRYPTO_NEWS: &str = "v4/crypto_news";
pub const FOREX_NEWS: &str = "v4/forex_news";
pub const STOCK_NEWS_RSS: &str = "v4/stock-news-sentiments-rss-feed";

// ------------------------------------------------------------
// EOD
// ------------------------------------------------------------
pub const EOD_HISTORY: &str = "eod";
