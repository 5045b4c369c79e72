//! World indices from the EOD provider.
//!
//! `eod/<symbol>?from=<today-360d>&to=<today>&fmt=json`
//!
//! EOD answers oldest first, so the window keeps the tail.

use crate::collector::fetch::{Arg, FieldRequest, ItemPlan, SeriesOrder, Shape, Window};
use crate::provider::resources as r;

pub const COLLECTION: &str = "indices";
pub const KIND: &str = "index";
pub const DEFAULT_WINDOW: usize = 100;

/// Days of history requested.
const LOOKBACK_DAYS: i64 = 360;

pub fn plan(window: Option<usize>) -> ItemPlan {
    ItemPlan::default().group(
        "historical",
        vec![
            FieldRequest::new("quotes", r::EOD_HISTORY)
                .query("from", Arg::DaysAgo(LOOKBACK_DAYS))
                .query("to", Arg::DaysAgo(0))
                .query("fmt", Arg::text("json"))
                .shape(Shape::Quotes(Window::new(
                    window.unwrap_or(DEFAULT_WINDOW),
                    SeriesOrder::OldestFirst,
                ))),
        ],
    )
}
