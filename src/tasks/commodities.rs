//! Commodities: normalized daily quotes, one snapshot per symbol.

use crate::collector::fetch::{FieldRequest, ItemPlan, SeriesOrder, Shape, Window};
use crate::provider::resources as r;

pub const COLLECTION: &str = "commodities";
pub const KIND: &str = "commodity-historical";
pub const DEFAULT_WINDOW: usize = 20;

pub fn plan(window: Option<usize>) -> ItemPlan {
    ItemPlan::default().group(
        "historical",
        vec![
            FieldRequest::new("quotes", r::PRICE_HISTORICAL).shape(Shape::Quotes(Window::new(
                window.unwrap_or(DEFAULT_WINDOW),
                SeriesOrder::NewestFirst,
            ))),
        ],
    )
}
