//! Forex: current quote plus normalized daily quotes per pair.

use crate::collector::fetch::{FieldRequest, ItemPlan, SeriesOrder, Shape, Window};
use crate::provider::resources as r;

pub const COLLECTION: &str = "forex";
pub const KIND: &str = "forex-price";
pub const DEFAULT_WINDOW: usize = 20;

pub fn plan(window: Option<usize>) -> ItemPlan {
    ItemPlan::new(vec![FieldRequest::new("quote", r::QUOTE)]).group(
        "historical",
        vec![
            FieldRequest::new("quotes", r::PRICE_HISTORICAL).shape(Shape::Quotes(Window::new(
                window.unwrap_or(DEFAULT_WINDOW),
                SeriesOrder::NewestFirst,
            ))),
        ],
    )
}
