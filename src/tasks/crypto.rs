//! Crypto: current quote plus daily history per coin.

use crate::collector::fetch::{FieldRequest, ItemPlan, SeriesOrder, Shape, Window};
use crate::provider::resources as r;

pub const COLLECTION: &str = "crypto";
pub const KIND: &str = "ticker";
pub const DEFAULT_WINDOW: usize = 100;

pub fn plan(window: Option<usize>) -> ItemPlan {
    ItemPlan::new(vec![
        FieldRequest::new("quote", r::QUOTE),
        FieldRequest::new("daily", r::PRICE_HISTORICAL).shape(Shape::Series(Window::new(
            window.unwrap_or(DEFAULT_WINDOW),
            SeriesOrder::NewestFirst,
        ))),
    ])
}
