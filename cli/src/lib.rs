//! Terminal shell for the cart synchronizer.

pub mod console;
pub mod shell;
pub mod terminal;

use std::path::Path;

use anyhow::Context;
use cartsync_core::CartLineItem;

/// Server-rendered cart lines, as a JSON array.
pub fn parse_cart(json: &str) -> anyhow::Result<Vec<CartLineItem>> {
    serde_json::from_str(json).context("cart file is not a JSON array of cart lines")
}

pub fn load_cart(path: &Path) -> anyhow::Result<Vec<CartLineItem>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read cart file {}", path.display()))?;
    parse_cart(&text)
}
