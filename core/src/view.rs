//! Presentation seam.
//!
//! The synchronizer never reads state back out of the page: it renders from
//! its [`CartSnapshot`](crate::model::CartSnapshot) through [`CartView`],
//! which a UI shell implements over whatever surface it owns.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Links;
use crate::model::CartLineItem;
use crate::model::ItemId;
use crate::model::Money;
use crate::model::Quantity;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// The page has no row for the item (e.g. it was removed elsewhere).
    #[error("no rendered row for item {0}")]
    MissingAnchor(ItemId),
}

/// Where the shell should send the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    SignIn { href: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub label: String,
    pub href: String,
}

/// Empty-cart state shown in place of the item list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyCart {
    pub heading: String,
    pub message: String,
    pub call_to_action: Link,
}

impl EmptyCart {
    pub fn new(links: &Links) -> Self {
        Self {
            heading: "Your cart is empty".to_string(),
            message: "Add some delicious meals to get started!".to_string(),
            call_to_action: Link {
                label: "Browse Meals".to_string(),
                href: links.browse.clone(),
            },
        }
    }
}

/// Badge text for the cart counter.
pub fn counter_label(count: u32) -> String {
    if count > 0 {
        format!("Cart ({count})")
    } else {
        "Cart".to_string()
    }
}

#[async_trait]
pub trait CartView: Send + Sync {
    /// Show the line's quantity and its line total.
    fn render_line(&self, line: &CartLineItem) -> Result<(), ViewError>;

    /// Drop the line's row.
    fn remove_line(&self, item_id: &ItemId) -> Result<(), ViewError>;

    /// Mirror the grand total into every total/subtotal region on the page.
    fn render_grand_total(&self, total: Money);

    /// Replace the item list with the empty state.
    fn render_empty(&self, empty: &EmptyCart);

    /// Take the empty state down so rows can be drawn again.
    fn clear_empty(&self);

    fn render_counter(&self, label: &str);

    /// Overwrite what the user typed into a row's quantity control.
    fn correct_quantity_input(&self, item_id: &ItemId, quantity: Quantity);

    /// Put the product page's quantity selector back to 1.
    fn reset_quantity_selector(&self);

    fn navigate(&self, to: Navigation);

    /// Ask the user to confirm removing a line.
    async fn confirm_removal(&self, item_id: &ItemId, line: Option<&CartLineItem>) -> bool;
}

type Hook = Arc<dyn Fn() + Send + Sync>;

/// Optional page capabilities, resolved when the page is composed.
///
/// Pages that render extra derived content (such as a product page's
/// "price × selected quantity" label) register a hook instead of the
/// synchronizer probing for it.
#[derive(Clone, Default)]
pub struct PageHooks {
    on_quantity_reset: Option<Hook>,
    on_cart_emptied: Option<Hook>,
}

impl std::fmt::Debug for PageHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHooks")
            .field("on_quantity_reset", &self.on_quantity_reset.is_some())
            .field("on_cart_emptied", &self.on_cart_emptied.is_some())
            .finish()
    }
}

impl PageHooks {
    pub fn on_quantity_reset(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_quantity_reset = Some(Arc::new(hook));
        self
    }

    pub fn on_cart_emptied(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_cart_emptied = Some(Arc::new(hook));
        self
    }

    pub(crate) fn quantity_reset(&self) {
        if let Some(hook) = &self.on_quantity_reset {
            hook();
        }
    }

    pub(crate) fn cart_emptied(&self) {
        if let Some(hook) = &self.on_cart_emptied {
            hook();
        }
    }
}
