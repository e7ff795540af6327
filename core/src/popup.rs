//! Transient overlays: the add-to-cart confirmation popup and error banners.
//!
//! The confirmation popup hangs under the cart icon and follows it while the
//! viewport changes; it is dismissed after [`Timings::confirmation`]. Error
//! banners sit fixed in the top-right corner for [`Timings::error`].

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::Links;
use crate::config::Timings;
use crate::model::ProductSummary;
use crate::model::Quantity;
use crate::view::Link;

const POPUP_WIDTH: f64 = 300.0;
const ANCHOR_GAP: f64 = 10.0;
const EDGE_MARGIN: f64 = 10.0;
const CORNER_OFFSET: f64 = 20.0;

/// Element box in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Geometry the popup is positioned against. Shells publish a new value on
/// every resize/scroll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f64,
    /// The cart icon/link in the navigation bar.
    pub cart_anchor: Option<Rect>,
    pub navbar: Option<Rect>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Fixed position relative to the viewport's top-left corner.
    At { top: f64, left: f64 },
    /// Fixed position relative to the viewport's top-right corner.
    TopRight { top: f64, right: f64 },
}

const TOP_RIGHT: Placement = Placement::TopRight {
    top: CORNER_OFFSET,
    right: CORNER_OFFSET,
};

/// Centered under the cart anchor, kept on screen. A navbar that has slid
/// above the viewport still occupies layout height, so its height is added
/// back. Without an anchor the popup falls back to the top-right corner.
pub fn confirmation_placement(viewport: &Viewport) -> Placement {
    let Some(anchor) = viewport.cart_anchor else {
        return TOP_RIGHT;
    };
    let navbar_offset = match viewport.navbar {
        Some(navbar) if navbar.top < 0.0 => navbar.height,
        _ => 0.0,
    };
    let top = anchor.bottom() + ANCHOR_GAP + navbar_offset;
    let centered = anchor.left + anchor.width / 2.0 - POPUP_WIDTH / 2.0;
    let max_left = viewport.width - POPUP_WIDTH - EDGE_MARGIN;
    let left = centered.min(max_left).max(EDGE_MARGIN);
    Placement::At { top, left }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    ItemAdded {
        name: String,
        /// `Qty: 2 | $10.00`
        details: String,
        actions: Vec<Link>,
    },
    Message {
        text: String,
    },
    Error {
        text: String,
    },
}

pub trait OverlaySurface: Send + Sync {
    fn show(&self, id: OverlayId, overlay: &Overlay, placement: Placement);
    fn reposition(&self, id: OverlayId, placement: Placement);
    fn dismiss(&self, id: OverlayId);
}

/// Build the confirmation content for an add. Without a usable product
/// summary the popup falls back to a plain count message.
pub fn item_added_overlay(
    summary: Option<&ProductSummary>,
    quantity: Quantity,
    links: &Links,
) -> Overlay {
    match summary {
        Some(product) if !product.name.is_empty() && !product.unit_price.is_zero() => {
            Overlay::ItemAdded {
                name: product.name.clone(),
                details: format!("Qty: {quantity} | {}", product.unit_price * quantity),
                actions: vec![
                    Link {
                        label: "View Cart".to_string(),
                        href: links.cart.clone(),
                    },
                    Link {
                        label: "Checkout".to_string(),
                        href: links.checkout.clone(),
                    },
                ],
            }
        }
        _ => {
            let plural = if quantity.get() > 1 { "s" } else { "" };
            Overlay::Message {
                text: format!("{quantity} item{plural} added to cart!"),
            }
        }
    }
}

pub struct PopupPresenter {
    surface: Arc<dyn OverlaySurface>,
    viewport: watch::Receiver<Viewport>,
    confirmation_for: Duration,
    error_for: Duration,
    links: Links,
    next_id: AtomicU64,
    /// Dismissal trigger of the visible confirmation popup, if any.
    active_confirmation: Mutex<Option<CancellationToken>>,
}

impl PopupPresenter {
    pub fn new(
        surface: Arc<dyn OverlaySurface>,
        viewport: watch::Receiver<Viewport>,
        timings: &Timings,
        links: Links,
    ) -> Self {
        Self {
            surface,
            viewport,
            confirmation_for: timings.confirmation(),
            error_for: timings.error(),
            links,
            next_id: AtomicU64::new(1),
            active_confirmation: Mutex::new(None),
        }
    }

    fn next_id(&self) -> OverlayId {
        OverlayId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Show the add confirmation, replacing any confirmation still visible.
    pub fn show_item_added(
        &self,
        summary: Option<&ProductSummary>,
        quantity: Quantity,
    ) -> OverlayId {
        let overlay = item_added_overlay(summary, quantity, &self.links);
        let id = self.next_id();
        let token = CancellationToken::new();
        let previous = self
            .active_confirmation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let mut viewport = self.viewport.clone();
        let placement = confirmation_placement(&viewport.borrow_and_update());
        self.surface.show(id, &overlay, placement);

        let surface = Arc::clone(&self.surface);
        let lifetime = self.confirmation_for;
        tokio::spawn(async move {
            let deadline = tokio::time::sleep(lifetime);
            tokio::pin!(deadline);
            let mut following = true;
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    _ = token.cancelled() => break,
                    changed = viewport.changed(), if following => match changed {
                        Ok(()) => {
                            let placement = confirmation_placement(&viewport.borrow_and_update());
                            surface.reposition(id, placement);
                        }
                        // Shell stopped publishing geometry; keep the last position.
                        Err(_) => following = false,
                    },
                }
            }
            // Dropping the receiver here is what unsubscribes from viewport updates.
            drop(viewport);
            surface.dismiss(id);
        });
        id
    }

    /// Show an error banner. Banners stack; each one expires on its own.
    pub fn show_error(&self, message: &str) -> OverlayId {
        let id = self.next_id();
        self.surface.show(
            id,
            &Overlay::Error {
                text: message.to_string(),
            },
            TOP_RIGHT,
        );
        let surface = Arc::clone(&self.surface);
        let lifetime = self.error_for;
        tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            surface.dismiss(id);
        });
        id
    }
}
