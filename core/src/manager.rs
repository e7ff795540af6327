//! Cart state synchronizer.
//!
//! [`CartManager`] owns the client's [`CartSnapshot`], turns user intent into
//! remote calls, and re-renders through [`CartView`] once the server has
//! confirmed. Quantity edits are debounced per item; every update/remove
//! takes a request stamp so a slow, superseded response is discarded instead
//! of overwriting newer state.

use std::collections::HashMap;
use std::num::IntErrorKind;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use cartsync_async_utils::KeyedDebouncer;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::api::AddConfirmation;
use crate::api::CartApi;
use crate::config::CartConfig;
use crate::error::CartError;
use crate::error::CartResult;
use crate::error::ErrorKind;
use crate::model::CartLineItem;
use crate::model::CartSnapshot;
use crate::model::ItemId;
use crate::model::Money;
use crate::model::ProductId;
use crate::model::ProductSummary;
use crate::model::Quantity;
use crate::popup::OverlaySurface;
use crate::popup::PopupPresenter;
use crate::popup::Viewport;
use crate::sequencer::RequestSequencer;
use crate::sequencer::Ticket;
use crate::view::CartView;
use crate::view::EmptyCart;
use crate::view::Navigation;
use crate::view::PageHooks;
use crate::view::counter_label;

const ADD_FAILED: &str = "Please log in to add items to cart";
const UPDATE_FAILED: &str = "Failed to update quantity";
const REMOVE_FAILED: &str = "Failed to remove item";

/// A user request to change a line's quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityChange {
    /// `+` stepper.
    Increase,
    /// `-` stepper.
    Decrease,
    /// Raw text from the quantity field (typing, arrow keys, blur).
    Typed(String),
    /// A numeric value from a control that already parsed it.
    Absolute(i64),
}

/// What `change_quantity` did with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// An update carrying this quantity is armed behind the debounce timer.
    Scheduled(Quantity),
    /// The value was above the maximum; the field was corrected and an
    /// update carrying the maximum is armed.
    Clamped(Quantity),
    /// The value was below 1; a removal is armed.
    RemovalScheduled,
    /// The stepper was already at its bound; nothing was scheduled.
    Unchanged,
    /// Not a number; nothing was scheduled.
    Ignored,
    /// No line for the item; nothing was scheduled.
    UnknownItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// The user did not confirm.
    Declined,
    /// The server confirmed, but a newer request for the item owns its state.
    Superseded,
}

/// Applied to a debounced edit once its quiet period ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Set(Quantity),
    Remove,
}

struct Inner {
    api: Arc<dyn CartApi>,
    view: Arc<dyn CartView>,
    presenter: PopupPresenter,
    hooks: PageHooks,
    empty_cart: EmptyCart,
    sign_in: String,
    snapshot: Mutex<CartSnapshot>,
    /// Latest not-yet-sent quantity edit per item.
    intents: Mutex<HashMap<ItemId, Intent>>,
    sequencer: Mutex<RequestSequencer>,
    debouncer: KeyedDebouncer<ItemId>,
    initialized: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the cart synchronizer. Clones share one instance.
#[derive(Clone)]
pub struct CartManager {
    inner: Arc<Inner>,
}

pub struct CartManagerBuilder {
    api: Arc<dyn CartApi>,
    view: Arc<dyn CartView>,
    surface: Arc<dyn OverlaySurface>,
    config: CartConfig,
    hooks: PageHooks,
    viewport: Option<watch::Receiver<Viewport>>,
}

impl CartManagerBuilder {
    pub fn config(mut self, config: CartConfig) -> Self {
        self.config = config;
        self
    }

    pub fn hooks(mut self, hooks: PageHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Geometry updates the confirmation popup follows while visible.
    pub fn viewport(mut self, viewport: watch::Receiver<Viewport>) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// Must be called from within a tokio runtime.
    pub fn build(self) -> CartManager {
        let viewport = self
            .viewport
            .unwrap_or_else(|| watch::channel(Viewport::default()).1);
        let presenter = PopupPresenter::new(
            self.surface,
            viewport,
            &self.config.timings,
            self.config.links.clone(),
        );
        CartManager {
            inner: Arc::new(Inner {
                api: self.api,
                view: self.view,
                presenter,
                hooks: self.hooks,
                empty_cart: EmptyCart::new(&self.config.links),
                sign_in: self.config.links.sign_in.clone(),
                snapshot: Mutex::new(CartSnapshot::default()),
                intents: Mutex::new(HashMap::new()),
                sequencer: Mutex::new(RequestSequencer::default()),
                debouncer: KeyedDebouncer::new(self.config.timings.debounce()),
                initialized: AtomicBool::new(false),
            }),
        }
    }
}

impl CartManager {
    pub fn builder(
        api: Arc<dyn CartApi>,
        view: Arc<dyn CartView>,
        surface: Arc<dyn OverlaySurface>,
    ) -> CartManagerBuilder {
        CartManagerBuilder {
            api,
            view,
            surface,
            config: CartConfig::default(),
            hooks: PageHooks::default(),
            viewport: None,
        }
    }

    /// Seed the cache with the lines the server rendered into the page, draw
    /// every line total and the grand total, and refresh the counter.
    ///
    /// Only the first call has any effect; it returns `true`.
    pub async fn initialize(&self, lines: Vec<CartLineItem>) -> bool {
        if self
            .inner
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("cart manager already initialized");
            return false;
        }
        let empty = {
            let mut snapshot = lock(&self.inner.snapshot);
            *snapshot = CartSnapshot::new(lines);
            snapshot.is_empty()
        };
        info!("cart initialized");
        if empty {
            self.inner.view.render_empty(&self.inner.empty_cart);
        }
        self.refresh_totals();
        self.refresh_counter().await;
        true
    }

    pub fn snapshot(&self) -> CartSnapshot {
        lock(&self.inner.snapshot).clone()
    }

    /// Send an add request. On success the confirmation popup is shown, the
    /// quantity selector is reset, the line is merged into the cache, and the
    /// totals and counter are refreshed. Nothing changes locally on failure.
    pub async fn add_item(
        &self,
        product_id: &ProductId,
        quantity: i64,
        product: Option<ProductSummary>,
    ) -> CartResult<()> {
        let quantity = Quantity::clamped(quantity);
        let confirmation = match self.inner.api.add_item(product_id, quantity).await {
            Ok(confirmation) => confirmation,
            Err(err) => {
                self.surface_error(&err, ADD_FAILED);
                return Err(err);
            }
        };
        info!(%product_id, %quantity, "added to cart");

        self.inner.view.reset_quantity_selector();
        self.inner.hooks.quantity_reset();
        self.inner
            .presenter
            .show_item_added(product.as_ref(), quantity);

        if self.merge_added(product_id, quantity, product, confirmation) {
            self.inner.view.clear_empty();
        }
        self.refresh_totals();
        self.refresh_counter().await;
        Ok(())
    }

    /// Merge a confirmed add into the cache. Returns whether the cart was
    /// empty before.
    ///
    /// A new line with no product data is cached under the product id at a
    /// zero unit price so that it is still listed and can be edited.
    fn merge_added(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
        product: Option<ProductSummary>,
        confirmation: AddConfirmation,
    ) -> bool {
        let item_id = confirmation
            .item_id
            .unwrap_or_else(|| ItemId::new(product_id.as_str()));
        let (line, was_empty) = {
            let mut snapshot = lock(&self.inner.snapshot);
            let was_empty = snapshot.is_empty();
            let line = match (snapshot.line(&item_id), product) {
                (Some(existing), _) => CartLineItem {
                    quantity: confirmation.quantity.unwrap_or_else(|| {
                        let merged = i64::from(existing.quantity.get()) + i64::from(quantity.get());
                        Quantity::clamped(merged)
                    }),
                    ..existing.clone()
                },
                (None, Some(product)) => CartLineItem {
                    item_id: item_id.clone(),
                    name: product.name,
                    unit_price: product.unit_price,
                    quantity: confirmation.quantity.unwrap_or(quantity),
                },
                (None, None) => {
                    warn!(%item_id, %product_id, "added line has no product data; price unknown");
                    CartLineItem {
                        item_id: item_id.clone(),
                        name: product_id.to_string(),
                        unit_price: Money::ZERO,
                        quantity: confirmation.quantity.unwrap_or(quantity),
                    }
                }
            };
            snapshot.upsert(line.clone());
            (line, was_empty)
        };
        debug!(item_id = %line.item_id, quantity = %line.quantity, "merged added line");
        was_empty
    }

    /// Route a quantity edit. Steppers move by one within `[1, 25]`; typed
    /// values above 25 are clamped, below 1 become a removal, and anything
    /// non-numeric is ignored. Accepted edits are debounced per item.
    pub fn change_quantity(&self, item_id: &ItemId, change: QuantityChange) -> ChangeOutcome {
        let requested = match change {
            QuantityChange::Increase | QuantityChange::Decrease => {
                let Some(base) = self.current_intent(item_id) else {
                    warn!(%item_id, "quantity change for unknown cart line");
                    return ChangeOutcome::UnknownItem;
                };
                let Intent::Set(base) = base else {
                    // A removal is already armed; the stepper is ignored.
                    return ChangeOutcome::Unchanged;
                };
                let next = if change == QuantityChange::Increase {
                    base.increment()
                } else {
                    base.decrement()
                };
                if next == base {
                    return ChangeOutcome::Unchanged;
                }
                i64::from(next.get())
            }
            QuantityChange::Typed(text) => match text.trim().parse::<i64>() {
                Ok(value) => value,
                // Too many digits is still a number: clamp or remove.
                Err(err) => match err.kind() {
                    IntErrorKind::PosOverflow => i64::MAX,
                    IntErrorKind::NegOverflow => i64::MIN,
                    _ => return ChangeOutcome::Ignored,
                },
            },
            QuantityChange::Absolute(value) => value,
        };

        if lock(&self.inner.snapshot).line(item_id).is_none() {
            warn!(%item_id, "quantity change for unknown cart line");
            return ChangeOutcome::UnknownItem;
        }

        let (intent, outcome) = if requested < i64::from(Quantity::MIN.get()) {
            (Intent::Remove, ChangeOutcome::RemovalScheduled)
        } else if requested > i64::from(Quantity::MAX.get()) {
            self.inner
                .view
                .correct_quantity_input(item_id, Quantity::MAX);
            (
                Intent::Set(Quantity::MAX),
                ChangeOutcome::Clamped(Quantity::MAX),
            )
        } else {
            let quantity = Quantity::clamped(requested);
            (Intent::Set(quantity), ChangeOutcome::Scheduled(quantity))
        };
        self.schedule(item_id.clone(), intent);
        outcome
    }

    /// Quantity steppers build on: the armed edit if any, else the cached line.
    fn current_intent(&self, item_id: &ItemId) -> Option<Intent> {
        if let Some(intent) = lock(&self.inner.intents).get(item_id) {
            return Some(*intent);
        }
        lock(&self.inner.snapshot)
            .line(item_id)
            .map(|line| Intent::Set(line.quantity))
    }

    fn schedule(&self, item_id: ItemId, intent: Intent) {
        lock(&self.inner.intents).insert(item_id.clone(), intent);
        let manager = self.clone();
        let key = item_id.clone();
        self.inner.debouncer.schedule(key, async move {
            let intent = lock(&manager.inner.intents).remove(&item_id);
            match intent {
                Some(Intent::Set(quantity)) => {
                    // Failures were already surfaced to the user.
                    let _ = manager.apply_quantity(&item_id, quantity).await;
                }
                Some(Intent::Remove) => {
                    let _ = manager.remove_item(&item_id).await;
                }
                None => {}
            }
        });
    }

    fn issue_ticket(&self, item_id: &ItemId) -> Ticket {
        lock(&self.inner.sequencer).issue(item_id)
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        lock(&self.inner.sequencer).is_current(ticket)
    }

    /// Send one update and, once confirmed, apply it to the cache and view.
    /// Returns `Ok(false)` when the response was superseded and dropped.
    async fn apply_quantity(&self, item_id: &ItemId, quantity: Quantity) -> CartResult<bool> {
        let ticket = self.issue_ticket(item_id);
        if let Err(err) = self.inner.api.update_item(item_id, quantity).await {
            if self.is_current(&ticket) {
                self.surface_error(&err, UPDATE_FAILED);
            } else {
                debug!(
                    %item_id,
                    stamp = ticket.stamp(),
                    "ignoring failure of superseded update: {err}"
                );
            }
            return Err(err);
        }
        if !self.is_current(&ticket) {
            debug!(
                %item_id,
                stamp = ticket.stamp(),
                "discarding superseded update response"
            );
            return Ok(false);
        }

        let applied = lock(&self.inner.snapshot)
            .set_quantity(item_id, quantity)
            .is_some();
        if !applied {
            let err = CartError::MissingLine {
                item_id: item_id.clone(),
            };
            warn!("{err}; update confirmed but not shown");
            return Err(err);
        }
        self.refresh_totals();
        self.refresh_counter().await;
        Ok(true)
    }

    /// Remove a line after the user confirms. Any armed edit for the item
    /// is dropped and in-flight updates for it are superseded.
    pub async fn remove_item(&self, item_id: &ItemId) -> CartResult<RemoveOutcome> {
        let line = lock(&self.inner.snapshot).line(item_id).cloned();
        if !self
            .inner
            .view
            .confirm_removal(item_id, line.as_ref())
            .await
        {
            return Ok(RemoveOutcome::Declined);
        }

        self.inner.debouncer.cancel(item_id);
        lock(&self.inner.intents).remove(item_id);
        let ticket = self.issue_ticket(item_id);

        if let Err(err) = self.inner.api.remove_item(item_id).await {
            if self.is_current(&ticket) {
                self.surface_error(&err, REMOVE_FAILED);
            } else {
                debug!(
                    %item_id,
                    stamp = ticket.stamp(),
                    "ignoring failure of superseded remove: {err}"
                );
            }
            return Err(err);
        }
        if !self.is_current(&ticket) {
            debug!(%item_id, "discarding superseded remove response");
            return Ok(RemoveOutcome::Superseded);
        }

        let now_empty = {
            let mut snapshot = lock(&self.inner.snapshot);
            if snapshot.remove(item_id).is_none() {
                warn!(%item_id, "removed item had no cart line");
            }
            snapshot.is_empty()
        };
        if let Err(err) = self.inner.view.remove_line(item_id) {
            warn!("{err}");
        }
        if now_empty {
            self.inner.view.render_empty(&self.inner.empty_cart);
            self.inner.hooks.cart_emptied();
        }
        info!(%item_id, "removed from cart");
        self.refresh_totals();
        self.refresh_counter().await;
        Ok(RemoveOutcome::Removed)
    }

    /// Redraw every line total from unit price × quantity and mirror the sum
    /// into the page's total regions.
    pub fn refresh_totals(&self) -> Money {
        let snapshot = self.snapshot();
        for line in snapshot.items() {
            if let Err(err) = self.inner.view.render_line(line) {
                warn!("{err}");
            }
        }
        let total = snapshot.grand_total();
        self.inner.view.render_grand_total(total);
        total
    }

    /// Fetch the authoritative count for the badge. Failures are logged only.
    pub async fn refresh_counter(&self) -> Option<u32> {
        match self.inner.api.cart_count().await {
            Ok(count) => {
                self.inner.view.render_counter(&counter_label(count));
                Some(count)
            }
            Err(err) => {
                warn!("error updating cart counter: {err}");
                None
            }
        }
    }

    /// Drop every armed quantity edit.
    pub fn shutdown(&self) {
        self.inner.debouncer.cancel_all();
        lock(&self.inner.intents).clear();
    }

    fn surface_error(&self, err: &CartError, fallback: &str) {
        match err.kind() {
            ErrorKind::AuthRequired => {
                info!("session not authenticated, redirecting to sign-in");
                self.inner.view.navigate(Navigation::SignIn {
                    href: self.inner.sign_in.clone(),
                });
            }
            ErrorKind::DomInconsistency => warn!("{err}"),
            ErrorKind::NetworkFailure | ErrorKind::ApplicationError => {
                warn!("{fallback}: {err}");
                self.inner.presenter.show_error(&err.banner_message(fallback));
            }
        }
    }
}
