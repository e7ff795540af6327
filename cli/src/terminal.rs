//! Terminal renditions of the page: a [`CartView`] that prints redraws and an
//! [`OverlaySurface`] that prints popups and banners once.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use async_trait::async_trait;
use cartsync_core::CartLineItem;
use cartsync_core::CartView;
use cartsync_core::ItemId;
use cartsync_core::Money;
use cartsync_core::OverlaySurface;
use cartsync_core::Quantity;
use cartsync_core::popup::Overlay;
use cartsync_core::popup::OverlayId;
use cartsync_core::popup::Placement;
use cartsync_core::view::EmptyCart;
use cartsync_core::view::Navigation;
use cartsync_core::view::ViewError;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::trace;

use crate::console::Console;
use crate::console::Tone;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Yes/no questions answered by the next line the shell reads.
#[derive(Default)]
pub struct Prompter {
    pending: Mutex<Option<oneshot::Sender<bool>>>,
}

impl Prompter {
    /// Wait for an answer. A question still open when a new one is asked is
    /// declined.
    pub async fn ask(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).replace(tx);
        rx.await.unwrap_or(false)
    }

    /// Feed an input line to the open question. Returns `false` when no
    /// question was waiting and the line is a command.
    pub fn answer(&self, line: &str) -> bool {
        let Some(tx) = lock(&self.pending).take() else {
            return false;
        };
        let yes = matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes");
        let _ = tx.send(yes);
        true
    }

    /// Decline the open question, if any.
    pub fn decline(&self) {
        lock(&self.pending).take();
    }
}

pub enum Confirm {
    AssumeYes,
    Ask(Arc<Prompter>),
}

pub struct TerminalView {
    console: Console,
    confirm: Confirm,
    base_url: String,
    /// Rows collected for the redraw in progress; flushed with the total.
    frame: Mutex<Vec<String>>,
}

impl TerminalView {
    pub fn new(console: Console, confirm: Confirm, base_url: &str) -> Self {
        Self {
            console,
            confirm,
            base_url: base_url.trim_end_matches('/').to_string(),
            frame: Mutex::new(Vec::new()),
        }
    }
}

pub fn format_row(line: &CartLineItem) -> String {
    format!(
        "{:<8} {:<24} x{:<3} {:>9}",
        line.item_id.as_str(),
        line.name,
        line.quantity.get(),
        line.line_total().to_string()
    )
}

#[async_trait]
impl CartView for TerminalView {
    fn render_line(&self, line: &CartLineItem) -> Result<(), ViewError> {
        lock(&self.frame).push(format_row(line));
        Ok(())
    }

    fn remove_line(&self, item_id: &ItemId) -> Result<(), ViewError> {
        self.console.styled(Tone::Dim, format!("removed {item_id}"));
        Ok(())
    }

    fn render_grand_total(&self, total: Money) {
        let rows = std::mem::take(&mut *lock(&self.frame));
        for row in rows {
            self.console.line(row);
        }
        self.console
            .styled(Tone::Heading, format!("{:<38} {:>9}", "Total", total.to_string()));
    }

    fn render_empty(&self, empty: &EmptyCart) {
        self.console.styled(Tone::Heading, &empty.heading);
        self.console.line(&empty.message);
        self.console.styled(
            Tone::Dim,
            format!(
                "{}: {}{}",
                empty.call_to_action.label, self.base_url, empty.call_to_action.href
            ),
        );
    }

    fn clear_empty(&self) {
        // Every redraw prints the whole list.
    }

    fn render_counter(&self, label: &str) {
        self.console.styled(Tone::Dim, format!("[{label}]"));
    }

    fn correct_quantity_input(&self, item_id: &ItemId, quantity: Quantity) {
        self.console
            .line(format!("{item_id}: quantity capped at {quantity}"));
    }

    fn reset_quantity_selector(&self) {}

    fn navigate(&self, to: Navigation) {
        match to {
            Navigation::SignIn { href } => self.console.styled(
                Tone::Error,
                format!("Sign in required: {}{href}", self.base_url),
            ),
        }
    }

    async fn confirm_removal(&self, item_id: &ItemId, line: Option<&CartLineItem>) -> bool {
        match &self.confirm {
            Confirm::AssumeYes => true,
            Confirm::Ask(prompter) => {
                let what = line.map_or_else(|| item_id.to_string(), |l| l.name.clone());
                self.console
                    .line(format!("Remove {what} from your cart? [y/N]"));
                prompter.ask().await
            }
        }
    }
}

pub struct TerminalSurface {
    console: Console,
}

impl TerminalSurface {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

impl OverlaySurface for TerminalSurface {
    fn show(&self, id: OverlayId, overlay: &Overlay, _placement: Placement) {
        debug!(?id, "overlay shown");
        match overlay {
            Overlay::ItemAdded {
                name,
                details,
                actions,
            } => {
                self.console
                    .styled(Tone::Success, format!("Added {name} to cart"));
                self.console.line(format!("  {details}"));
                let actions: Vec<String> = actions
                    .iter()
                    .map(|a| format!("{}: {}", a.label, a.href))
                    .collect();
                self.console
                    .styled(Tone::Dim, format!("  {}", actions.join("  ")));
            }
            Overlay::Message { text } => self.console.styled(Tone::Success, text),
            Overlay::Error { text } => self.console.styled(Tone::Error, format!("! {text}")),
        }
    }

    fn reposition(&self, id: OverlayId, placement: Placement) {
        trace!(?id, ?placement, "overlay moved");
    }

    fn dismiss(&self, id: OverlayId) {
        debug!(?id, "overlay dismissed");
    }
}
