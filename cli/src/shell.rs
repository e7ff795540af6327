//! Interactive line shell over a [`CartManager`].
//!
//! Each input line is parsed with clap and executed on its own task so that
//! quantity edits typed in quick succession fall into the same debounce
//! window, and so that a removal question can be answered by the next line.

use std::sync::Arc;

use cartsync_core::CartManager;
use cartsync_core::ChangeOutcome;
use cartsync_core::ItemId;
use cartsync_core::Money;
use cartsync_core::ProductId;
use cartsync_core::ProductSummary;
use cartsync_core::QuantityChange;
use cartsync_core::RemoveOutcome;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::task::JoinSet;
use tracing::debug;

use crate::console::Console;
use crate::console::Tone;
use crate::terminal::Prompter;

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct AddArgs {
    /// Product to add.
    pub product: String,

    /// How many to add; clamped to 1..=25.
    #[arg(default_value_t = 1, allow_negative_numbers = true)]
    pub quantity: i64,

    /// Product name, shown in the confirmation popup.
    #[arg(long, requires = "price")]
    pub name: Option<String>,

    /// Unit price (e.g. `$5.99`), shown in the confirmation popup.
    #[arg(long, requires = "name")]
    pub price: Option<Money>,
}

impl AddArgs {
    pub fn summary(&self) -> Option<ProductSummary> {
        Some(ProductSummary {
            name: self.name.clone()?,
            unit_price: self.price?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ShellCommand {
    /// Add a product to the cart.
    Add(AddArgs),
    /// Step a line's quantity up by one.
    Inc { item: String },
    /// Step a line's quantity down by one.
    Dec { item: String },
    /// Type a value into a line's quantity field.
    Set {
        item: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Remove a line.
    #[command(alias = "remove")]
    Rm { item: String },
    /// Redraw the cart.
    Show,
    /// Refresh the cart badge from the server.
    Count,
    /// Leave the shell.
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Parser)]
#[command(name = "cartsync>", no_binary_name = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

/// `Ok(None)` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, clap::Error> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    ShellLine::try_parse_from(words).map(|parsed| Some(parsed.command))
}

pub struct Shell {
    manager: CartManager,
    console: Console,
    prompter: Arc<Prompter>,
}

impl Shell {
    pub fn new(manager: CartManager, console: Console, prompter: Arc<Prompter>) -> Self {
        Self {
            manager,
            console,
            prompter,
        }
    }

    /// Read commands until `quit` or end of input. Commands still running
    /// are awaited; edits still inside their quiet period are dropped.
    pub async fn run<R>(&self, input: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut running = JoinSet::new();
        while let Some(line) = lines.next_line().await? {
            if self.prompter.answer(&line) {
                continue;
            }
            match parse_line(&line) {
                Ok(None) => {}
                Ok(Some(ShellCommand::Quit)) => break,
                Ok(Some(command)) => {
                    running.spawn(execute(
                        self.manager.clone(),
                        self.console.clone(),
                        command,
                    ));
                }
                Err(err) => self.console.styled(Tone::Error, err.to_string().trim_end()),
            }
            while running.try_join_next().is_some() {}
        }

        self.manager.shutdown();
        self.prompter.decline();
        while running.join_next().await.is_some() {}
        Ok(())
    }
}

pub async fn execute(manager: CartManager, console: Console, command: ShellCommand) {
    match command {
        ShellCommand::Add(args) => {
            let summary = args.summary();
            let product = ProductId::new(args.product);
            if let Err(err) = manager.add_item(&product, args.quantity, summary).await {
                debug!(%product, "add failed: {err}");
            }
        }
        ShellCommand::Inc { item } => {
            change(&manager, &console, &item, QuantityChange::Increase);
        }
        ShellCommand::Dec { item } => {
            change(&manager, &console, &item, QuantityChange::Decrease);
        }
        ShellCommand::Set { item, value } => {
            change(&manager, &console, &item, QuantityChange::Typed(value));
        }
        ShellCommand::Rm { item } => {
            let item_id = ItemId::new(item);
            match manager.remove_item(&item_id).await {
                Ok(RemoveOutcome::Declined) => {
                    console.styled(Tone::Dim, format!("kept {item_id}"));
                }
                Ok(RemoveOutcome::Removed | RemoveOutcome::Superseded) => {}
                Err(err) => debug!(%item_id, "remove failed: {err}"),
            }
        }
        ShellCommand::Show => {
            manager.refresh_totals();
        }
        ShellCommand::Count => {
            if manager.refresh_counter().await.is_none() {
                console.styled(Tone::Error, "cart count unavailable");
            }
        }
        ShellCommand::Quit => {}
    }
}

fn change(manager: &CartManager, console: &Console, item: &str, change: QuantityChange) {
    let item_id = ItemId::new(item);
    match manager.change_quantity(&item_id, change) {
        ChangeOutcome::Scheduled(quantity) | ChangeOutcome::Clamped(quantity) => {
            console.styled(Tone::Dim, format!("{item_id}: {quantity} pending"));
        }
        ChangeOutcome::RemovalScheduled => {
            console.styled(Tone::Dim, format!("{item_id}: removal pending"));
        }
        ChangeOutcome::Unchanged => {
            console.styled(Tone::Dim, format!("{item_id}: already at its limit"));
        }
        ChangeOutcome::Ignored => console.styled(Tone::Error, "quantity must be a number"),
        ChangeOutcome::UnknownItem => {
            console.styled(Tone::Error, format!("no cart line {item_id}"));
        }
    }
}
