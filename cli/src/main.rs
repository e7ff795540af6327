//! `cartsync` entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use cartsync_cli::console::Console;
use cartsync_cli::load_cart;
use cartsync_cli::shell::AddArgs;
use cartsync_cli::shell::Shell;
use cartsync_cli::terminal::Confirm;
use cartsync_cli::terminal::Prompter;
use cartsync_cli::terminal::TerminalSurface;
use cartsync_cli::terminal::TerminalView;
use cartsync_core::CartManager;
use cartsync_core::ConfigLoader;
use cartsync_core::HttpCartApi;
use cartsync_core::ProductId;
use clap::Parser;
use clap::Subcommand;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cartsync", version, about = "Keep a food-ordering cart in sync from the terminal")]
struct Cli {
    /// Configuration home (defaults to $CARTSYNC_HOME, then ~/.cartsync).
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Server origin, overriding the configuration.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// JSON array of the cart lines the server rendered.
    #[arg(long, global = true)]
    cart: Option<PathBuf>,

    /// Remove lines without asking.
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the number of lines in the cart.
    Count,
    /// Add a product and exit.
    Add(AddArgs),
    /// Interactive shell (default).
    Shell,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(home) = &cli.home {
        loader = loader.with_home(home);
    }
    let mut config = loader.load().context("failed to load configuration")?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    let lines = match &cli.cart {
        Some(path) => load_cart(path)?,
        None => Vec::new(),
    };

    let api = Arc::new(HttpCartApi::new(&config).context("failed to build cart client")?);
    let console = Console::stdout(!cli.no_color);
    let prompter = Arc::new(Prompter::default());
    let confirm = if cli.yes {
        Confirm::AssumeYes
    } else {
        Confirm::Ask(Arc::clone(&prompter))
    };
    let view = Arc::new(TerminalView::new(console.clone(), confirm, &config.base_url));
    let surface = Arc::new(TerminalSurface::new(console.clone()));
    let manager = CartManager::builder(api, view, surface)
        .config(config)
        .build();

    tracing::info!("cartsync v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Command::Shell) {
        Command::Count => {
            manager
                .refresh_counter()
                .await
                .context("cart count unavailable")?;
        }
        Command::Add(args) => {
            manager.initialize(lines).await;
            let summary = args.summary();
            manager
                .add_item(&ProductId::new(args.product), args.quantity, summary)
                .await?;
        }
        Command::Shell => {
            manager.initialize(lines).await;
            Shell::new(manager, console, prompter)
                .run(BufReader::new(tokio::io::stdin()))
                .await?;
        }
    }
    Ok(())
}
