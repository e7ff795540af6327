//! Root of the `cartsync-core` library.
//!
//! Client-side cart synchronization for the food-ordering site: a
//! [`CartManager`] that keeps a cached [`CartSnapshot`] consistent with the
//! server while coalescing rapid quantity edits, plus the popup presenter
//! that gives transient feedback.

// Library code reports through tracing or the injected view, never stdout.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod config;
pub mod csrf;
pub mod error;
pub mod manager;
pub mod model;
pub mod popup;
pub mod sequencer;
pub mod view;

pub use api::CartApi;
pub use api::HttpCartApi;
pub use config::CartConfig;
pub use config::ConfigLoader;
pub use error::CartError;
pub use error::CartResult;
pub use manager::CartManager;
pub use manager::ChangeOutcome;
pub use manager::QuantityChange;
pub use manager::RemoveOutcome;
pub use model::CartLineItem;
pub use model::CartSnapshot;
pub use model::ItemId;
pub use model::Money;
pub use model::ProductId;
pub use model::ProductSummary;
pub use model::Quantity;
pub use popup::OverlaySurface;
pub use view::CartView;
