#![warn(clippy::all, missing_docs)]

//! Core domain logic for the creature roulette.
//!
//! This crate hosts the weighted rarity draw, the embedded catalog,
//! configuration handling, player progress and shop rules, and the backends that
//! persist player state for the terminal UI and any future frontends.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod draw;
pub mod profile;
pub mod progress;
pub mod rarity;
pub mod schedule;
pub mod shop;
pub mod spin;

pub use backend::{Backend, LocalBackend, PlayerContext, RpcBackend};
pub use catalog::{Catalog, CatalogEntry};
pub use config::AppConfig;
pub use draw::{DrawError, DrawHistogram, Roulette};
pub use profile::{PlayerProfile, ProfileStore};
pub use rarity::{Rarity, RarityTable};
pub use shop::{PurchaseReceipt, ShopItem};
pub use spin::{SpinError, SpinOutcome, SpinService};
