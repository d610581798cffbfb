//! Live player auction engine.
//!
//! This crate implements the bidding core for a sports league auction:
//!
//! - Team budgets and squad caps, enforced before any sale
//! - Per-category player queues with a random deal order
//! - Bid validation against increments, deadlines and budgets
//! - The per-auction round state machine and its timeout sweep
//!
//! # Architecture
//!
//! - `engine`: thread-safe entry point, one lock per auction
//! - `handlers`: business logic for every state-changing operation
//! - `queries`: read-only state access
//! - `state`: in-memory auction structures
//! - `ledger`, `queue`, `session`, `validation`: the pieces handlers combine
//! - `hooks`: persistence and notification seams
//! - `config`: engine defaults
//! - `error`: error types
//!
//! # Example
//!
//! ```ignore
//! use auction_module::{AuctionEngine, CallContext, EngineConfig};
//!
//! let engine = AuctionEngine::new(EngineConfig::default())?;
//! let ctx = CallContext::now();
//!
//! let auction_id = engine.create_auction(&ctx, setup)?;
//! engine.go_live(&ctx, auction_id)?;
//! engine.lock_category(&ctx, auction_id, "Gold")?;
//! engine.next_player(&ctx, auction_id)?;
//! engine.place_bid(&ctx, auction_id, team_id, 600, None)?;
//! engine.finalize_bid(&ctx, auction_id)?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod ledger;
pub mod queries;
pub mod queue;
pub mod session;
pub mod state;
pub mod validation;

pub use config::{ConfigValidationError, EngineConfig};
pub use engine::AuctionEngine;
pub use error::AuctionError;
pub use handlers::{CallContext, HandlerResult};
pub use hooks::{AuctionHooks, HookError, NoopHooks, SaleRecord};
pub use state::{AuctionInstance, AuctionRegistry};
pub use validation::ProposedBid;
