//! Seams to the outside world: persisting sales and publishing events.

use thiserror::Error;

use auction_types::{Assignment, AuctionEvent, PlayerRef};

/// A sale about to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    pub assignment: Assignment,
    /// Player as it will look once sold (`team_id`/`bid_price` set)
    pub player: PlayerRef,
    /// Team's spent points after the sale
    pub team_points_spent: u64,
}

/// Errors reported by a hook implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Callbacks the engine invokes around state changes.
///
/// Both run under the auction lock and must not call back into the engine for
/// the same auction. `persist_sale` runs before the in-memory commit; an error
/// aborts the sale and leaves the auction unchanged. `notify` runs after the
/// commit, once per event, in commit order.
pub trait AuctionHooks: Send + Sync {
    fn persist_sale(&self, _sale: &SaleRecord) -> Result<(), HookError> {
        Ok(())
    }

    fn notify(&self, _event: &AuctionEvent) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl AuctionHooks for NoopHooks {}
