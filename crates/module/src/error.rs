//! Auction engine error types.

use thiserror::Error;

use auction_types::{AuctionId, AuctionStatus, Category, PlayerId, RoundState, TeamId};

/// Errors that can occur in the auction engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("Auction not found: {0}")]
    AuctionNotFound(AuctionId),

    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("Cannot {op} while round is {state:?}")]
    InvalidTransition { op: &'static str, state: RoundState },

    #[error("Invalid auction status. Expected: {expected:?}, Got: {got:?}")]
    InvalidStatus {
        expected: AuctionStatus,
        got: AuctionStatus,
    },

    #[error("Auction is not live")]
    AuctionNotLive,

    #[error("Bid too low: minimum {minimum}, offered {offered}")]
    BidTooLow { minimum: u64, offered: u64 },

    #[error("Insufficient budget: need {required}, have {available}")]
    InsufficientBudget { required: u64, available: u64 },

    #[error("Squad cap exceeded for {cap}: limit {limit}")]
    CapExceeded { cap: String, limit: u32 },

    #[error("Round deadline passed at {deadline}")]
    RoundExpired { deadline: u64 },

    #[error("No bid to finalize")]
    NoBidToFinalize,

    #[error("Queue exhausted for category {0}")]
    QueueExhausted(Category),

    #[error("Player already sold: {0}")]
    PlayerAlreadySold(PlayerId),

    #[error("Player {0} is not queued in the locked category")]
    PlayerNotQueued(PlayerId),

    #[error("Bid is for player {got}, current player is {expected}")]
    PlayerMismatch { expected: PlayerId, got: PlayerId },

    #[error("Category already locked: {0}")]
    CategoryLocked(Category),

    #[error("No category locked")]
    CategoryNotLocked,

    #[error("{remaining} unsold players remain in the locked category")]
    UnsoldPlayersRemain { remaining: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

impl AuctionError {
    /// Stable, machine-readable reason code reported to clients.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuctionError::AuctionNotFound(_) => "auction_not_found",
            AuctionError::PlayerNotFound(_) => "player_not_found",
            AuctionError::TeamNotFound(_) => "team_not_found",
            AuctionError::InvalidTransition { .. } => "invalid_transition",
            AuctionError::InvalidStatus { .. } => "invalid_status",
            AuctionError::AuctionNotLive => "auction_not_live",
            AuctionError::BidTooLow { .. } => "bid_too_low",
            AuctionError::InsufficientBudget { .. } => "insufficient_budget",
            AuctionError::CapExceeded { .. } => "cap_exceeded",
            AuctionError::RoundExpired { .. } => "round_expired",
            AuctionError::NoBidToFinalize => "no_bid_to_finalize",
            AuctionError::QueueExhausted(_) => "queue_exhausted",
            AuctionError::PlayerAlreadySold(_) => "player_already_sold",
            AuctionError::PlayerNotQueued(_) => "player_not_queued",
            AuctionError::PlayerMismatch { .. } => "player_mismatch",
            AuctionError::CategoryLocked(_) => "category_locked",
            AuctionError::CategoryNotLocked => "category_not_locked",
            AuctionError::UnsoldPlayersRemain { .. } => "unsold_players_remain",
            AuctionError::InvalidConfig(_) => "invalid_config",
            AuctionError::Persistence(_) => "persistence_failed",
            AuctionError::ArithmeticOverflow => "arithmetic_overflow",
        }
    }

    /// Bid rejections a client can act on (raise, stop bidding, refresh).
    pub fn is_bid_rejection(&self) -> bool {
        matches!(
            self,
            AuctionError::BidTooLow { .. }
                | AuctionError::InsufficientBudget { .. }
                | AuctionError::CapExceeded { .. }
                | AuctionError::RoundExpired { .. }
                | AuctionError::PlayerMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(
            AuctionError::BidTooLow {
                minimum: 600,
                offered: 500
            }
            .reason_code(),
            "bid_too_low"
        );
        assert_eq!(
            AuctionError::QueueExhausted("Gold".into()).reason_code(),
            "queue_exhausted"
        );
    }

    #[test]
    fn test_bid_rejections() {
        assert!(AuctionError::InsufficientBudget {
            required: 400,
            available: 300
        }
        .is_bid_rejection());
        assert!(!AuctionError::NoBidToFinalize.is_bid_rejection());
        assert!(!AuctionError::AuctionNotLive.is_bid_rejection());
    }

    #[test]
    fn test_display() {
        let err = AuctionError::InvalidTransition {
            op: "finalize_bid",
            state: RoundState::Idle,
        };
        assert_eq!(err.to_string(), "Cannot finalize_bid while round is Idle");
    }
}
