//! Round state for one live auction.
//!
//! `Session` only knows about round transitions; the handlers combine it with
//! the ledger, the queue and the bid log.

use auction_types::{Bid, PlayerId, RoundState};

use crate::error::AuctionError;
use crate::handlers::HandlerResult;

/// The in-progress round of an auction.
#[derive(Debug, Default, Clone)]
pub struct Session {
    state: RoundState,
    current_player: Option<PlayerId>,
    highest_bid: Option<Bid>,
    round_deadline: Option<u64>,
}

impl Session {
    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Bids are only accepted while the round is active.
    pub fn is_active(&self) -> bool {
        self.state == RoundState::BiddingActive
    }

    pub fn current_player(&self) -> Option<PlayerId> {
        self.current_player
    }

    pub fn highest_bid(&self) -> Option<&Bid> {
        self.highest_bid.as_ref()
    }

    pub fn round_deadline(&self) -> Option<u64> {
        self.round_deadline
    }

    /// Whether `now` is past the deadline plus `grace`.
    pub fn deadline_elapsed(&self, now: u64, grace: u64) -> bool {
        self.round_deadline
            .is_some_and(|deadline| now > deadline.saturating_add(grace))
    }

    /// Fail with `InvalidTransition` unless the round is in one of `allowed`.
    pub fn require(&self, op: &'static str, allowed: &[RoundState]) -> HandlerResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(AuctionError::InvalidTransition {
                op,
                state: self.state,
            })
        }
    }

    /// Idle -> BiddingActive
    pub(crate) fn open(&mut self, player_id: PlayerId, deadline: u64) -> HandlerResult<()> {
        self.require("start_bidding", &[RoundState::Idle])?;
        self.state = RoundState::BiddingActive;
        self.current_player = Some(player_id);
        self.highest_bid = None;
        self.round_deadline = Some(deadline);
        Ok(())
    }

    pub(crate) fn record_bid(&mut self, bid: Bid) {
        self.highest_bid = Some(bid);
    }

    pub(crate) fn extend_deadline(&mut self, deadline: u64) {
        if self.round_deadline.is_some_and(|current| deadline > current) {
            self.round_deadline = Some(deadline);
        }
    }

    /// BiddingActive -> Resolving
    pub(crate) fn close(&mut self) -> HandlerResult<()> {
        self.require("close_round", &[RoundState::BiddingActive])?;
        self.state = RoundState::Resolving;
        Ok(())
    }

    /// Any -> Idle. Returns the player whose round was cleared.
    pub(crate) fn clear(&mut self) -> Option<PlayerId> {
        self.state = RoundState::Idle;
        self.highest_bid = None;
        self.round_deadline = None;
        self.current_player.take()
    }
}
