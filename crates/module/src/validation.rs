//! Bid acceptance rules.
//!
//! Pure functions over the session, the ledger and the pricing rules. Nothing
//! here mutates state, so a rejected bid has no side effects.

use auction_types::{PlayerId, PricingConfig, RoundState, TeamId};

use crate::error::AuctionError;
use crate::handlers::HandlerResult;
use crate::ledger::BudgetLedger;
use crate::session::Session;

/// A bid as submitted by a team, before acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposedBid {
    pub team_id: TeamId,
    pub amount: u64,
    /// Player the client believes is up; `None` means "whoever is current"
    pub player_id: Option<PlayerId>,
}

/// Smallest amount the next bid must reach, or `None` once no higher bid
/// fits in a `u64`.
pub fn minimum_next_bid(
    session: &Session,
    pricing: &PricingConfig,
    category: Option<&str>,
) -> Option<u64> {
    let floor = session
        .highest_bid()
        .map(|b| b.amount)
        .unwrap_or_else(|| pricing.base_price_for(category));
    floor.checked_add(pricing.increment_for(category))
}

/// Accept or reject `bid` against the current round.
pub fn validate_bid(
    session: &Session,
    bid: &ProposedBid,
    ledger: &BudgetLedger,
    pricing: &PricingConfig,
    category: Option<&str>,
    now: u64,
) -> HandlerResult<()> {
    let current = match (session.is_active(), session.current_player()) {
        (true, Some(player_id)) => player_id,
        _ => {
            return Err(AuctionError::InvalidTransition {
                op: "place_bid",
                state: session.state(),
            })
        }
    };

    if let Some(player_id) = bid.player_id {
        if player_id != current {
            return Err(AuctionError::PlayerMismatch {
                expected: current,
                got: player_id,
            });
        }
    }

    if session.deadline_elapsed(now, pricing.grace_period_secs) {
        return Err(AuctionError::RoundExpired {
            deadline: session.round_deadline().unwrap_or_default(),
        });
    }

    let minimum =
        minimum_next_bid(session, pricing, category).ok_or(AuctionError::ArithmeticOverflow)?;
    if bid.amount < minimum {
        return Err(AuctionError::BidTooLow {
            minimum,
            offered: bid.amount,
        });
    }

    ledger.check(bid.team_id, bid.amount, category)
}

/// Whether a round in `state` could accept a bid at all.
pub fn accepts_bids(state: RoundState) -> bool {
    state == RoundState::BiddingActive
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_types::{Bid, Team, TeamRegistration};
    use std::collections::BTreeMap;

    fn pricing() -> PricingConfig {
        PricingConfig {
            base_price: 500,
            bid_increment: 100,
            round_time_limit_secs: 60,
            ..Default::default()
        }
    }

    fn ledger() -> BudgetLedger {
        let team = |team_id: TeamId, total_points: u64| {
            Team::from(TeamRegistration {
                team_id,
                name: format!("Team {}", team_id),
                owner: format!("Owner {}", team_id),
                total_points,
                max_players: None,
                category_caps: BTreeMap::new(),
            })
        };
        BudgetLedger::new(vec![team(1, 10_000), team(2, 300)])
    }

    fn active_session() -> Session {
        let mut session = Session::default();
        session.open(7, 1060).unwrap();
        session
    }

    fn proposed(team_id: TeamId, amount: u64) -> ProposedBid {
        ProposedBid {
            team_id,
            amount,
            player_id: None,
        }
    }

    #[test]
    fn test_first_bid_needs_base_plus_increment() {
        let session = active_session();
        let ledger = ledger();

        assert_eq!(
            validate_bid(&session, &proposed(1, 500), &ledger, &pricing(), None, 1000),
            Err(AuctionError::BidTooLow {
                minimum: 600,
                offered: 500
            })
        );
        assert!(validate_bid(&session, &proposed(1, 600), &ledger, &pricing(), None, 1000).is_ok());
    }

    #[test]
    fn test_next_bid_needs_increment_over_highest() {
        let mut session = active_session();
        session.record_bid(Bid {
            bid_id: 1,
            auction_id: 1,
            player_id: 7,
            team_id: 1,
            amount: 600,
            team_name: "Team 1".into(),
            owner: "Owner 1".into(),
            timestamp: 1000,
            is_winning: true,
        });

        assert_eq!(minimum_next_bid(&session, &pricing(), None), Some(700));
        assert!(matches!(
            validate_bid(&session, &proposed(1, 650), &ledger(), &pricing(), None, 1001),
            Err(AuctionError::BidTooLow { minimum: 700, .. })
        ));
    }

    #[test]
    fn test_rejects_over_budget() {
        let session = active_session();
        let mut pricing = pricing();
        pricing.base_price = 100;

        assert_eq!(
            validate_bid(&session, &proposed(2, 400), &ledger(), &pricing, None, 1000),
            Err(AuctionError::InsufficientBudget {
                required: 400,
                available: 300
            })
        );
    }

    #[test]
    fn test_rejects_when_idle() {
        let session = Session::default();
        assert!(matches!(
            validate_bid(&session, &proposed(1, 600), &ledger(), &pricing(), None, 1000),
            Err(AuctionError::InvalidTransition { op: "place_bid", .. })
        ));
    }

    #[test]
    fn test_rejects_stale_player() {
        let session = active_session();
        let bid = ProposedBid {
            team_id: 1,
            amount: 600,
            player_id: Some(8),
        };
        assert_eq!(
            validate_bid(&session, &bid, &ledger(), &pricing(), None, 1000),
            Err(AuctionError::PlayerMismatch {
                expected: 7,
                got: 8
            })
        );
    }

    #[test]
    fn test_deadline_and_grace() {
        let session = active_session();
        let mut pricing = pricing();

        assert_eq!(
            validate_bid(&session, &proposed(1, 600), &ledger(), &pricing, None, 1061),
            Err(AuctionError::RoundExpired { deadline: 1060 })
        );

        pricing.grace_period_secs = 2;
        assert!(validate_bid(&session, &proposed(1, 600), &ledger(), &pricing, None, 1061).is_ok());
    }

    #[test]
    fn test_category_override_pricing() {
        let session = active_session();
        let mut pricing = pricing();
        pricing.category_overrides.insert(
            "Platinum".into(),
            auction_types::CategoryPricing {
                base_price: Some(2000),
                bid_increment: Some(250),
                round_time_limit_secs: None,
            },
        );

        assert_eq!(minimum_next_bid(&session, &pricing, Some("Platinum")), Some(2250));
        assert_eq!(minimum_next_bid(&session, &pricing, Some("Gold")), Some(600));
    }

    #[test]
    fn test_no_room_above_highest_bid() {
        let mut session = active_session();
        session.record_bid(Bid {
            bid_id: 1,
            auction_id: 1,
            player_id: 7,
            team_id: 1,
            amount: u64::MAX - 50,
            team_name: "Team 1".into(),
            owner: "Owner 1".into(),
            timestamp: 1000,
            is_winning: true,
        });

        assert_eq!(minimum_next_bid(&session, &pricing(), None), None);
        assert_eq!(
            validate_bid(&session, &proposed(2, u64::MAX), &ledger(), &pricing(), None, 1001),
            Err(AuctionError::ArithmeticOverflow)
        );
    }

    #[test]
    fn test_accepts_bids() {
        assert!(accepts_bids(RoundState::BiddingActive));
        assert!(!accepts_bids(RoundState::Resolving));
        assert!(!accepts_bids(RoundState::Idle));
    }
}
