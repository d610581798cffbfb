//! Query handlers for the auction module.
//!
//! These functions provide read-only access to one auction's state.

use auction_types::{AuctionSummary, Bid, PlayerId, PlayerRef, SessionSnapshot, TeamSummary};

use crate::state::AuctionInstance;
use crate::validation::{accepts_bids, minimum_next_bid};

/// Snapshot of the running round.
pub fn session_snapshot(auction: &AuctionInstance, now: u64) -> SessionSnapshot {
    let session = &auction.session;
    let category = auction.current_category();

    let next_minimum_bid = accepts_bids(session.state())
        .then(|| minimum_next_bid(session, &auction.info.pricing, category))
        .flatten();

    SessionSnapshot {
        auction_id: auction.auction_id(),
        status: auction.info.status,
        round_state: session.state(),
        is_active: session.is_active(),
        current_player: session
            .current_player()
            .and_then(|id| auction.players.get(&id))
            .cloned(),
        current_highest_bid: session.highest_bid().cloned(),
        next_minimum_bid,
        round_deadline: session.round_deadline(),
        deadline_elapsed: session.deadline_elapsed(now, auction.info.pricing.grace_period_secs),
        locked_category: auction.queue.locked_category().map(str::to_string),
        queue_remaining: auction.queue.remaining(),
        server_time: now,
    }
}

/// Accepted bids in bid order, optionally for one player.
pub fn bid_history(auction: &AuctionInstance, player_id: Option<PlayerId>) -> Vec<Bid> {
    auction.bid_history(player_id).into_iter().cloned().collect()
}

pub fn team_summaries(auction: &AuctionInstance) -> Vec<TeamSummary> {
    auction.ledger.teams().map(TeamSummary::from).collect()
}

/// Players in ID order, filtered by effective category when given.
pub fn players(auction: &AuctionInstance, category: Option<&str>) -> Vec<PlayerRef> {
    auction
        .players
        .values()
        .filter(|p| category.map_or(true, |c| p.effective_category() == Some(c)))
        .cloned()
        .collect()
}

/// Listing entry for an auction.
pub fn auction_summary(auction: &AuctionInstance) -> AuctionSummary {
    AuctionSummary {
        auction_id: auction.auction_id(),
        name: auction.info.name.clone(),
        status: auction.info.status,
        round_state: auction.session.state(),
        locked_category: auction.queue.locked_category().map(str::to_string),
        players_total: auction.players.len(),
        players_sold: auction.players.values().filter(|p| p.is_sold()).count(),
        num_bids: auction.bids.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{
        handle_go_live, handle_lock_category, handle_place_bid, handle_start_bidding, CallContext,
    };
    use crate::validation::ProposedBid;
    use auction_types::{
        AuctionSetup, AuctionStatus, PlayerRegistration, PricingConfig, QueuePolicy, RoundState,
        TeamRegistration,
    };
    use std::collections::BTreeMap;

    fn auction() -> AuctionInstance {
        let players = [(1, "Gold"), (2, "Gold"), (3, "Silver")]
            .into_iter()
            .map(|(player_id, category)| PlayerRegistration {
                player_id,
                name: format!("Player {}", player_id),
                category: Some(category.to_string()),
                approved_category: None,
                approved: true,
                is_captain: false,
                is_icon: false,
            })
            .collect();
        let teams = vec![TeamRegistration {
            team_id: 1,
            name: "Strikers".into(),
            owner: "R. Owner".into(),
            total_points: 5_000,
            max_players: Some(15),
            category_caps: BTreeMap::new(),
        }];
        let setup = AuctionSetup {
            name: "Test".into(),
            pricing: None,
            queue_policy: None,
            players,
            teams,
        };
        let pricing = PricingConfig {
            base_price: 500,
            bid_increment: 100,
            round_time_limit_secs: 60,
            ..Default::default()
        };
        AuctionInstance::new(1, setup, pricing, QueuePolicy::default(), Some(3), 0).unwrap()
    }

    #[test]
    fn test_idle_snapshot() {
        let auction = auction();
        let snapshot = session_snapshot(&auction, 10);

        assert_eq!(snapshot.status, AuctionStatus::Upcoming);
        assert_eq!(snapshot.round_state, RoundState::Idle);
        assert!(!snapshot.is_active);
        assert!(snapshot.current_player.is_none());
        assert!(snapshot.next_minimum_bid.is_none());
        assert_eq!(snapshot.server_time, 10);
    }

    #[test]
    fn test_active_snapshot() {
        let mut auction = auction();
        let ctx = CallContext::at(100);
        handle_go_live(&mut auction, &ctx).unwrap();
        handle_lock_category(&mut auction, &ctx, "Gold").unwrap();
        handle_start_bidding(&mut auction, &ctx, 2).unwrap();

        let snapshot = session_snapshot(&auction, 120);
        assert!(snapshot.is_active);
        assert_eq!(snapshot.current_player.map(|p| p.player_id), Some(2));
        assert_eq!(snapshot.next_minimum_bid, Some(600));
        assert_eq!(snapshot.round_deadline, Some(160));
        assert!(!snapshot.deadline_elapsed);
        assert_eq!(snapshot.locked_category.as_deref(), Some("Gold"));
        assert_eq!(snapshot.queue_remaining, 1);

        handle_place_bid(
            &mut auction,
            &ctx,
            ProposedBid {
                team_id: 1,
                amount: 800,
                player_id: Some(2),
            },
        )
        .unwrap();
        let snapshot = session_snapshot(&auction, 161);
        assert_eq!(snapshot.next_minimum_bid, Some(900));
        assert_eq!(snapshot.current_highest_bid.map(|b| b.team_id), Some(1));
        assert!(snapshot.deadline_elapsed);
    }

    #[test]
    fn test_player_filter() {
        let auction = auction();
        assert_eq!(players(&auction, None).len(), 3);
        assert_eq!(players(&auction, Some("Gold")).len(), 2);
        assert!(players(&auction, Some("Bronze")).is_empty());
    }

    #[test]
    fn test_teams_and_summary() {
        let auction = auction();

        let teams = team_summaries(&auction);
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].points_left, 5_000);
        assert!(bid_history(&auction, None).is_empty());

        let summary = auction_summary(&auction);
        assert_eq!(summary.players_total, 3);
        assert_eq!(summary.players_sold, 0);
    }
}
