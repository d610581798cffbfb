//! End-to-end integration tests for the player auction engine.
//!
//! These tests drive [`AuctionEngine`] the way the server does:
//! 1. Auction creation and go-live
//! 2. Category lock and dealing players
//! 3. Bidding, finalize and manual assignment
//! 4. Timeouts, cancellation and concurrent bidders

#![cfg(test)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use auction_module::{
    AuctionEngine, AuctionError, AuctionHooks, CallContext, EngineConfig, HookError, SaleRecord,
};
use auction_types::{
    AssignmentKind, AuctionEvent, AuctionId, AuctionSetup, AuctionStatus, PlayerRegistration,
    PricingConfig, QueuePolicy, RoundOutcome, RoundState, TeamId, TeamRegistration,
};

const T0: u64 = 1_700_000_000;

fn player(player_id: u64, category: &str) -> PlayerRegistration {
    PlayerRegistration {
        player_id,
        name: format!("Player {}", player_id),
        category: Some(category.to_string()),
        approved_category: None,
        approved: true,
        is_captain: false,
        is_icon: false,
    }
}

fn team(team_id: TeamId, total_points: u64) -> TeamRegistration {
    TeamRegistration {
        team_id,
        name: format!("Team {}", team_id),
        owner: format!("Owner {}", team_id),
        total_points,
        max_players: Some(15),
        category_caps: BTreeMap::new(),
    }
}

fn pricing() -> PricingConfig {
    PricingConfig {
        base_price: 500,
        bid_increment: 100,
        round_time_limit_secs: 60,
        ..Default::default()
    }
}

fn engine_with(hooks: Arc<dyn AuctionHooks>, auto_resolve: bool) -> AuctionEngine {
    let config = EngineConfig {
        pricing: pricing(),
        auto_resolve_on_timeout: auto_resolve,
        queue_seed: Some(2026),
        ..Default::default()
    };
    AuctionEngine::with_hooks(config, hooks).unwrap()
}

fn engine() -> AuctionEngine {
    engine_with(Arc::new(auction_module::NoopHooks), true)
}

/// Gold 1-3, Platinum 4, a captain (5) and an icon (6).
fn league_setup(teams: Vec<TeamRegistration>) -> AuctionSetup {
    let mut players = vec![
        player(1, "Gold"),
        player(2, "Gold"),
        player(3, "Gold"),
        player(4, "Platinum"),
        player(5, "Gold"),
        player(6, "Gold"),
    ];
    players[4].is_captain = true;
    players[5].is_icon = true;

    AuctionSetup {
        name: "City League 2026".into(),
        pricing: None,
        queue_policy: Some(QueuePolicy {
            priority_players: vec![3],
        }),
        players,
        teams,
    }
}

fn live_auction(engine: &AuctionEngine, teams: Vec<TeamRegistration>) -> AuctionId {
    let ctx = CallContext::at(T0);
    let id = engine.create_auction(&ctx, league_setup(teams)).unwrap();
    engine.go_live(&ctx, id).unwrap();
    id
}

/// Cross-check the ledger against the player pool.
///
/// Every sold player appears exactly once, on the owning team's squad, at its
/// sale price; unsold players appear on no squad; spent points equal the sum
/// of squad prices and never exceed the budget.
fn assert_invariants(engine: &AuctionEngine, id: AuctionId) {
    let players = engine.get_players(id, None).unwrap();
    let teams = engine.get_teams(id).unwrap();

    for t in &teams {
        let squad_total: u64 = t.players.iter().map(|p| p.price).sum();
        assert_eq!(t.points_spent, squad_total, "team {} spent", t.team_id);
        assert!(t.points_spent <= t.total_points, "team {} overspent", t.team_id);
        assert_eq!(t.points_left, t.total_points - t.points_spent);
        assert_eq!(t.squad_size, t.players.len());
    }

    for p in &players {
        assert_eq!(p.team_id.is_some(), p.bid_price.is_some(), "player {}", p.player_id);

        let holders: Vec<_> = teams
            .iter()
            .flat_map(|t| {
                t.players
                    .iter()
                    .filter(|bought| bought.player_id == p.player_id)
                    .map(move |bought| (t.team_id, bought.price))
            })
            .collect();
        match (p.team_id, p.bid_price) {
            (Some(team_id), Some(price)) => assert_eq!(holders, vec![(team_id, price)]),
            _ => assert!(holders.is_empty(), "unsold player {} on a squad", p.player_id),
        }
    }

    let squad_entries: usize = teams.iter().map(|t| t.players.len()).sum();
    assert_eq!(squad_entries, players.iter().filter(|p| p.is_sold()).count());
}

/// Records events and can be told to refuse the next sale.
#[derive(Default)]
struct RecordingHooks {
    fail_next_sale: AtomicBool,
    sales: Mutex<Vec<SaleRecord>>,
    events: Mutex<Vec<AuctionEvent>>,
}

impl AuctionHooks for RecordingHooks {
    fn persist_sale(&self, sale: &SaleRecord) -> Result<(), HookError> {
        if self.fail_next_sale.swap(false, Ordering::SeqCst) {
            return Err(HookError::Unavailable("registration store offline".into()));
        }
        self.sales.lock().push(sale.clone());
        Ok(())
    }

    fn notify(&self, event: &AuctionEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Test the complete auction flow.
#[test]
fn test_full_auction_flow() {
    let hooks = Arc::new(RecordingHooks::default());
    let engine = engine_with(hooks.clone(), true);
    let id = live_auction(&engine, vec![team(1, 10_000), team(2, 10_000)]);

    // ========================================
    // Phase 1: Lock Gold, captain and icon stay out
    // ========================================

    let queue = engine.lock_category(&CallContext::at(T0), id, "Gold").unwrap();
    assert_eq!(queue.locked_total, 3);
    assert_eq!(queue.remaining[0], 3, "priority player is dealt first");
    assert!(!queue.remaining.contains(&5));
    assert!(!queue.remaining.contains(&6));

    // ========================================
    // Phase 2: First round, competitive bidding
    // ========================================

    let session = engine.next_player(&CallContext::at(T0 + 1), id).unwrap();
    assert_eq!(session.current_player.as_ref().map(|p| p.player_id), Some(3));
    assert_eq!(session.next_minimum_bid, Some(600));

    engine.place_bid(&CallContext::at(T0 + 5), id, 1, 600, Some(3)).unwrap();
    engine.place_bid(&CallContext::at(T0 + 8), id, 2, 700, Some(3)).unwrap();
    engine.place_bid(&CallContext::at(T0 + 9), id, 1, 1_000, Some(3)).unwrap();
    assert_invariants(&engine, id);

    // Next player commits the sale and deals the next one
    let session = engine.next_player(&CallContext::at(T0 + 20), id).unwrap();
    let second = session.current_player.map(|p| p.player_id).unwrap();
    assert_ne!(second, 3);
    assert_invariants(&engine, id);

    // ========================================
    // Phase 3: Nobody bids on the second player
    // ========================================

    assert_eq!(engine.skip_player(&CallContext::at(T0 + 30), id), Ok(second));
    assert_invariants(&engine, id);

    // ========================================
    // Phase 4: Admin places the remaining Gold player by hand
    // ========================================

    let third = engine
        .get_queue(id)
        .unwrap()
        .and_then(|q| q.remaining.first().copied())
        .unwrap();
    let assignment = engine
        .manual_assign(&CallContext::at(T0 + 40), id, third, 2, 800)
        .unwrap();
    assert_eq!(assignment.kind, AssignmentKind::Manual);
    assert_invariants(&engine, id);

    // The skipped player keeps the category from unlocking
    assert_eq!(
        engine.unlock_category(&CallContext::at(T0 + 41), id, false),
        Err(AuctionError::UnsoldPlayersRemain { remaining: 1 })
    );
    engine.unlock_category(&CallContext::at(T0 + 41), id, true).unwrap();

    // ========================================
    // Phase 5: Platinum and wrap up
    // ========================================

    engine.lock_category(&CallContext::at(T0 + 50), id, "Platinum").unwrap();
    engine.start_bidding(&CallContext::at(T0 + 50), id, 4).unwrap();
    engine.place_bid(&CallContext::at(T0 + 55), id, 2, 600, None).unwrap();
    engine.finalize_bid(&CallContext::at(T0 + 56), id).unwrap();
    engine.complete_auction(&CallContext::at(T0 + 60), id).unwrap();
    assert_invariants(&engine, id);

    let teams = engine.get_teams(id).unwrap();
    assert_eq!(teams[0].points_spent, 1_000);
    assert_eq!(teams[0].squad_size, 1);
    assert_eq!(teams[1].points_spent, 1_400);
    assert_eq!(teams[1].squad_size, 2);

    let sold: Vec<_> = engine
        .get_players(id, None)
        .unwrap()
        .into_iter()
        .filter(|p| p.is_sold())
        .map(|p| p.player_id)
        .collect();
    assert_eq!(sold.len(), 3);
    assert!(!sold.contains(&second));

    assert_eq!(hooks.sales.lock().len(), 3);
    let events = hooks.events.lock();
    let sold_events = events
        .iter()
        .filter(|e| matches!(e, AuctionEvent::PlayerSold(_)))
        .count();
    assert_eq!(sold_events, 3);
    assert!(matches!(
        events.last(),
        Some(AuctionEvent::AuctionClosed {
            status: AuctionStatus::Completed,
            ..
        })
    ));

    let listed = engine.list_auctions();
    assert_eq!(listed[0].players_sold, 3);
    assert_eq!(listed[0].status, AuctionStatus::Completed);
}

#[test]
fn test_increment_enforced() {
    let engine = engine();
    let id = live_auction(&engine, vec![team(1, 10_000), team(2, 10_000)]);
    let ctx = CallContext::at(T0);
    engine.lock_category(&ctx, id, "Gold").unwrap();
    engine.next_player(&ctx, id).unwrap();

    assert_eq!(
        engine.place_bid(&ctx, id, 1, 500, None),
        Err(AuctionError::BidTooLow {
            minimum: 600,
            offered: 500
        })
    );
    engine.place_bid(&ctx, id, 1, 600, None).unwrap();
    assert_eq!(
        engine.place_bid(&ctx, id, 2, 650, None),
        Err(AuctionError::BidTooLow {
            minimum: 700,
            offered: 650
        })
    );
    engine.place_bid(&ctx, id, 2, 700, None).unwrap();

    let assignment = engine.finalize_bid(&ctx, id).unwrap();
    assert_eq!((assignment.team_id, assignment.price), (2, 700));
    assert_eq!(engine.get_teams(id).unwrap()[1].points_left, 9_300);
    assert_invariants(&engine, id);
}

#[test]
fn test_budget_rejection() {
    let engine = engine();
    let ctx = CallContext::at(T0);
    let mut setup = league_setup(vec![team(1, 300)]);
    setup.pricing = Some(PricingConfig {
        base_price: 100,
        ..pricing()
    });
    let id = engine.create_auction(&ctx, setup).unwrap();
    engine.go_live(&ctx, id).unwrap();
    engine.lock_category(&ctx, id, "Gold").unwrap();
    engine.next_player(&ctx, id).unwrap();

    let err = engine.place_bid(&ctx, id, 1, 400, None).unwrap_err();
    assert_eq!(
        err,
        AuctionError::InsufficientBudget {
            required: 400,
            available: 300
        }
    );
    assert_eq!(err.reason_code(), "insufficient_budget");

    let session = engine.get_session(&ctx, id).unwrap();
    assert!(session.current_highest_bid.is_none());
    assert!(engine.get_bid_history(id, None).unwrap().is_empty());
    assert_invariants(&engine, id);
}

#[test]
fn test_category_cap() {
    let engine = engine();
    let mut capped = team(1, 10_000);
    capped.category_caps.insert("Gold".into(), 1);
    let id = live_auction(&engine, vec![capped]);
    let ctx = CallContext::at(T0);
    engine.lock_category(&ctx, id, "Gold").unwrap();

    engine.next_player(&ctx, id).unwrap();
    engine.place_bid(&ctx, id, 1, 600, None).unwrap();
    engine.next_player(&ctx, id).unwrap();

    assert!(matches!(
        engine.place_bid(&ctx, id, 1, 600, None),
        Err(AuctionError::CapExceeded { limit: 1, .. })
    ));
}

#[test]
fn test_queue_exhaustion() {
    let engine = engine();
    let id = live_auction(&engine, vec![team(1, 10_000)]);
    let ctx = CallContext::at(T0);
    engine.lock_category(&ctx, id, "Gold").unwrap();

    let mut dealt = Vec::new();
    for _ in 0..3 {
        let session = engine.next_player(&ctx, id).unwrap();
        dealt.push(session.current_player.unwrap().player_id);
    }
    dealt.sort_unstable();
    assert_eq!(dealt, vec![1, 2, 3]);

    assert_eq!(
        engine.next_player(&ctx, id),
        Err(AuctionError::QueueExhausted("Gold".into()))
    );
    assert_eq!(
        engine.get_session(&ctx, id).unwrap().round_state,
        RoundState::Idle
    );
}

#[test]
fn test_sale_survives_queue_exhaustion() {
    let engine = engine();
    let id = live_auction(&engine, vec![team(1, 10_000)]);
    let ctx = CallContext::at(T0);
    engine.lock_category(&ctx, id, "Gold").unwrap();

    for _ in 0..3 {
        engine.next_player(&ctx, id).unwrap();
    }
    engine.place_bid(&ctx, id, 1, 600, None).unwrap();

    assert!(matches!(
        engine.next_player(&ctx, id),
        Err(AuctionError::QueueExhausted(_))
    ));
    assert_eq!(engine.get_teams(id).unwrap()[0].points_spent, 600);
    assert_invariants(&engine, id);

    // The two skipped players keep the category locked
    assert!(engine.unlock_category(&ctx, id, false).is_err());
}

#[test]
fn test_manual_assign_over_highest_bid() {
    let engine = engine();
    let id = live_auction(&engine, vec![team(1, 10_000), team(2, 10_000)]);
    let ctx = CallContext::at(T0);
    engine.lock_category(&ctx, id, "Gold").unwrap();
    let current = engine
        .next_player(&ctx, id)
        .unwrap()
        .current_player
        .unwrap()
        .player_id;

    engine.place_bid(&ctx, id, 1, 900, None).unwrap();
    let assignment = engine.manual_assign(&ctx, id, current, 2, 750).unwrap();
    assert_eq!((assignment.team_id, assignment.price), (2, 750));
    assert_invariants(&engine, id);

    // Already sold, whoever asks
    assert_eq!(
        engine.manual_assign(&ctx, id, current, 1, 750),
        Err(AuctionError::PlayerAlreadySold(current))
    );
    assert_invariants(&engine, id);

    let teams = engine.get_teams(id).unwrap();
    assert_eq!(teams[0].points_spent, 0);
    assert_eq!(teams[1].points_spent, 750);
    assert!(engine
        .get_bid_history(id, Some(current))
        .unwrap()
        .iter()
        .all(|b| !b.is_winning));
}

#[test]
fn test_double_finalize() {
    let engine = engine();
    let id = live_auction(&engine, vec![team(1, 10_000)]);
    let ctx = CallContext::at(T0);
    engine.lock_category(&ctx, id, "Gold").unwrap();
    engine.next_player(&ctx, id).unwrap();
    engine.place_bid(&ctx, id, 1, 600, None).unwrap();

    engine.finalize_bid(&ctx, id).unwrap();
    assert!(matches!(
        engine.finalize_bid(&ctx, id),
        Err(AuctionError::InvalidTransition { .. })
    ));

    let teams = engine.get_teams(id).unwrap();
    assert_eq!(teams[0].squad_size, 1);
    assert_eq!(teams[0].points_spent, 600);
    assert_invariants(&engine, id);
}

#[test]
fn test_cancel_mid_round() {
    let engine = engine();
    let id = live_auction(&engine, vec![team(1, 10_000), team(2, 10_000)]);
    let ctx = CallContext::at(T0);
    engine.lock_category(&ctx, id, "Gold").unwrap();
    engine.next_player(&ctx, id).unwrap();
    engine.place_bid(&ctx, id, 1, 600, None).unwrap();

    engine.cancel_auction(&ctx, id).unwrap();

    assert_eq!(
        engine.place_bid(&ctx, id, 2, 700, None),
        Err(AuctionError::AuctionNotLive)
    );
    let session = engine.get_session(&ctx, id).unwrap();
    assert_eq!(session.status, AuctionStatus::Cancelled);
    assert_eq!(session.round_state, RoundState::Idle);
    assert!(engine.get_players(id, None).unwrap().iter().all(|p| !p.is_sold()));
    assert_invariants(&engine, id);
}

#[test]
fn test_timeout_auto_resolves() {
    let engine = engine();
    let id = live_auction(&engine, vec![team(1, 10_000)]);
    engine.lock_category(&CallContext::at(T0), id, "Gold").unwrap();
    engine.next_player(&CallContext::at(T0), id).unwrap();
    engine.place_bid(&CallContext::at(T0 + 30), id, 1, 600, None).unwrap();

    // Bids after the deadline are refused even before the sweep runs
    assert_eq!(
        engine.place_bid(&CallContext::at(T0 + 61), id, 1, 700, None),
        Err(AuctionError::RoundExpired { deadline: T0 + 60 })
    );

    let resolved = engine.sweep_expired(&CallContext::at(T0 + 61));
    assert_eq!(resolved.len(), 1);
    assert!(matches!(resolved[0].1, RoundOutcome::Sold(ref a) if a.price == 600));
    assert!(engine.sweep_expired(&CallContext::at(T0 + 62)).is_empty());
    assert_invariants(&engine, id);
}

#[test]
fn test_timeout_waits_for_admin() {
    let engine = engine_with(Arc::new(auction_module::NoopHooks), false);
    let id = live_auction(&engine, vec![team(1, 10_000)]);
    engine.lock_category(&CallContext::at(T0), id, "Gold").unwrap();
    let player_id = engine
        .next_player(&CallContext::at(T0), id)
        .unwrap()
        .current_player
        .unwrap()
        .player_id;
    engine.place_bid(&CallContext::at(T0 + 30), id, 1, 600, None).unwrap();

    let resolved = engine.sweep_expired(&CallContext::at(T0 + 61));
    assert_eq!(
        resolved,
        vec![(id, RoundOutcome::AwaitingFinalize { player_id })]
    );
    assert_eq!(
        engine.get_session(&CallContext::at(T0 + 61), id).unwrap().round_state,
        RoundState::Resolving
    );
    assert!(engine.finalize_bid(&CallContext::at(T0 + 90), id).is_ok());
}

#[test]
fn test_persistence_failure_rolls_back() {
    let hooks = Arc::new(RecordingHooks::default());
    let engine = engine_with(hooks.clone(), true);
    let id = live_auction(&engine, vec![team(1, 10_000)]);
    let ctx = CallContext::at(T0);
    engine.lock_category(&ctx, id, "Gold").unwrap();
    engine.next_player(&ctx, id).unwrap();
    engine.place_bid(&ctx, id, 1, 600, None).unwrap();

    hooks.fail_next_sale.store(true, Ordering::SeqCst);
    let err = engine.finalize_bid(&ctx, id).unwrap_err();
    assert_eq!(err.reason_code(), "persistence_failed");

    let session = engine.get_session(&ctx, id).unwrap();
    assert_eq!(session.round_state, RoundState::BiddingActive);
    assert_eq!(engine.get_teams(id).unwrap()[0].points_spent, 0);
    assert!(hooks.sales.lock().is_empty());
    assert_invariants(&engine, id);

    // Store back online: the same round can be finalized
    engine.finalize_bid(&ctx, id).unwrap();
    assert_eq!(hooks.sales.lock()[0].team_points_spent, 600);
    assert_invariants(&engine, id);
}

#[test]
fn test_concurrent_bidding() {
    let engine = engine();
    let teams: Vec<_> = (1..=8).map(|id| team(id, 1_000_000)).collect();
    let id = live_auction(&engine, teams);
    let ctx = CallContext::at(T0);
    engine.lock_category(&ctx, id, "Gold").unwrap();
    engine.next_player(&ctx, id).unwrap();

    std::thread::scope(|s| {
        for team_id in 1..=8u64 {
            let engine = &engine;
            s.spawn(move || {
                for _ in 0..50 {
                    let Some(minimum) = engine
                        .get_session(&ctx, id)
                        .ok()
                        .and_then(|session| session.next_minimum_bid)
                    else {
                        return;
                    };
                    match engine.place_bid(&ctx, id, team_id, minimum, None) {
                        Ok(_) | Err(AuctionError::BidTooLow { .. }) => {}
                        Err(other) => panic!("unexpected rejection: {}", other),
                    }
                }
            });
        }
    });

    let bids = engine.get_bid_history(id, None).unwrap();
    assert!(!bids.is_empty());
    assert!(bids.windows(2).all(|w| w[1].amount >= w[0].amount + 100));
    assert_eq!(bids.iter().filter(|b| b.is_winning).count(), 1);

    let highest = engine
        .get_session(&ctx, id)
        .unwrap()
        .current_highest_bid
        .unwrap();
    assert_eq!(bids.last().map(|b| b.bid_id), Some(highest.bid_id));

    let assignment = engine.finalize_bid(&ctx, id).unwrap();
    assert_eq!(assignment.price, highest.amount);
    let spent: u64 = engine
        .get_teams(id)
        .unwrap()
        .iter()
        .map(|t| t.points_spent)
        .sum();
    assert_eq!(spent, highest.amount);
    assert_invariants(&engine, id);
}

#[test]
fn test_auctions_are_independent() {
    let engine = engine();
    let first = live_auction(&engine, vec![team(1, 10_000)]);
    let second = live_auction(&engine, vec![team(1, 10_000)]);
    let ctx = CallContext::at(T0);

    engine.lock_category(&ctx, first, "Gold").unwrap();
    engine.next_player(&ctx, first).unwrap();
    engine.place_bid(&ctx, first, 1, 600, None).unwrap();

    assert!(matches!(
        engine.place_bid(&ctx, second, 1, 600, None),
        Err(AuctionError::InvalidTransition { .. })
    ));
    engine.cancel_auction(&ctx, second).unwrap();
    assert!(engine.finalize_bid(&ctx, first).is_ok());
}

/// Stalls the first accepted bid's notification.
#[derive(Default)]
struct SlowListener {
    stalled: AtomicBool,
    bids: Mutex<Vec<u64>>,
}

impl AuctionHooks for SlowListener {
    fn notify(&self, event: &AuctionEvent) {
        if let AuctionEvent::BidAccepted(bid) = event {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(300));
            }
            self.bids.lock().push(bid.amount);
        }
    }
}

#[test]
fn test_notifications_follow_commit_order() {
    let listener = Arc::new(SlowListener::default());
    let engine = engine_with(listener.clone(), true);
    let id = live_auction(&engine, vec![team(1, 10_000), team(2, 10_000)]);
    let ctx = CallContext::at(T0);
    engine.lock_category(&ctx, id, "Gold").unwrap();
    engine.next_player(&ctx, id).unwrap();

    std::thread::scope(|s| {
        let engine = &engine;
        s.spawn(move || engine.place_bid(&ctx, id, 1, 600, None).unwrap());
        s.spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            engine.place_bid(&ctx, id, 2, 700, None).unwrap();
        });
    });

    let committed: Vec<_> = engine
        .get_bid_history(id, None)
        .unwrap()
        .iter()
        .map(|b| b.amount)
        .collect();
    assert_eq!(committed, vec![600, 700]);
    assert_eq!(*listener.bids.lock(), committed);
}

#[test]
fn test_no_bid_above_top_of_range() {
    let engine = engine();
    let ctx = CallContext::at(T0);
    let id = live_auction(&engine, vec![team(1, u64::MAX), team(2, u64::MAX)]);
    engine.lock_category(&ctx, id, "Gold").unwrap();
    engine.next_player(&ctx, id).unwrap();

    engine.place_bid(&ctx, id, 1, u64::MAX - 50, None).unwrap();
    assert_eq!(
        engine.get_session(&ctx, id).unwrap().next_minimum_bid,
        None
    );
    assert_eq!(
        engine.place_bid(&ctx, id, 2, u64::MAX, None),
        Err(AuctionError::ArithmeticOverflow)
    );

    let bids = engine.get_bid_history(id, None).unwrap();
    assert_eq!(bids.len(), 1);
    assert_eq!(engine.finalize_bid(&ctx, id).unwrap().team_id, 1);
    assert_invariants(&engine, id);
}
