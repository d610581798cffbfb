//! Handlers for the auction round state machine.
//!
//! Each handler runs with exclusive access to one [`AuctionInstance`] (the
//! engine holds the write lock) and either applies completely or returns an
//! error with the instance untouched.
//!
//! Round states: `Idle -> BiddingActive -> Resolving -> Idle`.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use auction_types::{
    Assignment, AssignmentKind, AuctionEvent, AuctionStatus, Bid, DeadlinePolicy, PlayerId,
    PlayerRef, QueueSnapshot, RoundOutcome, RoundState, SaleNotice, TeamId,
};

use crate::error::AuctionError;
use crate::hooks::{AuctionHooks, SaleRecord};
use crate::session::Session;
use crate::state::AuctionInstance;
use crate::validation::{validate_bid, ProposedBid};

/// Context provided by the engine for each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Engine time (unix seconds). Deadlines are judged against this, never
    /// against a client clock.
    pub timestamp: u64,
}

impl CallContext {
    pub fn at(timestamp: u64) -> Self {
        Self { timestamp }
    }

    /// Context stamped with the system clock.
    pub fn now() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self { timestamp }
    }
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// Handle GoLive: Upcoming -> Live, with a fresh session.
pub fn handle_go_live(auction: &mut AuctionInstance, ctx: &CallContext) -> HandlerResult<()> {
    if auction.info.status != AuctionStatus::Upcoming {
        return Err(AuctionError::InvalidStatus {
            expected: AuctionStatus::Upcoming,
            got: auction.info.status,
        });
    }

    auction.info.status = AuctionStatus::Live;
    auction.info.went_live_at = Some(ctx.timestamp);
    auction.session = Session::default();

    info!(auction_id = auction.auction_id(), "auction is live");
    Ok(())
}

/// Handle LockCategory.
pub fn handle_lock_category(
    auction: &mut AuctionInstance,
    _ctx: &CallContext,
    category: &str,
) -> HandlerResult<QueueSnapshot> {
    auction.require_live()?;

    let snapshot = auction.queue.lock(
        category,
        &auction.players,
        &auction.info.queue_policy,
        &mut auction.rng,
    )?;

    info!(
        auction_id = auction.auction_id(),
        category,
        players = snapshot.locked_total,
        "category locked"
    );
    Ok(snapshot)
}

/// Handle UnlockCategory. `force` confirms releasing a category that still
/// has unsold players.
pub fn handle_unlock_category(
    auction: &mut AuctionInstance,
    _ctx: &CallContext,
    force: bool,
) -> HandlerResult<()> {
    auction.require_live()?;
    auction
        .queue
        .unlock(auction.session.state(), &auction.players, force)?;

    info!(auction_id = auction.auction_id(), force, "category unlocked");
    Ok(())
}

/// Handle StartBidding for a specific player. Returns the round deadline.
pub fn handle_start_bidding(
    auction: &mut AuctionInstance,
    ctx: &CallContext,
    player_id: PlayerId,
) -> HandlerResult<u64> {
    auction.require_live()?;
    auction.session.require("start_bidding", &[RoundState::Idle])?;

    if auction.queue.locked_category().is_none() {
        return Err(AuctionError::CategoryNotLocked);
    }

    let player = auction.player(player_id)?;
    if player.is_sold() {
        return Err(AuctionError::PlayerAlreadySold(player_id));
    }
    if !player.is_biddable() || !auction.queue.in_snapshot(player_id) {
        return Err(AuctionError::PlayerNotQueued(player_id));
    }

    auction.queue.take(player_id);
    open_round(auction, ctx, player_id)
}

/// Handle PlaceBid.
pub fn handle_place_bid(
    auction: &mut AuctionInstance,
    ctx: &CallContext,
    bid: ProposedBid,
) -> HandlerResult<Bid> {
    auction.require_live()?;

    validate_bid(
        &auction.session,
        &bid,
        &auction.ledger,
        &auction.info.pricing,
        auction.current_category(),
        ctx.timestamp,
    )?;

    let Some(player_id) = auction.session.current_player() else {
        return Err(AuctionError::InvalidTransition {
            op: "place_bid",
            state: auction.session.state(),
        });
    };

    let team = auction.ledger.team(bid.team_id)?;
    let (team_name, owner) = (team.name.clone(), team.owner.clone());

    let accepted = Bid {
        bid_id: auction.allocate_bid_id(),
        auction_id: auction.auction_id(),
        player_id,
        team_id: bid.team_id,
        amount: bid.amount,
        team_name,
        owner,
        timestamp: ctx.timestamp,
        is_winning: true,
    };

    auction.clear_winning(player_id);
    auction.bids.push(accepted.clone());
    auction.session.record_bid(accepted.clone());

    if let DeadlinePolicy::AntiSnipe {
        window_secs,
        extension_secs,
    } = auction.info.pricing.deadline_policy
    {
        if let Some(deadline) = auction.session.round_deadline() {
            if deadline.saturating_sub(ctx.timestamp) <= window_secs {
                auction
                    .session
                    .extend_deadline(ctx.timestamp.saturating_add(extension_secs));
            }
        }
    }

    debug!(
        auction_id = accepted.auction_id,
        player_id,
        team_id = accepted.team_id,
        amount = accepted.amount,
        "bid accepted"
    );
    auction.emit(AuctionEvent::BidAccepted(accepted.clone()));

    Ok(accepted)
}

/// Handle CloseRound: stop taking bids without committing yet.
pub fn handle_close_round(auction: &mut AuctionInstance, _ctx: &CallContext) -> HandlerResult<()> {
    auction.require_live()?;
    auction.session.close()?;

    info!(auction_id = auction.auction_id(), "round closed");
    Ok(())
}

/// Handle FinalizeBid: sell the current player to the highest bid.
///
/// Accepted from `BiddingActive` (an explicit finalize closes the round) or
/// `Resolving`. Without a highest bid the round is left as it is.
pub fn handle_finalize_bid(
    auction: &mut AuctionInstance,
    ctx: &CallContext,
    hooks: &dyn AuctionHooks,
) -> HandlerResult<Assignment> {
    auction.require_live()?;
    auction.session.require(
        "finalize_bid",
        &[RoundState::BiddingActive, RoundState::Resolving],
    )?;

    finalize_current(auction, ctx, hooks)
}

/// Handle ManualAssign: administrative sale at an explicit price.
///
/// Allowed in any round state. A running round is aborted once every check
/// has passed, so a rejected assignment leaves the round running.
pub fn handle_manual_assign(
    auction: &mut AuctionInstance,
    ctx: &CallContext,
    hooks: &dyn AuctionHooks,
    player_id: PlayerId,
    team_id: TeamId,
    price: u64,
) -> HandlerResult<Assignment> {
    auction.require_live()?;

    let sale = prepare_sale(
        auction,
        ctx,
        hooks,
        player_id,
        team_id,
        price,
        AssignmentKind::Manual,
    )?;

    if auction.session.current_player() == Some(player_id) {
        auction.session.clear();
        auction.clear_winning(player_id);
    } else {
        void_round(auction);
    }

    commit_sale(auction, sale)
}

/// Handle SkipPlayer: void the running round, leaving the player unsold.
pub fn handle_skip_player(auction: &mut AuctionInstance, _ctx: &CallContext) -> HandlerResult<PlayerId> {
    auction.require_live()?;
    auction.session.require(
        "skip_player",
        &[RoundState::BiddingActive, RoundState::Resolving],
    )?;

    void_round(auction).ok_or(AuctionError::InvalidTransition {
        op: "skip_player",
        state: RoundState::Idle,
    })
}

/// Handle NextPlayer: resolve the running round (sell to the highest bid,
/// otherwise skip) and open a round for the next queued player.
///
/// A sale made here stands even when the queue turns out to be empty.
pub fn handle_next_player(
    auction: &mut AuctionInstance,
    ctx: &CallContext,
    hooks: &dyn AuctionHooks,
) -> HandlerResult<PlayerId> {
    auction.require_live()?;

    let category = auction
        .queue
        .locked_category()
        .map(str::to_string)
        .ok_or(AuctionError::CategoryNotLocked)?;

    if auction.session.state() != RoundState::Idle {
        if auction.session.highest_bid().is_some() {
            finalize_current(auction, ctx, hooks)?;
        } else {
            void_round(auction);
        }
    }

    match auction.queue.next(&auction.players) {
        Some(player_id) => {
            open_round(auction, ctx, player_id)?;
            Ok(player_id)
        }
        None => {
            info!(auction_id = auction.auction_id(), %category, "queue exhausted");
            Err(AuctionError::QueueExhausted(category))
        }
    }
}

/// Handle CompleteAuction: Live -> Completed.
pub fn handle_complete_auction(auction: &mut AuctionInstance, ctx: &CallContext) -> HandlerResult<()> {
    match auction.info.status {
        AuctionStatus::Live => close_auction(auction, ctx, AuctionStatus::Completed),
        AuctionStatus::Upcoming => Err(AuctionError::InvalidStatus {
            expected: AuctionStatus::Live,
            got: AuctionStatus::Upcoming,
        }),
        _ => Err(AuctionError::AuctionNotLive),
    }
}

/// Handle CancelAuction: Upcoming/Live -> Cancelled.
pub fn handle_cancel_auction(auction: &mut AuctionInstance, ctx: &CallContext) -> HandlerResult<()> {
    if auction.info.status.is_terminal() {
        return Err(AuctionError::AuctionNotLive);
    }
    close_auction(auction, ctx, AuctionStatus::Cancelled)
}

/// Resolve a round whose deadline has passed.
///
/// The round moves to `Resolving`. With `auto_resolve` it is then sold to
/// the highest bid, or voided when nobody bid.
pub fn handle_sweep_expired(
    auction: &mut AuctionInstance,
    ctx: &CallContext,
    hooks: &dyn AuctionHooks,
    auto_resolve: bool,
) -> Option<RoundOutcome> {
    if auction.info.status != AuctionStatus::Live || !auction.session.is_active() {
        return None;
    }
    if !auction
        .session
        .deadline_elapsed(ctx.timestamp, auction.info.pricing.grace_period_secs)
    {
        return None;
    }

    let player_id = auction.session.current_player()?;
    auction.session.close().ok()?;
    info!(auction_id = auction.auction_id(), player_id, "round timed out");

    if !auto_resolve {
        return Some(RoundOutcome::AwaitingFinalize { player_id });
    }

    if auction.session.highest_bid().is_none() {
        void_round(auction);
        return Some(RoundOutcome::Unsold { player_id });
    }

    match finalize_current(auction, ctx, hooks) {
        Ok(assignment) => Some(RoundOutcome::Sold(assignment)),
        Err(err) => {
            warn!(
                auction_id = auction.auction_id(),
                player_id,
                %err,
                "timed-out round left for the administrator"
            );
            Some(RoundOutcome::AwaitingFinalize { player_id })
        }
    }
}

// =========================
// INTERNALS
// =========================

/// A sale that passed every check and was persisted, ready to apply.
struct PreparedSale {
    assignment: Assignment,
    sold: PlayerRef,
    team_name: String,
}

fn open_round(auction: &mut AuctionInstance, ctx: &CallContext, player_id: PlayerId) -> HandlerResult<u64> {
    let category = auction
        .players
        .get(&player_id)
        .and_then(PlayerRef::effective_category);
    let deadline = ctx
        .timestamp
        .saturating_add(auction.info.pricing.time_limit_for(category));

    auction.session.open(player_id, deadline)?;

    let auction_id = auction.auction_id();
    auction.emit(AuctionEvent::RoundOpened {
        auction_id,
        player_id,
        deadline,
    });
    info!(auction_id, player_id, deadline, "round opened");

    Ok(deadline)
}

fn finalize_current(
    auction: &mut AuctionInstance,
    ctx: &CallContext,
    hooks: &dyn AuctionHooks,
) -> HandlerResult<Assignment> {
    let winning = auction
        .session
        .highest_bid()
        .cloned()
        .ok_or(AuctionError::NoBidToFinalize)?;

    let sale = prepare_sale(
        auction,
        ctx,
        hooks,
        winning.player_id,
        winning.team_id,
        winning.amount,
        AssignmentKind::Finalized,
    )?;

    auction.session.clear();
    commit_sale(auction, sale)
}

/// Run every check for a sale and persist it. Mutates nothing.
fn prepare_sale(
    auction: &AuctionInstance,
    ctx: &CallContext,
    hooks: &dyn AuctionHooks,
    player_id: PlayerId,
    team_id: TeamId,
    price: u64,
    kind: AssignmentKind,
) -> HandlerResult<PreparedSale> {
    let player = auction.player(player_id)?;
    if player.is_sold() {
        return Err(AuctionError::PlayerAlreadySold(player_id));
    }

    auction
        .ledger
        .check(team_id, price, player.effective_category())?;

    let team = auction.ledger.team(team_id)?;
    let team_points_spent = team
        .points_spent
        .checked_add(price)
        .ok_or(AuctionError::ArithmeticOverflow)?;

    let assignment = Assignment {
        auction_id: auction.auction_id(),
        player_id,
        team_id,
        price,
        timestamp: ctx.timestamp,
        kind,
    };

    let mut sold = player.clone();
    sold.team_id = Some(team_id);
    sold.bid_price = Some(price);

    hooks
        .persist_sale(&SaleRecord {
            assignment: assignment.clone(),
            player: sold.clone(),
            team_points_spent,
        })
        .map_err(|e| AuctionError::Persistence(e.to_string()))?;

    Ok(PreparedSale {
        assignment,
        sold,
        team_name: team.name.clone(),
    })
}

/// Apply a prepared sale to the ledger, the pool and the queue.
fn commit_sale(auction: &mut AuctionInstance, sale: PreparedSale) -> HandlerResult<Assignment> {
    let PreparedSale {
        assignment,
        sold,
        team_name,
    } = sale;

    auction.ledger.commit(
        assignment.team_id,
        assignment.player_id,
        assignment.price,
        sold.effective_category(),
        assignment.timestamp,
    )?;

    let player_name = sold.name.clone();
    *auction.player_mut(assignment.player_id)? = sold;
    auction.queue.take(assignment.player_id);

    info!(
        auction_id = assignment.auction_id,
        player_id = assignment.player_id,
        team_id = assignment.team_id,
        price = assignment.price,
        kind = ?assignment.kind,
        "player sold"
    );
    auction.emit(AuctionEvent::PlayerSold(SaleNotice {
        auction_id: assignment.auction_id,
        player_id: assignment.player_id,
        player_name,
        team_id: assignment.team_id,
        team_name,
        price: assignment.price,
        kind: assignment.kind,
    }));

    Ok(assignment)
}

/// End the running round without a sale. Returns the player, if any.
fn void_round(auction: &mut AuctionInstance) -> Option<PlayerId> {
    let player_id = auction.session.clear()?;
    auction.clear_winning(player_id);

    let auction_id = auction.auction_id();
    let player_name = auction
        .players
        .get(&player_id)
        .map(|p| p.name.clone())
        .unwrap_or_default();

    info!(auction_id, player_id, "player unsold");
    auction.emit(AuctionEvent::PlayerUnsold {
        auction_id,
        player_id,
        player_name,
    });

    Some(player_id)
}

fn close_auction(
    auction: &mut AuctionInstance,
    ctx: &CallContext,
    status: AuctionStatus,
) -> HandlerResult<()> {
    void_round(auction);
    auction.queue.reset();
    auction.info.status = status;
    auction.info.closed_at = Some(ctx.timestamp);

    let auction_id = auction.auction_id();
    info!(auction_id, ?status, "auction closed");
    auction.emit(AuctionEvent::AuctionClosed { auction_id, status });

    Ok(())
}
