//! In-memory state for auctions.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;

use auction_types::{
    AuctionEvent, AuctionId, AuctionInfo, AuctionSetup, AuctionStatus, Bid, PlayerId, PlayerRef,
    PricingConfig, QueuePolicy, Team,
};

use crate::error::AuctionError;
use crate::handlers::HandlerResult;
use crate::ledger::BudgetLedger;
use crate::queue::{CategoryQueue, PlayerPool};
use crate::session::Session;

/// Shared handle to one auction; the lock serializes every mutation.
pub type AuctionHandle = Arc<RwLock<AuctionInstance>>;

/// All auctions known to the engine.
#[derive(Debug)]
pub struct AuctionRegistry {
    /// Next auction ID to assign
    pub next_auction_id: AuctionId,

    /// Auctions by ID, archived ones included
    pub auctions: HashMap<AuctionId, AuctionHandle>,
}

impl Default for AuctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AuctionRegistry {
    pub fn new() -> Self {
        Self {
            next_auction_id: 1,
            auctions: HashMap::new(),
        }
    }

    /// Get the next auction ID and increment.
    pub fn allocate_auction_id(&mut self) -> AuctionId {
        let id = self.next_auction_id;
        self.next_auction_id += 1;
        id
    }

    pub fn get(&self, auction_id: AuctionId) -> HandlerResult<AuctionHandle> {
        self.auctions
            .get(&auction_id)
            .cloned()
            .ok_or(AuctionError::AuctionNotFound(auction_id))
    }

    /// Handles for every auction, in ID order.
    pub fn handles(&self) -> Vec<(AuctionId, AuctionHandle)> {
        let mut all: Vec<_> = self
            .auctions
            .iter()
            .map(|(id, handle)| (*id, Arc::clone(handle)))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }
}

/// One auction: rules, pool, ledger, queue, session and bid log.
#[derive(Debug)]
pub struct AuctionInstance {
    pub info: AuctionInfo,
    pub players: PlayerPool,
    pub ledger: BudgetLedger,
    pub queue: CategoryQueue,
    pub session: Session,
    /// Append-only bid log
    pub bids: Vec<Bid>,
    next_bid_id: u64,
    pub(crate) rng: StdRng,
    /// Events produced by the current operation, drained by the engine
    pending_events: Vec<AuctionEvent>,
}

impl AuctionInstance {
    /// Build an auction from its setup. Duplicate player or team IDs are rejected.
    pub fn new(
        auction_id: AuctionId,
        setup: AuctionSetup,
        pricing: PricingConfig,
        queue_policy: QueuePolicy,
        seed: Option<u64>,
        created_at: u64,
    ) -> HandlerResult<Self> {
        let mut players = BTreeMap::new();
        for reg in setup.players {
            let id = reg.player_id;
            if players.insert(id, PlayerRef::from(reg)).is_some() {
                return Err(AuctionError::InvalidConfig(format!(
                    "Duplicate player id {}",
                    id
                )));
            }
        }

        let mut teams = BTreeMap::new();
        for reg in setup.teams {
            let id = reg.team_id;
            if teams.insert(id, Team::from(reg)).is_some() {
                return Err(AuctionError::InvalidConfig(format!("Duplicate team id {}", id)));
            }
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ auction_id),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            info: AuctionInfo {
                auction_id,
                name: setup.name,
                status: AuctionStatus::Upcoming,
                pricing,
                queue_policy,
                created_at,
                went_live_at: None,
                closed_at: None,
            },
            players,
            ledger: BudgetLedger::new(teams.into_values()),
            queue: CategoryQueue::default(),
            session: Session::default(),
            bids: Vec::new(),
            next_bid_id: 1,
            rng,
            pending_events: Vec::new(),
        })
    }

    pub fn auction_id(&self) -> AuctionId {
        self.info.auction_id
    }

    /// Fail with `AuctionNotLive` unless the auction is live.
    pub fn require_live(&self) -> HandlerResult<()> {
        if self.info.status == AuctionStatus::Live {
            Ok(())
        } else {
            Err(AuctionError::AuctionNotLive)
        }
    }

    pub fn player(&self, player_id: PlayerId) -> HandlerResult<&PlayerRef> {
        self.players
            .get(&player_id)
            .ok_or(AuctionError::PlayerNotFound(player_id))
    }

    pub(crate) fn player_mut(&mut self, player_id: PlayerId) -> HandlerResult<&mut PlayerRef> {
        self.players
            .get_mut(&player_id)
            .ok_or(AuctionError::PlayerNotFound(player_id))
    }

    /// Category of the player currently up for bidding.
    pub fn current_category(&self) -> Option<&str> {
        self.session
            .current_player()
            .and_then(|id| self.players.get(&id))
            .and_then(PlayerRef::effective_category)
    }

    /// Get the next bid ID and increment.
    pub(crate) fn allocate_bid_id(&mut self) -> u64 {
        let id = self.next_bid_id;
        self.next_bid_id += 1;
        id
    }

    /// Clear the winning flag on every bid for `player_id`.
    pub(crate) fn clear_winning(&mut self, player_id: PlayerId) {
        for bid in self.bids.iter_mut().filter(|b| b.player_id == player_id) {
            bid.is_winning = false;
        }
    }

    /// Bids for `player_id`, or all bids, in acceptance order.
    pub fn bid_history(&self, player_id: Option<PlayerId>) -> Vec<&Bid> {
        self.bids
            .iter()
            .filter(|b| player_id.map_or(true, |id| b.player_id == id))
            .collect()
    }

    pub(crate) fn emit(&mut self, event: AuctionEvent) {
        self.pending_events.push(event);
    }

    pub(crate) fn drain_events(&mut self) -> Vec<AuctionEvent> {
        std::mem::take(&mut self.pending_events)
    }
}
