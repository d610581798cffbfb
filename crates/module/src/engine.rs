//! Thread-safe entry point to the auction module.
//!
//! The registry lock is only held to look up or insert an auction. Each
//! auction then has its own lock: operations on one auction are serialized,
//! different auctions proceed in parallel. Events are published to the hooks
//! before the auction lock is released, so each auction's listeners see them
//! in commit order.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use auction_types::{
    Assignment, AuctionId, AuctionInfo, AuctionSetup, AuctionSummary, Bid, PlayerId, PlayerRef,
    QueueSnapshot, RoundOutcome, SessionSnapshot, TeamId, TeamSummary,
};

use crate::config::{validate_pricing, validate_queue_policy, ConfigValidationError, EngineConfig};
use crate::error::AuctionError;
use crate::handlers::{self, CallContext, HandlerResult};
use crate::hooks::{AuctionHooks, NoopHooks};
use crate::queries;
use crate::state::{AuctionHandle, AuctionInstance, AuctionRegistry};
use crate::validation::ProposedBid;

pub struct AuctionEngine {
    config: EngineConfig,
    registry: RwLock<AuctionRegistry>,
    hooks: Arc<dyn AuctionHooks>,
}

impl std::fmt::Debug for AuctionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuctionEngine")
            .field("config", &self.config)
            .field("auctions", &self.registry.read().auctions.len())
            .finish()
    }
}

impl AuctionEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigValidationError> {
        Self::with_hooks(config, Arc::new(NoopHooks))
    }

    pub fn with_hooks(
        config: EngineConfig,
        hooks: Arc<dyn AuctionHooks>,
    ) -> Result<Self, ConfigValidationError> {
        config.validate()?;
        Ok(Self {
            config,
            registry: RwLock::new(AuctionRegistry::new()),
            hooks,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================
    // LIFECYCLE
    // =========================

    /// Register a new auction in `Upcoming`. Pricing and queue policy fall
    /// back to the engine defaults.
    pub fn create_auction(&self, ctx: &CallContext, setup: AuctionSetup) -> HandlerResult<AuctionId> {
        let pricing = setup
            .pricing
            .clone()
            .unwrap_or_else(|| self.config.pricing.clone());
        let queue_policy = setup
            .queue_policy
            .clone()
            .unwrap_or_else(|| self.config.queue_policy.clone());

        validate_pricing(&pricing).map_err(|e| AuctionError::InvalidConfig(e.to_string()))?;
        validate_queue_policy(&queue_policy)
            .map_err(|e| AuctionError::InvalidConfig(e.to_string()))?;

        let mut registry = self.registry.write();
        let auction = AuctionInstance::new(
            registry.next_auction_id,
            setup,
            pricing,
            queue_policy,
            self.config.queue_seed,
            ctx.timestamp,
        )?;
        let auction_id = registry.allocate_auction_id();

        info!(
            auction_id,
            name = %auction.info.name,
            players = auction.players.len(),
            teams = auction.ledger.teams().count(),
            "auction created"
        );
        registry
            .auctions
            .insert(auction_id, Arc::new(RwLock::new(auction)));

        Ok(auction_id)
    }

    pub fn go_live(&self, ctx: &CallContext, auction_id: AuctionId) -> HandlerResult<SessionSnapshot> {
        self.mutate(auction_id, |a| {
            handlers::handle_go_live(a, ctx)?;
            Ok(queries::session_snapshot(a, ctx.timestamp))
        })
    }

    pub fn complete_auction(&self, ctx: &CallContext, auction_id: AuctionId) -> HandlerResult<()> {
        self.mutate(auction_id, |a| handlers::handle_complete_auction(a, ctx))
    }

    pub fn cancel_auction(&self, ctx: &CallContext, auction_id: AuctionId) -> HandlerResult<()> {
        self.mutate(auction_id, |a| handlers::handle_cancel_auction(a, ctx))
    }

    // =========================
    // QUEUE
    // =========================

    pub fn lock_category(
        &self,
        ctx: &CallContext,
        auction_id: AuctionId,
        category: &str,
    ) -> HandlerResult<QueueSnapshot> {
        self.mutate(auction_id, |a| handlers::handle_lock_category(a, ctx, category))
    }

    pub fn unlock_category(
        &self,
        ctx: &CallContext,
        auction_id: AuctionId,
        force: bool,
    ) -> HandlerResult<()> {
        self.mutate(auction_id, |a| handlers::handle_unlock_category(a, ctx, force))
    }

    // =========================
    // ROUNDS
    // =========================

    pub fn start_bidding(
        &self,
        ctx: &CallContext,
        auction_id: AuctionId,
        player_id: PlayerId,
    ) -> HandlerResult<SessionSnapshot> {
        self.mutate(auction_id, |a| {
            handlers::handle_start_bidding(a, ctx, player_id)?;
            Ok(queries::session_snapshot(a, ctx.timestamp))
        })
    }

    /// Open a round for the next queued player, resolving the current one
    /// first.
    pub fn next_player(&self, ctx: &CallContext, auction_id: AuctionId) -> HandlerResult<SessionSnapshot> {
        let hooks = Arc::clone(&self.hooks);
        self.mutate(auction_id, |a| {
            handlers::handle_next_player(a, ctx, hooks.as_ref())?;
            Ok(queries::session_snapshot(a, ctx.timestamp))
        })
    }

    pub fn place_bid(
        &self,
        ctx: &CallContext,
        auction_id: AuctionId,
        team_id: TeamId,
        amount: u64,
        player_id: Option<PlayerId>,
    ) -> HandlerResult<Bid> {
        let bid = ProposedBid {
            team_id,
            amount,
            player_id,
        };
        let result = self.mutate(auction_id, |a| handlers::handle_place_bid(a, ctx, bid));
        if let Err(err) = &result {
            debug!(auction_id, team_id, amount, reason = err.reason_code(), "bid rejected");
        }
        result
    }

    /// Stop taking bids; the round waits in `Resolving` for finalize or skip.
    pub fn close_round(&self, ctx: &CallContext, auction_id: AuctionId) -> HandlerResult<SessionSnapshot> {
        self.mutate(auction_id, |a| {
            handlers::handle_close_round(a, ctx)?;
            Ok(queries::session_snapshot(a, ctx.timestamp))
        })
    }

    pub fn finalize_bid(&self, ctx: &CallContext, auction_id: AuctionId) -> HandlerResult<Assignment> {
        let hooks = Arc::clone(&self.hooks);
        self.mutate(auction_id, |a| handlers::handle_finalize_bid(a, ctx, hooks.as_ref()))
    }

    pub fn manual_assign(
        &self,
        ctx: &CallContext,
        auction_id: AuctionId,
        player_id: PlayerId,
        team_id: TeamId,
        price: u64,
    ) -> HandlerResult<Assignment> {
        let hooks = Arc::clone(&self.hooks);
        self.mutate(auction_id, |a| {
            handlers::handle_manual_assign(a, ctx, hooks.as_ref(), player_id, team_id, price)
        })
    }

    pub fn skip_player(&self, ctx: &CallContext, auction_id: AuctionId) -> HandlerResult<PlayerId> {
        self.mutate(auction_id, |a| handlers::handle_skip_player(a, ctx))
    }

    /// Resolve every live round whose deadline (plus grace) has passed.
    pub fn sweep_expired(&self, ctx: &CallContext) -> Vec<(AuctionId, RoundOutcome)> {
        let handles = self.registry.read().handles();
        let auto_resolve = self.config.auto_resolve_on_timeout;

        handles
            .into_iter()
            .filter_map(|(auction_id, handle)| {
                let mut auction = handle.write();
                let outcome = handlers::handle_sweep_expired(
                    &mut auction,
                    ctx,
                    self.hooks.as_ref(),
                    auto_resolve,
                );
                self.publish(&mut auction);
                outcome.map(|o| (auction_id, o))
            })
            .collect()
    }

    // =========================
    // QUERIES
    // =========================

    pub fn get_session(&self, ctx: &CallContext, auction_id: AuctionId) -> HandlerResult<SessionSnapshot> {
        self.read(auction_id, |a| queries::session_snapshot(a, ctx.timestamp))
    }

    pub fn get_bid_history(
        &self,
        auction_id: AuctionId,
        player_id: Option<PlayerId>,
    ) -> HandlerResult<Vec<Bid>> {
        self.read(auction_id, |a| queries::bid_history(a, player_id))
    }

    pub fn get_queue(&self, auction_id: AuctionId) -> HandlerResult<Option<QueueSnapshot>> {
        self.read(auction_id, |a| a.queue.snapshot())
    }

    pub fn get_teams(&self, auction_id: AuctionId) -> HandlerResult<Vec<TeamSummary>> {
        self.read(auction_id, queries::team_summaries)
    }

    pub fn get_players(
        &self,
        auction_id: AuctionId,
        category: Option<&str>,
    ) -> HandlerResult<Vec<PlayerRef>> {
        self.read(auction_id, |a| queries::players(a, category))
    }

    pub fn get_info(&self, auction_id: AuctionId) -> HandlerResult<AuctionInfo> {
        self.read(auction_id, |a| a.info.clone())
    }

    pub fn list_auctions(&self) -> Vec<AuctionSummary> {
        self.registry
            .read()
            .handles()
            .into_iter()
            .map(|(_, handle)| queries::auction_summary(&handle.read()))
            .collect()
    }

    // =========================
    // INTERNALS
    // =========================

    fn handle(&self, auction_id: AuctionId) -> HandlerResult<AuctionHandle> {
        self.registry.read().get(auction_id)
    }

    /// Run `f` under the auction's write lock and publish its events before
    /// releasing it.
    fn mutate<T>(
        &self,
        auction_id: AuctionId,
        f: impl FnOnce(&mut AuctionInstance) -> HandlerResult<T>,
    ) -> HandlerResult<T> {
        let handle = self.handle(auction_id)?;
        let mut auction = handle.write();
        let result = f(&mut auction);
        self.publish(&mut auction);
        result
    }

    fn read<T>(&self, auction_id: AuctionId, f: impl FnOnce(&AuctionInstance) -> T) -> HandlerResult<T> {
        let handle = self.handle(auction_id)?;
        let auction = handle.read();
        Ok(f(&auction))
    }

    /// Caller holds the auction's write lock.
    fn publish(&self, auction: &mut AuctionInstance) {
        for event in auction.drain_events() {
            self.hooks.notify(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_types::{AuctionEvent, AuctionStatus, PlayerRegistration, RoundState, TeamRegistration};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<AuctionEvent>>,
    }

    impl AuctionHooks for Recorder {
        fn notify(&self, event: &AuctionEvent) {
            self.events.lock().push(event.clone());
        }
    }

    fn setup() -> AuctionSetup {
        AuctionSetup {
            name: "Premier".into(),
            pricing: None,
            queue_policy: None,
            players: (1..=2)
                .map(|player_id| PlayerRegistration {
                    player_id,
                    name: format!("Player {}", player_id),
                    category: Some("Gold".into()),
                    approved_category: None,
                    approved: true,
                    is_captain: false,
                    is_icon: false,
                })
                .collect(),
            teams: vec![TeamRegistration {
                team_id: 1,
                name: "Strikers".into(),
                owner: "R. Owner".into(),
                total_points: 1_000,
                max_players: None,
                category_caps: BTreeMap::new(),
            }],
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            queue_seed: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_list() {
        let engine = AuctionEngine::new(config()).unwrap();
        let ctx = CallContext::at(10);

        assert_eq!(engine.create_auction(&ctx, setup()), Ok(1));
        assert_eq!(engine.create_auction(&ctx, setup()), Ok(2));

        let listed = engine.list_auctions();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].auction_id, 1);
        assert_eq!(listed[0].status, AuctionStatus::Upcoming);
        assert_eq!(engine.get_info(2).unwrap().created_at, 10);
    }

    #[test]
    fn test_invalid_setup_does_not_consume_id() {
        let engine = AuctionEngine::new(config()).unwrap();
        let ctx = CallContext::at(10);

        let mut bad = setup();
        bad.pricing = Some(auction_types::PricingConfig {
            bid_increment: 0,
            ..Default::default()
        });
        assert!(matches!(
            engine.create_auction(&ctx, bad),
            Err(AuctionError::InvalidConfig(_))
        ));
        assert_eq!(engine.create_auction(&ctx, setup()), Ok(1));
    }

    #[test]
    fn test_unknown_auction() {
        let engine = AuctionEngine::new(config()).unwrap();
        assert_eq!(
            engine.get_session(&CallContext::at(0), 42).err(),
            Some(AuctionError::AuctionNotFound(42))
        );
        assert_eq!(
            engine.place_bid(&CallContext::at(0), 42, 1, 600, None).err(),
            Some(AuctionError::AuctionNotFound(42))
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let bad = EngineConfig {
            sweep_interval_ms: 0,
            ..config()
        };
        assert!(AuctionEngine::new(bad).is_err());
    }

    #[test]
    fn test_events_published_in_order() {
        let recorder = Arc::new(Recorder::default());
        let engine = AuctionEngine::with_hooks(config(), recorder.clone()).unwrap();
        let ctx = CallContext::at(100);

        let id = engine.create_auction(&ctx, setup()).unwrap();
        engine.go_live(&ctx, id).unwrap();
        engine.lock_category(&ctx, id, "Gold").unwrap();
        let session = engine.next_player(&ctx, id).unwrap();
        assert_eq!(session.round_state, RoundState::BiddingActive);

        engine.place_bid(&ctx, id, 1, 200, None).unwrap();
        engine.finalize_bid(&ctx, id).unwrap();

        let events = recorder.events.lock();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], AuctionEvent::RoundOpened { .. }));
        assert!(matches!(events[1], AuctionEvent::BidAccepted(_)));
        assert!(matches!(events[2], AuctionEvent::PlayerSold(_)));
    }

    #[test]
    fn test_sweep_expired_across_auctions() {
        let engine = AuctionEngine::new(config()).unwrap();
        let ctx = CallContext::at(100);

        let first = engine.create_auction(&ctx, setup()).unwrap();
        let second = engine.create_auction(&ctx, setup()).unwrap();
        for id in [first, second] {
            engine.go_live(&ctx, id).unwrap();
            engine.lock_category(&ctx, id, "Gold").unwrap();
            engine.next_player(&ctx, id).unwrap();
        }
        engine.place_bid(&ctx, first, 1, 200, None).unwrap();

        assert!(engine.sweep_expired(&CallContext::at(150)).is_empty());

        let outcomes = engine.sweep_expired(&CallContext::at(161));
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], (id, RoundOutcome::Sold(_)) if id == first));
        assert!(matches!(outcomes[1], (id, RoundOutcome::Unsold { .. }) if id == second));
        assert_eq!(engine.get_teams(first).unwrap()[0].points_spent, 200);
    }
}
