//! JSON-RPC surface of the auction server.
//!
//! `admin_*` methods drive the auction, `auction_placeBid` is the bidder's
//! entry point and `query_*` methods are read-only. Every call is stamped
//! with server time.

use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::error::INVALID_PARAMS_CODE;
use jsonrpsee::types::ErrorObjectOwned;
use tracing::{debug, info};

use auction_module::{AuctionEngine, AuctionError};
use auction_types::{
    Assignment, AuctionId, AuctionInfo, AuctionSetup, AuctionSummary, Bid, ErrorData,
    ManualAssignParams, PlaceBidParams, PlayerId, PlayerRef, QueueSnapshot, SessionSnapshot,
    SweepResult, TeamSummary,
};

use crate::clock::Clock;
use crate::codes;

/// RPC API definition for the auction server.
#[rpc(server)]
pub trait AuctionApi {
    // ============ Admin Methods ============

    /// Register a new auction.
    #[method(name = "admin_createAuction")]
    async fn admin_create_auction(&self, setup: AuctionSetup) -> Result<AuctionId, ErrorObjectOwned>;

    #[method(name = "admin_goLive")]
    async fn admin_go_live(&self, auction_id: AuctionId) -> Result<SessionSnapshot, ErrorObjectOwned>;

    #[method(name = "admin_lockCategory")]
    async fn admin_lock_category(
        &self,
        auction_id: AuctionId,
        category: String,
    ) -> Result<QueueSnapshot, ErrorObjectOwned>;

    /// Release the locked category. `force` confirms leaving unsold players.
    #[method(name = "admin_unlockCategory")]
    async fn admin_unlock_category(
        &self,
        auction_id: AuctionId,
        force: Option<bool>,
    ) -> Result<bool, ErrorObjectOwned>;

    #[method(name = "admin_startBidding")]
    async fn admin_start_bidding(
        &self,
        auction_id: AuctionId,
        player_id: PlayerId,
    ) -> Result<SessionSnapshot, ErrorObjectOwned>;

    /// Resolve the running round and deal the next player.
    #[method(name = "admin_nextPlayer")]
    async fn admin_next_player(&self, auction_id: AuctionId) -> Result<SessionSnapshot, ErrorObjectOwned>;

    #[method(name = "admin_closeRound")]
    async fn admin_close_round(&self, auction_id: AuctionId) -> Result<SessionSnapshot, ErrorObjectOwned>;

    #[method(name = "admin_finalizeBid")]
    async fn admin_finalize_bid(&self, auction_id: AuctionId) -> Result<Assignment, ErrorObjectOwned>;

    #[method(name = "admin_manualAssign")]
    async fn admin_manual_assign(&self, params: ManualAssignParams) -> Result<Assignment, ErrorObjectOwned>;

    #[method(name = "admin_skipPlayer")]
    async fn admin_skip_player(&self, auction_id: AuctionId) -> Result<PlayerId, ErrorObjectOwned>;

    #[method(name = "admin_completeAuction")]
    async fn admin_complete_auction(&self, auction_id: AuctionId) -> Result<bool, ErrorObjectOwned>;

    #[method(name = "admin_cancelAuction")]
    async fn admin_cancel_auction(&self, auction_id: AuctionId) -> Result<bool, ErrorObjectOwned>;

    /// Run the deadline sweep now.
    #[method(name = "admin_sweep")]
    async fn admin_sweep(&self) -> Result<Vec<SweepResult>, ErrorObjectOwned>;

    /// Set the current timestamp (manual clock only).
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned>;

    /// Advance the manual clock by `secs`.
    #[method(name = "admin_advanceTime")]
    async fn admin_advance_time(&self, secs: u64) -> Result<u64, ErrorObjectOwned>;

    // ============ Auction Methods ============

    #[method(name = "auction_placeBid")]
    async fn auction_place_bid(&self, params: PlaceBidParams) -> Result<Bid, ErrorObjectOwned>;

    // ============ Query Methods ============

    #[method(name = "query_getSession")]
    async fn query_get_session(&self, auction_id: AuctionId) -> Result<SessionSnapshot, ErrorObjectOwned>;

    #[method(name = "query_getBidHistory")]
    async fn query_get_bid_history(
        &self,
        auction_id: AuctionId,
        player_id: Option<PlayerId>,
    ) -> Result<Vec<Bid>, ErrorObjectOwned>;

    #[method(name = "query_getQueue")]
    async fn query_get_queue(&self, auction_id: AuctionId) -> Result<Option<QueueSnapshot>, ErrorObjectOwned>;

    #[method(name = "query_getTeams")]
    async fn query_get_teams(&self, auction_id: AuctionId) -> Result<Vec<TeamSummary>, ErrorObjectOwned>;

    #[method(name = "query_getPlayers")]
    async fn query_get_players(
        &self,
        auction_id: AuctionId,
        category: Option<String>,
    ) -> Result<Vec<PlayerRef>, ErrorObjectOwned>;

    #[method(name = "query_getAuction")]
    async fn query_get_auction(&self, auction_id: AuctionId) -> Result<AuctionInfo, ErrorObjectOwned>;

    #[method(name = "query_listAuctions")]
    async fn query_list_auctions(&self) -> Result<Vec<AuctionSummary>, ErrorObjectOwned>;

    #[method(name = "query_serverTime")]
    async fn query_server_time(&self) -> Result<u64, ErrorObjectOwned>;
}

/// Implementation of the auction RPC server.
pub struct AuctionServer {
    engine: Arc<AuctionEngine>,
    clock: Arc<Clock>,
}

impl AuctionServer {
    pub fn new(engine: Arc<AuctionEngine>, clock: Arc<Clock>) -> Self {
        Self { engine, clock }
    }
}

/// Map an engine error to a JSON-RPC error carrying its reason code.
pub fn rpc_error(err: AuctionError) -> ErrorObjectOwned {
    let code = match &err {
        AuctionError::AuctionNotFound(_)
        | AuctionError::PlayerNotFound(_)
        | AuctionError::TeamNotFound(_) => codes::NOT_FOUND,
        AuctionError::InvalidConfig(_) => INVALID_PARAMS_CODE,
        AuctionError::Persistence(_) => codes::PERSISTENCE,
        e if e.is_bid_rejection() => codes::BID_REJECTED,
        AuctionError::InvalidTransition { .. }
        | AuctionError::InvalidStatus { .. }
        | AuctionError::AuctionNotLive
        | AuctionError::CategoryLocked(_)
        | AuctionError::CategoryNotLocked
        | AuctionError::UnsoldPlayersRemain { .. }
        | AuctionError::QueueExhausted(_) => codes::INVALID_STATE,
        _ => codes::ENGINE,
    };

    debug!(code, reason = err.reason_code(), "call rejected: {}", err);
    ErrorObjectOwned::owned(
        code,
        err.to_string(),
        Some(ErrorData {
            reason: err.reason_code().to_string(),
        }),
    )
}

fn manual_clock_required() -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        codes::ENGINE,
        "Server runs on the system clock",
        Some(ErrorData {
            reason: "system_clock".to_string(),
        }),
    )
}

#[async_trait]
impl AuctionApiServer for AuctionServer {
    async fn admin_create_auction(&self, setup: AuctionSetup) -> Result<AuctionId, ErrorObjectOwned> {
        self.engine
            .create_auction(&self.clock.context(), setup)
            .map_err(rpc_error)
    }

    async fn admin_go_live(&self, auction_id: AuctionId) -> Result<SessionSnapshot, ErrorObjectOwned> {
        self.engine
            .go_live(&self.clock.context(), auction_id)
            .map_err(rpc_error)
    }

    async fn admin_lock_category(
        &self,
        auction_id: AuctionId,
        category: String,
    ) -> Result<QueueSnapshot, ErrorObjectOwned> {
        self.engine
            .lock_category(&self.clock.context(), auction_id, &category)
            .map_err(rpc_error)
    }

    async fn admin_unlock_category(
        &self,
        auction_id: AuctionId,
        force: Option<bool>,
    ) -> Result<bool, ErrorObjectOwned> {
        self.engine
            .unlock_category(&self.clock.context(), auction_id, force.unwrap_or(false))
            .map_err(rpc_error)?;
        Ok(true)
    }

    async fn admin_start_bidding(
        &self,
        auction_id: AuctionId,
        player_id: PlayerId,
    ) -> Result<SessionSnapshot, ErrorObjectOwned> {
        self.engine
            .start_bidding(&self.clock.context(), auction_id, player_id)
            .map_err(rpc_error)
    }

    async fn admin_next_player(&self, auction_id: AuctionId) -> Result<SessionSnapshot, ErrorObjectOwned> {
        self.engine
            .next_player(&self.clock.context(), auction_id)
            .map_err(rpc_error)
    }

    async fn admin_close_round(&self, auction_id: AuctionId) -> Result<SessionSnapshot, ErrorObjectOwned> {
        self.engine
            .close_round(&self.clock.context(), auction_id)
            .map_err(rpc_error)
    }

    async fn admin_finalize_bid(&self, auction_id: AuctionId) -> Result<Assignment, ErrorObjectOwned> {
        self.engine
            .finalize_bid(&self.clock.context(), auction_id)
            .map_err(rpc_error)
    }

    async fn admin_manual_assign(&self, params: ManualAssignParams) -> Result<Assignment, ErrorObjectOwned> {
        self.engine
            .manual_assign(
                &self.clock.context(),
                params.auction_id,
                params.player_id,
                params.team_id,
                params.price,
            )
            .map_err(rpc_error)
    }

    async fn admin_skip_player(&self, auction_id: AuctionId) -> Result<PlayerId, ErrorObjectOwned> {
        self.engine
            .skip_player(&self.clock.context(), auction_id)
            .map_err(rpc_error)
    }

    async fn admin_complete_auction(&self, auction_id: AuctionId) -> Result<bool, ErrorObjectOwned> {
        self.engine
            .complete_auction(&self.clock.context(), auction_id)
            .map_err(rpc_error)?;
        Ok(true)
    }

    async fn admin_cancel_auction(&self, auction_id: AuctionId) -> Result<bool, ErrorObjectOwned> {
        self.engine
            .cancel_auction(&self.clock.context(), auction_id)
            .map_err(rpc_error)?;
        Ok(true)
    }

    async fn admin_sweep(&self) -> Result<Vec<SweepResult>, ErrorObjectOwned> {
        Ok(sweep(&self.engine, &self.clock))
    }

    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned> {
        if !self.clock.set(timestamp) {
            return Err(manual_clock_required());
        }
        info!("Timestamp set to {}", timestamp);
        Ok(true)
    }

    async fn admin_advance_time(&self, secs: u64) -> Result<u64, ErrorObjectOwned> {
        self.clock.advance(secs).ok_or_else(manual_clock_required)
    }

    async fn auction_place_bid(&self, params: PlaceBidParams) -> Result<Bid, ErrorObjectOwned> {
        self.engine
            .place_bid(
                &self.clock.context(),
                params.auction_id,
                params.team_id,
                params.amount,
                params.player_id,
            )
            .map_err(rpc_error)
    }

    async fn query_get_session(&self, auction_id: AuctionId) -> Result<SessionSnapshot, ErrorObjectOwned> {
        self.engine
            .get_session(&self.clock.context(), auction_id)
            .map_err(rpc_error)
    }

    async fn query_get_bid_history(
        &self,
        auction_id: AuctionId,
        player_id: Option<PlayerId>,
    ) -> Result<Vec<Bid>, ErrorObjectOwned> {
        self.engine
            .get_bid_history(auction_id, player_id)
            .map_err(rpc_error)
    }

    async fn query_get_queue(&self, auction_id: AuctionId) -> Result<Option<QueueSnapshot>, ErrorObjectOwned> {
        self.engine.get_queue(auction_id).map_err(rpc_error)
    }

    async fn query_get_teams(&self, auction_id: AuctionId) -> Result<Vec<TeamSummary>, ErrorObjectOwned> {
        self.engine.get_teams(auction_id).map_err(rpc_error)
    }

    async fn query_get_players(
        &self,
        auction_id: AuctionId,
        category: Option<String>,
    ) -> Result<Vec<PlayerRef>, ErrorObjectOwned> {
        self.engine
            .get_players(auction_id, category.as_deref())
            .map_err(rpc_error)
    }

    async fn query_get_auction(&self, auction_id: AuctionId) -> Result<AuctionInfo, ErrorObjectOwned> {
        self.engine.get_info(auction_id).map_err(rpc_error)
    }

    async fn query_list_auctions(&self) -> Result<Vec<AuctionSummary>, ErrorObjectOwned> {
        Ok(self.engine.list_auctions())
    }

    async fn query_server_time(&self) -> Result<u64, ErrorObjectOwned> {
        Ok(self.clock.now())
    }
}

/// Run one deadline sweep and log what it resolved.
pub fn sweep(engine: &AuctionEngine, clock: &Clock) -> Vec<SweepResult> {
    engine
        .sweep_expired(&clock.context())
        .into_iter()
        .map(|(auction_id, outcome)| {
            info!(auction_id, ?outcome, "expired round resolved");
            SweepResult { auction_id, outcome }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_module::EngineConfig;
    use auction_types::{PlayerRegistration, RoundOutcome, RoundState, TeamRegistration};
    use std::collections::BTreeMap;

    fn server() -> AuctionServer {
        let config = EngineConfig {
            queue_seed: Some(7),
            ..Default::default()
        };
        let engine = Arc::new(AuctionEngine::new(config).unwrap());
        AuctionServer::new(engine, Arc::new(Clock::manual(1_000)))
    }

    fn setup() -> AuctionSetup {
        AuctionSetup {
            name: "Premier".into(),
            pricing: None,
            queue_policy: None,
            players: vec![PlayerRegistration {
                player_id: 1,
                name: "A. Batter".into(),
                category: Some("Gold".into()),
                approved_category: None,
                approved: true,
                is_captain: false,
                is_icon: false,
            }],
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

    fn bid(auction_id: AuctionId, amount: u64) -> PlaceBidParams {
        PlaceBidParams {
            auction_id,
            team_id: 1,
            amount,
            player_id: None,
        }
    }

    #[test]
    fn test_error_codes() {
        let err = rpc_error(AuctionError::BidTooLow {
            minimum: 600,
            offered: 500,
        });
        assert_eq!(err.code(), codes::BID_REJECTED);
        let data: ErrorData = serde_json::from_str(err.data().unwrap().get()).unwrap();
        assert_eq!(data.reason, "bid_too_low");

        assert_eq!(rpc_error(AuctionError::AuctionNotFound(3)).code(), codes::NOT_FOUND);
        assert_eq!(rpc_error(AuctionError::AuctionNotLive).code(), codes::INVALID_STATE);
        assert_eq!(
            rpc_error(AuctionError::Persistence("down".into())).code(),
            codes::PERSISTENCE
        );
        assert_eq!(
            rpc_error(AuctionError::InvalidConfig("bad".into())).code(),
            INVALID_PARAMS_CODE
        );
    }

    #[tokio::test]
    async fn test_round_over_rpc() {
        let server = server();
        let id = server.admin_create_auction(setup()).await.unwrap();
        server.admin_go_live(id).await.unwrap();
        server.admin_lock_category(id, "Gold".into()).await.unwrap();

        let session = server.admin_next_player(id).await.unwrap();
        assert_eq!(session.round_state, RoundState::BiddingActive);
        assert_eq!(session.round_deadline, Some(1_060));

        let err = server.auction_place_bid(bid(id, 100)).await.unwrap_err();
        assert_eq!(err.code(), codes::BID_REJECTED);

        server.auction_place_bid(bid(id, 110)).await.unwrap();
        let assignment = server.admin_finalize_bid(id).await.unwrap();
        assert_eq!(assignment.price, 110);

        let teams = server.query_get_teams(id).await.unwrap();
        assert_eq!(teams[0].points_left, 890);
    }

    #[tokio::test]
    async fn test_manual_clock_drives_sweep() {
        let server = server();
        let id = server.admin_create_auction(setup()).await.unwrap();
        server.admin_go_live(id).await.unwrap();
        server.admin_lock_category(id, "Gold".into()).await.unwrap();
        server.admin_start_bidding(id, 1).await.unwrap();

        assert!(server.admin_sweep().await.unwrap().is_empty());
        assert_eq!(server.admin_advance_time(61).await.unwrap(), 1_061);

        let resolved = server.admin_sweep().await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].outcome, RoundOutcome::Unsold { player_id: 1 });
    }
}
