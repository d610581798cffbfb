//! Client SDK for the player auction server.
//!
//! Typed wrappers over the server's JSON-RPC methods. Engine rejections come
//! back as [`ClientError::Rejected`] with the server's stable reason code, so
//! a bidding UI can react to `bid_too_low` or `insufficient_budget` without
//! parsing messages.

use jsonrpsee::core::client::{ClientT, Error as RpcError};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use thiserror::Error;

use auction_types::{
    Assignment, AuctionId, AuctionInfo, AuctionSetup, AuctionSummary, Bid, ErrorData,
    ManualAssignParams, PlaceBidParams, PlayerId, PlayerRef, QueueSnapshot, SessionSnapshot,
    SweepResult, TeamId, TeamSummary,
};

/// Errors returned by [`AuctionClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message} [{reason}]")]
    Rejected {
        code: i32,
        reason: String,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ClientError {
    /// Server reason code, when the engine rejected the call.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ClientError::Rejected { reason, .. } => Some(reason),
            ClientError::Transport(_) => None,
        }
    }
}

impl From<RpcError> for ClientError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Call(obj) => {
                let reason = obj
                    .data()
                    .and_then(|raw| serde_json::from_str::<ErrorData>(raw.get()).ok())
                    .map(|d| d.reason)
                    .unwrap_or_else(|| "unknown".to_string());
                ClientError::Rejected {
                    code: obj.code(),
                    reason,
                    message: obj.message().to_string(),
                }
            }
            other => ClientError::Transport(other.to_string()),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Typed JSON-RPC client.
#[derive(Debug, Clone)]
pub struct AuctionClient {
    inner: HttpClient,
}

impl AuctionClient {
    pub fn connect(url: &str) -> ClientResult<Self> {
        let inner = HttpClientBuilder::default()
            .build(url)
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self { inner })
    }

    // ============ Admin ============

    pub async fn create_auction(&self, setup: &AuctionSetup) -> ClientResult<AuctionId> {
        Ok(self
            .inner
            .request("admin_createAuction", rpc_params![setup])
            .await?)
    }

    pub async fn go_live(&self, auction_id: AuctionId) -> ClientResult<SessionSnapshot> {
        Ok(self.inner.request("admin_goLive", rpc_params![auction_id]).await?)
    }

    pub async fn lock_category(&self, auction_id: AuctionId, category: &str) -> ClientResult<QueueSnapshot> {
        Ok(self
            .inner
            .request("admin_lockCategory", rpc_params![auction_id, category])
            .await?)
    }

    pub async fn unlock_category(&self, auction_id: AuctionId, force: bool) -> ClientResult<bool> {
        Ok(self
            .inner
            .request("admin_unlockCategory", rpc_params![auction_id, force])
            .await?)
    }

    pub async fn start_bidding(&self, auction_id: AuctionId, player_id: PlayerId) -> ClientResult<SessionSnapshot> {
        Ok(self
            .inner
            .request("admin_startBidding", rpc_params![auction_id, player_id])
            .await?)
    }

    pub async fn next_player(&self, auction_id: AuctionId) -> ClientResult<SessionSnapshot> {
        Ok(self
            .inner
            .request("admin_nextPlayer", rpc_params![auction_id])
            .await?)
    }

    pub async fn close_round(&self, auction_id: AuctionId) -> ClientResult<SessionSnapshot> {
        Ok(self
            .inner
            .request("admin_closeRound", rpc_params![auction_id])
            .await?)
    }

    pub async fn finalize_bid(&self, auction_id: AuctionId) -> ClientResult<Assignment> {
        Ok(self
            .inner
            .request("admin_finalizeBid", rpc_params![auction_id])
            .await?)
    }

    pub async fn manual_assign(
        &self,
        auction_id: AuctionId,
        player_id: PlayerId,
        team_id: TeamId,
        price: u64,
    ) -> ClientResult<Assignment> {
        let params = ManualAssignParams {
            auction_id,
            player_id,
            team_id,
            price,
        };
        Ok(self
            .inner
            .request("admin_manualAssign", rpc_params![params])
            .await?)
    }

    pub async fn skip_player(&self, auction_id: AuctionId) -> ClientResult<PlayerId> {
        Ok(self
            .inner
            .request("admin_skipPlayer", rpc_params![auction_id])
            .await?)
    }

    pub async fn complete_auction(&self, auction_id: AuctionId) -> ClientResult<bool> {
        Ok(self
            .inner
            .request("admin_completeAuction", rpc_params![auction_id])
            .await?)
    }

    pub async fn cancel_auction(&self, auction_id: AuctionId) -> ClientResult<bool> {
        Ok(self
            .inner
            .request("admin_cancelAuction", rpc_params![auction_id])
            .await?)
    }

    pub async fn sweep(&self) -> ClientResult<Vec<SweepResult>> {
        Ok(self.inner.request("admin_sweep", rpc_params![]).await?)
    }

    pub async fn set_timestamp(&self, timestamp: u64) -> ClientResult<bool> {
        Ok(self
            .inner
            .request("admin_setTimestamp", rpc_params![timestamp])
            .await?)
    }

    pub async fn advance_time(&self, secs: u64) -> ClientResult<u64> {
        Ok(self
            .inner
            .request("admin_advanceTime", rpc_params![secs])
            .await?)
    }

    // ============ Bidding ============

    pub async fn place_bid(
        &self,
        auction_id: AuctionId,
        team_id: TeamId,
        amount: u64,
        player_id: Option<PlayerId>,
    ) -> ClientResult<Bid> {
        let params = PlaceBidParams {
            auction_id,
            team_id,
            amount,
            player_id,
        };
        Ok(self
            .inner
            .request("auction_placeBid", rpc_params![params])
            .await?)
    }

    // ============ Queries ============

    pub async fn get_session(&self, auction_id: AuctionId) -> ClientResult<SessionSnapshot> {
        Ok(self
            .inner
            .request("query_getSession", rpc_params![auction_id])
            .await?)
    }

    pub async fn get_bid_history(
        &self,
        auction_id: AuctionId,
        player_id: Option<PlayerId>,
    ) -> ClientResult<Vec<Bid>> {
        Ok(self
            .inner
            .request("query_getBidHistory", rpc_params![auction_id, player_id])
            .await?)
    }

    pub async fn get_queue(&self, auction_id: AuctionId) -> ClientResult<Option<QueueSnapshot>> {
        Ok(self
            .inner
            .request("query_getQueue", rpc_params![auction_id])
            .await?)
    }

    pub async fn get_teams(&self, auction_id: AuctionId) -> ClientResult<Vec<TeamSummary>> {
        Ok(self
            .inner
            .request("query_getTeams", rpc_params![auction_id])
            .await?)
    }

    pub async fn get_players(
        &self,
        auction_id: AuctionId,
        category: Option<&str>,
    ) -> ClientResult<Vec<PlayerRef>> {
        Ok(self
            .inner
            .request("query_getPlayers", rpc_params![auction_id, category])
            .await?)
    }

    pub async fn get_auction(&self, auction_id: AuctionId) -> ClientResult<AuctionInfo> {
        Ok(self
            .inner
            .request("query_getAuction", rpc_params![auction_id])
            .await?)
    }

    pub async fn list_auctions(&self) -> ClientResult<Vec<AuctionSummary>> {
        Ok(self.inner.request("query_listAuctions", rpc_params![]).await?)
    }

    pub async fn server_time(&self) -> ClientResult<u64> {
        Ok(self.inner.request("query_serverTime", rpc_params![]).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonrpsee::types::ErrorObjectOwned;

    #[test]
    fn test_rejection_carries_reason() {
        let obj = ErrorObjectOwned::owned(
            -32010,
            "Bid too low: minimum 600, offered 500",
            Some(serde_json::json!({ "reason": "bid_too_low" })),
        );
        let err = ClientError::from(RpcError::Call(obj));

        assert_eq!(err.reason(), Some("bid_too_low"));
        assert!(matches!(err, ClientError::Rejected { code: -32010, .. }));
    }

    #[test]
    fn test_rejection_without_data() {
        let obj = ErrorObjectOwned::owned(-32000, "boom", None::<()>);
        let err = ClientError::from(RpcError::Call(obj));
        assert_eq!(err.reason(), Some("unknown"));
    }

    #[test]
    fn test_connect_rejects_bad_url() {
        assert!(matches!(
            AuctionClient::connect("not a url"),
            Err(ClientError::Transport(_))
        ));
    }
}
