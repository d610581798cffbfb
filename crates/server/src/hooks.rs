//! Hooks that publish engine events to the log.

use tracing::info;

use auction_module::AuctionHooks;
use auction_types::AuctionEvent;

/// Logs every sale and closure; per-bid events at debug.
#[derive(Debug, Default)]
pub struct TracingHooks;

impl AuctionHooks for TracingHooks {
    fn notify(&self, event: &AuctionEvent) {
        match event {
            AuctionEvent::PlayerSold(notice) => info!(
                auction_id = notice.auction_id,
                player = %notice.player_name,
                team = %notice.team_name,
                price = notice.price,
                "SOLD"
            ),
            AuctionEvent::PlayerUnsold {
                auction_id,
                player_name,
                ..
            } => info!(auction_id, player = %player_name, "UNSOLD"),
            AuctionEvent::AuctionClosed { auction_id, status } => {
                info!(auction_id, ?status, "auction closed")
            }
            other => tracing::debug!(event = ?other, "auction event"),
        }
    }
}
