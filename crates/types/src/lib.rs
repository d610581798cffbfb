//! Core type definitions for live player auctions.
//!
//! This crate provides the shared data structures used across the auction system,
//! including pricing configuration, the player pool, team budget ledgers, bids,
//! session snapshots and the events emitted by the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Auction identifier.
pub type AuctionId = u64;

/// Player (registration) identifier.
pub type PlayerId = u64;

/// Team identifier.
pub type TeamId = u64;

/// Category tier name, e.g. "Platinum" or "Gold".
pub type Category = String;

// =========================
// PRICING
// =========================

/// What happens to the round deadline when a bid is accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeadlinePolicy {
    /// Deadline is fixed when the round opens
    #[default]
    Fixed,

    /// A bid landing within `window_secs` of the deadline pushes it out to
    /// `now + extension_secs`
    AntiSnipe { window_secs: u64, extension_secs: u64 },
}

/// Per-category pricing overrides. Unset fields fall back to the auction-wide value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPricing {
    pub base_price: Option<u64>,
    pub bid_increment: Option<u64>,
    pub round_time_limit_secs: Option<u64>,
}

/// Auction-wide pricing and timing rules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Floor for the first bid (first bid must reach base + increment)
    pub base_price: u64,
    /// Minimum step between consecutive bids
    pub bid_increment: u64,
    /// Length of a bidding round in seconds
    pub round_time_limit_secs: u64,
    /// Bids are still accepted this many seconds past the deadline
    #[serde(default)]
    pub grace_period_secs: u64,
    #[serde(default)]
    pub deadline_policy: DeadlinePolicy,
    #[serde(default)]
    pub category_overrides: BTreeMap<Category, CategoryPricing>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price: 100,
            bid_increment: 10,
            round_time_limit_secs: 60,
            grace_period_secs: 0,
            deadline_policy: DeadlinePolicy::Fixed,
            category_overrides: BTreeMap::new(),
        }
    }
}

impl PricingConfig {
    fn override_for(&self, category: Option<&str>) -> Option<&CategoryPricing> {
        category.and_then(|c| self.category_overrides.get(c))
    }

    /// Base price for a player in `category`.
    pub fn base_price_for(&self, category: Option<&str>) -> u64 {
        self.override_for(category)
            .and_then(|o| o.base_price)
            .unwrap_or(self.base_price)
    }

    /// Bid increment for a player in `category`.
    pub fn increment_for(&self, category: Option<&str>) -> u64 {
        self.override_for(category)
            .and_then(|o| o.bid_increment)
            .unwrap_or(self.bid_increment)
    }

    /// Round length for a player in `category`.
    pub fn time_limit_for(&self, category: Option<&str>) -> u64 {
        self.override_for(category)
            .and_then(|o| o.round_time_limit_secs)
            .unwrap_or(self.round_time_limit_secs)
    }
}

/// Ordering rule applied when a category is locked.
///
/// Players listed in `priority_players` that are eligible for the locked
/// category are dealt first, in the listed order. Everyone else follows in
/// random order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePolicy {
    #[serde(default)]
    pub priority_players: Vec<PlayerId>,
}

// =========================
// AUCTION
// =========================

/// Auction lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    /// Created, not yet accepting rounds
    Upcoming,
    /// Session open, rounds may run
    Live,
    /// Ended normally
    Completed,
    /// Called off by an administrator
    Cancelled,
}

impl AuctionStatus {
    /// Completed and cancelled auctions are archived and accept no further changes.
    pub fn is_terminal(self) -> bool {
        matches!(self, AuctionStatus::Completed | AuctionStatus::Cancelled)
    }
}

/// Auction record (event identity, rules and lifecycle).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionInfo {
    pub auction_id: AuctionId,
    pub name: String,
    pub status: AuctionStatus,
    pub pricing: PricingConfig,
    pub queue_policy: QueuePolicy,
    pub created_at: u64,
    pub went_live_at: Option<u64>,
    pub closed_at: Option<u64>,
}

/// Player registration admitted into an auction pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRegistration {
    pub player_id: PlayerId,
    pub name: String,
    /// Category the player picked when registering
    #[serde(default)]
    pub category: Option<Category>,
    /// Category set by the organiser, wins over the self-assigned one
    #[serde(default)]
    pub approved_category: Option<Category>,
    /// Only approved players are dealt into a bidding queue
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub is_captain: bool,
    #[serde(default)]
    pub is_icon: bool,
}

/// Team admitted into an auction with its budget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRegistration {
    pub team_id: TeamId,
    pub name: String,
    pub owner: String,
    pub total_points: u64,
    #[serde(default)]
    pub max_players: Option<u32>,
    #[serde(default)]
    pub category_caps: BTreeMap<Category, u32>,
}

/// Everything needed to create an auction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSetup {
    pub name: String,
    /// Falls back to the engine default when absent
    #[serde(default)]
    pub pricing: Option<PricingConfig>,
    #[serde(default)]
    pub queue_policy: Option<QueuePolicy>,
    pub players: Vec<PlayerRegistration>,
    pub teams: Vec<TeamRegistration>,
}

// =========================
// PLAYERS
// =========================

/// A player in the auction pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    pub player_id: PlayerId,
    pub name: String,
    pub category: Option<Category>,
    pub approved_category: Option<Category>,
    pub approved: bool,
    pub is_captain: bool,
    pub is_icon: bool,
    /// Owning team once sold
    pub team_id: Option<TeamId>,
    /// Sale price once sold
    pub bid_price: Option<u64>,
}

impl PlayerRef {
    /// Category used for queueing and pricing.
    pub fn effective_category(&self) -> Option<&str> {
        self.approved_category
            .as_deref()
            .or(self.category.as_deref())
    }

    pub fn is_sold(&self) -> bool {
        self.team_id.is_some()
    }

    /// Whether the player may be dealt into a normal bidding queue.
    pub fn is_biddable(&self) -> bool {
        self.approved && !self.is_sold() && !self.is_captain && !self.is_icon
    }
}

impl From<PlayerRegistration> for PlayerRef {
    fn from(r: PlayerRegistration) -> Self {
        Self {
            player_id: r.player_id,
            name: r.name,
            category: r.category,
            approved_category: r.approved_category,
            approved: r.approved,
            is_captain: r.is_captain,
            is_icon: r.is_icon,
            team_id: None,
            bid_price: None,
        }
    }
}

// =========================
// TEAMS
// =========================

/// A player bought by a team.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPurchase {
    pub player_id: PlayerId,
    pub category: Option<Category>,
    pub price: u64,
    pub timestamp: u64,
}

/// Team with its budget ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_id: TeamId,
    pub name: String,
    pub owner: String,
    /// Fixed at creation
    pub total_points: u64,
    /// Sum of purchase prices
    pub points_spent: u64,
    pub players: Vec<PlayerPurchase>,
    pub max_players: Option<u32>,
    pub category_caps: BTreeMap<Category, u32>,
}

impl Team {
    /// Remaining budget. The ledger never lets `points_spent` exceed `total_points`.
    pub fn points_left(&self) -> u64 {
        self.total_points.saturating_sub(self.points_spent)
    }

    pub fn squad_size(&self) -> usize {
        self.players.len()
    }

    pub fn count_in_category(&self, category: &str) -> usize {
        self.players
            .iter()
            .filter(|p| p.category.as_deref() == Some(category))
            .count()
    }

    pub fn owns(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|p| p.player_id == player_id)
    }
}

impl From<TeamRegistration> for Team {
    fn from(r: TeamRegistration) -> Self {
        Self {
            team_id: r.team_id,
            name: r.name,
            owner: r.owner,
            total_points: r.total_points,
            points_spent: 0,
            players: Vec::new(),
            max_players: r.max_players,
            category_caps: r.category_caps,
        }
    }
}

/// Read projection of a team ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub team_id: TeamId,
    pub name: String,
    pub owner: String,
    pub total_points: u64,
    pub points_spent: u64,
    pub points_left: u64,
    pub squad_size: usize,
    pub max_players: Option<u32>,
    pub players: Vec<PlayerPurchase>,
}

impl From<&Team> for TeamSummary {
    fn from(t: &Team) -> Self {
        Self {
            team_id: t.team_id,
            name: t.name.clone(),
            owner: t.owner.clone(),
            total_points: t.total_points,
            points_spent: t.points_spent,
            points_left: t.points_left(),
            squad_size: t.squad_size(),
            max_players: t.max_players,
            players: t.players.clone(),
        }
    }
}

// =========================
// BIDS & SESSION
// =========================

/// An accepted bid. Only `is_winning` changes after acceptance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// Sequence number within the auction
    pub bid_id: u64,
    pub auction_id: AuctionId,
    pub player_id: PlayerId,
    pub team_id: TeamId,
    pub amount: u64,
    pub team_name: String,
    pub owner: String,
    pub timestamp: u64,
    pub is_winning: bool,
}

/// Round state of an auction session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    /// No round in progress
    #[default]
    Idle,
    /// Deadline set, accepting bids
    BiddingActive,
    /// Bidding closed, waiting for the sale to be committed
    Resolving,
}

/// Consistent view of an auction session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub auction_id: AuctionId,
    pub status: AuctionStatus,
    pub round_state: RoundState,
    pub is_active: bool,
    pub current_player: Option<PlayerRef>,
    pub current_highest_bid: Option<Bid>,
    /// Minimum amount the next bid must reach, while bidding is open
    pub next_minimum_bid: Option<u64>,
    pub round_deadline: Option<u64>,
    pub deadline_elapsed: bool,
    pub locked_category: Option<Category>,
    pub queue_remaining: usize,
    /// Engine time the snapshot was taken at; clients derive countdowns from it
    pub server_time: u64,
}

/// Locked category and its remaining deal order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub category: Category,
    pub remaining: Vec<PlayerId>,
    /// Number of players captured when the category was locked
    pub locked_total: usize,
}

/// How a player ended up on a team.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    /// Highest bid committed
    Finalized,
    /// Administrative override
    Manual,
}

/// A committed sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub auction_id: AuctionId,
    pub player_id: PlayerId,
    pub team_id: TeamId,
    pub price: u64,
    pub timestamp: u64,
    pub kind: AssignmentKind,
}

/// How a timed-out round was resolved by the deadline sweep.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoundOutcome {
    Sold(Assignment),
    Unsold { player_id: PlayerId },
    /// Bidding closed, finalize left to the administrator
    AwaitingFinalize { player_id: PlayerId },
}

// =========================
// EVENTS
// =========================

/// "Player sold" notice for out-of-band display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleNotice {
    pub auction_id: AuctionId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub team_id: TeamId,
    pub team_name: String,
    pub price: u64,
    pub kind: AssignmentKind,
}

/// Observable engine events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuctionEvent {
    RoundOpened {
        auction_id: AuctionId,
        player_id: PlayerId,
        deadline: u64,
    },
    BidAccepted(Bid),
    PlayerSold(SaleNotice),
    PlayerUnsold {
        auction_id: AuctionId,
        player_id: PlayerId,
        player_name: String,
    },
    AuctionClosed {
        auction_id: AuctionId,
        status: AuctionStatus,
    },
}

// =========================
// RPC WIRE
// =========================

/// Parameters for placing a bid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceBidParams {
    pub auction_id: AuctionId,
    pub team_id: TeamId,
    pub amount: u64,
    /// Player the bidder saw on screen; a stale view is rejected
    #[serde(default)]
    pub player_id: Option<PlayerId>,
}

/// Parameters for an administrative sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualAssignParams {
    pub auction_id: AuctionId,
    pub player_id: PlayerId,
    pub team_id: TeamId,
    pub price: u64,
}

/// One round resolved by a sweep.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResult {
    pub auction_id: AuctionId,
    pub outcome: RoundOutcome,
}

/// Listing entry for an auction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSummary {
    pub auction_id: AuctionId,
    pub name: String,
    pub status: AuctionStatus,
    pub round_state: RoundState,
    pub locked_category: Option<Category>,
    pub players_total: usize,
    pub players_sold: usize,
    pub num_bids: usize,
}

/// Structured `data` attached to every engine error on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Stable reason code, e.g. `bid_too_low`
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(category: Option<&str>, approved_category: Option<&str>) -> PlayerRef {
        PlayerRef::from(PlayerRegistration {
            player_id: 1,
            name: "A. Batter".to_string(),
            category: category.map(str::to_string),
            approved_category: approved_category.map(str::to_string),
            approved: true,
            is_captain: false,
            is_icon: false,
        })
    }

    #[test]
    fn test_approved_category_overrides_self_assigned() {
        assert_eq!(player(Some("Gold"), None).effective_category(), Some("Gold"));
        assert_eq!(
            player(Some("Gold"), Some("Platinum")).effective_category(),
            Some("Platinum")
        );
        assert_eq!(player(None, None).effective_category(), None);
    }

    #[test]
    fn test_captains_and_icons_are_not_biddable() {
        let mut p = player(Some("Gold"), None);
        assert!(p.is_biddable());

        p.is_captain = true;
        assert!(!p.is_biddable());

        p.is_captain = false;
        p.is_icon = true;
        assert!(!p.is_biddable());

        p.is_icon = false;
        p.team_id = Some(3);
        p.bid_price = Some(700);
        assert!(!p.is_biddable());
    }

    #[test]
    fn test_category_pricing_overrides() {
        let mut pricing = PricingConfig::default();
        pricing.category_overrides.insert(
            "Platinum".to_string(),
            CategoryPricing {
                base_price: Some(1000),
                bid_increment: None,
                round_time_limit_secs: Some(90),
            },
        );

        assert_eq!(pricing.base_price_for(Some("Platinum")), 1000);
        assert_eq!(pricing.increment_for(Some("Platinum")), 10);
        assert_eq!(pricing.time_limit_for(Some("Platinum")), 90);
        assert_eq!(pricing.base_price_for(Some("Gold")), 100);
        assert_eq!(pricing.base_price_for(None), 100);
    }

    #[test]
    fn test_team_points_left() {
        let mut team = Team::from(TeamRegistration {
            team_id: 1,
            name: "Strikers".to_string(),
            owner: "R. Owner".to_string(),
            total_points: 10_000,
            max_players: Some(15),
            category_caps: BTreeMap::new(),
        });
        assert_eq!(team.points_left(), 10_000);

        team.points_spent = 2_500;
        assert_eq!(team.points_left(), 7_500);
    }

    #[test]
    fn test_deadline_policy_from_config_json() {
        let fixed: DeadlinePolicy = serde_json::from_str(r#"{"kind":"fixed"}"#).unwrap();
        assert_eq!(fixed, DeadlinePolicy::Fixed);

        let anti: DeadlinePolicy = serde_json::from_str(
            r#"{"kind":"anti_snipe","window_secs":10,"extension_secs":15}"#,
        )
        .unwrap();
        assert_eq!(
            anti,
            DeadlinePolicy::AntiSnipe {
                window_secs: 10,
                extension_secs: 15
            }
        );
    }

    #[test]
    fn test_registration_defaults() {
        let reg: PlayerRegistration =
            serde_json::from_str(r#"{"player_id":7,"name":"K. Keeper"}"#).unwrap();
        assert!(!reg.approved);
        assert!(!reg.is_captain);
        assert!(reg.category.is_none());
        assert!(!PlayerRef::from(reg).is_biddable());

        let reg: PlayerRegistration =
            serde_json::from_str(r#"{"player_id":7,"name":"K. Keeper","approved":true}"#).unwrap();
        assert!(PlayerRef::from(reg).is_biddable());
    }

    #[test]
    fn test_bid_params_without_player() {
        let params: PlaceBidParams =
            serde_json::from_str(r#"{"auction_id":1,"team_id":2,"amount":600}"#).unwrap();
        assert_eq!(params.player_id, None);

        let data: ErrorData = serde_json::from_value(serde_json::json!({ "reason": "bid_too_low" }))
            .unwrap();
        assert_eq!(data.reason, "bid_too_low");
    }
}
