//! Per-team budget bookkeeping.

use std::collections::BTreeMap;

use auction_types::{PlayerId, PlayerPurchase, Team, TeamId};

use crate::error::AuctionError;
use crate::handlers::HandlerResult;

/// Team budgets and squads for one auction.
#[derive(Debug, Clone, Default)]
pub struct BudgetLedger {
    teams: BTreeMap<TeamId, Team>,
}

impl BudgetLedger {
    pub fn new(teams: impl IntoIterator<Item = Team>) -> Self {
        Self {
            teams: teams.into_iter().map(|t| (t.team_id, t)).collect(),
        }
    }

    pub fn team(&self, team_id: TeamId) -> HandlerResult<&Team> {
        self.teams
            .get(&team_id)
            .ok_or(AuctionError::TeamNotFound(team_id))
    }

    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    /// True if the team has the points and squad room for this purchase.
    pub fn reserve_check(&self, team_id: TeamId, amount: u64, category: Option<&str>) -> bool {
        self.check(team_id, amount, category).is_ok()
    }

    /// Check that `team_id` can take a player of `category` at `amount`.
    pub fn check(&self, team_id: TeamId, amount: u64, category: Option<&str>) -> HandlerResult<()> {
        let team = self.team(team_id)?;

        if let Some(max) = team.max_players {
            if team.squad_size() >= max as usize {
                return Err(AuctionError::CapExceeded {
                    cap: "squad".to_string(),
                    limit: max,
                });
            }
        }

        if let Some(category) = category {
            if let Some(&cap) = team.category_caps.get(category) {
                if team.count_in_category(category) >= cap as usize {
                    return Err(AuctionError::CapExceeded {
                        cap: category.to_string(),
                        limit: cap,
                    });
                }
            }
        }

        if team.points_left() < amount {
            return Err(AuctionError::InsufficientBudget {
                required: amount,
                available: team.points_left(),
            });
        }

        Ok(())
    }

    /// Charge `amount` to the team and add the player to its squad.
    ///
    /// Re-checks budget and caps itself; on error the ledger is untouched.
    /// Returns the team's remaining points.
    pub fn commit(
        &mut self,
        team_id: TeamId,
        player_id: PlayerId,
        amount: u64,
        category: Option<&str>,
        timestamp: u64,
    ) -> HandlerResult<u64> {
        self.check(team_id, amount, category)?;

        let team = self
            .teams
            .get_mut(&team_id)
            .ok_or(AuctionError::TeamNotFound(team_id))?;

        if team.owns(player_id) {
            return Err(AuctionError::PlayerAlreadySold(player_id));
        }

        let spent = team
            .points_spent
            .checked_add(amount)
            .ok_or(AuctionError::ArithmeticOverflow)?;
        if spent > team.total_points {
            return Err(AuctionError::InsufficientBudget {
                required: amount,
                available: team.points_left(),
            });
        }

        team.points_spent = spent;
        team.players.push(PlayerPurchase {
            player_id,
            category: category.map(str::to_string),
            price: amount,
            timestamp,
        });

        Ok(team.points_left())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_types::TeamRegistration;

    fn team(team_id: TeamId, total_points: u64) -> Team {
        Team::from(TeamRegistration {
            team_id,
            name: format!("Team {}", team_id),
            owner: format!("Owner {}", team_id),
            total_points,
            max_players: None,
            category_caps: BTreeMap::new(),
        })
    }

    #[test]
    fn test_commit_updates_balance() {
        let mut ledger = BudgetLedger::new(vec![team(1, 1000)]);

        assert_eq!(ledger.commit(1, 10, 400, Some("Gold"), 100), Ok(600));

        let t = ledger.team(1).unwrap();
        assert_eq!(t.points_spent, 400);
        assert_eq!(t.points_left(), 600);
        assert_eq!(t.players.len(), 1);
        assert_eq!(t.players[0].category.as_deref(), Some("Gold"));
    }

    #[test]
    fn test_insufficient_budget_leaves_ledger_unchanged() {
        let mut ledger = BudgetLedger::new(vec![team(1, 1000)]);
        ledger.commit(1, 10, 700, None, 100).unwrap();

        assert!(!ledger.reserve_check(1, 400, None));
        assert!(ledger.reserve_check(1, 300, None));
        assert_eq!(
            ledger.commit(1, 11, 400, None, 101),
            Err(AuctionError::InsufficientBudget {
                required: 400,
                available: 300
            })
        );

        let t = ledger.team(1).unwrap();
        assert_eq!(t.points_spent, 700);
        assert_eq!(t.players.len(), 1);
    }

    #[test]
    fn test_exact_balance_allowed() {
        let mut ledger = BudgetLedger::new(vec![team(1, 500)]);
        assert!(ledger.reserve_check(1, 500, None));
        assert_eq!(ledger.commit(1, 10, 500, None, 100), Ok(0));
    }

    #[test]
    fn test_squad_cap() {
        let mut t = team(1, 10_000);
        t.max_players = Some(1);
        let mut ledger = BudgetLedger::new(vec![t]);

        ledger.commit(1, 10, 100, None, 100).unwrap();
        assert!(matches!(
            ledger.commit(1, 11, 100, None, 101),
            Err(AuctionError::CapExceeded { limit: 1, .. })
        ));
    }

    #[test]
    fn test_category_cap() {
        let mut t = team(1, 10_000);
        t.category_caps.insert("Platinum".into(), 1);
        let mut ledger = BudgetLedger::new(vec![t]);

        ledger.commit(1, 10, 100, Some("Platinum"), 100).unwrap();
        assert!(matches!(
            ledger.check(1, 100, Some("Platinum")),
            Err(AuctionError::CapExceeded { ref cap, .. }) if cap == "Platinum"
        ));
        assert!(ledger.reserve_check(1, 100, Some("Gold")));
    }

    #[test]
    fn test_duplicate_player_rejected() {
        let mut ledger = BudgetLedger::new(vec![team(1, 10_000)]);
        ledger.commit(1, 10, 100, None, 100).unwrap();
        assert_eq!(
            ledger.commit(1, 10, 100, None, 101),
            Err(AuctionError::PlayerAlreadySold(10))
        );
        assert_eq!(ledger.team(1).unwrap().points_spent, 100);
    }

    #[test]
    fn test_unknown_team() {
        let ledger = BudgetLedger::new(vec![team(1, 100)]);
        assert_eq!(ledger.check(9, 10, None), Err(AuctionError::TeamNotFound(9)));
    }
}
