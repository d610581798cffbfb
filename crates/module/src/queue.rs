//! Category queue: the randomized deal order for one locked category.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use auction_types::{Category, PlayerId, PlayerRef, QueuePolicy, QueueSnapshot, RoundState};

use crate::error::AuctionError;
use crate::handlers::HandlerResult;

/// Player pool keyed by id.
pub type PlayerPool = BTreeMap<PlayerId, PlayerRef>;

/// Deal order for the locked category.
///
/// Single consumer: only the owning auction instance pops from it, under the
/// auction lock.
#[derive(Debug, Default, Clone)]
pub struct CategoryQueue {
    locked: Option<Category>,
    order: VecDeque<PlayerId>,
    /// Everyone captured by the current lock, dealt or not
    snapshot: BTreeSet<PlayerId>,
}

impl CategoryQueue {
    pub fn locked_category(&self) -> Option<&str> {
        self.locked.as_deref()
    }

    /// Lock `category` and build its deal order.
    pub fn lock<R: Rng + ?Sized>(
        &mut self,
        category: &str,
        pool: &PlayerPool,
        policy: &QueuePolicy,
        rng: &mut R,
    ) -> HandlerResult<QueueSnapshot> {
        if let Some(locked) = &self.locked {
            return Err(AuctionError::CategoryLocked(locked.clone()));
        }

        let mut eligible: Vec<PlayerId> = pool
            .values()
            .filter(|p| p.is_biddable() && p.effective_category() == Some(category))
            .map(|p| p.player_id)
            .collect();
        eligible.shuffle(rng);

        // Configured priority players go first, in configured order
        let mut order: VecDeque<PlayerId> = VecDeque::with_capacity(eligible.len());
        for id in &policy.priority_players {
            if let Some(pos) = eligible.iter().position(|p| p == id) {
                order.push_back(eligible.remove(pos));
            }
        }
        order.extend(eligible);

        debug!(category, players = order.len(), "category locked");

        self.snapshot = order.iter().copied().collect();
        self.order = order;
        self.locked = Some(category.to_string());

        Ok(self.snapshot_view())
    }

    /// Pop the next player that is still eligible.
    pub fn next(&mut self, pool: &PlayerPool) -> Option<PlayerId> {
        while let Some(id) = self.order.pop_front() {
            if pool.get(&id).is_some_and(PlayerRef::is_biddable) {
                return Some(id);
            }
            debug!(player_id = id, "dropping ineligible player from queue");
        }
        None
    }

    /// Remove a specific player from the remaining order.
    pub fn take(&mut self, player_id: PlayerId) -> bool {
        match self.order.iter().position(|id| *id == player_id) {
            Some(pos) => {
                self.order.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Whether the current lock captured `player_id`.
    pub fn in_snapshot(&self, player_id: PlayerId) -> bool {
        self.snapshot.contains(&player_id)
    }

    /// Players still waiting to be dealt.
    pub fn remaining(&self) -> usize {
        self.order.len()
    }

    /// Players captured by the lock that are still unsold, dealt or not.
    pub fn unsold(&self, pool: &PlayerPool) -> usize {
        self.snapshot
            .iter()
            .filter(|id| pool.get(*id).is_some_and(PlayerRef::is_biddable))
            .count()
    }

    /// Release the lock. Only allowed while no round is in progress; unsold
    /// players block the release unless `force` is set.
    pub fn unlock(&mut self, round: RoundState, pool: &PlayerPool, force: bool) -> HandlerResult<()> {
        if self.locked.is_none() {
            return Err(AuctionError::CategoryNotLocked);
        }
        if round != RoundState::Idle {
            return Err(AuctionError::InvalidTransition {
                op: "unlock_category",
                state: round,
            });
        }

        let remaining = self.unsold(pool);
        if remaining > 0 && !force {
            return Err(AuctionError::UnsoldPlayersRemain { remaining });
        }

        self.reset();
        Ok(())
    }

    /// Drop the lock unconditionally.
    pub fn reset(&mut self) {
        self.locked = None;
        self.order.clear();
        self.snapshot.clear();
    }

    pub fn snapshot(&self) -> Option<QueueSnapshot> {
        self.locked.as_ref().map(|_| self.snapshot_view())
    }

    fn snapshot_view(&self) -> QueueSnapshot {
        QueueSnapshot {
            category: self.locked.clone().unwrap_or_default(),
            remaining: self.order.iter().copied().collect(),
            locked_total: self.snapshot.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_types::PlayerRegistration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool() -> PlayerPool {
        let mut players = vec![
            reg(1, "Gold"),
            reg(2, "Gold"),
            reg(3, "Gold"),
            reg(4, "Platinum"),
            reg(5, "Gold"),
            reg(6, "Gold"),
        ];
        players[4].is_captain = true;
        players[5].approved = false;

        players
            .into_iter()
            .map(|r| (r.player_id, PlayerRef::from(r)))
            .collect()
    }

    fn reg(player_id: PlayerId, category: &str) -> PlayerRegistration {
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

    #[test]
    fn test_lock_filters_eligible() {
        let mut queue = CategoryQueue::default();
        let mut rng = StdRng::seed_from_u64(7);

        let snapshot = queue
            .lock("Gold", &pool(), &QueuePolicy::default(), &mut rng)
            .unwrap();

        let mut ids = snapshot.remaining.clone();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(snapshot.locked_total, 3);
        assert_eq!(queue.locked_category(), Some("Gold"));
    }

    #[test]
    fn test_priority_players_first() {
        let mut queue = CategoryQueue::default();
        let mut rng = StdRng::seed_from_u64(7);
        let policy = QueuePolicy {
            priority_players: vec![3, 4, 2],
        };

        let snapshot = queue.lock("Gold", &pool(), &policy, &mut rng).unwrap();

        // 4 is Platinum, so it is ignored for this lock
        assert_eq!(&snapshot.remaining[..2], &[3, 2]);
        assert_eq!(snapshot.remaining[2], 1);
    }

    #[test]
    fn test_cannot_relock() {
        let mut queue = CategoryQueue::default();
        let mut rng = StdRng::seed_from_u64(1);
        let pool = pool();

        queue.lock("Gold", &pool, &QueuePolicy::default(), &mut rng).unwrap();
        assert_eq!(
            queue.lock("Platinum", &pool, &QueuePolicy::default(), &mut rng),
            Err(AuctionError::CategoryLocked("Gold".into()))
        );
    }

    #[test]
    fn test_next_skips_sold_players() {
        let mut queue = CategoryQueue::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut pool = pool();
        let policy = QueuePolicy {
            priority_players: vec![1, 2, 3],
        };

        queue.lock("Gold", &pool, &policy, &mut rng).unwrap();

        let p2 = pool.get_mut(&2).unwrap();
        p2.team_id = Some(1);
        p2.bid_price = Some(100);

        assert_eq!(queue.next(&pool), Some(1));
        assert_eq!(queue.next(&pool), Some(3));
        assert_eq!(queue.next(&pool), None);
    }

    #[test]
    fn test_unlock_requires_idle_round() {
        let mut queue = CategoryQueue::default();
        let mut rng = StdRng::seed_from_u64(3);
        let pool = pool();

        assert_eq!(
            queue.unlock(RoundState::Idle, &pool, false),
            Err(AuctionError::CategoryNotLocked)
        );

        queue.lock("Gold", &pool, &QueuePolicy::default(), &mut rng).unwrap();
        assert!(matches!(
            queue.unlock(RoundState::BiddingActive, &pool, true),
            Err(AuctionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_unlock_confirmation_gate() {
        let mut queue = CategoryQueue::default();
        let mut rng = StdRng::seed_from_u64(3);
        let pool = pool();

        queue.lock("Gold", &pool, &QueuePolicy::default(), &mut rng).unwrap();
        queue.next(&pool);

        // Dealt-but-unsold players still count
        assert_eq!(
            queue.unlock(RoundState::Idle, &pool, false),
            Err(AuctionError::UnsoldPlayersRemain { remaining: 3 })
        );

        queue.unlock(RoundState::Idle, &pool, true).unwrap();
        assert_eq!(queue.locked_category(), None);
        assert!(queue.snapshot().is_none());
    }

    #[test]
    fn test_take_removes_from_order() {
        let mut queue = CategoryQueue::default();
        let mut rng = StdRng::seed_from_u64(3);
        let pool = pool();

        queue.lock("Gold", &pool, &QueuePolicy::default(), &mut rng).unwrap();
        assert!(queue.take(2));
        assert!(!queue.take(2));
        assert_eq!(queue.remaining(), 2);
        assert!(queue.in_snapshot(2));
    }
}
