//! Optimistic vote bookkeeping.
//!
//! A vote patches the cached tallies immediately and is tracked here until the
//! remote call resolves. Every vote gets a fresh sequence number; only the
//! resolution carrying the latest sequence number for its item may touch the
//! cache, so a slow earlier call can never revert a newer vote.
//!
//! Per item there is at most one rollback record. A second vote issued while
//! the first is in flight keeps the original snapshot; a vote issued after the
//! item went idle snapshots the tallies it patches over. A fetch applied while
//! votes are outstanding becomes the new rollback target, with the outstanding
//! votes replayed on top of it for display.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::api_client::RemoteError;
use crate::models::{Item, ItemId, QueryKey, VoteDirection, VoteTally};

/// Handle for one dispatched vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTicket {
    pub item_id: ItemId,
    pub seq: u64,
    pub key: QueryKey,
    pub direction: VoteDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The latest vote succeeded. `apply` holds the tallies to write into the
    /// cache, if any; `None` keeps the optimistic values.
    Confirmed { apply: Option<VoteTally> },
    /// The latest vote failed; `restore` holds the tallies to put back.
    RolledBack {
        restore: VoteTally,
        error: RemoteError,
    },
    /// A newer vote for the same item is outstanding or already resolved.
    Superseded,
}

struct PendingVote {
    latest_seq: u64,
    rollback: VoteTally,
    key: QueryKey,
    // Votes dispatched but not yet resolved, in dispatch order
    outstanding: Vec<(u64, VoteDirection)>,
}

pub struct MutationCoordinator {
    next_seq: u64,
    pending: HashMap<ItemId, PendingVote>,
    refresh_delay: Duration,
    refresh_at: Option<Instant>,
    apply_server_tallies: bool,
}

impl MutationCoordinator {
    pub fn new(refresh_delay: Duration, apply_server_tallies: bool) -> Self {
        Self {
            next_seq: 1,
            pending: HashMap::new(),
            refresh_delay,
            refresh_at: None,
            apply_server_tallies,
        }
    }

    /// Register a vote on `item` as currently cached under `key`.
    ///
    /// Returns the ticket for the remote call and the optimistic tallies to
    /// patch into the cache, computed from the tallies currently shown.
    pub fn begin(
        &mut self,
        key: &QueryKey,
        item: &Item,
        direction: VoteDirection,
    ) -> (VoteTicket, VoteTally) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let current = item.tally();
        match self.pending.get_mut(&item.id) {
            Some(pending) => {
                debug!(
                    "Vote on {} overlaps seq {}, keeping rollback snapshot",
                    item.id, pending.latest_seq
                );
                pending.latest_seq = seq;
                pending.key = key.clone();
                pending.outstanding.push((seq, direction));
            }
            None => {
                self.pending.insert(
                    item.id,
                    PendingVote {
                        latest_seq: seq,
                        rollback: current,
                        key: key.clone(),
                        outstanding: vec![(seq, direction)],
                    },
                );
            }
        }

        let ticket = VoteTicket {
            item_id: item.id,
            seq,
            key: key.clone(),
            direction,
        };
        (ticket, current.apply(direction))
    }

    /// Settle a vote. Any resolution, stale or not, pushes the deferred
    /// refresh back to `now + refresh_delay`.
    pub fn resolve(
        &mut self,
        ticket: &VoteTicket,
        outcome: Result<VoteTally, RemoteError>,
        now: Instant,
    ) -> Resolution {
        self.refresh_at = Some(now + self.refresh_delay);

        let Some(pending) = self.pending.get_mut(&ticket.item_id) else {
            return Resolution::Superseded;
        };

        pending.outstanding.retain(|(seq, _)| *seq != ticket.seq);
        if pending.latest_seq != ticket.seq {
            // An older call confirmed: its tallies are the newest known server
            // state, so a later rollback should land there.
            if let Ok(tally) = outcome {
                pending.rollback = tally;
            }
            debug!(
                "Discarding stale vote resolution for {} (seq {} < {})",
                ticket.item_id, ticket.seq, pending.latest_seq
            );
            return Resolution::Superseded;
        }

        let rollback = pending.rollback;
        self.pending.remove(&ticket.item_id);

        match outcome {
            Ok(tally) => Resolution::Confirmed {
                apply: self.apply_server_tallies.then_some(tally),
            },
            Err(error) => Resolution::RolledBack {
                restore: rollback,
                error,
            },
        }
    }

    pub fn is_pending(&self, id: ItemId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Key the outstanding patch for `id` was applied under.
    pub fn pending_key(&self, id: ItemId) -> Option<&QueryKey> {
        self.pending.get(&id).map(|pending| &pending.key)
    }

    /// Take freshly fetched tallies for `id` as the new rollback target.
    ///
    /// Returns the tallies to display: the fetched ones with every still
    /// outstanding vote applied again. `None` when no vote is pending.
    pub fn rebase(&mut self, id: ItemId, fetched: VoteTally) -> Option<VoteTally> {
        let pending = self.pending.get_mut(&id)?;
        pending.rollback = fetched;
        Some(
            pending
                .outstanding
                .iter()
                .fold(fetched, |tally, (_, direction)| tally.apply(*direction)),
        )
    }

    pub fn refresh_due(&self, now: Instant) -> bool {
        self.refresh_at.is_some_and(|at| now >= at)
    }

    /// Consume the deferred refresh if it is due.
    pub fn take_refresh(&mut self, now: Instant) -> bool {
        if self.refresh_due(now) {
            self.refresh_at = None;
            true
        } else {
            false
        }
    }

    pub fn refresh_at(&self) -> Option<Instant> {
        self.refresh_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Period, SortMode};
    use crate::testing::item;

    fn key() -> QueryKey {
        QueryKey::new(SortMode::Hot, Period::Week, None, None, 1)
    }

    fn tally(upvotes: u32, downvotes: u32) -> VoteTally {
        VoteTally { upvotes, downvotes }
    }

    #[test]
    fn test_patch_rollback_symmetry() {
        let mut coordinator = MutationCoordinator::new(Duration::from_secs(2), true);
        let target = item(7, 10, 2);
        let (ticket, patched) = coordinator.begin(&key(), &target, VoteDirection::Up);
        assert_eq!(patched, tally(11, 2));
        assert!(coordinator.is_pending(7));

        let resolution = coordinator.resolve(&ticket, Err(RemoteError::RateLimited), Instant::now());
        assert_eq!(
            resolution,
            Resolution::RolledBack {
                restore: tally(10, 2),
                error: RemoteError::RateLimited
            }
        );
        assert!(!coordinator.has_pending());
    }

    #[test]
    fn test_downvote_never_decrements_upvotes() {
        let mut coordinator = MutationCoordinator::new(Duration::from_secs(2), true);
        let (_, patched) = coordinator.begin(&key(), &item(7, 10, 2), VoteDirection::Down);
        assert_eq!(patched, tally(10, 3));
    }

    #[test]
    fn test_overlapping_votes_keep_original_snapshot() {
        let mut coordinator = MutationCoordinator::new(Duration::from_secs(2), true);
        let (first, patched) = coordinator.begin(&key(), &item(7, 10, 2), VoteDirection::Up);
        let shown = item(7, patched.upvotes, patched.downvotes);
        let (second, patched) = coordinator.begin(&key(), &shown, VoteDirection::Down);
        assert_eq!(patched, tally(11, 3));
        assert!(second.seq > first.seq);

        let now = Instant::now();
        assert_eq!(
            coordinator.resolve(&second, Err(RemoteError::Status(500)), now),
            Resolution::RolledBack {
                restore: tally(10, 2),
                error: RemoteError::Status(500)
            }
        );
        // The first call resolving late changes nothing
        assert_eq!(
            coordinator.resolve(&first, Ok(tally(11, 2)), now),
            Resolution::Superseded
        );
    }

    #[test]
    fn test_last_resolution_wins() {
        let mut coordinator = MutationCoordinator::new(Duration::from_secs(2), true);
        let (first, patched) = coordinator.begin(&key(), &item(7, 10, 2), VoteDirection::Up);
        let shown = item(7, patched.upvotes, patched.downvotes);
        let (second, _) = coordinator.begin(&key(), &shown, VoteDirection::Up);

        let now = Instant::now();
        assert_eq!(
            coordinator.resolve(&second, Ok(tally(12, 2)), now),
            Resolution::Confirmed {
                apply: Some(tally(12, 2))
            }
        );
        assert_eq!(
            coordinator.resolve(&first, Err(RemoteError::RateLimited), now),
            Resolution::Superseded
        );
    }

    #[test]
    fn test_stale_success_moves_rollback_target() {
        let mut coordinator = MutationCoordinator::new(Duration::from_secs(2), true);
        let (first, patched) = coordinator.begin(&key(), &item(7, 10, 2), VoteDirection::Up);
        let shown = item(7, patched.upvotes, patched.downvotes);
        let (second, _) = coordinator.begin(&key(), &shown, VoteDirection::Up);

        let now = Instant::now();
        assert_eq!(
            coordinator.resolve(&first, Ok(tally(11, 2)), now),
            Resolution::Superseded
        );
        assert_eq!(
            coordinator.resolve(&second, Err(RemoteError::RateLimited), now),
            Resolution::RolledBack {
                restore: tally(11, 2),
                error: RemoteError::RateLimited
            }
        );
    }

    #[test]
    fn test_vote_after_resolution_snapshots_current_tallies() {
        let mut coordinator = MutationCoordinator::new(Duration::from_secs(2), false);
        let (first, _) = coordinator.begin(&key(), &item(7, 10, 2), VoteDirection::Up);
        assert_eq!(
            coordinator.resolve(&first, Ok(tally(11, 2)), Instant::now()),
            Resolution::Confirmed { apply: None }
        );

        let (second, _) = coordinator.begin(&key(), &item(7, 11, 2), VoteDirection::Up);
        match coordinator.resolve(&second, Err(RemoteError::RateLimited), Instant::now()) {
            Resolution::RolledBack { restore, .. } => assert_eq!(restore, tally(11, 2)),
            other => panic!("expected rollback, got {other:?}"),
        }
    }

    #[test]
    fn test_rebase_moves_rollback_and_replays_outstanding() {
        let mut coordinator = MutationCoordinator::new(Duration::from_secs(2), true);
        assert_eq!(coordinator.rebase(7, tally(20, 2)), None);

        let (first, patched) = coordinator.begin(&key(), &item(7, 10, 2), VoteDirection::Up);
        let shown = item(7, patched.upvotes, patched.downvotes);
        let (second, _) = coordinator.begin(&key(), &shown, VoteDirection::Down);
        let now = Instant::now();
        assert_eq!(
            coordinator.resolve(&first, Err(RemoteError::Status(500)), now),
            Resolution::Superseded
        );

        // Only the second vote is still out
        assert_eq!(coordinator.rebase(7, tally(20, 2)), Some(tally(20, 3)));
        assert_eq!(coordinator.pending_key(7), Some(&key()));
        assert_eq!(
            coordinator.resolve(&second, Err(RemoteError::RateLimited), now),
            Resolution::RolledBack {
                restore: tally(20, 2),
                error: RemoteError::RateLimited
            }
        );
    }

    #[test]
    fn test_each_resolution_resets_refresh_timer() {
        let mut coordinator = MutationCoordinator::new(Duration::from_secs(2), true);
        let t0 = Instant::now();
        let (first, _) = coordinator.begin(&key(), &item(1, 0, 0), VoteDirection::Up);
        let (second, _) = coordinator.begin(&key(), &item(2, 0, 0), VoteDirection::Up);
        assert!(!coordinator.refresh_due(t0 + Duration::from_secs(10)));

        coordinator.resolve(&first, Ok(tally(1, 0)), t0);
        let t1 = t0 + Duration::from_millis(1_500);
        coordinator.resolve(&second, Ok(tally(1, 0)), t1);

        assert!(!coordinator.take_refresh(t0 + Duration::from_secs(2)));
        assert!(coordinator.take_refresh(t1 + Duration::from_secs(2)));
        assert!(!coordinator.refresh_due(t1 + Duration::from_secs(5)));
    }
}
