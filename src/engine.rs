//! Client-side synchronization of the ranked list.
//!
//! `SyncEngine` lives on the UI thread and is the only writer of the cache.
//! Remote calls run through a [`Spawner`] and report back over a channel;
//! `pump` drains that channel and fires timers, one completion at a time, so
//! every state change happens on this thread in arrival order.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::animator::{AnimationKind, FeedbackAnimator};
use crate::api_client::{FailureCategory, RemoteError, RemoteExecutor};
use crate::cache::ResultCache;
use crate::config::Config;
use crate::dispatch::Spawner;
use crate::feedback::{validate_feedback, FeedbackError, FeedbackStatus};
use crate::models::{
    Item, ItemId, PageResult, Pagination, QueryKey, VoteDirection, VoteTally, PAGE_SIZE,
};
use crate::optimistic::{MutationCoordinator, Resolution, VoteTicket};
use crate::poller::PollingScheduler;
use crate::refine::{Refinement, RefinementChoices};

/// Visible loading state of the active query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Why a fetch was issued. Only user fetches surface failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    User,
    Poll,
    Deferred,
}

#[derive(Debug, Clone)]
struct FetchTicket {
    key: QueryKey,
    seq: u64,
    origin: FetchOrigin,
    votes_at_issue: u64,
}

enum Completion {
    Fetch {
        ticket: FetchTicket,
        result: Result<PageResult, RemoteError>,
    },
    Vote {
        ticket: VoteTicket,
        result: Result<VoteTally, RemoteError>,
    },
    Feedback {
        item_id: ItemId,
        result: Result<(), RemoteError>,
    },
}

pub struct SyncEngine {
    executor: Arc<dyn RemoteExecutor>,
    spawner: Arc<dyn Spawner>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    active: QueryKey,
    cache: ResultCache,
    coordinator: MutationCoordinator,
    animator: FeedbackAnimator,
    poller: PollingScheduler,
    refinement: Refinement,
    load_state: LoadState,
    fetch_seq: u64,
    applied_fetch_seq: u64,
    user_fetch: Option<u64>,
    votes_issued: u64,
    in_flight: usize,
    feedback: HashMap<ItemId, FeedbackStatus>,
}

impl SyncEngine {
    pub fn new(
        config: &Config,
        executor: Arc<dyn RemoteExecutor>,
        spawner: Arc<dyn Spawner>,
        now: Instant,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            executor,
            spawner,
            tx,
            rx,
            active: QueryKey::default(),
            cache: ResultCache::new(config.cache_capacity),
            coordinator: MutationCoordinator::new(
                config.refresh_delay,
                config.apply_server_tallies,
            ),
            animator: FeedbackAnimator::new(),
            poller: PollingScheduler::new(config.poll_interval, config.poll_quiet_period, now),
            refinement: Refinement::default(),
            load_state: LoadState::Idle,
            fetch_seq: 0,
            applied_fetch_seq: 0,
            user_fetch: None,
            votes_issued: 0,
            in_flight: 0,
            feedback: HashMap::new(),
        }
    }

    pub fn active_key(&self) -> &QueryKey {
        &self.active
    }

    /// Make `key` the displayed query.
    ///
    /// A cached page for `key` is shown right away and refreshed silently;
    /// otherwise the view goes into `Loading`. Fetches still in flight for
    /// the previous key are ignored when they land.
    pub fn set_query(&mut self, key: QueryKey, now: Instant) {
        if key == self.active {
            return;
        }
        info!("Switching query to {}", key);
        self.active = key;
        self.user_fetch = None;
        self.poller.reset(now);

        if self.cache.contains(&self.active) {
            self.load_state = LoadState::Ready;
            self.issue_fetch(FetchOrigin::Poll);
        } else {
            self.load_state = LoadState::Loading;
            let seq = self.issue_fetch(FetchOrigin::User);
            self.user_fetch = Some(seq);
        }
    }

    /// User-initiated re-fetch of the active query.
    pub fn refresh(&mut self, now: Instant) {
        self.load_state = LoadState::Loading;
        let seq = self.issue_fetch(FetchOrigin::User);
        self.user_fetch = Some(seq);
        self.poller.mark_polled(now);
    }

    /// Cast a vote on an item of the active page.
    ///
    /// Returns `false` when the item is not on the displayed page.
    pub fn vote(&mut self, id: ItemId, direction: VoteDirection, now: Instant) -> bool {
        let Some(item) = self.cache.read(&self.active).and_then(|page| page.item(id).cloned())
        else {
            warn!("Ignoring vote for item {} not on the active page", id);
            return false;
        };

        let (ticket, optimistic) = self.coordinator.begin(&self.active, &item, direction);
        self.cache
            .patch(&self.active, id, |item| item.with_tally(optimistic));
        let kind = match direction {
            VoteDirection::Up => AnimationKind::Up,
            VoteDirection::Down => AnimationKind::Down,
        };
        self.animator.trigger(id, kind, now);
        self.poller.note_mutation(now);
        self.votes_issued += 1;
        debug!("Optimistic vote {:?} on {} (seq {})", direction, id, ticket.seq);

        let executor = Arc::clone(&self.executor);
        let tx = self.tx.clone();
        self.spawn(move || {
            let result = executor.vote(ticket.item_id, ticket.direction);
            let _ = tx.send(Completion::Vote { ticket, result });
        });
        true
    }

    /// Validate and send feedback for an item.
    ///
    /// Text outside the accepted bounds is refused here without a remote
    /// call. A submission already in flight for the same item is not
    /// repeated.
    pub fn submit_feedback(&mut self, id: ItemId, text: &str) -> Result<(), FeedbackError> {
        let text = validate_feedback(text)?;
        if self.feedback.get(&id) == Some(&FeedbackStatus::Sending) {
            return Ok(());
        }
        self.feedback.insert(id, FeedbackStatus::Sending);

        let executor = Arc::clone(&self.executor);
        let tx = self.tx.clone();
        self.spawn(move || {
            let result = executor.submit_feedback(id, &text);
            let _ = tx.send(Completion::Feedback { item_id: id, result });
        });
        Ok(())
    }

    /// Apply finished remote calls and fire due timers.
    ///
    /// Returns `true` when anything visible may have changed.
    pub fn pump(&mut self, now: Instant) -> bool {
        let mut changed = false;

        while let Ok(completion) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            changed = true;
            match completion {
                Completion::Fetch { ticket, result } => self.on_fetch(ticket, result),
                Completion::Vote { ticket, result } => self.on_vote(ticket, result, now),
                Completion::Feedback { item_id, result } => self.on_feedback(item_id, result),
            }
        }

        let before = self.animator.len();
        self.animator.sweep(now);
        changed |= before != self.animator.len();

        if !self.coordinator.has_pending() && self.coordinator.take_refresh(now) {
            debug!("Deferred refresh of {}", self.active);
            self.issue_fetch(FetchOrigin::Deferred);
            self.poller.mark_polled(now);
        } else if !self.coordinator.has_pending() && self.poller.due(now) {
            debug!("Polling {}", self.active);
            self.issue_fetch(FetchOrigin::Poll);
            self.poller.mark_polled(now);
        }

        changed
    }

    /// Earliest instant at which `pump` has timer work to do.
    pub fn next_wakeup(&self) -> Instant {
        [self.animator.next_expiry(), self.coordinator.refresh_at()]
            .into_iter()
            .flatten()
            .fold(self.poller.next_poll(), Instant::min)
    }

    /// Whether remote calls are outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    pub fn page(&self) -> Option<Arc<PageResult>> {
        self.cache.read(&self.active)
    }

    pub fn cached(&self, key: &QueryKey) -> Option<Arc<PageResult>> {
        self.cache.read(key)
    }

    /// How long ago the active page was last stored.
    pub fn page_age(&self, now: Instant) -> Option<Duration> {
        self.cache.age(&self.active, now)
    }

    pub fn pagination(&self) -> Option<Pagination> {
        self.page().map(|page| page.pagination)
    }

    /// Items of the active page that pass the refinement.
    pub fn visible_items(&self) -> Vec<Arc<Item>> {
        self.page()
            .map(|page| self.refinement.apply(&page))
            .unwrap_or_default()
    }

    pub fn choices(&self) -> RefinementChoices {
        self.page()
            .map(|page| RefinementChoices::from_page(&page))
            .unwrap_or_default()
    }

    pub fn refinement(&self) -> &Refinement {
        &self.refinement
    }

    pub fn set_refinement(&mut self, refinement: Refinement) {
        self.refinement = refinement;
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn animation(&self, id: ItemId, now: Instant) -> Option<AnimationKind> {
        self.animator.current(id, now)
    }

    pub fn is_vote_pending(&self, id: ItemId) -> bool {
        self.coordinator.is_pending(id)
    }

    pub fn feedback_status(&self, id: ItemId) -> Option<&FeedbackStatus> {
        self.feedback.get(&id)
    }

    pub fn clear_feedback_status(&mut self, id: ItemId) {
        if self.feedback.get(&id) != Some(&FeedbackStatus::Sending) {
            self.feedback.remove(&id);
        }
    }

    fn spawn(&mut self, job: impl FnOnce() + Send + 'static) {
        self.in_flight += 1;
        self.spawner.spawn(Box::new(job));
    }

    fn issue_fetch(&mut self, origin: FetchOrigin) -> u64 {
        self.fetch_seq += 1;
        let ticket = FetchTicket {
            key: self.active.clone(),
            seq: self.fetch_seq,
            origin,
            votes_at_issue: self.votes_issued,
        };
        let seq = ticket.seq;

        let executor = Arc::clone(&self.executor);
        let tx = self.tx.clone();
        self.spawn(move || {
            let result = executor.list(&ticket.key, PAGE_SIZE);
            let _ = tx.send(Completion::Fetch { ticket, result });
        });
        seq
    }

    fn on_fetch(&mut self, ticket: FetchTicket, result: Result<PageResult, RemoteError>) {
        let is_user_fetch = self.user_fetch == Some(ticket.seq);
        if is_user_fetch {
            self.user_fetch = None;
        }

        if ticket.key != self.active {
            debug!("Discarding fetch for inactive query {}", ticket.key);
            return;
        }
        if ticket.seq < self.applied_fetch_seq {
            debug!("Discarding fetch {} older than applied {}", ticket.seq, self.applied_fetch_seq);
            return;
        }

        match result {
            Ok(page) => {
                let raced_vote = self.coordinator.has_pending()
                    || self.votes_issued != ticket.votes_at_issue;
                if ticket.origin != FetchOrigin::User && raced_vote {
                    debug!("Dropping background fetch that raced a vote on {}", ticket.key);
                    return;
                }
                debug!("Applying {} items for {}", page.items.len(), ticket.key);
                let page = self.rebase_pending(&ticket.key, page);
                self.cache.replace(ticket.key, page);
                self.applied_fetch_seq = ticket.seq;
                self.load_state = LoadState::Ready;
            }
            Err(e) if is_user_fetch => {
                warn!("Failed to load {}: {}", ticket.key, e);
                self.load_state = LoadState::Failed(e.to_string());
            }
            Err(e) => {
                debug!("Background fetch of {} failed, keeping stale data: {}", ticket.key, e);
            }
        }
    }

    /// Fold votes still in flight into a fetched page. The fetched tallies
    /// become their rollback target and the outstanding votes stay visible.
    fn rebase_pending(&mut self, key: &QueryKey, mut page: PageResult) -> PageResult {
        if !self.coordinator.has_pending() {
            return page;
        }
        for slot in page.items.iter_mut() {
            if self.coordinator.pending_key(slot.id) != Some(key) {
                continue;
            }
            if let Some(tally) = self.coordinator.rebase(slot.id, slot.tally()) {
                debug!("Rebased pending vote on {} onto {:?}", slot.id, slot.tally());
                *slot = Arc::new(slot.with_tally(tally));
            }
        }
        page
    }

    fn on_vote(&mut self, ticket: VoteTicket, result: Result<VoteTally, RemoteError>, now: Instant) {
        let id = ticket.item_id;
        match self.coordinator.resolve(&ticket, result, now) {
            Resolution::Confirmed { apply: Some(tally) } => {
                debug!("Vote on {} confirmed: {:?}", id, tally);
                self.cache
                    .patch(&ticket.key, id, |item| item.with_tally(tally));
            }
            Resolution::Confirmed { apply: None } => {
                debug!("Vote on {} confirmed", id);
            }
            Resolution::RolledBack { restore, error } => {
                let kind = match error.category() {
                    FailureCategory::TransientRejected => AnimationKind::Rejected,
                    _ => AnimationKind::Failed,
                };
                info!("Vote on {} rolled back: {}", id, error);
                self.cache
                    .patch(&ticket.key, id, |item| item.with_tally(restore));
                self.animator.trigger(id, kind, now);
            }
            Resolution::Superseded => {}
        }
        self.poller.note_mutation(now);
    }

    fn on_feedback(&mut self, id: ItemId, result: Result<(), RemoteError>) {
        let status = match result {
            Ok(()) => {
                info!("Feedback for {} sent", id);
                FeedbackStatus::Sent
            }
            Err(RemoteError::Rejected { message, .. }) => {
                warn!("Feedback for {} rejected: {}", id, message);
                FeedbackStatus::Failed(message)
            }
            Err(e) => {
                warn!("Feedback for {} failed: {}", id, e);
                FeedbackStatus::Failed(e.to_string())
            }
        };
        self.feedback.insert(id, status);
    }
}
