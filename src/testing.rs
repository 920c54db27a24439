//! Fixtures shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{TimeZone, Utc};

use crate::api_client::{AdminCredentials, RemoteError, RemoteExecutor};
use crate::dispatch::{Job, Spawner};
use crate::models::{
    FeedbackPage, Item, ItemId, PageResult, Pagination, QueryKey, VoteDirection, VoteTally,
    PAGE_SIZE,
};

pub fn item(id: ItemId, upvotes: u32, downvotes: u32) -> Item {
    Item {
        id,
        username: format!("user{id}"),
        translation: format!("translation {id}"),
        transliteration: None,
        explanation: None,
        region: "KR".to_string(),
        language: "korean".to_string(),
        rank: None,
        top_champions: Vec::new(),
        verified: false,
        upvotes,
        downvotes,
        created_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
        first_seen: None,
    }
}

pub fn page_of(items: Vec<Item>, total: u64) -> PageResult {
    PageResult::new(
        items,
        Pagination {
            page: 1,
            limit: PAGE_SIZE,
            total,
        },
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(QueryKey),
    Vote(ItemId, VoteDirection),
    Feedback(ItemId, String),
    Admin(String, u32),
}

#[derive(Default)]
struct ScriptedPages {
    queue: VecDeque<Result<PageResult, RemoteError>>,
    last: Option<Result<PageResult, RemoteError>>,
}

/// Executor answering from scripted responses and recording every call.
pub struct FakeExecutor {
    pages: Mutex<HashMap<QueryKey, ScriptedPages>>,
    votes: Mutex<VecDeque<Result<VoteTally, RemoteError>>>,
    feedback: Mutex<VecDeque<Result<(), RemoteError>>>,
    admin_password: String,
    admin_pages: Mutex<HashMap<u32, FeedbackPage>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            votes: Mutex::new(VecDeque::new()),
            feedback: Mutex::new(VecDeque::new()),
            admin_password: "hunter2".to_string(),
            admin_pages: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response for a list call on `key`. Once the queue is empty the
    /// last response handed out is repeated.
    pub fn push_page(&self, key: &QueryKey, result: Result<PageResult, RemoteError>) {
        self.pages
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .queue
            .push_back(result);
    }

    pub fn push_vote(&self, result: Result<VoteTally, RemoteError>) {
        self.votes.lock().unwrap().push_back(result);
    }

    pub fn push_feedback(&self, result: Result<(), RemoteError>) {
        self.feedback.lock().unwrap().push_back(result);
    }

    pub fn set_admin_page(&self, page: u32, result: FeedbackPage) {
        self.admin_pages.lock().unwrap().insert(page, result);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl RemoteExecutor for FakeExecutor {
    fn list(&self, key: &QueryKey, _limit: u32) -> Result<PageResult, RemoteError> {
        self.calls.lock().unwrap().push(Call::List(key.clone()));
        let mut pages = self.pages.lock().unwrap();
        let Some(scripted) = pages.get_mut(key) else {
            return Err(RemoteError::Status(404));
        };
        if let Some(next) = scripted.queue.pop_front() {
            scripted.last = Some(next);
        }
        scripted.last.clone().unwrap_or(Err(RemoteError::Status(404)))
    }

    fn vote(&self, id: ItemId, direction: VoteDirection) -> Result<VoteTally, RemoteError> {
        self.calls.lock().unwrap().push(Call::Vote(id, direction));
        self.votes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::Transport("no scripted vote".to_string())))
    }

    fn submit_feedback(&self, id: ItemId, text: &str) -> Result<(), RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Feedback(id, text.to_string()));
        self.feedback.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    fn admin_feedback(
        &self,
        credentials: &AdminCredentials,
        page: u32,
        _limit: u32,
    ) -> Result<FeedbackPage, RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Admin(credentials.password.clone(), page));
        if credentials.password != self.admin_password {
            return Err(RemoteError::Unauthorized);
        }
        self.admin_pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .ok_or(RemoteError::Status(404))
    }
}

/// Holds jobs until the test runs them, so tests pick resolution order.
#[derive(Default)]
pub struct ManualSpawner {
    jobs: Mutex<VecDeque<Job>>,
}

impl ManualSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Run the job at `index` in spawn order.
    pub fn run_at(&self, index: usize) {
        let job = self.jobs.lock().unwrap().remove(index).expect("no such job");
        job();
    }

    pub fn run_next(&self) {
        self.run_at(0);
    }

    pub fn run_all(&self) {
        while self.pending() > 0 {
            self.run_next();
        }
    }
}

impl Spawner for ManualSpawner {
    fn spawn(&self, job: Job) {
        self.jobs.lock().unwrap().push_back(job);
    }
}
