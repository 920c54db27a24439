//! Credential-gated, read-only view of submitted feedback.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::api_client::{AdminCredentials, RemoteError, RemoteExecutor};
use crate::dispatch::Spawner;
use crate::models::{FeedbackPage, PAGE_SIZE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminState {
    LoggedOut,
    Loading { page: u32 },
    Loaded(FeedbackPage),
    Unauthorized,
    Failed { page: u32, message: String },
}

struct AdminCompletion {
    seq: u64,
    page: u32,
    result: Result<FeedbackPage, RemoteError>,
}

pub struct AdminFeed {
    executor: Arc<dyn RemoteExecutor>,
    spawner: Arc<dyn Spawner>,
    tx: Sender<AdminCompletion>,
    rx: Receiver<AdminCompletion>,
    credentials: Option<AdminCredentials>,
    request_seq: u64,
    state: AdminState,
}

impl AdminFeed {
    pub fn new(executor: Arc<dyn RemoteExecutor>, spawner: Arc<dyn Spawner>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            executor,
            spawner,
            tx,
            rx,
            credentials: None,
            request_seq: 0,
            state: AdminState::LoggedOut,
        }
    }

    pub fn state(&self) -> &AdminState {
        &self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn login(&mut self, password: &str) {
        self.credentials = Some(AdminCredentials {
            password: password.to_string(),
        });
        self.fetch(1);
    }

    /// Forget the credentials. A response still in flight is dropped.
    pub fn logout(&mut self) {
        self.credentials = None;
        self.request_seq += 1;
        self.state = AdminState::LoggedOut;
    }

    pub fn goto_page(&mut self, page: u32) {
        if self.credentials.is_some() {
            self.fetch(page.max(1));
        }
    }

    /// Apply the latest response. Returns `true` if the state changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok(completion) = self.rx.try_recv() {
            if completion.seq != self.request_seq {
                debug!("Dropping stale admin response {}", completion.seq);
                continue;
            }
            changed = true;
            self.state = match completion.result {
                Ok(page) => AdminState::Loaded(page),
                Err(RemoteError::Unauthorized) => {
                    warn!("Admin login rejected");
                    self.credentials = None;
                    AdminState::Unauthorized
                }
                Err(e) => {
                    warn!("Failed to fetch admin feedback: {}", e);
                    AdminState::Failed {
                        page: completion.page,
                        message: e.to_string(),
                    }
                }
            };
        }
        changed
    }

    fn fetch(&mut self, page: u32) {
        let Some(credentials) = self.credentials.clone() else {
            return;
        };
        self.request_seq += 1;
        self.state = AdminState::Loading { page };

        let seq = self.request_seq;
        let executor = Arc::clone(&self.executor);
        let tx = self.tx.clone();
        self.spawner.spawn(Box::new(move || {
            let result = executor.admin_feedback(&credentials, page, PAGE_SIZE);
            let _ = tx.send(AdminCompletion { seq, page, result });
        }));
    }
}
