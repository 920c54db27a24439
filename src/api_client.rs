use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{
    FeedbackPage, FeedbackRequest, ItemId, ListResponse, PageResult, QueryKey, VoteDirection,
    VoteRequest, VoteTally,
};

const API_PREFIX: &str = "/api/v1/translations";
const ADMIN_USER: &str = "admin";

/// Everything that can go wrong talking to the remote data service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("rate limited")]
    RateLimited,

    #[error("unauthorized")]
    Unauthorized,

    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("server returned status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

/// How a failure is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Rate limit: roll back, show the rejection, let the user retry later.
    TransientRejected,
    /// Network, 5xx or parse failure.
    StructuralFailure,
    /// The service refused the input itself.
    ValidationFailure,
}

impl RemoteError {
    pub fn category(&self) -> FailureCategory {
        match self {
            RemoteError::RateLimited => FailureCategory::TransientRejected,
            RemoteError::Rejected { .. } => FailureCategory::ValidationFailure,
            RemoteError::Unauthorized
            | RemoteError::Status(_)
            | RemoteError::Transport(_)
            | RemoteError::Decode(_) => FailureCategory::StructuralFailure,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::Status(status.as_u16())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// Credentials for the administrative feedback feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub password: String,
}

/// The request/response contract of the remote data service.
///
/// Calls block; callers run them off the UI thread (see `dispatch`).
pub trait RemoteExecutor: Send + Sync {
    fn list(&self, key: &QueryKey, limit: u32) -> Result<PageResult, RemoteError>;

    fn vote(&self, id: ItemId, direction: VoteDirection) -> Result<VoteTally, RemoteError>;

    fn submit_feedback(&self, id: ItemId, text: &str) -> Result<(), RemoteError>;

    fn admin_feedback(
        &self,
        credentials: &AdminCredentials,
        page: u32,
        limit: u32,
    ) -> Result<FeedbackPage, RemoteError>;
}

pub struct LeaderboardClient {
    client: Client,
    base_url: String,
}

impl LeaderboardClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("leaderboard-reader/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::RateLimited);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            let message = response
                .json::<ErrorBody>()
                .map(|body| body.error)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("bad request").to_string());
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Err(RemoteError::Status(status.as_u16()))
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: String,
}

impl RemoteExecutor for LeaderboardClient {
    fn list(&self, key: &QueryKey, limit: u32) -> Result<PageResult, RemoteError> {
        let request = self
            .client
            .get(self.url(API_PREFIX))
            .query(&key.query_params(limit));
        let body: ListResponse = self.send(request)?.json()?;
        debug!("Fetched {} items for {}", body.data.len(), key);
        Ok(body.into())
    }

    fn vote(&self, id: ItemId, direction: VoteDirection) -> Result<VoteTally, RemoteError> {
        let request = self
            .client
            .post(self.url(&format!("{API_PREFIX}/{id}/vote")))
            .json(&VoteRequest {
                vote: direction.as_wire(),
            });
        Ok(self.send(request)?.json()?)
    }

    fn submit_feedback(&self, id: ItemId, text: &str) -> Result<(), RemoteError> {
        let request = self
            .client
            .post(self.url(&format!("{API_PREFIX}/{id}/feedback")))
            .json(&FeedbackRequest { text });
        self.send(request)?;
        Ok(())
    }

    fn admin_feedback(
        &self,
        credentials: &AdminCredentials,
        page: u32,
        limit: u32,
    ) -> Result<FeedbackPage, RemoteError> {
        let request = self
            .client
            .get(self.url("/admin/feedback"))
            .query(&[("page", page), ("limit", limit)])
            .basic_auth(ADMIN_USER, Some(&credentials.password));
        Ok(self.send(request)?.json()?)
    }
}
