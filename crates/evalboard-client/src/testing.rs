//! In-memory doubles for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use parking_lot::Mutex;

use crate::client::TokenProvider;
use crate::error::ClientError;
use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};

pub fn json(code: u16, body: serde_json::Value) -> ApiResponse {
    ApiResponse {
        status: StatusCode::from_u16(code).unwrap(),
        body: serde_json::to_vec(&body).unwrap(),
    }
}

pub fn status(code: u16) -> ApiResponse {
    ApiResponse {
        status: StatusCode::from_u16(code).unwrap(),
        body: Vec::new(),
    }
}

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: ApiResponse) {
        self.replies.lock().push_back(Ok(response));
    }

    pub fn push_error(&self, err: TransportError) {
        self.replies.lock().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.path.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other(format!("no reply scripted for {}", request.path))))
    }
}

/// Token provider whose refresh either rotates to a fixed token or fails.
pub struct StaticTokens {
    token: Mutex<Option<String>>,
    next: Mutex<Option<String>>,
    ended: AtomicBool,
    refreshes: AtomicUsize,
    invalidations: AtomicUsize,
}

impl StaticTokens {
    pub fn new(token: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            token: Mutex::new(token.map(str::to_string)),
            next: Mutex::new(None),
            ended: AtomicBool::new(false),
            refreshes: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
        })
    }

    pub fn refresh_to(&self, token: &str) {
        *self.next.lock() = Some(token.to_string());
    }

    /// Refreshes report that another caller already ended the session.
    pub fn end_elsewhere(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for StaticTokens {
    fn access_token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    async fn refresh_access_token(&self, _stale: Option<&str>) -> Result<String, ClientError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.ended.load(Ordering::SeqCst) {
            return Err(ClientError::SessionExpired);
        }
        let next = self.next.lock().clone();
        match next {
            Some(token) => {
                *self.token.lock() = Some(token.clone());
                Ok(token)
            }
            None => Err(ClientError::NoRefreshToken),
        }
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        *self.token.lock() = None;
    }
}
