//! Scripted collaborators shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::api::{ApiError, ApiResponse, PendingRequest, Transport};
use crate::auth::{SessionEvent, SessionListener};
use crate::notify::{NoticeKind, Notifier};

pub fn status(code: u16) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::new(StatusCode::from_u16(code).unwrap(), ""))
}

pub fn json(code: u16, body: serde_json::Value) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::new(StatusCode::from_u16(code).unwrap(), body.to_string()))
}

/// Replays canned responses in order and records every request it was given.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<ApiResponse, ApiError>>>,
    requests: Mutex<Vec<PendingRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<ApiResponse, ApiError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<PendingRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &PendingRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left for {}", request.path()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeKind, String)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(NoticeKind, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<(NoticeKind, String)> {
        self.notices.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        self.notices.lock().unwrap().push((kind, message.to_string()));
    }
}

#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<SessionEvent>>,
}

impl EventLog {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl SessionListener for EventLog {
    fn on_session_event(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}
