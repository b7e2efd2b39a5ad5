//! Scriptable backend for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

use crate::error::TransportError;
use crate::transport::{BackendEvent, CreateRequest, CreateResponse, Transport};

pub(crate) struct MockTransport {
    events: broadcast::Sender<BackendEvent>,
    assigned: Mutex<VecDeque<String>>,
    create_error: Mutex<Option<String>>,
    fail_create: AtomicBool,
    fail_set_active: AtomicBool,
    fail_teardown: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            events,
            assigned: Mutex::new(VecDeque::new()),
            create_error: Mutex::new(None),
            fail_create: AtomicBool::new(false),
            fail_set_active: AtomicBool::new(false),
            fail_teardown: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Ids handed out by the next `create` calls, in order
    pub(crate) fn assign(&self, ids: &[&str]) {
        self.assigned
            .lock()
            .extend(ids.iter().map(|id| id.to_string()));
    }

    /// Next `create` answers with an error payload
    pub(crate) fn refuse_next(&self, reason: &str) {
        *self.create_error.lock() = Some(reason.to_string());
    }

    pub(crate) fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_set_active(&self, fail: bool) {
        self.fail_set_active.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_teardown(&self, fail: bool) {
        self.fail_teardown.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn emit(&self, event: BackendEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn create(&self, request: CreateRequest) -> Result<CreateResponse, TransportError> {
        let proposed = request.proposed_id.unwrap_or_default();
        self.calls.lock().push(format!("create:{proposed}"));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        let id = self.assigned.lock().pop_front().unwrap_or(proposed);
        Ok(CreateResponse {
            id,
            error: self.create_error.lock().take(),
        })
    }

    async fn set_active(&self, id: &str) -> Result<(), TransportError> {
        self.calls.lock().push(format!("set_active:{id}"));
        if self.fail_set_active.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected(id.to_string()));
        }
        Ok(())
    }

    async fn teardown(&self, id: &str) -> Result<(), TransportError> {
        self.calls.lock().push(format!("teardown:{id}"));
        if self.fail_teardown.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected(id.to_string()));
        }
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }
}
