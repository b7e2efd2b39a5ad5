//! In-process stream worker
//!
//! Owns stream data on its own task. The registry only reaches it through
//! [`WorkerTransport`], by message passing, the same way it would reach an
//! external worker process.

use async_trait::async_trait;
use logdeck_session::{BackendEvent, CreateRequest, CreateResponse, Transport, TransportError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

type Reply<T> = oneshot::Sender<Result<T, TransportError>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub max_streams: usize,
    /// Pending requests before callers start waiting
    pub queue_depth: usize,
    pub event_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_streams: 64,
            queue_depth: 256,
            event_capacity: 1024,
        }
    }
}

enum WorkerRequest {
    Create {
        proposed_id: Option<String>,
        resp: oneshot::Sender<CreateResponse>,
    },
    SetActive {
        id: String,
        resp: Reply<()>,
    },
    Teardown {
        id: String,
        resp: Reply<()>,
    },
    Attach {
        id: String,
        title: String,
        resp: Reply<u32>,
    },
    Append {
        id: String,
        rows: Vec<String>,
        resp: Reply<u64>,
    },
    Search {
        id: String,
        query: Option<String>,
        resp: Reply<u64>,
    },
    Shutdown,
}

#[derive(Default)]
struct Stream {
    rows: Vec<String>,
    sources: Vec<(u32, String)>,
    query: Option<String>,
}

impl Stream {
    fn matches(&self) -> u64 {
        match &self.query {
            Some(query) => self.rows.iter().filter(|row| row.contains(query.as_str())).count() as u64,
            None => 0,
        }
    }
}

struct Worker {
    config: WorkerConfig,
    streams: HashMap<String, Stream>,
    active: Option<String>,
    next_source_id: u32,
    events: broadcast::Sender<BackendEvent>,
}

impl Worker {
    async fn run(mut self, mut requests: mpsc::Receiver<WorkerRequest>) {
        tracing::debug!("Stream worker started");
        while let Some(request) = requests.recv().await {
            match request {
                WorkerRequest::Create { proposed_id, resp } => {
                    let _ = resp.send(self.create(proposed_id));
                }
                WorkerRequest::SetActive { id, resp } => {
                    let _ = resp.send(self.set_active(id));
                }
                WorkerRequest::Teardown { id, resp } => {
                    let _ = resp.send(self.teardown(&id));
                }
                WorkerRequest::Attach { id, title, resp } => {
                    let _ = resp.send(self.attach(&id, title));
                }
                WorkerRequest::Append { id, rows, resp } => {
                    let _ = resp.send(self.append(&id, rows));
                }
                WorkerRequest::Search { id, query, resp } => {
                    let _ = resp.send(self.search(&id, query));
                }
                WorkerRequest::Shutdown => break,
            }
        }
        tracing::debug!(streams = self.streams.len(), "Stream worker stopped");
    }

    fn create(&mut self, proposed_id: Option<String>) -> CreateResponse {
        // Honor the proposal unless it is missing or taken
        let id = proposed_id
            .filter(|id| !id.is_empty() && !self.streams.contains_key(id))
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if self.streams.len() >= self.config.max_streams {
            return CreateResponse {
                id,
                error: Some(format!("stream limit reached ({})", self.config.max_streams)),
            };
        }

        self.streams.insert(id.clone(), Stream::default());
        tracing::debug!(stream_id = %id, "Stream created");
        CreateResponse { id, error: None }
    }

    fn stream_mut(&mut self, id: &str) -> Result<&mut Stream, TransportError> {
        self.streams
            .get_mut(id)
            .ok_or_else(|| TransportError::Rejected(format!("unknown stream {id}")))
    }

    fn set_active(&mut self, id: String) -> Result<(), TransportError> {
        self.stream_mut(&id)?;
        self.active = Some(id);
        Ok(())
    }

    fn teardown(&mut self, id: &str) -> Result<(), TransportError> {
        if self.streams.remove(id).is_none() {
            return Err(TransportError::Rejected(format!("unknown stream {id}")));
        }
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        tracing::debug!(stream_id = %id, "Stream released");
        Ok(())
    }

    fn attach(&mut self, id: &str, title: String) -> Result<u32, TransportError> {
        let source_id = self.next_source_id;
        self.stream_mut(id)?.sources.push((source_id, title.clone()));
        self.next_source_id += 1;
        self.publish(BackendEvent::SourceChanged {
            id: id.to_string(),
            source_id,
            title,
        });
        Ok(source_id)
    }

    fn append(&mut self, id: &str, rows: Vec<String>) -> Result<u64, TransportError> {
        let stream = self.stream_mut(id)?;
        stream.rows.extend(rows);
        let row_count = stream.rows.len() as u64;
        let searching = stream.query.is_some();
        let matches = stream.matches();

        self.publish(BackendEvent::StreamUpdated {
            id: id.to_string(),
            row_count,
        });
        if searching {
            self.publish(BackendEvent::SearchUpdated {
                id: id.to_string(),
                row_count: matches,
            });
        }
        Ok(row_count)
    }

    fn search(&mut self, id: &str, query: Option<String>) -> Result<u64, TransportError> {
        let stream = self.stream_mut(id)?;
        stream.query = query.filter(|q| !q.is_empty());
        let matches = stream.matches();
        self.publish(BackendEvent::SearchUpdated {
            id: id.to_string(),
            row_count: matches,
        });
        Ok(matches)
    }

    fn publish(&self, event: BackendEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

/// Message-passing handle to the stream worker
pub struct WorkerTransport {
    requests: mpsc::Sender<WorkerRequest>,
    events: broadcast::Sender<BackendEvent>,
}

impl WorkerTransport {
    /// Start the worker task. The handle resolves once the worker stops.
    pub fn spawn(config: WorkerConfig) -> (Self, JoinHandle<()>) {
        let (requests, receiver) = mpsc::channel(config.queue_depth.max(1));
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let worker = Worker {
            config,
            streams: HashMap::new(),
            active: None,
            next_source_id: 0,
            events: events.clone(),
        };
        let handle = tokio::spawn(worker.run(receiver));

        (Self { requests, events }, handle)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> WorkerRequest,
    ) -> Result<T, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(build(tx))
            .await
            .map_err(|_| TransportError::Disconnected)?;
        rx.await.map_err(|_| TransportError::Disconnected)
    }

    /// Attach a named source to a stream; returns the new source id
    pub async fn attach_source(&self, id: &str, title: &str) -> Result<u32, TransportError> {
        self.request(|resp| WorkerRequest::Attach {
            id: id.to_string(),
            title: title.to_string(),
            resp,
        })
        .await?
    }

    /// Append rows; returns the stream's new row count
    pub async fn append_rows(&self, id: &str, rows: Vec<String>) -> Result<u64, TransportError> {
        self.request(|resp| WorkerRequest::Append {
            id: id.to_string(),
            rows,
            resp,
        })
        .await?
    }

    /// Run (or clear, with `None`) the stream's search; returns the match count
    pub async fn search(&self, id: &str, query: Option<&str>) -> Result<u64, TransportError> {
        self.request(|resp| WorkerRequest::Search {
            id: id.to_string(),
            query: query.map(str::to_string),
            resp,
        })
        .await?
    }

    pub async fn shutdown(&self) {
        if self.requests.send(WorkerRequest::Shutdown).await.is_err() {
            tracing::debug!("Stream worker already stopped");
        }
    }
}

#[async_trait]
impl Transport for WorkerTransport {
    async fn create(&self, request: CreateRequest) -> Result<CreateResponse, TransportError> {
        self.request(|resp| WorkerRequest::Create {
            proposed_id: request.proposed_id,
            resp,
        })
        .await
    }

    async fn set_active(&self, id: &str) -> Result<(), TransportError> {
        self.request(|resp| WorkerRequest::SetActive {
            id: id.to_string(),
            resp,
        })
        .await?
    }

    async fn teardown(&self, id: &str) -> Result<(), TransportError> {
        self.request(|resp| WorkerRequest::Teardown {
            id: id.to_string(),
            resp,
        })
        .await?
    }

    fn events(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }
}
