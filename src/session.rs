//! Session: owns the reducer state and performs its effects.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::UploadError;
use crate::reducer::{ChatState, Effect, RequestContext, RequestId};
use crate::settings::Settings;
use crate::stream::{spawn_stream, StreamEvent};
use crate::transport::HttpTransport;
use crate::upload::{self, Attachment, DocumentFile, UploadOutcome};

/// Results of background work other than chat streaming.
#[derive(Debug)]
pub enum BackgroundEvent {
    Upload {
        id: u64,
        result: Result<UploadOutcome, UploadError>,
    },
    Health(bool),
}

/// Backend reachability as last probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Unknown,
    Up,
    Down,
}

pub struct Session {
    state: ChatState,
    settings: Settings,
    attachment: Attachment,
    transport: HttpTransport,
    health: Health,
    /// Sequence number of the last upload started.
    upload_seq: u64,
    /// The upload whose result will be applied, if one is running.
    upload: Option<(u64, JoinHandle<()>)>,
    fresh_upload_error: Option<String>,
    scroll_requested: bool,
    worker: Option<(RequestId, JoinHandle<()>)>,
    stream_tx: mpsc::UnboundedSender<StreamEvent>,
    stream_rx: mpsc::UnboundedReceiver<StreamEvent>,
    background_tx: mpsc::UnboundedSender<BackgroundEvent>,
    background_rx: mpsc::UnboundedReceiver<BackgroundEvent>,
}

impl Session {
    pub fn new(transport: HttpTransport, settings: Settings) -> Self {
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        let (background_tx, background_rx) = mpsc::unbounded_channel();

        Self {
            state: ChatState::new(),
            settings,
            attachment: Attachment::default(),
            transport,
            health: Health::Unknown,
            upload_seq: 0,
            upload: None,
            fresh_upload_error: None,
            scroll_requested: false,
            worker: None,
            stream_tx,
            stream_rx,
            background_tx,
            background_rx,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn is_uploading(&self) -> bool {
        self.upload.is_some()
    }

    /// Message of an upload failure not yet shown, if any.
    pub fn take_upload_error(&mut self) -> Option<String> {
        self.fresh_upload_error.take()
    }

    /// Whether a transition asked the view to scroll since the last call.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    /// Submit user text. Returns whether it was accepted.
    pub fn submit(&mut self, text: &str) -> bool {
        let ctx = RequestContext {
            credential: self.settings.credential(),
            model: self.settings.model.current(),
            developer_prompt: self.settings.developer_prompt.current(),
            document_ref: self.attachment.document_ref(),
        };
        let effects = self.state.submit(text, ctx);
        let accepted = !effects.is_empty();
        self.perform(effects);
        accepted
    }

    /// Cancel the in-flight request, if any.
    pub fn cancel(&mut self) {
        if let Some(id) = self.state.in_flight() {
            let effects = self.state.abort(id);
            self.perform(effects);
        }
    }

    /// Start uploading the file at `path`. A no-op without a credential.
    ///
    /// A new upload supersedes one still running: the older task is aborted
    /// and any result it already sent is ignored.
    pub fn start_upload(&mut self, path: PathBuf) -> bool {
        let Some(credential) = self.settings.credential().cloned() else {
            debug!("upload ignored: no credential configured");
            return false;
        };

        if let Some((old, handle)) = self.upload.take() {
            debug!(upload = old, "superseding running upload");
            handle.abort();
        }

        self.upload_seq += 1;
        let id = self.upload_seq;
        let transport = self.transport.clone();
        let tx = self.background_tx.clone();
        let handle = tokio::spawn(async move {
            let result = match DocumentFile::read(&path).await {
                Ok(file) => upload::upload(&transport, &file, Some(&credential)).await,
                Err(err) => Err(err),
            };
            let _ = tx.send(BackgroundEvent::Upload { id, result });
        });
        self.upload = Some((id, handle));
        true
    }

    /// Probe the backend once in the background.
    pub fn probe_health(&self) {
        let transport = self.transport.clone();
        let tx = self.background_tx.clone();
        tokio::spawn(async move {
            let up = transport.health().await;
            let _ = tx.send(BackgroundEvent::Health(up));
        });
    }

    /// Apply every event that is ready without waiting. Returns whether any
    /// state changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.stream_rx.try_recv() {
            self.apply_stream(event);
            changed = true;
        }
        while let Ok(event) = self.background_rx.try_recv() {
            self.apply_background(event);
            changed = true;
        }
        changed
    }

    /// Wait for the next event and apply it.
    pub async fn next_event(&mut self) {
        tokio::select! {
            Some(event) = self.stream_rx.recv() => self.apply_stream(event),
            Some(event) = self.background_rx.recv() => self.apply_background(event),
        }
    }

    /// Apply events until the in-flight request settles.
    pub async fn wait_idle(&mut self) {
        while self.state.is_loading() {
            self.next_event().await;
        }
    }

    /// Apply events until the latest upload reports back.
    pub async fn wait_upload(&mut self) {
        while self.upload.is_some() {
            self.next_event().await;
        }
    }

    fn apply_stream(&mut self, event: StreamEvent) {
        let settled_id = event.id();
        let effects = event.apply(&mut self.state);
        if !self.state.is_loading() {
            self.release_worker(settled_id);
        }
        self.perform(effects);
    }

    fn apply_background(&mut self, event: BackgroundEvent) {
        match event {
            BackgroundEvent::Upload { id, result } => {
                if !matches!(self.upload, Some((current, _)) if current == id) {
                    debug!(upload = id, "ignoring result of superseded upload");
                    return;
                }
                self.upload = None;
                let failed = result.is_err();
                self.attachment.apply(result);
                if failed {
                    self.fresh_upload_error = self.attachment.last_error().map(str::to_string);
                }
            }
            BackgroundEvent::Health(up) => {
                info!(endpoint = self.transport.endpoint(), up, "backend health");
                self.health = if up { Health::Up } else { Health::Down };
            }
        }
    }

    fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SendRequest { id, request } => {
                    let handle = spawn_stream(self.transport.clone(), id, request, self.stream_tx.clone());
                    self.worker = Some((id, handle));
                }
                Effect::CancelRequest(id) => {
                    if let Some((worker_id, handle)) = self.worker.take() {
                        if worker_id == id {
                            handle.abort();
                        } else {
                            self.worker = Some((worker_id, handle));
                        }
                    }
                }
                Effect::ScrollToBottom => self.scroll_requested = true,
            }
        }
    }

    fn release_worker(&mut self, id: RequestId) {
        if matches!(self.worker, Some((worker_id, _)) if worker_id == id) {
            self.worker = None;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.worker.take() {
            handle.abort();
        }
        if let Some((_, handle)) = self.upload.take() {
            handle.abort();
        }
    }
}
