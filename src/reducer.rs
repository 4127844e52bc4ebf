//! Conversation state machine.
//!
//! `Idle -> AwaitingFirstChunk -> Streaming -> Idle` on success. A transport
//! error or an abort returns to `Idle` from either busy phase. Transitions
//! mutate [`ChatState`] and return [`Effect`]s; performing them (sending the
//! request, aborting the worker, scrolling the view) is up to the caller.

use std::fmt;

use strum::Display;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::conversation::{Conversation, Role};
use crate::error::RequestError;
use crate::transport::{ChatRequest, Credential};

/// Text of the assistant turn appended when a request fails.
pub const ERROR_TURN_TEXT: &str = "Sorry, there was an error processing your request.";

/// Identifies one accepted submission and every event it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingFirstChunk,
    Streaming,
}

/// Everything outside the conversation that a chat request is built from.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub credential: Option<&'a Credential>,
    pub model: &'a str,
    pub developer_prompt: &'a str,
    pub document_ref: Option<&'a str>,
}

/// Work requested by a transition.
#[derive(Debug, PartialEq)]
pub enum Effect {
    SendRequest { id: RequestId, request: ChatRequest },
    CancelRequest(RequestId),
    ScrollToBottom,
}

/// Conversation plus the bookkeeping of the turn being streamed.
#[derive(Debug, Default)]
pub struct ChatState {
    conversation: Conversation,
    phase: Phase,
    /// Index of the assistant turn still receiving chunks.
    open_turn: Option<usize>,
    accumulated: String,
    in_flight: Option<RequestId>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn open_turn(&self) -> Option<usize> {
        self.open_turn
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight
    }

    /// Append a user turn and request a send. A no-op unless idle, with
    /// non-blank text and a credential.
    pub fn submit(&mut self, user_text: &str, ctx: RequestContext<'_>) -> Vec<Effect> {
        let text = user_text.trim();
        if text.is_empty() {
            debug!("submission ignored: empty message");
            return Vec::new();
        }
        let Some(credential) = ctx.credential else {
            debug!("submission ignored: no credential configured");
            return Vec::new();
        };
        if self.phase != Phase::Idle {
            debug!(phase = %self.phase, "submission ignored: a request is already in flight");
            return Vec::new();
        }

        self.conversation.push(Role::User, text);
        self.phase = Phase::AwaitingFirstChunk;
        self.open_turn = None;
        self.accumulated.clear();

        let id = RequestId::new();
        self.in_flight = Some(id);
        info!(
            request_id = %id,
            model = ctx.model,
            has_document = ctx.document_ref.is_some(),
            "submitting chat request"
        );

        let request = ChatRequest {
            developer_prompt: ctx.developer_prompt.to_string(),
            user_message: text.to_string(),
            model: ctx.model.to_string(),
            credential: credential.clone(),
            document_ref: ctx.document_ref.map(str::to_string),
        };

        vec![Effect::SendRequest { id, request }, Effect::ScrollToBottom]
    }

    /// Merge decoded text into the open assistant turn, opening one if needed.
    pub fn on_chunk_decoded(&mut self, id: RequestId, text: &str) -> Vec<Effect> {
        if !self.accepts(id, "chunk") {
            return Vec::new();
        }

        match self.open_turn {
            Some(index) => {
                self.accumulated.push_str(text);
                self.conversation.replace_content(index, self.accumulated.clone());
            }
            None => {
                self.accumulated = text.to_string();
                let index = self.conversation.push(Role::Assistant, text);
                self.open_turn = Some(index);
            }
        }
        self.phase = Phase::Streaming;

        vec![Effect::ScrollToBottom]
    }

    /// The body ended. An empty response still completes as an empty turn.
    pub fn on_stream_complete(&mut self, id: RequestId) -> Vec<Effect> {
        if !self.accepts(id, "completion") {
            return Vec::new();
        }

        if self.open_turn.is_none() {
            self.conversation.push(Role::Assistant, String::new());
        }
        info!(request_id = %id, chars = self.accumulated.chars().count(), "chat response complete");
        self.settle();

        vec![Effect::ScrollToBottom]
    }

    /// The request failed. Partial content stays as it is and the fixed
    /// error text is appended as its own turn.
    pub fn on_transport_error(&mut self, id: RequestId, err: &RequestError) -> Vec<Effect> {
        if !self.accepts(id, "error") {
            return Vec::new();
        }

        error!(
            request_id = %id,
            error = %err,
            partial_chars = self.accumulated.chars().count(),
            "chat request failed"
        );
        self.conversation.push(Role::Assistant, ERROR_TURN_TEXT);
        self.settle();

        vec![Effect::ScrollToBottom]
    }

    /// Stop the in-flight request, keeping whatever streamed so far.
    pub fn abort(&mut self, id: RequestId) -> Vec<Effect> {
        if !self.accepts(id, "abort") {
            return Vec::new();
        }

        info!(request_id = %id, partial_chars = self.accumulated.chars().count(), "chat request cancelled");
        self.settle();

        vec![Effect::CancelRequest(id)]
    }

    fn accepts(&self, id: RequestId, what: &str) -> bool {
        if self.phase == Phase::Idle || self.in_flight != Some(id) {
            debug!(request_id = %id, phase = %self.phase, "ignoring stale {}", what);
            return false;
        }
        true
    }

    /// Close the open turn and return to idle.
    fn settle(&mut self) {
        self.open_turn = None;
        self.accumulated.clear();
        self.in_flight = None;
        self.phase = Phase::Idle;
    }
}
