//! Worker that drives one chat request.
//!
//! The worker owns the transport call and the decoder; it never touches the
//! conversation. It reports [`StreamEvent`]s in arrival order over a channel
//! whose receiver feeds the reducer.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::decoder::ChunkDecoder;
use crate::error::RequestError;
use crate::reducer::{ChatState, Effect, RequestId};
use crate::transport::{ChatRequest, HttpTransport};

/// Progress of one request, tagged with the request it belongs to.
#[derive(Debug)]
pub enum StreamEvent {
    Chunk { id: RequestId, text: String },
    Complete { id: RequestId },
    Failed { id: RequestId, error: RequestError },
}

impl StreamEvent {
    pub fn id(&self) -> RequestId {
        match self {
            StreamEvent::Chunk { id, .. } | StreamEvent::Complete { id } | StreamEvent::Failed { id, .. } => *id,
        }
    }

    /// Feed this event to the reducer.
    pub fn apply(self, state: &mut ChatState) -> Vec<Effect> {
        match self {
            StreamEvent::Chunk { id, text } => state.on_chunk_decoded(id, &text),
            StreamEvent::Complete { id } => state.on_stream_complete(id),
            StreamEvent::Failed { id, error } => state.on_transport_error(id, &error),
        }
    }
}

/// Spawn the worker for `request`. Aborting the returned handle abandons the
/// body; the reducer side handles that through [`ChatState::abort`].
pub fn spawn_stream(
    transport: HttpTransport,
    id: RequestId,
    request: ChatRequest,
    tx: mpsc::UnboundedSender<StreamEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match transport.send(&request).await {
            Ok(chunks) => forward_chunks(id, chunks, &tx).await,
            Err(error) => {
                let _ = tx.send(StreamEvent::Failed { id, error });
            }
        }
    })
}

/// Decode `chunks` and forward them, then report completion or failure.
pub async fn forward_chunks<S>(id: RequestId, mut chunks: S, tx: &mpsc::UnboundedSender<StreamEvent>)
where
    S: Stream<Item = Result<Vec<u8>, RequestError>> + Unpin,
{
    let mut decoder = ChunkDecoder::new();
    let mut chunk_count = 0usize;
    let mut byte_count = 0usize;

    while let Some(item) = chunks.next().await {
        match item {
            Ok(bytes) => {
                chunk_count += 1;
                byte_count += bytes.len();
                trace!(request_id = %id, len = bytes.len(), "chunk received");

                let text = decoder.push(&bytes);
                if tx.send(StreamEvent::Chunk { id, text }).is_err() {
                    debug!(request_id = %id, "receiver dropped, abandoning stream");
                    return;
                }
            }
            Err(error) => {
                let _ = tx.send(StreamEvent::Failed { id, error });
                return;
            }
        }
    }

    let leftover = decoder.finish();
    if !leftover.is_empty() {
        warn!(
            request_id = %id,
            pending = leftover.pending().len(),
            malformed = leftover.malformed().len(),
            "response ended with undecodable bytes"
        );
    }
    debug!(request_id = %id, chunks = chunk_count, bytes = byte_count, "response body finished");
    let _ = tx.send(StreamEvent::Complete { id });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::reducer::{RequestContext, ERROR_TURN_TEXT};
    use crate::transport::Credential;
    use futures::stream;
    use pretty_assertions::assert_eq;

    async fn collect(id: RequestId, items: Vec<Result<Vec<u8>, RequestError>>) -> Vec<StreamEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_chunks(id, stream::iter(items), &tx).await;
        drop(tx);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn start(state: &mut ChatState) -> RequestId {
        let key = Credential::new("k1").unwrap();
        let effects = state.submit(
            "Hello",
            RequestContext {
                credential: Some(&key),
                model: "m",
                developer_prompt: "p",
                document_ref: None,
            },
        );
        match effects.first() {
            Some(Effect::SendRequest { id, .. }) => *id,
            other => panic!("expected SendRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn split_character_survives_chunk_boundary() {
        let id = RequestId::new();
        let bytes = "añb".as_bytes();
        let events = collect(id, vec![Ok(bytes[..2].to_vec()), Ok(bytes[2..].to_vec())]).await;

        let texts: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Chunk { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["a".to_string(), "ñb".to_string()]);
        assert!(matches!(events.last(), Some(StreamEvent::Complete { .. })));
    }

    #[tokio::test]
    async fn mid_stream_failure_is_last_event() {
        let id = RequestId::new();
        let events = collect(
            id,
            vec![
                Ok(b"Par".to_vec()),
                Err(RequestError::InvalidRequest("dropped")),
                Ok(b"never".to_vec()),
            ],
        )
        .await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], StreamEvent::Failed { .. }));
    }

    #[tokio::test]
    async fn events_drive_reducer_to_partial_plus_error() {
        let mut state = ChatState::new();
        let id = start(&mut state);
        let events = collect(id, vec![Ok(b"Par".to_vec()), Err(RequestError::InvalidRequest("x"))]).await;
        for event in events {
            event.apply(&mut state);
        }
        assert_eq!(
            state.conversation().entries(),
            vec![
                (Role::User, "Hello"),
                (Role::Assistant, "Par"),
                (Role::Assistant, ERROR_TURN_TEXT),
            ]
        );
    }

    #[tokio::test]
    async fn empty_body_completes_with_empty_turn() {
        let mut state = ChatState::new();
        let id = start(&mut state);
        for event in collect(id, Vec::new()).await {
            event.apply(&mut state);
        }
        assert_eq!(
            state.conversation().entries(),
            vec![(Role::User, "Hello"), (Role::Assistant, "")]
        );
        assert!(!state.is_loading());
    }
}
