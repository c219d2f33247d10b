//! SSE delivery of chunk streams.
//!
//! One event per chunk, `data` being the chunk JSON. The upstream stream is
//! polled only when the response body is polled, so a slow client slows the
//! upstream read. No `[DONE]` sentinel and no keep-alive comments are sent.

use axum::response::{
    sse::{Event, Sse},
    IntoResponse, Response,
};
use futures::StreamExt;
use gateway_core::{CancellationSignal, ChatChunk, ChunkStream};
use std::convert::Infallible;
use tracing::{debug, error};

use crate::error::ApiError;

/// Fires the cancellation signal when dropped, unless disarmed.
///
/// Lives inside the response body, so a client disconnect (which drops the
/// body) cancels the upstream work.
#[derive(Debug)]
pub struct CancelOnDrop {
    signal: Option<CancellationSignal>,
}

impl CancelOnDrop {
    /// Guard `signal`
    #[must_use]
    pub fn new(signal: CancellationSignal) -> Self {
        Self { signal: Some(signal) }
    }

    /// Stream finished on its own; nothing to cancel
    pub fn disarm(&mut self) {
        self.signal = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            if signal.cancel() {
                debug!("Response dropped before stream end; cancelling upstream");
            }
        }
    }
}

fn chunk_event(chunk: &ChatChunk) -> Option<Event> {
    match Event::default().json_data(chunk) {
        Ok(event) => Some(event),
        Err(err) => {
            error!(error = %err, chunk_id = %chunk.id, "Failed to encode chunk");
            None
        }
    }
}

/// Turn a chunk stream into an SSE response.
///
/// The first item is awaited before committing to `200`: a failure there
/// becomes a regular error response. Later failures end the event stream and
/// are logged.
///
/// # Errors
/// Returns the normalized error when the stream fails before its first chunk
pub async fn sse_response(
    mut stream: ChunkStream,
    cancellation: CancellationSignal,
) -> Result<Response, ApiError> {
    let mut guard = CancelOnDrop::new(cancellation);

    let first = match stream.next().await {
        Some(Ok(chunk)) => Some(chunk),
        Some(Err(err)) => return Err(err.into()),
        None => None,
    };

    let events = async_stream::stream! {
        let mut delivered = 0_usize;

        if let Some(chunk) = first {
            match chunk_event(&chunk) {
                Some(event) => {
                    delivered += 1;
                    yield Ok::<_, Infallible>(event);
                }
                None => return,
            }
        } else {
            guard.disarm();
            return;
        }

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => match chunk_event(&chunk) {
                    Some(event) => {
                        delivered += 1;
                        yield Ok(event);
                    }
                    None => return,
                },
                Err(err) => {
                    let normalized = ApiError::from(err);
                    error!(
                        status = normalized.status().as_u16(),
                        message = %normalized.message(),
                        delivered,
                        "Stream terminated by fault"
                    );
                    return;
                }
            }
        }

        guard.disarm();
        debug!(delivered, "Stream completed");
    };

    Ok(Sse::new(events).into_response())
}
