//! Event-Stream Relay
//!
//! Re-frames the upstream server-sent event stream for the client. Upstream
//! chunks are decoded incrementally (a chunk may end inside a multi-byte
//! character) and accumulated until a blank line closes an event; only
//! complete events are written to the client, in upstream order, followed by
//! a single `data: [DONE]` sentinel.

use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::Response;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::io;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::error::ApiError;

/// Terminal event written after the upstream stream ends
pub const DONE_EVENT: &str = "data: [DONE]\n\n";

/// Payload of the sentinel event, as it appears upstream
const DONE_PAYLOAD: &str = "[DONE]";

/// Chunks queued between the relay task and the client body
const RELAY_CHANNEL_CAPACITY: usize = 64;

/// Field names that already make a line a server-sent event line
const SSE_FIELD_PREFIXES: &[&str] = &["data:", "event:", "id:", "retry:", ":"];

/// Incremental UTF-8 decoder.
///
/// Bytes of an incomplete trailing sequence are held until the next call.
/// Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode as much of `pending + chunk` as forms complete characters
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(error) => {
                    let valid = error.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match error.error_len() {
                        // Incomplete sequence at the end; wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left at end of input
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Per-request buffering state: decoder plus the text not yet closed by a
/// blank line.
#[derive(Debug, Default)]
pub struct EventBuffer {
    decoder: Utf8Decoder,
    pending: String,
}

impl EventBuffer {
    /// Feed one upstream chunk; returns the events it completed, trimmed,
    /// in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decoder.decode(chunk);
        self.pending.push_str(&text);

        let mut events = Vec::new();
        while let Some((pos, sep_len)) = find_separator(&self.pending) {
            let event = self.pending[..pos].trim().to_string();
            self.pending.drain(..pos + sep_len);
            if !event.is_empty() {
                events.push(event);
            }
        }
        events
    }

    /// End of upstream: returns the trailing fragment if anything but
    /// whitespace is left.
    pub fn finish(&mut self) -> Option<String> {
        let rest = self.decoder.finish();
        self.pending.push_str(&rest);

        let tail = self.pending.trim().to_string();
        self.pending.clear();
        (!tail.is_empty()).then_some(tail)
    }
}

/// Earliest event separator in `buffer` as `(position, length)`
fn find_separator(buffer: &str) -> Option<(usize, usize)> {
    let lf = buffer.find("\n\n").map(|pos| (pos, 2));
    let crlf = buffer.find("\r\n\r\n").map(|pos| (pos, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

/// True if the event is the upstream's own end-of-stream marker
fn is_done_event(event: &str) -> bool {
    event
        .strip_prefix("data:")
        .is_some_and(|payload| payload.trim() == DONE_PAYLOAD)
}

/// Wrap a trimmed event in the client envelope
pub fn frame_event(event: &str) -> Bytes {
    if SSE_FIELD_PREFIXES
        .iter()
        .any(|prefix| event.starts_with(prefix))
    {
        Bytes::from(format!("{}\n\n", event))
    } else {
        Bytes::from(format!("data: {}\n\n", event))
    }
}

/// Build the streaming client response for an upstream byte stream.
///
/// Headers are fixed here; the body is fed by a task spawned per request
/// (see [`spawn_relay`]).
pub fn event_stream_response<S, E>(upstream: S, request_id: String) -> Response
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let rx = spawn_relay(upstream, request_id);
    let body = Body::from_stream(ReceiverStream::new(rx));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        header::CONNECTION,
        header::HeaderValue::from_static("keep-alive"),
    );
    response
}

/// Spawn the relay task and return the receiving end of the client body.
///
/// The task stops as soon as the receiver is dropped (client gone), which
/// also drops the upstream stream and releases its connection. An upstream
/// error ends the body with an I/O error and no sentinel.
pub fn spawn_relay<S, E>(upstream: S, request_id: String) -> mpsc::Receiver<Result<Bytes, io::Error>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut upstream = Box::pin(upstream);
        let mut buffer = EventBuffer::default();
        let mut forwarded = 0usize;

        log::debug!("[{}] Stream relay started", request_id);

        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    log::info!("[{}] Client disconnected after {} events", request_id, forwarded);
                    return;
                }
                next = upstream.next() => next,
            };

            match next {
                Some(Ok(bytes)) => {
                    for event in buffer.push(&bytes) {
                        if is_done_event(&event) {
                            continue;
                        }
                        if tx.send(Ok(frame_event(&event))).await.is_err() {
                            log::info!("[{}] Client disconnected after {} events", request_id, forwarded);
                            return;
                        }
                        forwarded += 1;
                    }
                }
                Some(Err(e)) => {
                    let error = ApiError::StreamInterrupted(e.to_string());
                    log::warn!("[{}] {} (after {} events)", request_id, error, forwarded);
                    let _ = tx.send(Err(io::Error::other(error))).await;
                    return;
                }
                None => break,
            }
        }

        if let Some(tail) = buffer.finish() {
            if !is_done_event(&tail) {
                if tx.send(Ok(frame_event(&tail))).await.is_err() {
                    return;
                }
                forwarded += 1;
            }
        }

        let _ = tx.send(Ok(Bytes::from_static(DONE_EVENT.as_bytes()))).await;
        log::info!("[{}] Stream completed: {} events", request_id, forwarded);
    });

    rx
}
