//! Response capture decorator
//!
//! Wraps an outbound body (or a plain writer) so that everything written to
//! the client is also observable afterwards. The wrapped stream behaves
//! exactly like the original; the copy goes to a shared [`CapturedResponse`].

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};
use parking_lot::Mutex;

/// Observed state of one response
#[derive(Debug)]
pub struct CapturedResponse {
    max_body_bytes: usize,
    state: Mutex<ResponseState>,
}

#[derive(Debug, Default)]
struct ResponseState {
    status: Option<u16>,
    written: usize,
    body: BytesMut,
    completed_at: Option<Instant>,
}

impl CapturedResponse {
    /// `max_body_bytes` bounds the buffered copy, not the forwarded stream
    pub fn new(max_body_bytes: usize) -> Self {
        Self {
            max_body_bytes,
            state: Mutex::new(ResponseState::default()),
        }
    }

    pub fn set_status(&self, status: u16) {
        self.state.lock().status = Some(status);
    }

    /// Status code, 200 when none was recorded
    pub fn status(&self) -> u16 {
        self.state.lock().status.unwrap_or(200)
    }

    /// Count `chunk` and buffer as much of it as the cap allows
    pub fn record(&self, chunk: &[u8]) {
        let mut state = self.state.lock();
        state.written += chunk.len();
        let room = self.max_body_bytes.saturating_sub(state.body.len());
        if room > 0 {
            let take = room.min(chunk.len());
            state.body.extend_from_slice(&chunk[..take]);
        }
    }

    /// Total bytes written, buffered or not
    pub fn size(&self) -> usize {
        self.state.lock().written
    }

    pub fn body(&self) -> Bytes {
        self.state.lock().body.clone().freeze()
    }

    pub fn is_truncated(&self) -> bool {
        let state = self.state.lock();
        state.written > state.body.len()
    }

    /// Stamp the completion time. Later calls keep the first stamp.
    pub fn mark_complete(&self) {
        let mut state = self.state.lock();
        if state.completed_at.is_none() {
            state.completed_at = Some(Instant::now());
        }
    }

    pub fn completed_at(&self) -> Option<Instant> {
        self.state.lock().completed_at
    }
}

type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Body decorator that tees data frames into a [`CapturedResponse`].
///
/// `on_complete` runs once, either at end of stream or when the body is
/// dropped (client went away, error mid-stream).
pub struct CaptureBody<B> {
    inner: B,
    captured: Arc<CapturedResponse>,
    on_complete: Option<Completion>,
}

impl<B> CaptureBody<B> {
    pub fn new(inner: B, captured: Arc<CapturedResponse>) -> Self {
        Self {
            inner,
            captured,
            on_complete: None,
        }
    }

    pub fn on_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    fn finish(&mut self) {
        if let Some(callback) = self.on_complete.take() {
            self.captured.mark_complete();
            callback();
        }
    }
}

impl<B> Body for CaptureBody<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.captured.record(data);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for CaptureBody<B> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Writer decorator for console and job output streams
pub struct CaptureWriter<W> {
    inner: W,
    captured: Arc<CapturedResponse>,
}

impl<W: io::Write> CaptureWriter<W> {
    pub fn new(inner: W, captured: Arc<CapturedResponse>) -> Self {
        Self { inner, captured }
    }

    pub fn captured(&self) -> &CapturedResponse {
        &self.captured
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> io::Write for CaptureWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.captured.record(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
