use bytes::Bytes;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

/// What the supervisor publishes to viewers.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// One complete JPEG.
    Frame(Bytes),
    /// The streaming process is gone; viewers should disconnect.
    Ended,
}

/// One viewer's handle on the shared stream. Dropping it detaches the viewer.
#[derive(Debug)]
pub struct LiveStream {
    rx: broadcast::Receiver<StreamEvent>,
}

impl LiveStream {
    pub(crate) fn new(rx: broadcast::Receiver<StreamEvent>) -> Self {
        Self { rx }
    }

    /// Next JPEG frame, or `None` once the stream has ended.
    ///
    /// A viewer that falls behind skips the frames it missed.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.recv().await {
                Ok(StreamEvent::Frame(frame)) => return Some(frame),
                Ok(StreamEvent::Ended) | Err(RecvError::Closed) => return None,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Viewer lagging, frames skipped");
                }
            }
        }
    }
}
