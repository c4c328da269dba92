//! The progress stream returned by [`ContentPipeline::stream`].
//!
//! [`ContentPipeline::stream`]: super::ContentPipeline::stream

use crate::cancellation::CancellationToken;
use crate::core::ProgressEvent;
use crate::errors::ErrorKind;
use futures::stream::{FusedStream, Stream};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::warn;

/// A finite, non-restartable stream of progress events for one run.
///
/// The stream ends right after the terminal `Result` or `Error` event. If
/// the run stops without one (a panic or an aborted task), the stream
/// yields an `internal` error event before ending. Dropping it detaches from the run, which keeps going and discards its
/// remaining events.
#[derive(Debug)]
pub struct ProgressStream {
    receiver: UnboundedReceiver<ProgressEvent>,
    token: Arc<CancellationToken>,
    handle: JoinHandle<()>,
    finished: bool,
}

impl ProgressStream {
    pub(crate) fn new(
        receiver: UnboundedReceiver<ProgressEvent>,
        token: Arc<CancellationToken>,
        handle: JoinHandle<()>,
    ) -> Self {
        Self {
            receiver,
            token,
            handle,
            finished: false,
        }
    }

    /// Cancels the underlying run.
    ///
    /// The pending stage is abandoned and the stream ends with an `Error`
    /// event of kind `cancelled`. Has no effect once the run is terminal.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.token.cancel(reason);
    }

    /// Returns true once the terminal event has been yielded.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns true if the background run task has exited.
    #[must_use]
    pub fn is_run_done(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    self.finished = true;
                    self.receiver.close();
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.finished = true;
                warn!("Run ended without a terminal event");
                Poll::Ready(Some(ProgressEvent::Error {
                    message: "run ended without reporting a result".to_string(),
                    error_kind: ErrorKind::Internal,
                }))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl FusedStream for ProgressStream {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}
