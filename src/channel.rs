//! Streaming bridge between the engine and an incremental consumer
//!
//! The whole orchestration runs as one task that pushes text fragments onto
//! a channel as the final answer is produced. [`ResponseStream`] yields the
//! characters to async consumers; [`BlockingChars`] yields the same
//! characters to synchronous ones.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error};

use crate::error::{ParleyError, Result};
use crate::orchestrator::DelegationEngine;
use crate::session::SessionHandle;

/// Text streamed when the session has no active configuration
pub const NO_ACTIVE_REPLY: &str = "Error: No active orchestration configuration set";

fn failure_text(error: &ParleyError) -> String {
    match error {
        ParleyError::NoActiveConfiguration => NO_ACTIVE_REPLY.to_string(),
        other => format!("Error during orchestration: {other}"),
    }
}

/// Failure text for a task that ended without closing its answer normally
///
/// Cancellation is not a failure: an aborted stream just ends.
fn join_failure(outcome: std::result::Result<(), JoinError>) -> Option<String> {
    match outcome {
        Err(e) if e.is_panic() => {
            error!(error = %e, "Streaming orchestration panicked");
            Some(failure_text(&ParleyError::Runtime(
                "orchestration task panicked".to_string(),
            )))
        }
        _ => None,
    }
}

/// Characters of one orchestration's final answer
///
/// Finite and single-use. Dropping the stream or calling
/// [`cancel`](Self::cancel) aborts the orchestration task. A panic in the
/// task ends the stream with `"Error during orchestration: .."` text.
///
/// Fragments are pushed as they are produced, so if the synthesis reply
/// fails partway through, the characters already yielded are followed by
/// the error text. [`DelegationEngine::orchestrate`] returns only the error
/// text in that case.
pub struct ResponseStream {
    rx: mpsc::UnboundedReceiver<String>,
    pending: VecDeque<char>,
    task: JoinHandle<()>,
    /// The task has been joined
    finished: bool,
}

impl ResponseStream {
    /// Start an orchestration on the current tokio runtime
    pub fn spawn(
        engine: Arc<DelegationEngine>,
        session: SessionHandle,
        user_input: impl Into<String>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let user_input = user_input.into();

        let task = tokio::spawn(async move {
            debug!(session_id = %session.id(), "Streaming orchestration started");

            if let Err(e) = engine.orchestrate_with_sink(&session, &user_input, &tx).await {
                error!(session_id = %session.id(), error = %e, "Streaming orchestration failed");
                let _ = tx.send(failure_text(&e));
            }
        });

        Self {
            rx,
            pending: VecDeque::new(),
            task,
            finished: false,
        }
    }

    /// Next chunk of text, at fragment granularity
    pub async fn next_fragment(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            return Some(self.pending.drain(..).collect());
        }
        if self.finished {
            return None;
        }

        match self.rx.recv().await {
            Some(fragment) => Some(fragment),
            None => {
                let outcome = (&mut self.task).await;
                self.finished = true;
                join_failure(outcome)
            }
        }
    }

    /// Collect the remaining answer
    pub async fn collect_text(mut self) -> String {
        let mut text = String::new();
        while let Some(fragment) = self.next_fragment().await {
            text.push_str(&fragment);
        }
        text
    }

    /// Abort the orchestration; characters already queued are still yielded
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Stream for ResponseStream {
    type Item = char;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<char>> {
        let this = self.get_mut();

        loop {
            if let Some(c) = this.pending.pop_front() {
                return Poll::Ready(Some(c));
            }

            if this.finished {
                return Poll::Ready(None);
            }

            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(fragment)) => this.pending.extend(fragment.chars()),
                Poll::Ready(None) => match Pin::new(&mut this.task).poll(cx) {
                    Poll::Ready(outcome) => {
                        this.finished = true;
                        if let Some(text) = join_failure(outcome) {
                            this.pending.extend(text.chars());
                        }
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Blocking character iterator over one orchestration's final answer
///
/// The orchestration runs on a dedicated thread that owns a current-thread
/// runtime for the duration of the call, so this works the same whether or
/// not the caller is already inside a tokio runtime. Each `next` may block
/// the calling thread.
pub struct BlockingChars {
    rx: std::sync::mpsc::Receiver<String>,
    pending: VecDeque<char>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl BlockingChars {
    pub fn spawn(
        engine: Arc<DelegationEngine>,
        session: SessionHandle,
        user_input: impl Into<String>,
    ) -> Result<Self> {
        let (tx, rx) = std::sync::mpsc::channel();
        let user_input = user_input.into();

        let worker = std::thread::Builder::new()
            .name("parley-orchestration".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!(error = %e, "Failed to build orchestration runtime");
                        let _ = tx.send(failure_text(&ParleyError::Runtime(e.to_string())));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let mut stream = ResponseStream::spawn(engine, session, user_input);
                    while let Some(fragment) = stream.next_fragment().await {
                        if tx.send(fragment).is_err() {
                            stream.cancel();
                            break;
                        }
                    }
                });
            })
            .map_err(|e| ParleyError::Runtime(format!("failed to spawn orchestration thread: {e}")))?;

        Ok(Self {
            rx,
            pending: VecDeque::new(),
            worker: Some(worker),
        })
    }
}

impl Iterator for BlockingChars {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        loop {
            if let Some(c) = self.pending.pop_front() {
                return Some(c);
            }

            match self.rx.recv() {
                Ok(fragment) => self.pending.extend(fragment.chars()),
                Err(_) => {
                    if let Some(worker) = self.worker.take() {
                        let _ = worker.join();
                    }
                    return None;
                }
            }
        }
    }
}
